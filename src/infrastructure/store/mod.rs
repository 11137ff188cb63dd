pub mod memory;

pub use memory::{InMemoryAttendeeStore, InMemoryCallCount};
