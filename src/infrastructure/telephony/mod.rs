pub mod dispatcher;
pub mod driver;

pub use dispatcher::{DriverDispatcher, HttpDispatcher, UpdateCallRequest};
pub use driver::SipMediaApplicationDriver;
