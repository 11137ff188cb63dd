pub mod call_handler;
pub mod router;
pub mod stream_handler;

pub use call_handler::AppState;
pub use router::build_router;
