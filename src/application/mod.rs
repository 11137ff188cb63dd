pub mod bootstrap;
pub mod orchestrator;

pub use bootstrap::App;
pub use orchestrator::MeetingOrchestrator;
