pub mod dispatch;
pub mod driver;
pub mod hooks;
pub mod idle;
pub mod listener;
pub mod orchestrator;

pub use driver::{IterationDriver, IterationReport, Phase};
pub use listener::{JobListener, RoundReport, StatusCounts};
pub use orchestrator::{RunSummary, StageOrchestrator};
