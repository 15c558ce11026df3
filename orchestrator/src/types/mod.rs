pub mod batch;
pub mod chain;
pub mod event;
pub mod jobs;
pub mod manifest;
pub mod params;
pub mod stage;

pub use batch::{is_validation_iteration, Batch};
pub use chain::{ChainKind, StageChain};
pub use event::EventId;
pub use stage::{PipelineLayout, SmoothingMode, Stage, SubmissionMode};
