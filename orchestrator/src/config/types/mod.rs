pub mod hpc;
pub mod monitoring;
pub mod pipeline;
pub mod project;
pub mod scheduler;

pub use hpc::*;
pub use monitoring::*;
pub use pipeline::*;
pub use project::*;
pub use scheduler::*;
