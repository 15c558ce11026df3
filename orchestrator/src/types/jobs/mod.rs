pub mod job_updates;
pub mod record;
