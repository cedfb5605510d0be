pub mod cron;
pub mod pipeline;
pub mod scheduler;

pub use self::cron::CronSchedule;
pub use pipeline::{CycleOutcome, CycleReport, DigestPipeline, TriggerSummary, DIGEST_JOB_NAME};
pub use scheduler::{JobHandler, JobStatus, Scheduler};

pub const DEFAULT_SCHEDULE: &str = "0 8 * * *";

pub mod prelude {
    pub use super::{DigestPipeline, JobHandler, Scheduler, DEFAULT_SCHEDULE, DIGEST_JOB_NAME};
}
