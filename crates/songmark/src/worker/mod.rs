pub mod job;
pub mod orchestrator;
pub mod pool;
pub mod queue;

pub use job::{Job, JobResult, Priority};
pub use orchestrator::{EnqueueOutcome, Orchestrator};
pub use pool::{WorkerPool, WorkerSettings};
pub use queue::JobQueue;
