pub mod pool;

pub use pool::{HandlerFactory, HandlerTable, Submission, SubmissionResult, WorkerPool};
