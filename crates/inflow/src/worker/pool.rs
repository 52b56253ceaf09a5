use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};
use uuid::Uuid;

use crate::error::{ErrorKind, WorkerError};
use crate::handler::{Disposition, HandlerRunner};

/// Builds one handler instance per submission. Registered under the task
/// name the watch service routes by.
pub trait HandlerFactory: Send + Sync {
    fn build(&self, input: &Path) -> HandlerRunner;
}

impl<F> HandlerFactory for F
where
    F: Fn(&Path) -> HandlerRunner + Send + Sync,
{
    fn build(&self, input: &Path) -> HandlerRunner {
        self(input)
    }
}

/// Explicit handler routing table, populated at startup.
#[derive(Default)]
pub struct HandlerTable {
    factories: HashMap<String, Box<dyn HandlerFactory>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: impl HandlerFactory + 'static) {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn build(&self, name: &str, input: &Path) -> Result<HandlerRunner, WorkerError> {
        self.factories
            .get(name)
            .map(|f| f.build(input))
            .ok_or_else(|| WorkerError::UnknownHandler {
                name: name.to_string(),
            })
    }
}

/// One deposited input routed to a named handler.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: String,
    pub handler: String,
    pub input_file: PathBuf,
}

impl Submission {
    pub fn new(handler: impl Into<String>, input_file: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            handler: handler.into(),
            input_file: input_file.into(),
        }
    }
}

/// What the pool reports back per submission.
#[derive(Debug)]
pub struct SubmissionResult {
    pub submission_id: String,
    pub input_file: PathBuf,
    pub disposition: Disposition,
    pub error: Option<(ErrorKind, String)>,
}

/// Runs handler instances on a fixed set of worker threads. Handler state
/// is per-instance; the only shared resources are the sink clients inside
/// the factories.
pub struct WorkerPool {
    job_sender: Sender<Submission>,
    result_receiver: Receiver<SubmissionResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(worker_count: usize, handlers: Arc<HandlerTable>) -> Self {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = bounded::<Submission>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<SubmissionResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let handler_table = Arc::clone(&handlers);

            let handle = thread::spawn(move || {
                run_worker(worker_id, job_rx, result_tx, shutdown_flag, handler_table);
            });

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
        }
    }

    /// Pool sized to the machine.
    pub fn with_default_size(handlers: Arc<HandlerTable>) -> Self {
        Self::new(num_cpus::get(), handlers)
    }

    pub fn submit(&self, submission: Submission) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(submission)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn try_recv_result(&self) -> Option<SubmissionResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<SubmissionResult> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<Submission>,
    result_sender: Sender<SubmissionResult>,
    shutdown: Arc<AtomicBool>,
    handlers: Arc<HandlerTable>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(submission) => {
                debug!(
                    "Worker {} processing submission: {:?}",
                    worker_id, submission.input_file
                );

                let result = run_submission(&handlers, &submission);

                if result_sender.send(result).is_err() {
                    error!("Worker {} failed to send result", worker_id);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn run_submission(handlers: &HandlerTable, submission: &Submission) -> SubmissionResult {
    let mut handler = match handlers.build(&submission.handler, &submission.input_file) {
        Ok(handler) => handler,
        Err(e) => {
            return SubmissionResult {
                submission_id: submission.id.clone(),
                input_file: submission.input_file.clone(),
                disposition: Disposition::Failed,
                error: Some((ErrorKind::InvalidInput, e.to_string())),
            };
        }
    };

    match handler.execute() {
        Ok(outcome) => SubmissionResult {
            submission_id: submission.id.clone(),
            input_file: submission.input_file.clone(),
            disposition: outcome.disposition,
            error: outcome.error,
        },
        // Only re-entry produces this branch; a fresh instance per
        // submission never hits it in practice.
        Err(e) => SubmissionResult {
            submission_id: submission.id.clone(),
            input_file: submission.input_file.clone(),
            disposition: Disposition::Failed,
            error: Some((e.kind(), e.to_string())),
        },
    }
}
