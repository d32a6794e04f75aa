use std::collections::VecDeque;
use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::{debug, error, warn};

use crate::Job;
use crate::executor::JobExecutor;
use crate::sink::ResultSink;

/// Run-wide shared state: the job queue, the result sink and the failure flag.
#[derive(Debug)]
pub struct Scheduler<W: Write> {
    queue: Mutex<VecDeque<Job>>,
    sink: ResultSink<W>,
    failed: AtomicBool,
}

impl<W: Write> Scheduler<W> {
    pub fn new(jobs: Vec<Job>, sink: ResultSink<W>) -> Self {
        Self {
            queue: Mutex::new(jobs.into()),
            sink,
            failed: AtomicBool::new(false),
        }
    }

    pub fn pop(&self) -> Option<Job> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    pub fn sink(&self) -> &ResultSink<W> {
        &self.sink
    }

    pub fn into_sink(self) -> ResultSink<W> {
        self.sink
    }

    fn work<E: JobExecutor + ?Sized>(&self, executor: &E) {
        while let Some(job) = self.pop() {
            let label = job.to_string();
            let outcome = executor.execute(&job);
            if !outcome.is_ok() {
                self.mark_failed();
            }
            if let Err(err) = self.sink.record(&label, outcome) {
                error!("{label}: {err}");
                self.mark_failed();
            }
        }
    }
}

/// Fixed number of threads draining one [`Scheduler`].
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: NonZeroUsize,
}

impl WorkerPool {
    pub fn new(workers: NonZeroUsize) -> Self {
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    /// Blocks until the queue is empty and every in-flight job has been recorded.
    pub fn run<W, E>(&self, scheduler: &Scheduler<W>, executor: &E)
    where
        W: Write + Send,
        E: JobExecutor + ?Sized,
    {
        thread::scope(|scope| {
            let mut spawned = 0;
            for index in 0..self.workers.get() {
                let worker = thread::Builder::new()
                    .name(format!("worker-{index}"))
                    .spawn_scoped(scope, move || scheduler.work(executor));
                match worker {
                    Ok(_) => spawned += 1,
                    Err(err) => {
                        warn!("failed to start worker {index}: {err}");
                        break;
                    }
                }
            }
            debug!(spawned, "workers started");
            if spawned == 0 {
                scheduler.work(executor);
            }
        });
    }
}
