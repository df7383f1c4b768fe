//! The dedicated I/O worker thread shared by `Reader` and `Writer`: a single
//! background thread, a busy flag, and a condition variable. No channel
//! crate is used here on purpose -- the job handoff and its outcome both
//! live directly in the `Mutex`-guarded state, blocking on a condition
//! variable that guards a single busy flag.
//!
//! Double buffering -- each endpoint holds two scratch buffers, swapped
//! atomically under the lock -- is expressed here as ownership transfer
//! rather than manual index-swapping: a job takes ownership of the buffer
//! it will fill or drain, and hands that same buffer back as part of its
//! outcome once done, so the caller can reuse its allocation for the next
//! frame.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::error::{Error, IoError, Result};

pub type Job<T, R> = Box<dyn FnOnce(&mut T) -> Result<R> + Send>;

struct Inner<T, R> {
    resource: Option<T>,
    pending: Option<Job<T, R>>,
    outcome: Option<Result<R>>,
    /// True from the moment a job is submitted until its outcome has been
    /// collected (by `wait`, or discarded by a later `submit`). Distinct
    /// from `pending.is_some()`, which goes false the instant the worker
    /// thread picks the job up -- `outstanding` stays true while the job is
    /// actually running.
    outstanding: bool,
    failed: Option<String>,
    shutdown: bool,
}

struct Shared<T, R> {
    mutex: Mutex<Inner<T, R>>,
    condvar: Condvar,
}

/// A single-job-at-a-time background worker. `T` is the resource the jobs
/// operate on (a `File`, in practice); `R` is whatever a job hands back
/// once it completes (typically the buffer it was given, now drained or
/// filled).
pub struct Worker<T, R> {
    shared: Arc<Shared<T, R>>,
    thread: Option<JoinHandle<()>>,
}

fn worker_failure(message: &str) -> Error {
    Error::Io(IoError::new(std::io::ErrorKind::Other, format!("vidpak I/O worker failed previously: {}", message)))
}

impl<T: Send + 'static, R: Send + 'static> Worker<T, R> {
    pub fn spawn(resource: T, thread_name: impl Into<String>) -> Self {
        let shared = Arc::new(Shared {
            mutex: Mutex::new(Inner {
                resource: Some(resource),
                pending: None,
                outcome: None,
                outstanding: false,
                failed: None,
                shutdown: false,
            }),
            condvar: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name(thread_name.into())
            .spawn(move || Self::run(worker_shared))
            .expect("failed to spawn vidpak I/O worker thread");

        Self { shared, thread: Some(thread) }
    }

    fn run(shared: Arc<Shared<T, R>>) {
        let mut resource = {
            let mut guard = shared.mutex.lock().unwrap();
            guard.resource.take().expect("worker resource taken twice")
        };

        loop {
            let job = {
                let mut guard = shared.mutex.lock().unwrap();
                loop {
                    if guard.shutdown {
                        return;
                    }
                    if let Some(job) = guard.pending.take() {
                        break job;
                    }
                    guard = shared.condvar.wait(guard).unwrap();
                }
            };

            let outcome = job(&mut resource);

            let mut guard = shared.mutex.lock().unwrap();
            if let Err(ref error) = outcome {
                guard.failed = Some(error.to_string());
            }
            guard.outcome = Some(outcome);
            shared.condvar.notify_all();
        }
    }

    /// Waits for any previously submitted job to finish -- discarding its
    /// outcome if the caller never collected it with `wait` (the
    /// fire-and-forget prefetch path), unless that outcome was a failure,
    /// which becomes sticky -- then hands `job` to the worker. Returns as
    /// soon as the job has been handed off; does not wait for `job` itself.
    pub fn submit(&self, job: Job<T, R>) -> Result<()> {
        let mut guard = self.shared.mutex.lock().unwrap();
        guard = self.drain_previous(guard)?;
        guard.pending = Some(job);
        guard.outstanding = true;
        self.shared.condvar.notify_all();
        Ok(())
    }

    /// Blocks until the most recently submitted job completes and returns
    /// its outcome.
    pub fn wait(&self) -> Result<R> {
        let mut guard = self.shared.mutex.lock().unwrap();
        loop {
            if let Some(outcome) = guard.outcome.take() {
                guard.outstanding = false;
                return outcome;
            }
            if let Some(message) = guard.failed.clone() {
                return Err(worker_failure(&message));
            }
            guard = self.shared.condvar.wait(guard).unwrap();
        }
    }

    fn drain_previous<'a>(&self, mut guard: MutexGuard<'a, Inner<T, R>>) -> Result<MutexGuard<'a, Inner<T, R>>> {
        loop {
            if let Some(message) = guard.failed.clone() {
                return Err(worker_failure(&message));
            }

            if !guard.outstanding {
                return Ok(guard);
            }

            if let Some(outcome) = guard.outcome.take() {
                guard.outstanding = false;
                if let Err(error) = outcome {
                    let message = error.to_string();
                    guard.failed = Some(message.clone());
                    return Err(worker_failure(&message));
                }
                continue;
            }

            guard = self.shared.condvar.wait(guard).unwrap();
        }
    }

    pub fn close(&self) {
        let mut guard = self.shared.mutex.lock().unwrap();
        guard.shutdown = true;
        self.shared.condvar.notify_all();
    }
}

impl<T, R> Drop for Worker<T, R> {
    fn drop(&mut self) {
        self.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn runs_jobs_in_submission_order() {
        let worker: Worker<Vec<u32>, u32> = Worker::spawn(Vec::new(), "test-worker");

        worker.submit(Box::new(|log: &mut Vec<u32>| {
            log.push(1);
            Ok(1)
        })).unwrap();
        assert_eq!(worker.wait().unwrap(), 1);

        worker.submit(Box::new(|log: &mut Vec<u32>| {
            log.push(2);
            Ok(2)
        })).unwrap();
        assert_eq!(worker.wait().unwrap(), 2);
    }

    #[test]
    fn failure_is_sticky_for_later_calls() {
        let worker: Worker<(), ()> = Worker::spawn((), "test-worker-fail");

        worker.submit(Box::new(|_: &mut ()| {
            Err(Error::usage("synthetic failure"))
        })).unwrap();
        assert!(worker.wait().is_err());

        let second = worker.submit(Box::new(|_: &mut ()| Ok(())));
        assert!(second.is_err(), "a worker that already failed must stay failed");
    }

    #[test]
    fn unclaimed_success_does_not_block_the_next_submit() {
        let counter = Arc::new(AtomicU32::new(0));
        let worker: Worker<(), ()> = Worker::spawn((), "test-worker-fire-and-forget");

        let counter_clone = Arc::clone(&counter);
        worker.submit(Box::new(move |_: &mut ()| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })).unwrap();

        // No `wait()` here -- this models the prefetch-and-detach path.
        worker.submit(Box::new(|_: &mut ()| Ok(()))).unwrap();
        worker.wait().unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
