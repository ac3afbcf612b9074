//! Hand-off of work onto the UI-owning thread.
//!
//! The dispatcher is the only part of the runtime that is `Send + Sync`.
//! Anything that may run on a foreign thread (a `Drop` impl, a waker, a
//! worker callback) holds a clone of it and posts a job; the UI thread
//! drains the queue from its event loop via [`crate::Runtime::pump`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::error::{Result, RuntimeError};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

#[derive(Clone)]
pub struct UiDispatcher {
    inner: Arc<DispatchInner>,
}

struct DispatchInner {
    owner: ThreadId,
    queue: Mutex<Queue>,
    waker: Mutex<Option<Waker>>,
}

/// `closed` lives under the queue lock so a post can't slip in behind a
/// close.
#[derive(Default)]
struct Queue {
    jobs: VecDeque<Job>,
    closed: bool,
}

impl UiDispatcher {
    /// Creates a dispatcher owned by the calling thread.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatchInner {
                owner: thread::current().id(),
                queue: Mutex::new(Queue::default()),
                waker: Mutex::new(None),
            }),
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.inner.owner
    }

    /// Whether both handles feed the same queue.
    pub fn ptr_eq(&self, other: &UiDispatcher) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.inner.owner
    }

    pub fn ensure_ui_thread(&self) -> Result<()> {
        let current = thread::current().id();
        if current == self.inner.owner {
            Ok(())
        } else {
            Err(RuntimeError::NotOnUiThread {
                owner: self.inner.owner,
                current,
            })
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.queue.lock().closed
    }

    /// Installs a hook invoked after every successful post, from whichever
    /// thread posted. Platform loops use it to request a pump.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.inner.waker.lock() = Some(Arc::new(waker));
    }

    /// Calls the waker hook, if any.
    pub fn notify(&self) {
        // Clone out so the hook never runs under our lock.
        let waker = self.inner.waker.lock().clone();
        if let Some(w) = waker {
            w();
        }
    }

    /// Queues `job` for the UI thread. Never blocks on, or waits for, the UI
    /// thread.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        {
            let mut queue = self.inner.queue.lock();
            if queue.closed {
                return Err(RuntimeError::DispatcherClosed);
            }
            queue.jobs.push_back(Box::new(job));
        }
        self.notify();
        Ok(())
    }

    /// Number of jobs waiting for the UI thread.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().jobs.len()
    }

    /// Runs up to `max` queued jobs on the UI thread and returns how many ran.
    ///
    /// Jobs posted while draining are picked up in the same call as long as
    /// the budget allows. Stops as soon as the dispatcher is closed.
    pub fn drain(&self, max: usize) -> Result<usize> {
        self.ensure_ui_thread()?;
        let mut ran = 0;
        while ran < max {
            // Pop under the lock, run outside it: jobs may post more jobs.
            let job = {
                let mut queue = self.inner.queue.lock();
                if queue.closed {
                    break;
                }
                queue.jobs.pop_front()
            };
            let Some(job) = job else {
                break;
            };
            job();
            ran += 1;
        }
        Ok(ran)
    }

    /// Rejects further posts and discards whatever is still queued.
    /// Returns the number of discarded jobs.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut queue = self.inner.queue.lock();
            queue.closed = true;
            std::mem::take(&mut queue.jobs)
        };
        let n = discarded.len();
        drop(discarded);
        n
    }
}

impl Default for UiDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UiDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiDispatcher")
            .field("owner", &self.inner.owner)
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}
