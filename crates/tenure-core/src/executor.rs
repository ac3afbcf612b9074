//! Single-threaded task executor driven by the UI thread.
//!
//! Futures never leave the UI thread, so they may hold `Rc`s and other
//! `!Send` state. Wakers and [`TaskHandle`]s are `Send + Sync`: waking from a
//! worker thread only pushes the task onto a shared ready queue and pokes the
//! dispatcher's waker hook.

use std::cell::RefCell;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll, Wake, Waker};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::dispatch::UiDispatcher;

new_key_type! {
    pub struct TaskKey;
}

/// Scheduling priority of a spawned task. Higher priorities are polled
/// first; equal priorities run in wake order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    Background,
    Low,
    #[default]
    Medium,
    High,
}

type LocalFuture = Pin<Box<dyn Future<Output = ()>>>;

struct Task {
    future: Option<LocalFuture>,
    cancelled: Arc<AtomicBool>,
    waker: Waker,
}

#[derive(PartialEq, Eq)]
struct Ready {
    priority: TaskPriority,
    seq: u64,
    key: TaskKey,
}

impl Ord for Ready {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: highest priority first, then lowest sequence number.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Ready {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct ReadyQueue {
    heap: Mutex<BinaryHeap<Ready>>,
    seq: AtomicU64,
}

impl ReadyQueue {
    fn push(&self, key: TaskKey, priority: TaskPriority) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.heap.lock().push(Ready { priority, seq, key });
    }

    fn pop(&self) -> Option<TaskKey> {
        self.heap.lock().pop().map(|r| r.key)
    }

    fn len(&self) -> usize {
        self.heap.lock().len()
    }
}

struct TaskWaker {
    key: TaskKey,
    priority: TaskPriority,
    ready: Arc<ReadyQueue>,
    dispatcher: UiDispatcher,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.ready.push(self.key, self.priority);
        self.dispatcher.notify();
    }
}

/// Cancellation handle for a spawned task. Dropping it detaches the task.
#[derive(Clone)]
pub struct TaskHandle {
    key: TaskKey,
    priority: TaskPriority,
    cancelled: Arc<AtomicBool>,
    ready: Arc<ReadyQueue>,
    dispatcher: UiDispatcher,
}

impl TaskHandle {
    pub fn key(&self) -> TaskKey {
        self.key
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Requests cancellation. The future is dropped the next time the
    /// executor runs, not before this returns. Safe from any thread.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            log::trace!("task {:?}: cancellation requested", self.key);
            self.ready.push(self.key, self.priority);
            self.dispatcher.notify();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("key", &self.key)
            .field("priority", &self.priority)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub struct LocalExecutor {
    tasks: RefCell<SlotMap<TaskKey, Task>>,
    ready: Arc<ReadyQueue>,
    dispatcher: UiDispatcher,
}

impl LocalExecutor {
    pub fn new(dispatcher: UiDispatcher) -> Self {
        Self {
            tasks: RefCell::new(SlotMap::with_key()),
            ready: Arc::new(ReadyQueue::default()),
            dispatcher,
        }
    }

    pub fn spawn(
        &self,
        priority: TaskPriority,
        future: impl Future<Output = ()> + 'static,
    ) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let key = self.tasks.borrow_mut().insert_with_key(|key| Task {
            future: Some(Box::pin(future)),
            cancelled: cancelled.clone(),
            waker: Waker::from(Arc::new(TaskWaker {
                key,
                priority,
                ready: self.ready.clone(),
                dispatcher: self.dispatcher.clone(),
            })),
        });
        log::trace!("task {key:?}: spawned at {priority:?}");
        self.ready.push(key, priority);
        self.dispatcher.notify();

        TaskHandle {
            key,
            priority,
            cancelled,
            ready: self.ready.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }

    /// Number of live (not yet finished or cancelled) tasks.
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    pub fn contains(&self, key: TaskKey) -> bool {
        self.tasks.borrow().contains_key(key)
    }

    pub fn has_ready(&self) -> bool {
        self.ready.len() > 0
    }

    /// Polls up to `max` ready tasks. Returns how many wake-ups were
    /// processed (polls plus cancellations).
    pub fn run_ready(&self, max: usize) -> usize {
        let mut processed = 0;
        while processed < max {
            let Some(key) = self.ready.pop() else {
                break;
            };

            let (mut future, waker) = {
                let mut tasks = self.tasks.borrow_mut();
                let Some(task) = tasks.get_mut(key) else {
                    // Stale wake for a finished task.
                    continue;
                };
                if task.cancelled.load(Ordering::Acquire) {
                    let task = tasks.remove(key);
                    drop(tasks);
                    // Drop the future outside the borrow; its destructors may spawn.
                    drop(task);
                    log::trace!("task {key:?}: cancelled");
                    processed += 1;
                    continue;
                }
                let Some(future) = task.future.take() else {
                    // Already being polled further up the stack.
                    continue;
                };
                (future, task.waker.clone())
            };

            processed += 1;
            let mut cx = Context::from_waker(&waker);
            match future.as_mut().poll(&mut cx) {
                Poll::Ready(()) => {
                    log::trace!("task {key:?}: finished");
                    self.tasks.borrow_mut().remove(key);
                }
                Poll::Pending => {
                    let mut tasks = self.tasks.borrow_mut();
                    if let Some(task) = tasks.get_mut(key) {
                        if task.cancelled.load(Ordering::Acquire) {
                            let task = tasks.remove(key);
                            drop(tasks);
                            drop(task);
                            drop(future);
                            log::trace!("task {key:?}: cancelled while running");
                        } else {
                            task.future = Some(future);
                        }
                    }
                }
            }
        }
        processed
    }

    /// Drops every task without polling it again. Returns how many were live.
    pub fn cancel_all(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        let n = tasks.len();
        for (_, task) in tasks.iter() {
            task.cancelled.store(true, Ordering::Release);
        }
        drop(tasks);
        n
    }
}

/// Yields once back to the executor, letting other ready tasks run.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
