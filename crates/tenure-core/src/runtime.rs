use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::rc::Rc;

use smallvec::SmallVec;
use web_time::Instant;

use crate::config::RuntimeConfig;
use crate::dispatch::UiDispatcher;
use crate::error::{Result, RuntimeError};
use crate::executor::{LocalExecutor, TaskHandle, TaskPriority};
use crate::scope::{Scope, SlotTable, current_scope};
use crate::view::{Callback, View, ViewId};

thread_local! {
    pub static COMPOSER: RefCell<SlotTable> = RefCell::new(SlotTable::default());
    static CURRENT_RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

/// A per-runtime singleton, created lazily by [`Runtime::service`].
pub trait Service: Any {
    /// Called once from [`Runtime::shutdown`].
    fn shutdown(&self) {}
}

struct ServiceEntry {
    value: Rc<dyn Any>,
    hooks: Rc<dyn Service>,
}

/// The UI-thread context object: dispatcher, executor and services.
///
/// Constructed on the UI thread at startup, entered while composing and
/// pumping, shut down at exit. Cloning shares the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

struct RuntimeInner {
    config: RuntimeConfig,
    dispatcher: UiDispatcher,
    executor: LocalExecutor,
    services: RefCell<HashMap<TypeId, ServiceEntry>>,
}

/// Counts of work done by one [`Runtime::pump`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub jobs: usize,
    pub polls: usize,
}

impl PumpStats {
    pub fn is_idle(&self) -> bool {
        self.jobs == 0 && self.polls == 0
    }
}

impl Runtime {
    /// Creates a runtime owned by the calling thread.
    pub fn new(config: RuntimeConfig) -> Self {
        let dispatcher = UiDispatcher::new();
        let executor = LocalExecutor::new(dispatcher.clone());
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                dispatcher,
                executor,
                services: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn dispatcher(&self) -> &UiDispatcher {
        &self.inner.dispatcher
    }

    pub fn executor(&self) -> &LocalExecutor {
        &self.inner.executor
    }

    /// Makes this the current runtime of the calling thread until the guard
    /// drops.
    pub fn enter(&self) -> Result<RuntimeGuard> {
        self.inner.dispatcher.ensure_ui_thread()?;
        let prev = CURRENT_RUNTIME.with(|c| c.borrow_mut().replace(self.clone()));
        Ok(RuntimeGuard { prev })
    }

    pub fn current() -> Option<Runtime> {
        // `try_with`: sentinels may drop during thread-local teardown.
        CURRENT_RUNTIME
            .try_with(|c| c.borrow().clone())
            .ok()
            .flatten()
    }

    pub fn try_current() -> Result<Runtime> {
        Self::current().ok_or(RuntimeError::NoRuntime)
    }

    /// Returns the runtime's instance of `T`, creating it on first use.
    pub fn service<T: Service + Default>(&self) -> Rc<T> {
        if let Some(existing) = self.try_service::<T>() {
            return existing;
        }
        let rc = Rc::new(T::default());
        self.inner.services.borrow_mut().insert(
            TypeId::of::<T>(),
            ServiceEntry {
                value: rc.clone(),
                hooks: rc.clone(),
            },
        );
        rc
    }

    /// Returns the runtime's instance of `T` if one was created.
    pub fn try_service<T: Service>(&self) -> Option<Rc<T>> {
        let services = self.inner.services.borrow();
        let entry = services.get(&TypeId::of::<T>())?;
        entry.value.clone().downcast::<T>().ok()
    }

    pub fn spawn_local(
        &self,
        priority: TaskPriority,
        future: impl Future<Output = ()> + 'static,
    ) -> TaskHandle {
        self.inner.executor.spawn(priority, future)
    }

    /// Runs queued UI jobs, then ready tasks, within the configured budgets.
    pub fn pump(&self) -> Result<PumpStats> {
        let _guard = self.enter()?;
        let started = Instant::now();
        let config = &self.inner.config;

        let jobs = self.inner.dispatcher.drain(config.max_jobs_per_pump)?;
        let polls = self.inner.executor.run_ready(config.max_polls_per_pump);

        let elapsed = started.elapsed();
        if elapsed > config.slow_pump_threshold {
            log::debug!("slow pump: {jobs} jobs, {polls} polls in {elapsed:?}");
        }
        Ok(PumpStats { jobs, polls })
    }

    /// Pumps until a round does no work. Returns the accumulated stats.
    pub fn run_until_idle(&self) -> Result<PumpStats> {
        let mut total = PumpStats::default();
        for _ in 0..self.inner.config.max_settle_rounds {
            let round = self.pump()?;
            if round.is_idle() {
                return Ok(total);
            }
            total.jobs += round.jobs;
            total.polls += round.polls;
        }
        log::warn!(
            "runtime did not settle after {} rounds ({} jobs pending)",
            self.inner.config.max_settle_rounds,
            self.inner.dispatcher.pending()
        );
        Ok(total)
    }

    /// Closes the dispatcher, drops every task and shuts services down.
    /// Pending UI jobs are discarded, not run.
    pub fn shutdown(self) -> Result<()> {
        self.inner.dispatcher.ensure_ui_thread()?;
        let discarded = self.inner.dispatcher.close();
        let cancelled = self.inner.executor.cancel_all();

        let services: Vec<ServiceEntry> = self
            .inner
            .services
            .borrow_mut()
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        for entry in &services {
            entry.hooks.shutdown();
        }
        drop(services);

        log::debug!("runtime shut down: {discarded} jobs discarded, {cancelled} tasks dropped");
        Ok(())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("dispatcher", &self.inner.dispatcher)
            .field("tasks", &self.inner.executor.len())
            .field("services", &self.inner.services.borrow().len())
            .finish()
    }
}

pub struct RuntimeGuard {
    prev: Option<Runtime>,
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        let leaving = CURRENT_RUNTIME.with(|c| std::mem::replace(&mut *c.borrow_mut(), prev));
        // May be the last handle; its teardown can look up the current runtime.
        drop(leaving);
    }
}

/// Slot-based remember (sequential composition only).
///
/// Stored in the current scope, or in the thread's root composer outside of
/// any scope.
pub fn remember<T: 'static>(init: impl FnOnce() -> T) -> Rc<T> {
    if let Some(scope) = current_scope() {
        return scope.remember(init);
    }
    let (rc, released) = COMPOSER.with(|c| {
        let mut c = c.borrow_mut();
        let rc = c.remember(init);
        (rc, c.take_released())
    });
    drop(released);
    rc
}

/// Key-based remember
pub fn remember_with_key<T: 'static>(key: impl Into<String>, init: impl FnOnce() -> T) -> Rc<T> {
    if let Some(scope) = current_scope() {
        return scope.remember_with_key(key, init);
    }
    let (rc, released) = COMPOSER.with(|c| {
        let mut c = c.borrow_mut();
        let rc = c.remember_with_key(key.into(), init);
        (rc, c.take_released())
    });
    drop(released);
    rc
}

pub fn remember_state<T: 'static>(init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
    remember(|| RefCell::new(init()))
}

pub fn remember_state_with_key<T: 'static>(
    key: impl Into<String>,
    init: impl FnOnce() -> T,
) -> Rc<RefCell<T>> {
    remember_with_key(key, || RefCell::new(init()))
}

/// Frame — output of composition for a tick.
pub struct Frame {
    pub root: View,
    /// Views that became visible this frame, in tree order.
    pub appeared: Vec<ViewId>,
    /// Views that were visible last frame and are gone now.
    pub disappeared: Vec<ViewId>,
}

/// Drives composition and owns the host's appear/disappear bookkeeping.
pub struct Scheduler {
    root: Scope,
    visible: HashMap<ViewId, SmallVec<[Callback; 1]>>,
    frames: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            root: Scope::new(),
            visible: HashMap::new(),
            frames: 0,
        }
    }

    pub fn root_scope(&self) -> &Scope {
        &self.root
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Composes the tree, then fires disappear for views that left it and
    /// appear for views that entered it.
    ///
    /// Appear fires every time a view comes back on screen, not once per
    /// identity.
    pub fn compose<F>(&mut self, mut build_root: F) -> Frame
    where
        F: FnMut(&mut Scheduler) -> View,
    {
        let root_scope = self.root.clone();
        let root = root_scope.compose(|| build_root(self));
        self.frames += 1;

        let mut now: Vec<&View> = Vec::new();
        root.walk(&mut |v| now.push(v));
        let now_ids: HashSet<ViewId> = now.iter().map(|v| v.id).collect();

        let mut disappeared = Vec::new();
        let mut gone = Vec::new();
        self.visible.retain(|id, on_disappear| {
            if now_ids.contains(id) {
                true
            } else {
                disappeared.push(*id);
                gone.push(std::mem::take(on_disappear));
                false
            }
        });
        disappeared.sort_unstable();

        let mut appeared = Vec::new();
        let mut to_appear: Vec<Callback> = Vec::new();
        for v in &now {
            let was_visible = self
                .visible
                .insert(v.id, v.on_disappear.clone())
                .is_some();
            if !was_visible {
                appeared.push(v.id);
                to_appear.extend(v.on_appear.iter().cloned());
            }
        }

        // Callbacks run after bookkeeping so they may compose again.
        for cb in gone.into_iter().flatten() {
            cb();
        }
        for cb in to_appear {
            cb();
        }

        log::trace!(
            "frame {}: {} appeared, {} disappeared",
            self.frames,
            appeared.len(),
            disappeared.len()
        );

        Frame {
            root,
            appeared,
            disappeared,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
