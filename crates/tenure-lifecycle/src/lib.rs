//! # Lifecycle hooks
//!
//! The host's appear signal repeats whenever a view comes back on screen, and
//! its disappear signal fires whenever a view is merely covered. These hooks
//! are built on identity-scoped storage instead, so they line up with what a
//! view's identity actually goes through:
//!
//! - [`LifecycleExt::on_load`] — once, on the first appear of an identity.
//! - [`LifecycleExt::on_change_of`] — `(old, new)` once at load and per
//!   distinct value.
//! - [`LifecycleExt::load_task`] — async work started at load, cancelled at
//!   destruction.
//! - [`LifecycleExt::on_destroy`] — once, when the identity is released.
//!
//! ```rust
//! use tenure_core::*;
//! use tenure_lifecycle::*;
//!
//! let rt = Runtime::new(RuntimeConfig::default());
//! let _entered = rt.enter().unwrap();
//! let mut scheduler = Scheduler::new();
//!
//! let screen = Scope::new();
//! scheduler.compose(|_| {
//!     screen.compose(|| {
//!         View::new("profile")
//!             .on_load(|| log::info!("profile loaded"))
//!             .on_destroy(|| log::info!("profile gone"))
//!     })
//! });
//!
//! // Releasing the identity is what fires the destroy hook.
//! screen.dispose();
//! rt.run_until_idle().unwrap();
//! ```

pub mod change;
pub mod destroy;
pub mod load;
pub mod task;

use std::future::Future;

use tenure_core::{TaskPriority, View};

pub use change::{ChangeTrigger, on_change_of};
pub use destroy::{
    DestroyRegistry, DestroySentinel, PendingAction, RegistryHandle, Token, on_destroy,
};
pub use load::{LoadGate, on_load, on_load_with};
pub use task::load_task;

/// Lifecycle decorators for views.
pub trait LifecycleExt: Sized {
    fn on_load(self, action: impl FnOnce() + 'static) -> Self;

    fn on_change_of<T: PartialEq + Clone + 'static>(
        self,
        value: T,
        trigger: ChangeTrigger,
        action: impl Fn(&T, &T) + 'static,
    ) -> Self;

    fn load_task<Fut: Future<Output = ()> + 'static>(
        self,
        priority: TaskPriority,
        work: impl FnOnce() -> Fut + 'static,
    ) -> Self;

    fn on_destroy(self, action: impl FnOnce() + 'static) -> Self;
}

impl LifecycleExt for View {
    fn on_load(self, action: impl FnOnce() + 'static) -> Self {
        load::on_load(self, action)
    }

    fn on_change_of<T: PartialEq + Clone + 'static>(
        self,
        value: T,
        trigger: ChangeTrigger,
        action: impl Fn(&T, &T) + 'static,
    ) -> Self {
        change::on_change_of(self, value, trigger, action)
    }

    fn load_task<Fut: Future<Output = ()> + 'static>(
        self,
        priority: TaskPriority,
        work: impl FnOnce() -> Fut + 'static,
    ) -> Self {
        task::load_task(self, priority, work)
    }

    fn on_destroy(self, action: impl FnOnce() + 'static) -> Self {
        destroy::on_destroy(self, action)
    }
}
