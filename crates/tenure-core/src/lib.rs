//! # Runtime, scopes and signals
//!
//! `tenure-core` is the host side of Tenure: it composes view descriptions,
//! keeps per-identity state alive between compositions, tells views when
//! they come on and go off screen, and owns the UI thread.
//!
//! - `Runtime` — the UI-thread context: dispatcher, executor, services.
//! - `Scope` + `remember*` — identity-scoped storage.
//! - `Scheduler` — composition and appear/disappear signals.
//! - `on_change` — native value-change notification.
//!
//! ## Runtime
//!
//! ```rust
//! use tenure_core::*;
//!
//! let rt = Runtime::new(RuntimeConfig::default());
//! let _entered = rt.enter().unwrap();
//!
//! // Any thread may hand work back to the UI thread.
//! let dispatcher = rt.dispatcher().clone();
//! std::thread::spawn(move || dispatcher.post(|| log::info!("back on the UI thread")))
//!     .join()
//!     .unwrap()
//!     .unwrap();
//!
//! rt.run_until_idle().unwrap();
//! ```
//!
//! ## Remembered state
//!
//! `remember` and `remember_state` are order‑based: the Nth call in a
//! composition of a scope always refers to the Nth stored value.
//! `remember_with_key` and `remember_state_with_key` are key‑based and more
//! stable across conditional branches.
//!
//! ```rust
//! use tenure_core::*;
//!
//! let scope = Scope::new();
//! let first = scope.compose(|| remember_state(|| 0));
//! *first.borrow_mut() += 1;
//! let again = scope.compose(|| remember_state(|| 0));
//! assert_eq!(*again.borrow(), 1);
//! ```
//!
//! Values live exactly as long as their scope. `Scope::dispose` releases
//! them, running their `Drop`; a scope that is merely not composed for a
//! while (an entry covered by a pushed screen) keeps them.
//!
//! ## Appear and disappear
//!
//! `Scheduler::compose` diffs the views of consecutive frames. A view that
//! enters the frame gets its `on_appear` callbacks, one that leaves gets its
//! `on_disappear` callbacks. Both fire again every time visibility flips, so
//! neither says anything about mount or destruction.

pub mod change;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod runtime;
pub mod scope;
pub mod tests;
pub mod view;

pub use change::*;
pub use config::*;
pub use dispatch::*;
pub use error::RuntimeError;
pub use executor::*;
pub use prelude::*;
pub use runtime::*;
pub use scope::*;
pub use view::*;
