pub use crate::change::on_change;
pub use crate::config::RuntimeConfig;
pub use crate::dispatch::UiDispatcher;
pub use crate::error::RuntimeError;
pub use crate::executor::{TaskHandle, TaskPriority, yield_now};
pub use crate::runtime::{
    Frame, PumpStats, Runtime, Scheduler, Service, remember, remember_state,
    remember_state_with_key, remember_with_key,
};
pub use crate::scope::{Scope, current_scope};
pub use crate::view::{Callback, View, ViewId};
