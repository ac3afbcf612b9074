use std::thread::ThreadId;

/// Errors raised by the host runtime.
///
/// Lifecycle routing itself never fails; these only surface when the
/// runtime is driven from the wrong place or after it has shut down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("runtime is owned by thread {owner:?}, called from {current:?}")]
    NotOnUiThread { owner: ThreadId, current: ThreadId },

    #[error("UI dispatcher is closed")]
    DispatcherClosed,

    #[error("no runtime entered on this thread")]
    NoRuntime,
}

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;
