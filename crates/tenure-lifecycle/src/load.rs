use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tenure_core::{View, remember};

/// "Eligible to fire" flag kept in identity-scoped storage.
#[derive(Debug)]
pub struct LoadGate {
    eligible: Cell<bool>,
}

impl LoadGate {
    pub fn new() -> Self {
        Self {
            eligible: Cell::new(true),
        }
    }

    /// True exactly once per gate.
    pub fn try_fire(&self) -> bool {
        self.eligible.replace(false)
    }

    pub fn has_fired(&self) -> bool {
        !self.eligible.get()
    }
}

impl Default for LoadGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `action` on the first appear of `view` within its current identity.
///
/// Later appears (returning from a pushed entry, a parent toggling
/// visibility) are ignored. A new identity gets a new gate.
pub fn on_load(view: View, action: impl FnOnce() + 'static) -> View {
    let gate = remember(LoadGate::new);
    on_load_with(view, gate, action)
}

/// [`on_load`] against a gate the caller remembered, so other hooks of the
/// same identity can ask whether it has loaded yet.
pub fn on_load_with(
    view: View,
    gate: Rc<LoadGate>,
    action: impl FnOnce() + 'static,
) -> View {
    let action = RefCell::new(Some(action));
    view.on_appear(move || {
        if !gate.try_fire() {
            return;
        }
        let action = action.borrow_mut().take();
        if let Some(f) = action {
            f();
        }
    })
}
