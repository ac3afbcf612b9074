use std::rc::Rc;

use tenure_core::{View, remember};

use crate::load::{LoadGate, on_load_with};

/// Selects how [`on_change_of`] reports values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChangeTrigger {
    /// `(current, current)` once at load, then `(old, new)` per distinct
    /// value.
    #[default]
    WithLoad,
    /// The host's own change tracking, `initial` passed through unchanged.
    Native { initial: bool },
}

/// Delivers `(old, new)` for `value` according to `trigger`.
///
/// With [`ChangeTrigger::WithLoad`] the initial call rides on the load gate
/// and only real transitions go through the native primitive (initial fire
/// off), so the load notification is never duplicated. Transitions seen
/// while the view is composed but not yet loaded only move the baseline.
pub fn on_change_of<T>(
    view: View,
    value: T,
    trigger: ChangeTrigger,
    action: impl Fn(&T, &T) + 'static,
) -> View
where
    T: PartialEq + Clone + 'static,
{
    match trigger {
        ChangeTrigger::Native { initial } => {
            tenure_core::on_change(value, initial, &action);
            view
        }
        ChangeTrigger::WithLoad => {
            let gate = remember(LoadGate::new);
            let action = Rc::new(action);
            let at_load = action.clone();
            let current = value.clone();
            let view = on_load_with(view, gate.clone(), move || at_load(&current, &current));
            tenure_core::on_change(value, false, |old, new| {
                if gate.has_fired() {
                    action(old, new)
                }
            });
            view
        }
    }
}
