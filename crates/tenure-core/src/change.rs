use std::cell::RefCell;

use crate::remember;

/// Native change notification.
///
/// Compares `value` with the one seen by this call site in the previous
/// composition of the current scope and calls `action(old, new)` when they
/// differ. With `initial` set, the first composition also calls
/// `action(value, value)`.
///
/// Slot-based: call sites must be composed in a stable order.
pub fn on_change<T: PartialEq + Clone + 'static>(
    value: T,
    initial: bool,
    action: impl FnOnce(&T, &T),
) {
    let last = remember(|| RefCell::new(None::<T>));

    let previous = last.borrow_mut().replace(value.clone());
    match previous {
        None if initial => action(&value, &value),
        None => {}
        Some(old) if old != value => action(&old, &value),
        Some(_) => {}
    }
}
