use std::cell::RefCell;
use std::future::Future;

use tenure_core::{Runtime, TaskHandle, TaskPriority, View, remember};

use crate::destroy::on_destroy;
use crate::load::on_load;

/// Spawns `work()` on the runtime's executor at first load and requests its
/// cancellation when the view is destroyed.
///
/// Cancellation is asynchronous: the future is dropped on the executor's
/// next run, after the destroy action has returned. Appearing again after
/// being covered does not restart the work.
pub fn load_task<Fut>(
    view: View,
    priority: TaskPriority,
    work: impl FnOnce() -> Fut + 'static,
) -> View
where
    Fut: Future<Output = ()> + 'static,
{
    let Some(rt) = Runtime::current() else {
        log::warn!("load_task: no runtime entered; task for {:?} not started", view.name);
        return view;
    };

    let running = remember(|| RefCell::new(None::<TaskHandle>));

    let started = running.clone();
    let view = on_load(view, move || {
        let handle = rt.spawn_local(priority, work());
        log::trace!("load_task: started {:?}", handle.key());
        *started.borrow_mut() = Some(handle);
    });

    on_destroy(view, move || {
        let handle = running.borrow_mut().take();
        if let Some(handle) = handle {
            handle.cancel();
        }
    })
}
