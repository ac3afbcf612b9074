#[cfg(test)]
mod tests {
    use crate::COMPOSER;
    use crate::change::on_change;
    use crate::remember_with_key;
    use crate::runtime::*;
    use crate::scope::*;
    use crate::view::View;
    use crate::{RuntimeConfig, RuntimeError, TaskPriority, yield_now};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    struct Tracked(Rc<Cell<usize>>);
    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_scope_explicit_dispose() {
        let cleaned_up = Rc::new(RefCell::new(false));

        let scope = Scope::new();
        let cleaned_up_clone = cleaned_up.clone();
        scope.add_disposer(move || {
            *cleaned_up_clone.borrow_mut() = true;
        });

        assert!(!*cleaned_up.borrow());
        scope.dispose();
        assert!(*cleaned_up.borrow());
    }

    #[test]
    fn test_scope_dispose_releases_remembered_values() {
        let drops = Rc::new(Cell::new(0));
        let scope = Scope::new();

        for _ in 0..3 {
            let d = drops.clone();
            scope.compose(|| {
                remember(move || Tracked(d));
            });
        }
        assert_eq!(drops.get(), 0, "recomposition keeps the slot");
        assert_eq!(scope.slot_count(), 1);

        let handle = scope.clone();
        scope.dispose();
        assert_eq!(drops.get(), 1);
        assert!(handle.is_disposed());

        // Idempotent.
        handle.dispose();
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_scope_dispose_runs_children_first() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let parent = Scope::new();
        let child = parent.child();

        let o = order.clone();
        parent.add_disposer(move || o.borrow_mut().push("parent"));
        let o = order.clone();
        child.add_disposer(move || o.borrow_mut().push("child"));

        parent.dispose();
        assert_eq!(*order.borrow(), vec!["child", "parent"]);
    }

    #[test]
    fn test_slot_type_change_replaces_value() {
        let drops = Rc::new(Cell::new(0));
        let scope = Scope::new();
        let d = drops.clone();
        scope.compose(|| {
            remember(move || Tracked(d));
        });
        let v = scope.compose(|| remember(|| 7u8));
        assert_eq!(*v, 7);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_key_based_remember() {
        COMPOSER.with(|c| c.borrow_mut().keyed_slots.clear());

        let val1 = remember_with_key("test", || 42);
        let val2 = remember_with_key("test", || 100);

        // Should return the same instance
        assert_eq!(*val1, 42);
        assert_eq!(*val2, 42); // Not 100, because key exists
    }

    #[test]
    fn test_view_ids_are_stable_per_scope() {
        let scope = Scope::new();
        let first = scope.compose(|| View::new("a").child(View::new("b")));
        let second = scope.compose(|| View::new("a").child(View::new("b")));
        assert_eq!(first.id, second.id);
        assert_eq!(first.children[0].id, second.children[0].id);
        assert_ne!(first.id, first.children[0].id);

        let other = Scope::new().compose(|| View::new("a"));
        assert_ne!(other.id, first.id);
    }

    #[test]
    fn test_appear_fires_on_every_return_to_screen() {
        let appears = Rc::new(Cell::new(0));
        let disappears = Rc::new(Cell::new(0));
        let show = Rc::new(Cell::new(true));
        let mut s = Scheduler::new();

        let frame = |s: &mut Scheduler| {
            let (a, d, show) = (appears.clone(), disappears.clone(), show.clone());
            s.compose(move |_| {
                let root = View::new("root");
                if show.get() {
                    root.child(
                        View::new("leaf")
                            .on_appear({
                                let a = a.clone();
                                move || a.set(a.get() + 1)
                            })
                            .on_disappear({
                                let d = d.clone();
                                move || d.set(d.get() + 1)
                            }),
                    )
                } else {
                    root
                }
            })
        };

        let f = frame(&mut s);
        assert_eq!(f.appeared.len(), 2);
        assert_eq!(appears.get(), 1);

        frame(&mut s);
        assert_eq!(appears.get(), 1, "still visible, no new appear");

        show.set(false);
        let f = frame(&mut s);
        assert_eq!(f.disappeared.len(), 1);
        assert_eq!(disappears.get(), 1);

        show.set(true);
        frame(&mut s);
        assert_eq!(appears.get(), 2);
        assert_eq!(s.frames(), 4);
    }

    #[test]
    fn test_native_on_change() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let scope = Scope::new();

        for (v, initial) in [(1, false), (1, false), (2, false), (3, false)] {
            let seen = seen.clone();
            scope.compose(|| {
                on_change(v, initial, |old: &i32, new: &i32| {
                    seen.borrow_mut().push((*old, *new))
                })
            });
        }
        assert_eq!(*seen.borrow(), vec![(1, 2), (2, 3)]);

        seen.borrow_mut().clear();
        let fresh = Scope::new();
        for v in [4, 4] {
            let seen = seen.clone();
            fresh.compose(|| {
                on_change(v, true, |old: &i32, new: &i32| {
                    seen.borrow_mut().push((*old, *new))
                })
            });
        }
        assert_eq!(*seen.borrow(), vec![(4, 4)]);
    }

    #[derive(Default)]
    struct Counter {
        hits: Cell<usize>,
        shut: Rc<Cell<bool>>,
    }
    impl Service for Counter {
        fn shutdown(&self) {
            self.shut.set(true);
        }
    }

    #[test]
    fn test_runtime_services_are_singletons() {
        let rt = Runtime::new(RuntimeConfig::default());
        assert!(rt.try_service::<Counter>().is_none());

        rt.service::<Counter>().hits.set(3);
        assert_eq!(rt.service::<Counter>().hits.get(), 3);

        let shut = rt.service::<Counter>().shut.clone();
        rt.shutdown().unwrap();
        assert!(shut.get());
    }

    #[test]
    fn test_runtime_enter_and_current() {
        assert!(Runtime::current().is_none());
        assert_eq!(Runtime::try_current().unwrap_err(), RuntimeError::NoRuntime);

        let rt = Runtime::new(RuntimeConfig::default());
        {
            let _g = rt.enter().unwrap();
            assert!(Runtime::current().is_some());
        }
        assert!(Runtime::current().is_none());
    }

    #[test]
    fn test_runtime_rejects_foreign_thread() {
        let rt = Runtime::new(RuntimeConfig::default());
        let dispatcher = rt.dispatcher().clone();
        let err = std::thread::spawn(move || dispatcher.ensure_ui_thread())
            .join()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NotOnUiThread { .. }));
    }

    #[test]
    fn test_run_until_idle_settles_jobs_and_tasks() {
        let _ = env_logger::builder().is_test(true).try_init();
        let rt = Runtime::new(RuntimeConfig::default().max_polls_per_pump(1));
        let steps = Rc::new(Cell::new(0));

        let s = steps.clone();
        rt.spawn_local(TaskPriority::Low, async move {
            for _ in 0..3 {
                s.set(s.get() + 1);
                yield_now().await;
            }
        });

        let posted = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let p = posted.clone();
        let dispatcher = rt.dispatcher().clone();
        std::thread::spawn(move || {
            dispatcher
                .post(move || p.store(true, std::sync::atomic::Ordering::SeqCst))
                .unwrap()
        })
        .join()
        .unwrap();

        let stats = rt.run_until_idle().unwrap();
        assert_eq!(stats.jobs, 1);
        assert_eq!(steps.get(), 3);
        assert!(posted.load(std::sync::atomic::Ordering::SeqCst));
        assert!(rt.executor().is_empty());
    }

    #[test]
    fn test_shutdown_discards_jobs_and_tasks() {
        let rt = Runtime::new(RuntimeConfig::default());
        rt.dispatcher()
            .post(|| panic!("never runs after shutdown"))
            .unwrap();
        rt.spawn_local(TaskPriority::High, std::future::pending());
        let dispatcher = rt.dispatcher().clone();
        rt.shutdown().unwrap();
        assert_eq!(dispatcher.post(|| {}), Err(RuntimeError::DispatcherClosed));
    }
}
