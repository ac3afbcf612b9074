#[cfg(test)]
mod tests {
    use crate::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    enum Screen {
        Home,
        Detail(u32),
        Settings,
    }

    struct Tracked(Rc<Cell<usize>>);
    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    /// Composes the top entry, remembering one `Tracked` per entry scope.
    fn compose_top(stack: &Rc<NavBackStack<Screen>>, drops: &Rc<Cell<usize>>) -> View {
        let drops = drops.clone();
        NavDisplay(
            stack.clone(),
            renderer(move |entry: &EntryScope<Screen>| {
                let d = drops.clone();
                remember(move || Tracked(d));
                View::new(format!("{:?}", entry.key()))
            }),
        )
    }

    #[test]
    fn covered_entries_keep_their_state() {
        let stack = Rc::new(NavBackStack::new(Screen::Home));
        let nav = Navigator::new((*stack).clone());
        let drops = Rc::new(Cell::new(0));

        compose_top(&stack, &drops);
        nav.push(Screen::Detail(1));
        compose_top(&stack, &drops);
        assert_eq!(stack.size(), 2);
        assert_eq!(drops.get(), 0, "home is covered, not released");

        assert!(nav.pop());
        assert_eq!(drops.get(), 1, "detail released on pop");

        let view = compose_top(&stack, &drops);
        assert!(view.find("Home").is_some());
        assert!(!nav.pop(), "the root entry stays");
    }

    #[test]
    fn replace_gives_a_fresh_identity() {
        let stack = Rc::new(NavBackStack::new(Screen::Home));
        let nav = Navigator::new((*stack).clone());
        let drops = Rc::new(Cell::new(0));

        compose_top(&stack, &drops);
        let (before, ..) = stack.top().unwrap();
        nav.replace(Screen::Settings);
        let (after, key, ..) = stack.top().unwrap();

        assert_ne!(before, after);
        assert_eq!(key, Screen::Settings);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn clear_and_pop_to_release_everything_above() {
        let stack = Rc::new(NavBackStack::new(Screen::Home));
        let nav = Navigator::new((*stack).clone());
        let drops = Rc::new(Cell::new(0));

        compose_top(&stack, &drops);
        for i in 0..3 {
            nav.push(Screen::Detail(i));
            compose_top(&stack, &drops);
        }
        nav.pop_to(|k| *k == Screen::Home, false);
        assert_eq!(stack.keys(), vec![Screen::Home]);
        assert_eq!(drops.get(), 3);

        nav.clear_and_push(Screen::Settings);
        assert_eq!(stack.keys(), vec![Screen::Settings]);
        assert_eq!(drops.get(), 4);
    }

    #[test]
    fn json_round_trip_restores_keys_with_fresh_scopes() {
        let stack = Rc::new(NavBackStack::new(Screen::Home));
        let nav = Navigator::new((*stack).clone());
        let drops = Rc::new(Cell::new(0));
        nav.push(Screen::Detail(7));
        compose_top(&stack, &drops);

        let json = stack.to_json();
        let version = stack.version();
        stack.from_json(&json).unwrap();

        assert_eq!(stack.keys(), vec![Screen::Home, Screen::Detail(7)]);
        assert_eq!(drops.get(), 1);
        assert!(stack.version() > version);
        assert!(stack.from_json("not json").is_err());
        assert_eq!(stack.size(), 2);
    }

    #[test]
    fn results_pass_between_entries() {
        let saved = SavedState::default();
        saved.set_result("picked", 3u32);
        assert_eq!(saved.take_result::<u32>("picked"), Some(3));
        assert_eq!(saved.take_result::<u32>("picked"), None);

        let a = saved.remember("count", || 1);
        *a.borrow_mut() += 1;
        assert_eq!(*saved.remember("count", || 1).borrow(), 2);
    }

    #[derive(Clone, Debug, Deserialize)]
    struct Unsaveable;

    impl Serialize for Unsaveable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not persistable"))
        }
    }

    #[test]
    fn failed_save_falls_back_to_an_empty_stack() {
        let _ = env_logger::builder().is_test(true).try_init();
        let stack = NavBackStack::new(Unsaveable);
        assert_eq!(stack.to_json(), "[]");
        assert_eq!(stack.size(), 1);
    }
}
