#![allow(non_snake_case)]
//! Back-stack navigation with retained entry state.
//!
//! Every entry owns a [`Scope`]. Pushing a new entry leaves the entries below
//! it composed-out but alive: their remembered values survive and they get
//! an appear signal again when they return to the top. Popping, replacing,
//! clearing or restoring the stack disposes the affected entries' scopes,
//! which is the only point where their state is released.

use std::{any::Any, cell::Cell, cell::RefCell, collections::HashMap, fmt::Debug, rc::Rc};

use serde::{Deserialize, Serialize};
use tenure_core::*;

pub trait NavKey: Clone + Debug + 'static + Serialize + for<'de> Deserialize<'de> {}
impl<T> NavKey for T where T: Clone + Debug + 'static + Serialize + for<'de> Deserialize<'de> {}

/// Per-entry saved values and results handed back between entries.
#[derive(Default)]
pub struct SavedState {
    map: RefCell<HashMap<&'static str, Box<dyn Any>>>,
    results: RefCell<HashMap<&'static str, Box<dyn Any>>>,
}
impl SavedState {
    pub fn remember<T: 'static + Clone>(
        &self,
        key: &'static str,
        init: impl FnOnce() -> T,
    ) -> Rc<RefCell<T>> {
        if let Some(b) = self.map.borrow().get(key)
            && let Some(rc) = b.downcast_ref::<Rc<RefCell<T>>>()
        {
            return rc.clone();
        }
        let rc = Rc::new(RefCell::new(init()));
        self.map.borrow_mut().insert(key, Box::new(rc.clone()));
        rc
    }
    pub fn set_result<T: 'static>(&self, key: &'static str, val: T) {
        self.results.borrow_mut().insert(key, Box::new(val));
    }
    pub fn take_result<T: 'static>(&self, key: &'static str) -> Option<T> {
        self.results
            .borrow_mut()
            .remove(key)?
            .downcast::<T>()
            .ok()
            .map(|b| *b)
    }
}

struct Entry<K: NavKey> {
    id: u64,
    key: K,
    saved: Rc<SavedState>,
    /// Identity storage of this entry. Disposed when the entry leaves the
    /// stack, never when it is merely covered.
    scope: Scope,
}

impl<K: NavKey> Entry<K> {
    fn release(self) {
        log::debug!("nav: releasing entry {} ({:?})", self.id, self.key);
        self.scope.dispose();
    }
}

struct BackState<K: NavKey> {
    entries: Vec<Entry<K>>,
    next_id: u64,
}

impl<K: NavKey> BackState<K> {
    fn new_entry(&mut self, key: K) -> Entry<K> {
        let id = self.next_id;
        self.next_id += 1;
        Entry {
            id,
            key,
            saved: Rc::new(SavedState::default()),
            scope: Scope::new(),
        }
    }
}

#[derive(Clone)]
pub struct NavBackStack<K: NavKey> {
    inner: Rc<RefCell<BackState<K>>>,
    version: Rc<Cell<u64>>,
}
impl<K: NavKey> NavBackStack<K> {
    pub fn new(start: K) -> Self {
        let mut state = BackState {
            entries: Vec::new(),
            next_id: 1,
        };
        let first = state.new_entry(start);
        state.entries.push(first);
        Self {
            inner: Rc::new(RefCell::new(state)),
            version: Rc::new(Cell::new(0)),
        }
    }

    pub fn top(&self) -> Option<(u64, K, Rc<SavedState>, Scope)> {
        let s = self.inner.borrow();
        s.entries
            .last()
            .map(|e| (e.id, e.key.clone(), e.saved.clone(), e.scope.clone()))
    }
    pub fn size(&self) -> usize {
        self.inner.borrow().entries.len()
    }
    pub fn keys(&self) -> Vec<K> {
        self.inner
            .borrow()
            .entries
            .iter()
            .map(|e| e.key.clone())
            .collect()
    }
    /// Bumped on every stack mutation.
    pub fn version(&self) -> u64 {
        self.version.get()
    }
    fn bump(&self) {
        self.version.set(self.version.get().wrapping_add(1));
    }

    fn push_inner(&self, key: K) {
        let mut s = self.inner.borrow_mut();
        let entry = s.new_entry(key);
        log::debug!("nav: push entry {} ({:?})", entry.id, entry.key);
        s.entries.push(entry);
    }

    /// Pop the top entry (if any) and dispose its scope.
    fn pop_inner(&self) -> bool {
        let entry = self.inner.borrow_mut().entries.pop();

        // Released outside the borrow: disposal runs user cleanup.
        if let Some(e) = entry {
            e.release();
            true
        } else {
            false
        }
    }

    /// Swaps the top entry for a new one with its own identity.
    fn replace_inner(&self, key: K) {
        let old = {
            let mut s = self.inner.borrow_mut();
            let old = s.entries.pop();
            let entry = s.new_entry(key);
            s.entries.push(entry);
            old
        };
        if let Some(e) = old {
            e.release();
        }
    }

    pub fn to_json(&self) -> String
    where
        K: Serialize,
    {
        let s = self.inner.borrow();
        let keys: Vec<&K> = s.entries.iter().map(|e| &e.key).collect();
        serde_json::to_string(&keys).unwrap_or_else(|e| {
            log::warn!("nav: failed to save back stack: {e}");
            "[]".into()
        })
    }

    /// Rebuilds the stack from `to_json` output. Every existing entry is
    /// released; restored entries start with fresh identities.
    pub fn from_json(&self, json: &str) -> Result<(), serde_json::Error>
    where
        K: for<'de> Deserialize<'de>,
    {
        let keys = serde_json::from_str::<Vec<K>>(json)?;

        let old_entries = {
            let mut s = self.inner.borrow_mut();
            std::mem::take(&mut s.entries)
        };
        for e in old_entries.into_iter().rev() {
            e.release();
        }

        let mut s = self.inner.borrow_mut();
        for k in keys {
            let entry = s.new_entry(k);
            s.entries.push(entry);
        }
        drop(s);
        self.bump();
        Ok(())
    }
}

#[derive(Clone)]
pub struct Navigator<K: NavKey> {
    pub stack: NavBackStack<K>,
}
impl<K: NavKey> Navigator<K> {
    pub fn new(stack: NavBackStack<K>) -> Self {
        Self { stack }
    }
    pub fn push(&self, k: K) {
        self.stack.push_inner(k);
        self.stack.bump();
    }
    pub fn replace(&self, k: K) {
        self.stack.replace_inner(k);
        self.stack.bump();
    }
    pub fn pop(&self) -> bool {
        // Don't pop if only one entry is present
        if self.stack.size() <= 1 {
            return false;
        }
        let ok = self.stack.pop_inner();
        if ok {
            self.stack.bump();
        }
        ok
    }
    pub fn clear_and_push(&self, k: K) {
        while self.stack.pop_inner() {}
        self.stack.push_inner(k);
        self.stack.bump();
    }
    pub fn pop_to<F: Fn(&K) -> bool>(&self, pred: F, inclusive: bool) {
        let count = {
            let s = self.stack.inner.borrow();
            if let Some(idx) = s.entries.iter().rposition(|e| pred(&e.key)) {
                s.entries.len() - idx - (if inclusive { 0 } else { 1 })
            } else {
                0
            }
        };
        for _ in 0..count {
            let _ = self.stack.pop_inner();
        }
        if count > 0 {
            self.stack.bump();
        }
    }
}

/// The stack for this call site, kept alive by the composing scope.
pub fn remember_back_stack<K: NavKey>(start: K) -> Rc<NavBackStack<K>> {
    remember_with_key("nav:stack", || NavBackStack::new(start))
}

pub struct EntryScope<K: NavKey> {
    id: u64,
    key: K,
    saved: Rc<SavedState>,
    nav: Navigator<K>,
}
impl<K: NavKey> EntryScope<K> {
    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn key(&self) -> &K {
        &self.key
    }
    pub fn navigator(&self) -> Navigator<K> {
        self.nav.clone()
    }
    pub fn remember_saveable<T: 'static + Clone>(
        &self,
        slot: &'static str,
        init: impl FnOnce() -> T,
    ) -> Rc<RefCell<T>> {
        self.saved.remember(slot, init)
    }
    pub fn set_result<T: 'static>(&self, slot: &'static str, v: T) {
        self.saved.set_result(slot, v)
    }
    pub fn take_result<T: 'static>(&self, slot: &'static str) -> Option<T> {
        self.saved.take_result(slot)
    }
}

pub type EntryRenderer<K> = Rc<dyn Fn(&EntryScope<K>) -> View>;
pub fn renderer<K: NavKey>(f: impl Fn(&EntryScope<K>) -> View + 'static) -> EntryRenderer<K> {
    Rc::new(f)
}

/// Composes the top entry inside its own scope. Covered entries are not
/// composed, so the scheduler sees them disappear, but their scopes live on.
pub fn NavDisplay<K: NavKey>(stack: Rc<NavBackStack<K>>, make_view: EntryRenderer<K>) -> View {
    let (id, key, saved, entry_scope) = match stack.top() {
        Some(t) => t,
        None => return View::new("nav:empty"),
    };
    let scope = EntryScope {
        id,
        key,
        saved,
        nav: Navigator {
            stack: (*stack).clone(),
        },
    };

    let content = entry_scope.compose(|| (make_view)(&scope));
    View::new("nav:display").child(content)
}

mod tests;
