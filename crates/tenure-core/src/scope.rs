//! Identity-scoped storage.
//!
//! A [`Scope`] outlives individual compositions: remembered values, view
//! ordinals and disposers live here until the scope is disposed (e.g. when a
//! navigation entry is popped). Releasing the slot storage is what runs the
//! `Drop` of every remembered value, which is the deterministic destruction
//! signal the lifecycle hooks build on.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::view::ViewId;

thread_local! {
    static CURRENT_SCOPE: RefCell<Option<Weak<ScopeInner>>> = const { RefCell::new(None) };
}

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

pub type ScopeId = u64;

/// Order-based and key-based remembered values.
#[derive(Default)]
pub struct SlotTable {
    pub slots: Vec<Box<dyn Any>>,
    pub cursor: usize,
    pub keyed_slots: HashMap<String, Box<dyn Any>>,
    /// Values evicted by a type change, dropped once the table is no longer
    /// borrowed.
    released: Vec<Box<dyn Any>>,
}

impl SlotTable {
    pub fn remember<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<T> {
        let cursor = self.cursor;
        self.cursor += 1;

        if cursor >= self.slots.len() {
            let rc: Rc<T> = Rc::new(init());
            self.slots.push(Box::new(rc.clone()));
            return rc;
        }

        if let Some(rc) = self.slots[cursor].downcast_ref::<Rc<T>>() {
            rc.clone()
        } else {
            log::warn!(
                "remember: slot {} type changed; replacing. \
                 If this is due to conditional composition, prefer remember_with_key.",
                cursor
            );
            let rc: Rc<T> = Rc::new(init());
            let old = std::mem::replace(&mut self.slots[cursor], Box::new(rc.clone()));
            self.released.push(old);
            rc
        }
    }

    pub fn remember_with_key<T: 'static>(
        &mut self,
        key: String,
        init: impl FnOnce() -> T,
    ) -> Rc<T> {
        if let Some(existing) = self.keyed_slots.get(&key) {
            if let Some(rc) = existing.downcast_ref::<Rc<T>>() {
                return rc.clone();
            }
            log::warn!(
                "remember_with_key: key '{}' reused with a different type; replacing.",
                key
            );
        }

        let rc: Rc<T> = Rc::new(init());
        if let Some(old) = self.keyed_slots.insert(key, Box::new(rc.clone())) {
            self.released.push(old);
        }
        rc
    }

    pub fn take_released(&mut self) -> Vec<Box<dyn Any>> {
        std::mem::take(&mut self.released)
    }

    pub fn len(&self) -> usize {
        self.slots.len() + self.keyed_slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Scope {
    inner: Rc<ScopeInner>,
}

struct ScopeInner {
    id: ScopeId,
    slots: RefCell<SlotTable>,
    next_view: Cell<u32>,
    disposers: RefCell<Vec<Box<dyn FnOnce()>>>,
    children: RefCell<Vec<Scope>>,
    disposed: Cell<bool>,
}

impl Scope {
    pub fn new() -> Self {
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Rc::new(ScopeInner {
                id,
                slots: RefCell::new(SlotTable::default()),
                next_view: Cell::new(0),
                disposers: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
            }),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Runs `f` with this scope as the current one.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        // Restore on unwind too, so a panicking view doesn't leave us current.
        struct Restore(Option<Weak<ScopeInner>>);
        impl Drop for Restore {
            fn drop(&mut self) {
                let prev = self.0.take();
                CURRENT_SCOPE.with(|current| *current.borrow_mut() = prev);
            }
        }

        let prev = CURRENT_SCOPE.with(|current| {
            current
                .borrow_mut()
                .replace(Rc::downgrade(&self.inner))
        });
        let _restore = Restore(prev);
        f()
    }

    /// Starts a composition pass: rewinds the slot cursor and view ordinals,
    /// then runs `f` as the current scope.
    pub fn compose<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.slots.borrow_mut().cursor = 0;
        self.inner.next_view.set(0);
        self.run(f)
    }

    pub fn remember<T: 'static>(&self, init: impl FnOnce() -> T) -> Rc<T> {
        // `init` runs under the borrow; it must not remember into the same scope.
        let (rc, released) = {
            let mut slots = self.inner.slots.borrow_mut();
            let rc = slots.remember(init);
            (rc, slots.take_released())
        };
        drop(released);
        rc
    }

    pub fn remember_with_key<T: 'static>(
        &self,
        key: impl Into<String>,
        init: impl FnOnce() -> T,
    ) -> Rc<T> {
        let (rc, released) = {
            let mut slots = self.inner.slots.borrow_mut();
            let rc = slots.remember_with_key(key.into(), init);
            (rc, slots.take_released())
        };
        drop(released);
        rc
    }

    /// Number of values currently remembered in this scope.
    pub fn slot_count(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    /// Next stable view id for this composition pass.
    pub fn next_view_id(&self) -> ViewId {
        let ordinal = self.inner.next_view.get();
        self.inner.next_view.set(ordinal.wrapping_add(1));
        (self.inner.id << 32) | ordinal as ViewId
    }

    pub fn add_disposer(&self, disposer: impl FnOnce() + 'static) {
        self.inner.disposers.borrow_mut().push(Box::new(disposer));
    }

    pub fn child(&self) -> Scope {
        let child = Scope::new();
        self.inner.children.borrow_mut().push(child.clone());
        child
    }

    /// Disposes children, runs disposers, then releases every remembered
    /// value. Idempotent.
    pub fn dispose(self) {
        self.inner.release();
    }
}

impl ScopeInner {
    fn release(&self) {
        if self.disposed.replace(true) {
            return;
        }
        log::trace!("scope {}: releasing", self.id);

        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            child.dispose();
        }

        let disposers = std::mem::take(&mut *self.disposers.borrow_mut());
        for disposer in disposers {
            disposer();
        }

        // Take first, drop after the borrow ends: a slot's Drop may call back
        // into this scope.
        let slots = std::mem::take(&mut *self.slots.borrow_mut());
        drop(slots);
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Scope {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("slots", &self.slot_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

pub fn current_scope() -> Option<Scope> {
    CURRENT_SCOPE.with(|current| {
        current
            .borrow()
            .as_ref()
            .and_then(|weak| weak.upgrade().map(|inner| Scope { inner }))
    })
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.release();
    }
}
