//! Destroy hooks.
//!
//! Visibility can't tell "covered by a pushed entry" from "gone for good",
//! so destruction is keyed off storage instead. A [`DestroySentinel`] is
//! remembered in the view's identity-scoped storage. It is released only
//! when the scope is disposed, and its `Drop` asks the runtime's
//! [`DestroyRegistry`] to run the pending action for its [`Token`].
//!
//! The sentinel holds a token and a dispatcher handle, never the registry
//! itself. `Drop` may run on any thread; off the UI thread it only posts a
//! job, and the registry (which is `!Send`) is only touched by that job on
//! the UI thread.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tenure_core::{Runtime, Service, UiDispatcher, View, remember};

use crate::load::on_load;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Correlates a sentinel with its registered action. Unique per process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(u64);

impl Token {
    pub fn fresh() -> Self {
        Token(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

pub struct PendingAction {
    token: Token,
    action: Box<dyn FnOnce()>,
}

impl PendingAction {
    pub fn token(&self) -> Token {
        self.token
    }

    fn invoke(self) {
        (self.action)()
    }
}

impl std::fmt::Debug for PendingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAction")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Pending destroy actions of one runtime, in registration order.
///
/// UI thread only. Reach it with [`DestroyRegistry::of`]; from other threads
/// go through a [`RegistryHandle`].
#[derive(Default)]
pub struct DestroyRegistry {
    entries: RefCell<IndexMap<Token, PendingAction>>,
}

impl DestroyRegistry {
    pub fn of(rt: &Runtime) -> Rc<DestroyRegistry> {
        rt.service::<DestroyRegistry>()
    }

    /// Stores `action` under `token`, replacing anything already there.
    pub fn register(&self, token: Token, action: impl FnOnce() + 'static) {
        let pending = PendingAction {
            token,
            action: Box::new(action),
        };
        let replaced = self.entries.borrow_mut().insert(token, pending);
        if replaced.is_some() {
            log::warn!("destroy: token {token:?} registered twice; keeping the newer action");
        } else {
            log::trace!("destroy: registered {token:?}");
        }
    }

    /// Removes the action for `token` and runs it. Returns false (and does
    /// nothing) when no action is registered, e.g. because it already fired.
    pub fn fire_and_remove(&self, token: Token) -> bool {
        let pending = self.entries.borrow_mut().shift_remove(&token);
        match pending {
            Some(p) => {
                log::trace!("destroy: firing {token:?}");
                // Borrow released: the action may register or fire others.
                p.invoke();
                true
            }
            None => {
                log::trace!("destroy: no action for {token:?}");
                false
            }
        }
    }

    pub fn contains(&self, token: Token) -> bool {
        self.entries.borrow().contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Registered tokens, oldest first.
    pub fn tokens(&self) -> Vec<Token> {
        self.entries.borrow().keys().copied().collect()
    }

    /// Drops every pending action without running it.
    pub fn drain(&self) -> usize {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        entries.len()
    }
}

impl Service for DestroyRegistry {
    fn shutdown(&self) {
        let n = self.drain();
        if n > 0 {
            log::debug!("destroy: dropped {n} pending actions at shutdown");
        }
    }
}

impl std::fmt::Debug for DestroyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestroyRegistry")
            .field("tokens", &self.tokens())
            .finish()
    }
}

/// Thread-safe way to trigger [`DestroyRegistry::fire_and_remove`].
#[derive(Clone, Debug)]
pub struct RegistryHandle {
    dispatcher: UiDispatcher,
}

impl RegistryHandle {
    pub fn new(rt: &Runtime) -> Self {
        Self {
            dispatcher: rt.dispatcher().clone(),
        }
    }

    /// Fires `token` on the UI thread: inline when already there with this
    /// runtime entered, otherwise as a posted job. Never blocks.
    pub fn fire_and_remove(&self, token: Token) {
        if self.dispatcher.is_ui_thread()
            && let Some(rt) = Runtime::current()
            && rt.dispatcher().ptr_eq(&self.dispatcher)
        {
            fire_in(&rt, token);
            return;
        }

        if let Err(e) = self.dispatcher.post(move || match Runtime::current() {
            Some(rt) => fire_in(&rt, token),
            None => log::debug!("destroy: {token:?} reached the UI thread without a runtime"),
        }) {
            log::trace!("destroy: {token:?} not delivered: {e}");
        }
    }
}

fn fire_in(rt: &Runtime, token: Token) {
    // Don't create the registry just to miss in it.
    if let Some(registry) = rt.try_service::<DestroyRegistry>() {
        registry.fire_and_remove(token);
    }
}

/// Lives in identity-scoped storage; its drop is the destruction signal.
#[derive(Debug)]
pub struct DestroySentinel {
    token: Token,
    handle: RegistryHandle,
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DestroySentinel>();
};

impl DestroySentinel {
    pub fn new(handle: RegistryHandle) -> Self {
        Self {
            token: Token::fresh(),
            handle,
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }
}

impl Drop for DestroySentinel {
    fn drop(&mut self) {
        self.handle.fire_and_remove(self.token);
    }
}

/// Runs `action` once when `view`'s identity is released for good.
///
/// The action is registered on first load; a view that never appeared never
/// fires. Being covered by a pushed entry, or disappearing for any other
/// reason while the identity lives, does not fire it. Release of the
/// identity storage is the signal: a host that tears a scope down and
/// rebuilds an equivalent one reports a destruction for the old scope.
pub fn on_destroy(view: View, action: impl FnOnce() + 'static) -> View {
    let Some(rt) = Runtime::current() else {
        log::warn!("on_destroy: no runtime entered; handler for {:?} ignored", view.name);
        return view;
    };

    let sentinel = remember(|| DestroySentinel::new(RegistryHandle::new(&rt)));
    let token = sentinel.token();
    let registry = DestroyRegistry::of(&rt);
    on_load(view, move || registry.register(token, action))
}
