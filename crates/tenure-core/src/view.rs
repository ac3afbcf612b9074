use std::borrow::Cow;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::scope::current_scope;

pub type ViewId = u64;

pub type Callback = Rc<dyn Fn()>;

thread_local! {
    static UNSCOPED_IDS: std::cell::Cell<u32> = const { std::cell::Cell::new(0) };
}

/// A node of the view description produced by one composition pass.
///
/// Views are rebuilt every frame; anything that must survive between frames
/// lives in the composing scope (`remember*`), not here.
#[derive(Clone)]
pub struct View {
    pub id: ViewId,
    pub name: Cow<'static, str>,
    pub children: Vec<View>,
    pub on_appear: SmallVec<[Callback; 1]>,
    pub on_disappear: SmallVec<[Callback; 1]>,
}

impl View {
    /// Creates a view whose id is stable across compositions of the current
    /// scope.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        let id = match current_scope() {
            Some(scope) => scope.next_view_id(),
            None => UNSCOPED_IDS.with(|n| {
                let id = n.get();
                n.set(id.wrapping_add(1));
                id as ViewId
            }),
        };
        Self::with_id(id, name)
    }

    pub fn with_id(id: ViewId, name: impl Into<Cow<'static, str>>) -> Self {
        View {
            id,
            name: name.into(),
            children: vec![],
            on_appear: SmallVec::new(),
            on_disappear: SmallVec::new(),
        }
    }

    pub fn with_children(mut self, kids: Vec<View>) -> Self {
        self.children = kids;
        self
    }

    pub fn child(mut self, kid: View) -> Self {
        self.children.push(kid);
        self
    }

    /// Host appear signal: runs each time the view comes on screen.
    pub fn on_appear(mut self, f: impl Fn() + 'static) -> Self {
        self.on_appear.push(Rc::new(f));
        self
    }

    /// Host disappear signal: runs each time the view leaves the screen,
    /// including when it is merely covered by a pushed entry.
    pub fn on_disappear(mut self, f: impl Fn() + 'static) -> Self {
        self.on_disappear.push(Rc::new(f));
        self
    }

    /// Pre-order traversal.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a View)) {
        f(self);
        for c in &self.children {
            c.walk(f);
        }
    }

    /// First view (pre-order) with the given name.
    pub fn find(&self, name: &str) -> Option<&View> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("on_appear", &self.on_appear.len())
            .field("on_disappear", &self.on_disappear.len())
            .field("children", &self.children)
            .finish()
    }
}
