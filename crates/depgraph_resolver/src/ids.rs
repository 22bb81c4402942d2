//! Stable arena indices for the shared-object graph.
//!
//! Components, modules, nodes, edges and selectors all reference each other.
//! Rather than modelling that with `Rc`/`RefCell` back-edges, every entity
//! lives in a `Vec` owned by [`crate::resolve_state::ResolveState`] and is
//! referred to elsewhere by one of the newtypes below.

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn new(index: usize) -> Self {
                Self(u32::try_from(index).expect("arena index overflowed u32"))
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(
    /// Index of a [`crate::component::ModuleResolveState`].
    ModuleId
);
arena_id!(
    /// Index of a [`crate::component::ComponentState`].
    ComponentId
);
arena_id!(
    /// Index of a [`crate::node::NodeState`].
    NodeId
);
arena_id!(
    /// Index of a [`crate::edge::EdgeState`].
    EdgeId
);
arena_id!(
    /// Index of a [`crate::selector::SelectorState`].
    SelectorId
);
