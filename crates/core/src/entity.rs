//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Child records owned by an aggregate (cart lines, variants) are entities:
/// they keep their id while their attributes change.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
