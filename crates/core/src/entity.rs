//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Row version of the persisted state this value was read from.
    ///
    /// Zero until first persisted, 1 once stored, and grows by one with every
    /// persisted mutation.
    fn version(&self) -> u64;

    /// Record the version assigned by storage after a successful write.
    fn set_version(&mut self, version: u64);
}
