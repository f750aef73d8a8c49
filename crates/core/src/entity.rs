//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Owners and accounts are entities: two rows with the same id are the same
/// owner/account regardless of the balance or lock flag they carry.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
