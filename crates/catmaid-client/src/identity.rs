//! Identity map for undo/redo
//!
//! Every mutating call makes the server hand out new ids and edition times.
//! Commands remember the references they first observed ("unmapped") and
//! translate them through this map into the references that are current
//! right now ("mapped").
//!
//! Bindings are only ever added. Resolution follows bindings transitively,
//! because the target of one binding can itself be re-created later and
//! become the source of another.

use std::collections::{HashMap, HashSet};
use tracing::trace;

use crate::types::{EntityId, EntityKind, EntityRef};

#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    /// Every binding observed per key, latest last
    bindings: HashMap<(EntityKind, EntityId), Vec<EntityRef>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `unmapped_id` to the given mapped reference
    ///
    /// A later call for the same key overrides the current binding, the
    /// previous one stays in the chain returned by [`IdentityMap::history`].
    pub fn add(
        &mut self,
        kind: EntityKind,
        unmapped_id: EntityId,
        mapped_id: EntityId,
        mapped_version: impl Into<String>,
    ) {
        let mapped = EntityRef::new(mapped_id, mapped_version);
        trace!(%kind, unmapped_id, mapped = %mapped, "Identity mapped");
        self.bindings
            .entry((kind, unmapped_id))
            .or_default()
            .push(mapped);
    }

    /// Current direct binding of a key, without following the chain
    pub fn get(&self, kind: EntityKind, unmapped_id: EntityId) -> Option<&EntityRef> {
        self.bindings
            .get(&(kind, unmapped_id))
            .and_then(|chain| chain.last())
    }

    /// Resolve a reference to the one that is current now
    ///
    /// Without any binding the reference is returned unchanged: it was never
    /// touched by a command and therefore is already current.
    pub fn resolve(&self, kind: EntityKind, unmapped: &EntityRef) -> EntityRef {
        let mut current = unmapped.clone();
        let mut visited = HashSet::new();
        while visited.insert(current.id) {
            match self.get(kind, current.id) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    /// Resolve only the id of an entity whose version is not tracked
    pub fn resolve_id(&self, kind: EntityKind, unmapped_id: EntityId) -> EntityId {
        self.resolve(kind, &EntityRef::new(unmapped_id, String::new())).id
    }

    /// All bindings ever recorded for a key, oldest first
    pub fn history(&self, kind: EntityKind, unmapped_id: EntityId) -> &[EntityRef] {
        self.bindings
            .get(&(kind, unmapped_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, kind: EntityKind, unmapped_id: EntityId) -> bool {
        self.bindings.contains_key(&(kind, unmapped_id))
    }

    /// Number of bound keys
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_resolves_to_itself() {
        let map = IdentityMap::new();
        let node = EntityRef::new(4, "t0");
        assert_eq!(map.resolve(EntityKind::Node, &node), node);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut map = IdentityMap::new();
        map.add(EntityKind::Connector, 1, 2, "t2");

        let um = EntityRef::new(1, "t1");
        let first = map.resolve(EntityKind::Connector, &um);
        let second = map.resolve(EntityKind::Connector, &um);
        assert_eq!(first, second);
        assert_eq!(first, EntityRef::new(2, "t2"));
    }

    #[test]
    fn test_resolution_is_transitive() {
        let mut map = IdentityMap::new();
        map.add(EntityKind::Connector, 1, 2, "t2");
        map.add(EntityKind::Connector, 2, 3, "t3");
        map.add(EntityKind::Connector, 3, 3, "t3b");

        let resolved = map.resolve(EntityKind::Connector, &EntityRef::new(1, "t1"));
        assert_eq!(resolved, EntityRef::new(3, "t3b"));
    }

    #[test]
    fn test_self_binding_terminates() {
        let mut map = IdentityMap::new();
        map.add(EntityKind::Link, 7, 7, "t7");
        assert_eq!(
            map.resolve(EntityKind::Link, &EntityRef::new(7, "old")),
            EntityRef::new(7, "t7")
        );
    }

    #[test]
    fn test_cycle_terminates() {
        let mut map = IdentityMap::new();
        map.add(EntityKind::Node, 1, 2, "a");
        map.add(EntityKind::Node, 2, 1, "b");
        let resolved = map.resolve(EntityKind::Node, &EntityRef::new(1, "x"));
        assert_eq!(resolved, EntityRef::new(1, "b"));
    }

    #[test]
    fn test_kinds_are_separate() {
        let mut map = IdentityMap::new();
        map.add(EntityKind::Node, 5, 50, "n");
        assert_eq!(map.resolve_id(EntityKind::Connector, 5), 5);
        assert_eq!(map.resolve_id(EntityKind::Node, 5), 50);
    }

    #[test]
    fn test_add_overrides_but_keeps_history() {
        let mut map = IdentityMap::new();
        map.add(EntityKind::Connector, 1, 2, "t2");
        map.add(EntityKind::Connector, 1, 9, "t9");

        assert_eq!(map.get(EntityKind::Connector, 1), Some(&EntityRef::new(9, "t9")));
        assert_eq!(
            map.history(EntityKind::Connector, 1),
            &[EntityRef::new(2, "t2"), EntityRef::new(9, "t9")]
        );
        assert_eq!(map.len(), 1);
    }
}
