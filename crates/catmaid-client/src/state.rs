//! The client's view of entities at the time a user acts
//!
//! Commands capture their unmapped references from this view when they are
//! created. It is never consulted again afterwards; later executions go
//! through the identity map.

use std::collections::HashMap;

use crate::error::{ClientError, Result};
use crate::types::{EntityId, EntityRef, LinkState};

#[derive(Debug, Clone, Default)]
pub struct ObservedState {
    /// Edition time of every known node or connector
    versions: HashMap<EntityId, String>,
    /// Known links per connector
    links: HashMap<EntityId, Vec<LinkState>>,
}

impl ObservedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, id: EntityId, version: impl Into<String>) -> Self {
        self.set_node(id, version);
        self
    }

    /// Add a connector together with its complete link set
    pub fn with_connector(
        mut self,
        id: EntityId,
        version: impl Into<String>,
        links: Vec<LinkState>,
    ) -> Self {
        self.set_node(id, version);
        self.links.insert(id, links);
        self
    }

    pub fn set_node(&mut self, id: EntityId, version: impl Into<String>) {
        self.versions.insert(id, version.into());
    }

    pub fn set_links(&mut self, connector_id: EntityId, links: Vec<LinkState>) {
        self.links.insert(connector_id, links);
    }

    pub fn node(&self, id: EntityId) -> Result<EntityRef> {
        self.versions
            .get(&id)
            .map(|version| EntityRef::new(id, version.clone()))
            .ok_or(ClientError::UnknownEntity(id))
    }

    /// Links of a connector; empty if none were observed
    pub fn links(&self, connector_id: EntityId) -> &[LinkState] {
        self.links
            .get(&connector_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_lookup() {
        let state = ObservedState::new().with_node(3, "t3");
        assert_eq!(state.node(3).unwrap(), EntityRef::new(3, "t3"));
        assert!(matches!(state.node(4), Err(ClientError::UnknownEntity(4))));
    }

    #[test]
    fn test_connector_links() {
        let link = LinkState::new(10, "l10", 3, 1);
        let state = ObservedState::new().with_connector(7, "c7", vec![link.clone()]);
        assert_eq!(state.links(7), &[link]);
        assert!(state.links(8).is_empty());
    }
}
