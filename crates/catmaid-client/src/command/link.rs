use async_trait::async_trait;
use tracing::debug;

use super::{stored, validate_for_undo, Undoable};
use crate::error::Result;
use crate::gateway::Connectors;
use crate::identity::IdentityMap;
use crate::snapshot::Snapshot;
use crate::state::ObservedState;
use crate::types::{EntityId, EntityKind, EntityRef, LinkType, ProjectId};

/// Current references of a node and a connector
fn resolve_pair(
    map: &IdentityMap,
    node: &EntityRef,
    connector: &EntityRef,
) -> (EntityRef, EntityRef) {
    (
        map.resolve(EntityKind::Node, node),
        map.resolve(EntityKind::Connector, connector),
    )
}

fn pair_snapshot(node: &EntityRef, connector: &EntityRef) -> Result<Snapshot> {
    Snapshot::nodes([node.clone(), connector.clone()])
}

/// Link a node to a connector through a relation
#[derive(Debug, Clone)]
pub struct LinkConnector {
    project: ProjectId,
    connector: EntityRef,
    node: EntityRef,
    link_type: LinkType,
    /// Link created by the first execution
    unmapped_link: Option<EntityId>,
}

impl LinkConnector {
    pub fn new(
        state: &ObservedState,
        project: ProjectId,
        connector_id: EntityId,
        node_id: EntityId,
        link_type: LinkType,
    ) -> Result<Self> {
        Ok(Self {
            project,
            connector: state.node(connector_id)?,
            node: state.node(node_id)?,
            link_type,
            unmapped_link: None,
        })
    }

    /// Id of the link as first created
    pub fn unmapped_link(&self) -> Option<EntityId> {
        self.unmapped_link
    }
}

#[async_trait]
impl Undoable for LinkConnector {
    fn title(&self) -> String {
        format!(
            "Link connector {} with node {} through relation \"{}\"",
            self.connector.id, self.node.id, self.link_type
        )
    }

    async fn execute(&mut self, gateway: &Connectors, map: &mut IdentityMap) -> Result<()> {
        let (node, connector) = resolve_pair(map, &self.node, &self.connector);
        let snapshot = pair_snapshot(&node, &connector)?;
        let link = gateway
            .create_link(&snapshot, self.project, connector.id, node.id, &self.link_type)
            .await?;

        let unmapped = *self.unmapped_link.get_or_insert(link.id);
        map.add(EntityKind::Link, unmapped, link.id, link.version);
        Ok(())
    }

    async fn undo(&mut self, gateway: &Connectors, map: &mut IdentityMap) -> Result<()> {
        let (node, connector) = resolve_pair(map, &self.node, &self.connector);
        validate_for_undo(&[("mapped connector", &connector), ("mapped node", &node)])?;
        let snapshot = pair_snapshot(&node, &connector)?;

        let removed = gateway
            .remove_link(&snapshot, self.project, connector.id, node.id)
            .await?;
        debug!(link_id = removed.link_id, "Link creation undone");
        Ok(())
    }
}

/// Remove the link between a node and a connector
#[derive(Debug, Clone)]
pub struct UnlinkConnector {
    project: ProjectId,
    connector: EntityRef,
    node: EntityRef,
    /// Relation of the removed link
    link_type: Option<LinkType>,
    /// Link removed by the first execution
    unmapped_link: Option<EntityId>,
}

impl UnlinkConnector {
    pub fn new(
        state: &ObservedState,
        project: ProjectId,
        connector_id: EntityId,
        node_id: EntityId,
    ) -> Result<Self> {
        Ok(Self {
            project,
            connector: state.node(connector_id)?,
            node: state.node(node_id)?,
            link_type: None,
            unmapped_link: None,
        })
    }

    pub fn link_type(&self) -> Option<&LinkType> {
        self.link_type.as_ref()
    }
}

#[async_trait]
impl Undoable for UnlinkConnector {
    fn title(&self) -> String {
        format!(
            "Remove link between connector {} and node {}",
            self.connector.id, self.node.id
        )
    }

    async fn execute(&mut self, gateway: &Connectors, map: &mut IdentityMap) -> Result<()> {
        let (node, connector) = resolve_pair(map, &self.node, &self.connector);
        let snapshot = pair_snapshot(&node, &connector)?;
        let removed = gateway
            .remove_link(&snapshot, self.project, connector.id, node.id)
            .await?;

        self.link_type = removed.link_type;
        self.unmapped_link.get_or_insert(removed.link_id);
        Ok(())
    }

    async fn undo(&mut self, gateway: &Connectors, map: &mut IdentityMap) -> Result<()> {
        let (node, connector) = resolve_pair(map, &self.node, &self.connector);
        validate_for_undo(&[
            ("mapped connector", &connector),
            ("mapped node", &node),
            ("link type", &self.link_type),
        ])?;
        let link_type = stored("link type", &self.link_type)?;
        let snapshot = pair_snapshot(&node, &connector)?;

        let link = gateway
            .create_link(&snapshot, self.project, connector.id, node.id, link_type)
            .await?;
        if let Some(unmapped) = self.unmapped_link {
            map.add(EntityKind::Link, unmapped, link.id, link.version);
        }
        Ok(())
    }
}
