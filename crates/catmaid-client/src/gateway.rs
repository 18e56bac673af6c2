//! Remote connector operations
//!
//! Every mutation takes a [`Snapshot`] of the state it expects, checks the
//! caller's permissions locally and only then goes to the server. Successful
//! mutations are announced on the [`EventBus`].

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::events::{ConnectorEvent, EventBus, EventListener};
use crate::permissions::{Capability, Permissions};
use crate::snapshot::Snapshot;
use crate::transport::{Request, Transport};
use crate::types::{
    Confidence, ConnectorDetail, ConnectorFilter, CreateConnectorResponse, CreateLinkResponse,
    CreatedConnector, EntityId, EntityRef, LinkType, Location, NewLink, ProjectId,
    RemovedConnector, RemovedLink,
};

/// Gateway to the connector endpoints of one CATMAID instance
pub struct Connectors {
    transport: Arc<dyn Transport>,
    permissions: RwLock<Permissions>,
    events: Arc<EventBus>,
}

fn require_attested(snapshot: &Snapshot, ids: &[EntityId]) -> Result<()> {
    match ids.iter().find(|id| !snapshot.contains(**id)) {
        Some(id) => Err(ClientError::InvalidSnapshot(format!(
            "entity #{} is not attested",
            id
        ))),
        None => Ok(()),
    }
}

impl Connectors {
    pub fn new(transport: Arc<dyn Transport>, permissions: Permissions) -> Self {
        Self::with_event_bus(transport, permissions, Arc::new(EventBus::new()))
    }

    pub fn with_event_bus(
        transport: Arc<dyn Transport>,
        permissions: Permissions,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            transport,
            permissions: RwLock::new(permissions),
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectorEvent> {
        self.events.subscribe()
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.events.add_listener(listener);
    }

    pub async fn set_permissions(&self, permissions: Permissions) {
        *self.permissions.write().await = permissions;
    }

    pub async fn permissions(&self) -> Permissions {
        self.permissions.read().await.clone()
    }

    /// Load the current user's permissions from the server and use them
    pub async fn fetch_permissions(&self) -> Result<Permissions> {
        let response = self.transport.send(Request::get("permissions")).await?;
        let permissions = Permissions::from_server_json(&response)?;
        debug!(?permissions, "Permissions loaded");
        self.set_permissions(permissions.clone()).await;
        Ok(permissions)
    }

    async fn require(
        &self,
        project: ProjectId,
        capability: Capability,
        message: &str,
    ) -> Result<()> {
        self.permissions
            .read()
            .await
            .require(project, capability, message)
    }

    /// Create a connector, optionally linked to existing nodes
    ///
    /// A snapshot is only needed when links are created; it must attest every
    /// linked node.
    pub async fn create(
        &self,
        snapshot: Option<&Snapshot>,
        project: ProjectId,
        location: Location,
        confidence: Confidence,
        links: Option<&[NewLink]>,
    ) -> Result<CreatedConnector> {
        self.require(
            project,
            Capability::Annotate,
            "You don't have permission to create connectors",
        )
        .await?;

        let state = match (links, snapshot) {
            (Some(links), Some(snapshot)) if !links.is_empty() => {
                let nodes: Vec<EntityId> = links.iter().map(|l| l.node_id).collect();
                require_attested(snapshot, &nodes)?;
                Some(snapshot.encode())
            }
            (Some(links), None) if !links.is_empty() => {
                return Err(ClientError::InvalidSnapshot(
                    "creating links requires a snapshot of the partner nodes".into(),
                ))
            }
            _ => None,
        };

        let params = json!({
            "pid": project,
            "confidence": confidence,
            "x": location.x,
            "y": location.y,
            "z": location.z,
            "links": links,
            "state": state,
        });
        let response = self
            .transport
            .send(Request::post(format!("{}/connector/create", project), params))
            .await?;
        let created: CreateConnectorResponse = serde_json::from_value(response)?;

        info!(
            project,
            connector_id = created.connector_id,
            links = created.created_links.len(),
            "Connector created"
        );
        self.events.emit(ConnectorEvent::ConnectorCreated {
            connector_id: created.connector_id,
            location,
        });

        Ok(CreatedConnector {
            connector: EntityRef::new(created.connector_id, created.connector_edition_time),
            created_links: created.created_links,
        })
    }

    /// Remove a connector together with its links
    pub async fn remove(
        &self,
        snapshot: &Snapshot,
        project: ProjectId,
        connector_id: EntityId,
    ) -> Result<RemovedConnector> {
        self.require(
            project,
            Capability::Annotate,
            "You don't have permission to remove connectors",
        )
        .await?;
        match snapshot {
            Snapshot::Neighborhood {
                primary,
                links: Some(_),
            } if primary.id == connector_id => {}
            _ => {
                return Err(ClientError::InvalidSnapshot(format!(
                    "removal of connector #{} needs its neighborhood with all links",
                    connector_id
                )))
            }
        }

        let params = json!({
            "connector_id": connector_id,
            "state": snapshot.encode(),
        });
        let response = self
            .transport
            .send(Request::post(format!("{}/connector/delete", project), params))
            .await?;
        let removed: RemovedConnector = serde_json::from_value(response)?;

        info!(project, connector_id = removed.connector_id, "Connector removed");
        self.events.emit(ConnectorEvent::ConnectorRemoved {
            connector_id: removed.connector_id,
        });
        Ok(removed)
    }

    /// Link a node to a connector; returns the new link
    pub async fn create_link(
        &self,
        snapshot: &Snapshot,
        project: ProjectId,
        connector_id: EntityId,
        node_id: EntityId,
        link_type: &LinkType,
    ) -> Result<EntityRef> {
        self.require(
            project,
            Capability::Annotate,
            "You don't have permission to create links",
        )
        .await?;
        require_attested(snapshot, &[node_id, connector_id])?;

        let params = json!({
            "pid": project,
            "from_id": node_id,
            "link_type": link_type,
            "to_id": connector_id,
            "state": snapshot.encode(),
        });
        let response = self
            .transport
            .send(Request::post(format!("{}/link/create", project), params))
            .await?;
        let created: CreateLinkResponse = serde_json::from_value(response)?;

        info!(
            project,
            link_id = created.link_id,
            connector_id,
            node_id,
            %link_type,
            "Link created"
        );
        self.events.emit(ConnectorEvent::LinkCreated {
            link_id: created.link_id,
            link_type: link_type.clone(),
            node_id,
        });
        Ok(EntityRef::new(created.link_id, created.link_edition_time))
    }

    /// Remove the link between a node and a connector
    pub async fn remove_link(
        &self,
        snapshot: &Snapshot,
        project: ProjectId,
        connector_id: EntityId,
        node_id: EntityId,
    ) -> Result<RemovedLink> {
        self.require(
            project,
            Capability::Annotate,
            "You don't have permission to remove links",
        )
        .await?;
        require_attested(snapshot, &[node_id, connector_id])?;

        let params = json!({
            "pid": project,
            "connector_id": connector_id,
            "treenode_id": node_id,
            "state": snapshot.encode(),
        });
        let response = self
            .transport
            .send(Request::post(format!("{}/link/delete", project), params))
            .await?;
        let removed: RemovedLink = serde_json::from_value(response)?;

        info!(project, link_id = removed.link_id, connector_id, node_id, "Link removed");
        self.events.emit(ConnectorEvent::LinkRemoved {
            link_id: removed.link_id,
            link_type: removed.link_type.clone(),
            link_type_id: removed.link_type_id,
            connector_id,
            node_id,
        });
        Ok(removed)
    }

    /// Location, confidence and partners of a connector
    pub async fn info(
        &self,
        project: ProjectId,
        connector_id: EntityId,
    ) -> Result<ConnectorDetail> {
        self.require(
            project,
            Capability::Browse,
            "You don't have permission to get connector details",
        )
        .await?;

        let response = self
            .transport
            .send(Request::get(format!(
                "{}/connector/{}/detail",
                project, connector_id
            )))
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Connector rows matching a filter, in the server's row format
    pub async fn list(&self, project: ProjectId, filter: &ConnectorFilter) -> Result<Vec<Value>> {
        self.require(
            project,
            Capability::Browse,
            "You don't have permission to list connectors",
        )
        .await?;

        let params = serde_json::to_value(filter)?;
        let response = self
            .transport
            .send(Request::post(format!("{}/connector/info", project), params))
            .await?;
        match response {
            Value::Array(rows) => Ok(rows),
            other => Err(ClientError::InvalidResponse(format!(
                "expected a list of connectors, got {}",
                other
            ))),
        }
    }
}
