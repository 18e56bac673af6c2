use async_trait::async_trait;
use tracing::debug;

use super::{stored, validate_for_undo, Undoable};
use crate::error::Result;
use crate::gateway::Connectors;
use crate::identity::IdentityMap;
use crate::snapshot::Snapshot;
use crate::types::{Confidence, EntityId, EntityKind, EntityRef, Location, ProjectId};

/// Create a connector without links
///
/// The connector created by the first execution is the unmapped reference
/// every later execution and undo resolves from.
#[derive(Debug, Clone)]
pub struct CreateConnector {
    project: ProjectId,
    location: Location,
    confidence: Confidence,
    /// First created connector
    unmapped: Option<EntityRef>,
    /// Connector created by the latest execution
    connector_id: Option<EntityId>,
}

impl CreateConnector {
    pub fn new(project: ProjectId, location: Location, confidence: Confidence) -> Self {
        Self {
            project,
            location,
            confidence,
            unmapped: None,
            connector_id: None,
        }
    }

    /// Id assigned by the latest execution
    pub fn connector_id(&self) -> Option<EntityId> {
        self.connector_id
    }

    pub fn unmapped(&self) -> Option<&EntityRef> {
        self.unmapped.as_ref()
    }
}

#[async_trait]
impl Undoable for CreateConnector {
    fn title(&self) -> String {
        format!("Create new connector at {}", self.location)
    }

    async fn execute(&mut self, gateway: &Connectors, map: &mut IdentityMap) -> Result<()> {
        let created = gateway
            .create(None, self.project, self.location, self.confidence, None)
            .await?;

        let unmapped = self
            .unmapped
            .get_or_insert_with(|| created.connector.clone());
        map.add(
            EntityKind::Connector,
            unmapped.id,
            created.connector.id,
            created.connector.version.clone(),
        );
        self.connector_id = Some(created.connector.id);
        Ok(())
    }

    async fn undo(&mut self, gateway: &Connectors, map: &mut IdentityMap) -> Result<()> {
        let unmapped = stored("created connector", &self.unmapped)?;
        let connector = map.resolve(EntityKind::Connector, unmapped);
        validate_for_undo(&[("mapped connector", &connector)])?;

        // A freshly created connector has no links
        let snapshot = Snapshot::neighborhood(connector.clone(), Some(Vec::new()))?;
        gateway.remove(&snapshot, self.project, connector.id).await?;
        debug!(connector = %connector, "Connector creation undone");
        Ok(())
    }
}
