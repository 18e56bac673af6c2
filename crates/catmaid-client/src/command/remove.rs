use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::{stored, validate_for_undo, Undoable};
use crate::error::{ClientError, Result};
use crate::gateway::Connectors;
use crate::identity::IdentityMap;
use crate::snapshot::Snapshot;
use crate::state::ObservedState;
use crate::types::{
    Confidence, EntityId, EntityKind, EntityRef, LinkState, Location, NewLink, Partner, ProjectId,
};

/// Remove a connector and all of its links
///
/// Undo recreates the connector at its old location and replays every
/// partner link. New links are matched to the removed ones by node and
/// relation.
#[derive(Debug, Clone)]
pub struct RemoveConnector {
    project: ProjectId,
    connector: EntityRef,
    links: Vec<LinkState>,
    confidence: Option<Confidence>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    partners: Option<Vec<Partner>>,
    /// Link id at execution time to the link id first observed
    reverse_links: Option<HashMap<EntityId, EntityId>>,
}

impl RemoveConnector {
    /// Capture the connector and its links as currently observed
    pub fn new(state: &ObservedState, project: ProjectId, connector_id: EntityId) -> Result<Self> {
        Ok(Self {
            project,
            connector: state.node(connector_id)?,
            links: state.links(connector_id).to_vec(),
            confidence: None,
            x: None,
            y: None,
            z: None,
            partners: None,
            reverse_links: None,
        })
    }

    pub fn partners(&self) -> Option<&[Partner]> {
        self.partners.as_deref()
    }

    pub fn location(&self) -> Option<Location> {
        Some(Location::new(self.x?, self.y?, self.z?))
    }
}

/// Reject partner sets where two partners share a node and relation
fn ensure_unambiguous(mapped: &[(EntityRef, &Partner)]) -> Result<()> {
    let mut seen = HashSet::new();
    for (node, partner) in mapped {
        if !seen.insert((node.id, partner.rel_id)) {
            return Err(ClientError::AmbiguousLinkMatch {
                node_id: node.id,
                relation_id: partner.rel_id,
            });
        }
    }
    Ok(())
}

#[async_trait]
impl Undoable for RemoveConnector {
    fn title(&self) -> String {
        format!("Remove connector #{}", self.connector.id)
    }

    async fn execute(&mut self, gateway: &Connectors, map: &mut IdentityMap) -> Result<()> {
        let connector = map.resolve(EntityKind::Connector, &self.connector);

        let mut reverse_links = HashMap::new();
        let links: Vec<LinkState> = self
            .links
            .iter()
            .map(|link| {
                let mapped = map.resolve(EntityKind::Link, &link.link_ref());
                reverse_links.insert(mapped.id, link.link_id);
                LinkState::new(
                    mapped.id,
                    mapped.version,
                    map.resolve_id(EntityKind::Node, link.node_id),
                    link.relation_id,
                )
            })
            .collect();

        let snapshot = Snapshot::neighborhood(connector.clone(), Some(links))?;
        let removed = gateway.remove(&snapshot, self.project, connector.id).await?;

        self.confidence = removed.confidence;
        self.x = removed.x;
        self.y = removed.y;
        self.z = removed.z;
        self.partners = removed.partners;
        self.reverse_links = Some(reverse_links);
        debug!(connector = %connector, "Connector removed, undo state stored");
        Ok(())
    }

    async fn undo(&mut self, gateway: &Connectors, map: &mut IdentityMap) -> Result<()> {
        validate_for_undo(&[
            ("confidence", &self.confidence),
            ("partners", &self.partners),
            ("x", &self.x),
            ("y", &self.y),
            ("z", &self.z),
            ("reverse link mapping", &self.reverse_links),
        ])?;
        let confidence = *stored("confidence", &self.confidence)?;
        let partners = stored("partners", &self.partners)?;
        let reverse_links = stored("reverse link mapping", &self.reverse_links)?;
        let location = Location::new(
            *stored("x", &self.x)?,
            *stored("y", &self.y)?,
            *stored("z", &self.z)?,
        );

        // Partners may have been replaced since the removal
        let mut mapped = Vec::with_capacity(partners.len());
        for partner in partners {
            let node = EntityRef::new(partner.id, partner.edition_time.clone());
            validate_for_undo(&[("partner node", &node)])?;
            mapped.push((map.resolve(EntityKind::Node, &node), partner));
        }
        ensure_unambiguous(&mapped)?;

        let (snapshot, links) = if mapped.is_empty() {
            (None, None)
        } else {
            let snapshot = Snapshot::nodes(mapped.iter().map(|(node, _)| node.clone()))?;
            let links: Vec<NewLink> = mapped
                .iter()
                .map(|(node, partner)| NewLink {
                    node_id: node.id,
                    relation_id: partner.rel_id,
                    confidence: partner.confidence,
                })
                .collect();
            (Some(snapshot), Some(links))
        };

        let created = gateway
            .create(
                snapshot.as_ref(),
                self.project,
                location,
                confidence,
                links.as_deref(),
            )
            .await?;

        map.add(
            EntityKind::Connector,
            self.connector.id,
            created.connector.id,
            created.connector.version.clone(),
        );
        for link in &created.created_links {
            let partner = mapped
                .iter()
                .find(|(node, p)| node.id == link.node_id && p.rel_id == link.relation_id)
                .map(|(_, p)| *p);
            let Some(partner) = partner else {
                warn!(
                    link_id = link.link_id,
                    node_id = link.node_id,
                    "Created link matches no stored partner"
                );
                continue;
            };
            let unmapped_link = match reverse_links.get(&partner.link_id) {
                Some(id) => *id,
                None => {
                    warn!(
                        link_id = partner.link_id,
                        "Removed link was not observed, mapping it directly"
                    );
                    partner.link_id
                }
            };
            map.add(EntityKind::Link, unmapped_link, link.link_id, link.version.clone());
        }

        debug!(
            connector = %created.connector,
            links = created.created_links.len(),
            "Connector removal undone"
        );
        Ok(())
    }
}
