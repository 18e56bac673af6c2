//! State snapshots sent with mutating requests
//!
//! A snapshot attests which entities (and at which edition time) an
//! operation expects. The server compares it against its own state and
//! rejects the request if anything changed in the meantime.

use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{ClientError, Result};
use crate::types::{EntityId, EntityRef, LinkState};

/// Optimistic-concurrency precondition for one gateway call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// A single entity
    Node(EntityRef),
    /// A set of entities, no neighborhood information
    Nodes(Vec<EntityRef>),
    /// A primary entity and, if attested, its complete link set
    Neighborhood {
        primary: EntityRef,
        links: Option<Vec<LinkState>>,
    },
}

fn ensure_resolved(entity: &EntityRef) -> Result<()> {
    if entity.is_resolved() {
        Ok(())
    } else {
        Err(ClientError::InvalidSnapshot(format!(
            "entity {} has no usable id or edition time",
            entity
        )))
    }
}

impl Snapshot {
    pub fn node(entity: EntityRef) -> Result<Self> {
        ensure_resolved(&entity)?;
        Ok(Snapshot::Node(entity))
    }

    /// Entities are deduplicated by id; the same id at two versions is rejected
    pub fn nodes(entities: impl IntoIterator<Item = EntityRef>) -> Result<Self> {
        let mut seen: HashMap<EntityId, String> = HashMap::new();
        let mut unique = Vec::new();
        for entity in entities {
            ensure_resolved(&entity)?;
            match seen.get(&entity.id) {
                Some(version) if *version == entity.version => continue,
                Some(version) => {
                    return Err(ClientError::InvalidSnapshot(format!(
                        "entity #{} attested at both {} and {}",
                        entity.id, version, entity.version
                    )))
                }
                None => {
                    seen.insert(entity.id, entity.version.clone());
                    unique.push(entity);
                }
            }
        }
        if unique.is_empty() {
            return Err(ClientError::InvalidSnapshot("no entities attested".into()));
        }
        Ok(Snapshot::Nodes(unique))
    }

    pub fn neighborhood(primary: EntityRef, links: Option<Vec<LinkState>>) -> Result<Self> {
        ensure_resolved(&primary)?;
        if let Some(links) = &links {
            for link in links {
                ensure_resolved(&link.link_ref())?;
            }
        }
        Ok(Snapshot::Neighborhood { primary, links })
    }

    pub fn primary(&self) -> Option<&EntityRef> {
        match self {
            Snapshot::Node(entity) => Some(entity),
            Snapshot::Neighborhood { primary, .. } => Some(primary),
            Snapshot::Nodes(_) => None,
        }
    }

    /// Attested link set of a neighborhood snapshot
    pub fn links(&self) -> Option<&[LinkState]> {
        match self {
            Snapshot::Neighborhood { links, .. } => links.as_deref(),
            _ => None,
        }
    }

    /// Entities attested directly (links excluded)
    pub fn entities(&self) -> Vec<&EntityRef> {
        match self {
            Snapshot::Node(entity) => vec![entity],
            Snapshot::Nodes(entities) => entities.iter().collect(),
            Snapshot::Neighborhood { primary, .. } => vec![primary],
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities().iter().any(|e| e.id == id)
    }

    /// Server-consumable state payload
    pub fn to_payload(&self) -> Value {
        match self {
            Snapshot::Node(entity) => json!({ "edition_time": entity.version }),
            Snapshot::Nodes(entities) => Value::Array(
                entities
                    .iter()
                    .map(|e| json!([e.id, e.version]))
                    .collect(),
            ),
            Snapshot::Neighborhood { primary, links } => {
                let mut state = json!({ "edition_time": primary.version });
                if let Some(links) = links {
                    state["c_links"] = Value::Array(
                        links
                            .iter()
                            .map(|l| json!([l.link_id, l.version]))
                            .collect(),
                    );
                }
                state
            }
        }
    }

    /// Payload as sent in the `state` request parameter
    pub fn encode(&self) -> String {
        self.to_payload().to_string()
    }
}
