//! Types for the CATMAID connector API

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::{ClientError, Result};

/// Project space identifier
pub type ProjectId = i64;

/// Server-assigned id of a node, connector or link
pub type EntityId = i64;

/// Kinds of entity tracked by the identity map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Skeleton treenode
    Node,
    Connector,
    /// Typed relation between a node and a connector
    Link,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Node => write!(f, "node"),
            EntityKind::Connector => write!(f, "connector"),
            EntityKind::Link => write!(f, "link"),
        }
    }
}

/// An entity id together with the edition time it was observed at
///
/// The version is an opaque token assigned by the server on creation and on
/// every later mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
    pub version: String,
}

impl EntityRef {
    pub fn new(id: EntityId, version: impl Into<String>) -> Self {
        Self {
            id,
            version: version.into(),
        }
    }

    /// True if both id and version are usable in a state payload
    pub fn is_resolved(&self) -> bool {
        self.id > 0 && !self.version.is_empty()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.id, self.version)
    }
}

/// Point in project space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Confidence score in range 1-5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8")]
pub struct Confidence(u8);

impl Confidence {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ClientError::InvalidValue(format!(
                "confidence {} outside {}-{}",
                value,
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Confidence {
    type Error = ClientError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relation name of a link (e.g. "presynaptic_to")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkType(String);

impl LinkType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn presynaptic() -> Self {
        Self::new("presynaptic_to")
    }

    pub fn postsynaptic() -> Self {
        Self::new("postsynaptic_to")
    }

    pub fn abutting() -> Self {
        Self::new("abutting")
    }

    pub fn gap_junction() -> Self {
        Self::new("gapjunction_with")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LinkType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A connector link as observed by the client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkState {
    pub link_id: EntityId,
    pub version: String,
    /// Linked treenode
    pub node_id: EntityId,
    pub relation_id: EntityId,
}

impl LinkState {
    pub fn new(
        link_id: EntityId,
        version: impl Into<String>,
        node_id: EntityId,
        relation_id: EntityId,
    ) -> Self {
        Self {
            link_id,
            version: version.into(),
            node_id,
            relation_id,
        }
    }

    pub fn link_ref(&self) -> EntityRef {
        EntityRef::new(self.link_id, self.version.clone())
    }
}

/// Link to create together with a new connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewLink {
    pub node_id: EntityId,
    pub relation_id: EntityId,
    pub confidence: Confidence,
}

// Sent as [treenode_id, relation_id, confidence]
impl Serialize for NewLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (self.node_id, self.relation_id, self.confidence).serialize(serializer)
    }
}

/// Link created by `connector/create`
///
/// Wire form is `[link_id, edition_time, treenode_id, relation_id]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(EntityId, String, EntityId, EntityId)")]
pub struct CreatedLink {
    pub link_id: EntityId,
    pub version: String,
    pub node_id: EntityId,
    pub relation_id: EntityId,
}

impl From<(EntityId, String, EntityId, EntityId)> for CreatedLink {
    fn from(
        (link_id, version, node_id, relation_id): (EntityId, String, EntityId, EntityId),
    ) -> Self {
        Self {
            link_id,
            version,
            node_id,
            relation_id,
        }
    }
}

impl CreatedLink {
    pub fn link_ref(&self) -> EntityRef {
        EntityRef::new(self.link_id, self.version.clone())
    }
}

/// Partner link reported by `connector/delete`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    /// Treenode id
    pub id: EntityId,
    /// Treenode edition time
    pub edition_time: String,
    pub rel_id: EntityId,
    pub confidence: Confidence,
    pub link_id: EntityId,
}

/// Raw response of `connector/create`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreateConnectorResponse {
    pub connector_id: EntityId,
    pub connector_edition_time: String,
    #[serde(default)]
    pub created_links: Vec<CreatedLink>,
}

/// Result of a connector creation
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedConnector {
    pub connector: EntityRef,
    pub created_links: Vec<CreatedLink>,
}

/// Result of a connector removal, as reported by `connector/delete`
///
/// Fields the server omits stay `None`; undo refuses to run without them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemovedConnector {
    pub connector_id: EntityId,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
    #[serde(default)]
    pub partners: Option<Vec<Partner>>,
}

/// Raw response of `link/create`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreateLinkResponse {
    pub link_id: EntityId,
    pub link_edition_time: String,
}

/// Result of a link removal, as reported by `link/delete`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemovedLink {
    pub link_id: EntityId,
    #[serde(default)]
    pub link_type: Option<LinkType>,
    #[serde(default)]
    pub link_type_id: Option<EntityId>,
}

/// Partner entry of `connector/{id}/detail`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailPartner {
    pub link_id: EntityId,
    pub partner_id: EntityId,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub skeleton_id: Option<EntityId>,
    pub relation_id: EntityId,
    #[serde(default)]
    pub relation_name: Option<String>,
}

/// Detailed connector information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorDetail {
    pub connector_id: EntityId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub confidence: Confidence,
    #[serde(default)]
    pub partners: Vec<DetailPartner>,
}

impl ConnectorDetail {
    pub fn location(&self) -> Location {
        Location::new(self.x, self.y, self.z)
    }
}

/// Filter for `connector/info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectorFilter {
    #[serde(rename = "cids", skip_serializing_if = "Vec::is_empty")]
    pub connector_ids: Vec<EntityId>,
    #[serde(rename = "skids", skip_serializing_if = "Vec::is_empty")]
    pub skeleton_ids: Vec<EntityId>,
    #[serde(rename = "pre", skip_serializing_if = "Vec::is_empty")]
    pub pre_skeleton_ids: Vec<EntityId>,
    #[serde(rename = "post", skip_serializing_if = "Vec::is_empty")]
    pub post_skeleton_ids: Vec<EntityId>,
}

impl ConnectorFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connectors(mut self, ids: Vec<EntityId>) -> Self {
        self.connector_ids = ids;
        self
    }

    pub fn with_skeletons(mut self, ids: Vec<EntityId>) -> Self {
        self.skeleton_ids = ids;
        self
    }

    pub fn with_pre_skeletons(mut self, ids: Vec<EntityId>) -> Self {
        self.pre_skeleton_ids = ids;
        self
    }

    pub fn with_post_skeletons(mut self, ids: Vec<EntityId>) -> Self {
        self.post_skeleton_ids = ids;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_range() {
        assert!(Confidence::new(0).is_err());
        assert!(Confidence::new(6).is_err());
        assert_eq!(Confidence::new(3).unwrap().value(), 3);
        assert_eq!(Confidence::default().value(), 5);
    }

    #[test]
    fn test_confidence_from_server_is_checked() {
        assert!(serde_json::from_value::<Confidence>(serde_json::json!(9)).is_err());
        assert_eq!(
            serde_json::from_value::<Confidence>(serde_json::json!(2)).unwrap(),
            Confidence::new(2).unwrap()
        );
        assert_eq!(serde_json::to_value(Confidence::new(2).unwrap()).unwrap(), 2);

        let removed = serde_json::from_value::<RemovedConnector>(
            serde_json::json!({"connector_id": 5, "confidence": 0}),
        );
        assert!(removed.is_err());
    }

    #[test]
    fn test_created_link_from_array() {
        let links: Vec<CreatedLink> =
            serde_json::from_str(r#"[[77, "2024-01-01T00:00:00Z", 12, 4]]"#).unwrap();
        assert_eq!(links[0].link_id, 77);
        assert_eq!(links[0].node_id, 12);
        assert_eq!(links[0].relation_id, 4);
        assert_eq!(links[0].link_ref(), EntityRef::new(77, "2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_new_link_serializes_as_triple() {
        let link = NewLink {
            node_id: 9,
            relation_id: 2,
            confidence: Confidence::new(4).unwrap(),
        };
        assert_eq!(serde_json::to_value(link).unwrap(), serde_json::json!([9, 2, 4]));
    }

    #[test]
    fn test_removed_connector_tolerates_missing_fields() {
        let removed: RemovedConnector =
            serde_json::from_str(r#"{"connector_id": 5, "x": 1.0, "y": 2.0, "z": 3.0}"#).unwrap();
        assert_eq!(removed.connector_id, 5);
        assert!(removed.confidence.is_none());
        assert!(removed.partners.is_none());
    }

    #[test]
    fn test_filter_skips_empty_lists() {
        let filter = ConnectorFilter::new().with_pre_skeletons(vec![3]);
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json, serde_json::json!({"pre": [3]}));
    }

    #[test]
    fn test_entity_ref_resolved() {
        assert!(EntityRef::new(1, "t").is_resolved());
        assert!(!EntityRef::new(1, "").is_resolved());
        assert!(!EntityRef::new(0, "t").is_resolved());
    }
}
