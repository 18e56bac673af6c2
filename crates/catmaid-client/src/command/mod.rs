//! Undoable connector commands
//!
//! A command captures the references it was created from, runs its operation
//! through the gateway and keeps whatever the server returned that is needed
//! to reverse it later. Every new id the server hands out is registered in
//! the identity map before the command returns.

mod create;
mod link;
mod remove;

pub use create::CreateConnector;
pub use link::{LinkConnector, UnlinkConnector};
pub use remove::RemoveConnector;

use async_trait::async_trait;
use std::fmt;

use crate::error::{ClientError, Result};
use crate::gateway::Connectors;
use crate::identity::IdentityMap;
use crate::types::EntityRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Unexecuted,
    Executed,
    Undone,
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStatus::Unexecuted => write!(f, "unexecuted"),
            CommandStatus::Executed => write!(f, "executed"),
            CommandStatus::Undone => write!(f, "undone"),
        }
    }
}

/// A reversible unit of work
#[async_trait]
pub trait Undoable: Send + Sync {
    /// Human readable description for history listings
    fn title(&self) -> String;

    /// Perform the operation, or perform it again after an undo
    async fn execute(&mut self, gateway: &Connectors, map: &mut IdentityMap) -> Result<()>;

    /// Reverse the last execution
    async fn undo(&mut self, gateway: &Connectors, map: &mut IdentityMap) -> Result<()>;
}

/// Something undo may depend on
pub trait UndoValue {
    fn is_present(&self) -> bool;
}

impl<T> UndoValue for Option<T> {
    fn is_present(&self) -> bool {
        self.is_some()
    }
}

impl UndoValue for EntityRef {
    fn is_present(&self) -> bool {
        self.is_resolved()
    }
}

/// Fail with `MissingUndoState` naming every absent value
pub fn validate_for_undo(values: &[(&str, &dyn UndoValue)]) -> Result<()> {
    let missing: Vec<&str> = values
        .iter()
        .filter(|(_, value)| !value.is_present())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ClientError::MissingUndoState(missing.join(", ")))
    }
}

/// Borrow a stored value, failing if it was never recorded
pub fn stored<'a, T>(name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| ClientError::MissingUndoState(name.to_string()))
}

/// The kinds of command
pub enum CommandOp {
    CreateConnector(CreateConnector),
    RemoveConnector(RemoveConnector),
    LinkConnector(LinkConnector),
    UnlinkConnector(UnlinkConnector),
}

impl CommandOp {
    fn inner(&self) -> &dyn Undoable {
        match self {
            CommandOp::CreateConnector(c) => c,
            CommandOp::RemoveConnector(c) => c,
            CommandOp::LinkConnector(c) => c,
            CommandOp::UnlinkConnector(c) => c,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Undoable {
        match self {
            CommandOp::CreateConnector(c) => c,
            CommandOp::RemoveConnector(c) => c,
            CommandOp::LinkConnector(c) => c,
            CommandOp::UnlinkConnector(c) => c,
        }
    }
}

/// A command together with its lifecycle state
///
/// `Unexecuted -> Executed <-> Undone`. The state only advances when the
/// remote call succeeded.
pub struct Command {
    status: CommandStatus,
    op: CommandOp,
}

impl Command {
    pub fn new(op: CommandOp) -> Self {
        Self {
            status: CommandStatus::Unexecuted,
            op,
        }
    }

    pub fn status(&self) -> CommandStatus {
        self.status
    }

    pub fn op(&self) -> &CommandOp {
        &self.op
    }

    pub fn title(&self) -> String {
        self.op.inner().title()
    }

    pub async fn execute(&mut self, gateway: &Connectors, map: &mut IdentityMap) -> Result<()> {
        if self.status == CommandStatus::Executed {
            return Err(ClientError::InvalidTransition(format!(
                "\"{}\" is already executed",
                self.title()
            )));
        }
        self.op.inner_mut().execute(gateway, map).await?;
        self.status = CommandStatus::Executed;
        Ok(())
    }

    pub async fn undo(&mut self, gateway: &Connectors, map: &mut IdentityMap) -> Result<()> {
        if self.status != CommandStatus::Executed {
            return Err(ClientError::InvalidTransition(format!(
                "cannot undo \"{}\" while {}",
                self.title(),
                self.status
            )));
        }
        self.op.inner_mut().undo(gateway, map).await?;
        self.status = CommandStatus::Undone;
        Ok(())
    }
}

impl From<CreateConnector> for Command {
    fn from(c: CreateConnector) -> Self {
        Command::new(CommandOp::CreateConnector(c))
    }
}

impl From<RemoveConnector> for Command {
    fn from(c: RemoveConnector) -> Self {
        Command::new(CommandOp::RemoveConnector(c))
    }
}

impl From<LinkConnector> for Command {
    fn from(c: LinkConnector) -> Self {
        Command::new(CommandOp::LinkConnector(c))
    }
}

impl From<UnlinkConnector> for Command {
    fn from(c: UnlinkConnector) -> Self {
        Command::new(CommandOp::UnlinkConnector(c))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("title", &self.title())
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Permissions;
    use crate::transport::MockTransport;
    use crate::types::{Confidence, Location};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_validate_names_every_missing_value() {
        let confidence: Option<u8> = None;
        let x = Some(1.0);
        let partners: Option<Vec<u8>> = None;
        let err = validate_for_undo(&[
            ("confidence", &confidence),
            ("x", &x),
            ("partners", &partners),
        ])
        .unwrap_err();
        assert!(matches!(err, ClientError::MissingUndoState(ref m) if m == "confidence, partners"));
    }

    #[test]
    fn test_unresolved_reference_is_missing() {
        let connector = EntityRef::new(3, "");
        assert!(validate_for_undo(&[("connector", &connector)]).is_err());
        assert!(stored::<u8>("x", &None).is_err());
        assert_eq!(*stored("x", &Some(2)).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            "1/connector/create",
            json!({"connector_id": 4, "connector_edition_time": "t4"}),
        );
        let gateway = Connectors::new(mock.clone(), Permissions::all(1));
        let mut map = IdentityMap::new();
        let mut command: Command =
            CreateConnector::new(1, Location::new(1.0, 2.0, 3.0), Confidence::default()).into();

        assert!(matches!(
            command.undo(&gateway, &mut map).await,
            Err(ClientError::InvalidTransition(_))
        ));
        command.execute(&gateway, &mut map).await.unwrap();
        assert_eq!(command.status(), CommandStatus::Executed);
        assert!(matches!(
            command.execute(&gateway, &mut map).await,
            Err(ClientError::InvalidTransition(_))
        ));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_call_keeps_status() {
        let mock = Arc::new(MockTransport::new());
        let gateway = Connectors::new(mock.clone(), Permissions::all(1));
        let mut map = IdentityMap::new();
        let mut command: Command =
            CreateConnector::new(1, Location::new(1.0, 2.0, 3.0), Confidence::default()).into();

        assert!(command.execute(&gateway, &mut map).await.is_err());
        assert_eq!(command.status(), CommandStatus::Unexecuted);
        assert!(map.is_empty());
    }
}
