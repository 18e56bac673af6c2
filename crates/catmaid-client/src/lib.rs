//! Connector client and undo/redo command layer for CATMAID
//!
//! The server hands out a new id and edition time on every mutation. To undo
//! and redo connector edits anyway, commands record the references they first
//! saw and resolve them through an [`IdentityMap`] each time they run.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use catmaid_client::{
//!     ClientConfig, CommandHistory, Confidence, Connectors, CreateConnector, HttpTransport,
//!     Location, Permissions,
//! };
//!
//! # async fn example() -> catmaid_client::Result<()> {
//! let config = ClientConfig::new("https://catmaid.example.org").with_api_token("secret");
//! let transport = Arc::new(HttpTransport::new(config.clone())?);
//! let connectors = Connectors::new(transport, Permissions::new());
//! connectors.fetch_permissions().await?;
//!
//! let mut history = CommandHistory::from_config(&config);
//! let create = CreateConnector::new(1, Location::new(10.0, 20.0, 30.0), Confidence::default());
//! history.execute(&connectors, create.into()).await?;
//! history.undo(&connectors).await?;
//! history.redo(&connectors).await?;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod history;
pub mod identity;
pub mod permissions;
pub mod snapshot;
pub mod state;
pub mod transport;
pub mod types;

// Re-export main types
pub use command::{
    validate_for_undo, Command, CommandOp, CommandStatus, CreateConnector, LinkConnector,
    RemoveConnector, UndoValue, Undoable, UnlinkConnector,
};
pub use config::ClientConfig;
pub use error::{ClientError, ErrorKind, Result};
pub use events::{
    spawn_logging_listener, ConnectorEvent, EventBus, EventListener, LoggingEventListener,
};
pub use gateway::Connectors;
pub use history::{CommandHistory, HistoryEntry};
pub use identity::IdentityMap;
pub use permissions::{Capability, Permissions};
pub use snapshot::Snapshot;
pub use state::ObservedState;
pub use transport::{HttpTransport, Method, MockReply, MockTransport, Request, Transport};
pub use types::*;
