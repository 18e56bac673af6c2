//! Bounded undo/redo history
//!
//! The history owns the identity map for its whole lifetime. Executing a new
//! command drops the redo branch; the oldest commands are evicted once the
//! capacity is exceeded.

use std::collections::VecDeque;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command::Command;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::gateway::Connectors;
use crate::identity::IdentityMap;

/// A command in the history
#[derive(Debug)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub command: Command,
}

#[derive(Debug)]
pub struct CommandHistory {
    identity: IdentityMap,
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    capacity: usize,
}

impl CommandHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            identity: IdentityMap::new(),
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_capacity(config.history_capacity)
    }

    /// Execute a command and record it
    ///
    /// A failed command is not recorded and leaves the redo branch intact.
    pub async fn execute(&mut self, gateway: &Connectors, mut command: Command) -> Result<Uuid> {
        command.execute(gateway, &mut self.identity).await?;

        let id = Uuid::new_v4();
        info!(%id, title = %command.title(), "Command executed");
        if !self.redo_stack.is_empty() {
            debug!(dropped = self.redo_stack.len(), "Redo branch discarded");
            self.redo_stack.clear();
        }
        self.undo_stack.push_back(HistoryEntry { id, command });
        while self.undo_stack.len() > self.capacity {
            if let Some(evicted) = self.undo_stack.pop_front() {
                debug!(id = %evicted.id, title = %evicted.command.title(), "Command evicted");
            }
        }
        Ok(id)
    }

    /// Undo the most recent command; `None` if there is nothing to undo
    pub async fn undo(&mut self, gateway: &Connectors) -> Result<Option<String>> {
        let Some(mut entry) = self.undo_stack.pop_back() else {
            return Ok(None);
        };
        if let Err(e) = entry.command.undo(gateway, &mut self.identity).await {
            warn!(id = %entry.id, error = %e, "Undo failed");
            self.undo_stack.push_back(entry);
            return Err(e);
        }
        let title = entry.command.title();
        info!(id = %entry.id, title = %title, "Command undone");
        self.redo_stack.push(entry);
        Ok(Some(title))
    }

    /// Execute the most recently undone command again
    pub async fn redo(&mut self, gateway: &Connectors) -> Result<Option<String>> {
        let Some(mut entry) = self.redo_stack.pop() else {
            return Ok(None);
        };
        if let Err(e) = entry.command.execute(gateway, &mut self.identity).await {
            warn!(id = %entry.id, error = %e, "Redo failed");
            self.redo_stack.push(entry);
            return Err(e);
        }
        let title = entry.command.title();
        info!(id = %entry.id, title = %title, "Command redone");
        self.undo_stack.push_back(entry);
        Ok(Some(title))
    }

    /// Most recently executed command
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.undo_stack.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Titles of undoable commands, oldest first
    pub fn titles(&self) -> Vec<String> {
        self.undo_stack.iter().map(|e| e.command.title()).collect()
    }

    /// Titles of redoable commands, next redo first
    pub fn redo_titles(&self) -> Vec<String> {
        self.redo_stack.iter().rev().map(|e| e.command.title()).collect()
    }

    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.identity
    }
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}
