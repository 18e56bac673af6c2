//! Line-oriented editing session
//!
//! ```text
//! node 12 2024-05-01T10:00:00Z          observe a treenode
//! clink 7 30 2024-05-01T10:00:00Z 12 4  observe link 30 of connector 7 to node 12
//! connector 7 2024-05-01T10:00:00Z      observe a connector
//! create 10 20 30 [confidence]
//! remove 7
//! link 7 12 presynaptic_to
//! unlink 7 12
//! undo | redo | history | quit
//! ```
//!
//! Commands capture entities from what was observed so far. Connectors and
//! links created in the session are observed automatically.

use anyhow::{anyhow, bail, Context};
use std::str::FromStr;

use catmaid_client::{
    Command, CommandHistory, CommandOp, Confidence, Connectors, CreateConnector, EntityId,
    EntityKind, LinkConnector, LinkState, LinkType, Location, ObservedState, ProjectId,
    RemoveConnector, UnlinkConnector,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Node {
        id: EntityId,
        version: String,
    },
    Connector {
        id: EntityId,
        version: String,
    },
    ConnectorLink {
        connector_id: EntityId,
        link: LinkState,
    },
    Create {
        location: Location,
        confidence: Confidence,
    },
    Remove {
        connector_id: EntityId,
    },
    Link {
        connector_id: EntityId,
        node_id: EntityId,
        link_type: LinkType,
    },
    Unlink {
        connector_id: EntityId,
        node_id: EntityId,
    },
    Undo,
    Redo,
    History,
    Quit,
}

fn arg<T: FromStr>(args: &[&str], index: usize, name: &str) -> anyhow::Result<T> {
    let raw = args
        .get(index)
        .ok_or_else(|| anyhow!("missing argument <{}>", name))?;
    raw.parse()
        .map_err(|_| anyhow!("invalid <{}>: {:?}", name, raw))
}

impl SessionCommand {
    /// Parse one input line; blank lines and `#` comments yield `None`
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let (name, args) = (words[0], &words[1..]);

        let command = match name {
            "node" => SessionCommand::Node {
                id: arg(args, 0, "id")?,
                version: arg(args, 1, "edition time")?,
            },
            "connector" => SessionCommand::Connector {
                id: arg(args, 0, "id")?,
                version: arg(args, 1, "edition time")?,
            },
            "clink" => SessionCommand::ConnectorLink {
                connector_id: arg(args, 0, "connector id")?,
                link: LinkState::new(
                    arg(args, 1, "link id")?,
                    arg::<String>(args, 2, "edition time")?,
                    arg(args, 3, "node id")?,
                    arg(args, 4, "relation id")?,
                ),
            },
            "create" => {
                let confidence = match args.get(3) {
                    Some(_) => Confidence::new(arg(args, 3, "confidence")?)?,
                    None => Confidence::default(),
                };
                SessionCommand::Create {
                    location: Location::new(
                        arg(args, 0, "x")?,
                        arg(args, 1, "y")?,
                        arg(args, 2, "z")?,
                    ),
                    confidence,
                }
            }
            "remove" => SessionCommand::Remove {
                connector_id: arg(args, 0, "connector id")?,
            },
            "link" => SessionCommand::Link {
                connector_id: arg(args, 0, "connector id")?,
                node_id: arg(args, 1, "node id")?,
                link_type: LinkType::new(arg::<String>(args, 2, "relation")?),
            },
            "unlink" => SessionCommand::Unlink {
                connector_id: arg(args, 0, "connector id")?,
                node_id: arg(args, 1, "node id")?,
            },
            "undo" => SessionCommand::Undo,
            "redo" => SessionCommand::Redo,
            "history" => SessionCommand::History,
            "quit" | "exit" => SessionCommand::Quit,
            other => bail!("unknown command {:?}", other),
        };
        Ok(Some(command))
    }
}

/// Observed state and command history of one session
pub struct Session<'a> {
    connectors: &'a Connectors,
    project: ProjectId,
    state: ObservedState,
    history: CommandHistory,
}

impl<'a> Session<'a> {
    pub fn new(connectors: &'a Connectors, project: ProjectId, history: CommandHistory) -> Self {
        Self {
            connectors,
            project,
            state: ObservedState::new(),
            history,
        }
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    async fn execute(&mut self, command: Command) -> anyhow::Result<String> {
        let title = command.title();
        self.history.execute(self.connectors, command).await?;
        Ok(title)
    }

    /// Add the link made by the last command to the observed link set
    ///
    /// The link response has no relation id, so the connector detail is
    /// fetched to complete it.
    async fn observe_created_link(&mut self, connector_id: EntityId) -> anyhow::Result<()> {
        let Some(CommandOp::LinkConnector(link)) = self.history.last().map(|e| e.command.op())
        else {
            return Ok(());
        };
        let Some(created) = link
            .unmapped_link()
            .and_then(|id| self.history.identity_map().get(EntityKind::Link, id))
            .cloned()
        else {
            return Ok(());
        };

        let detail = self
            .connectors
            .info(self.project, connector_id)
            .await
            .with_context(|| format!("cannot refresh connector {}", connector_id))?;
        let partner = detail
            .partners
            .iter()
            .find(|p| p.link_id == created.id)
            .ok_or_else(|| {
                anyhow!("link {} missing from connector {}", created.id, connector_id)
            })?;

        let mut links = self.state.links(connector_id).to_vec();
        links.push(LinkState::new(
            created.id,
            created.version,
            partner.partner_id,
            partner.relation_id,
        ));
        self.state.set_links(connector_id, links);
        Ok(())
    }

    /// Run a command; returns the text to show, `None` on quit
    pub async fn run(&mut self, command: SessionCommand) -> anyhow::Result<Option<String>> {
        let output = match command {
            SessionCommand::Node { id, version } => {
                self.state.set_node(id, version);
                format!("Observed node {}", id)
            }
            SessionCommand::Connector { id, version } => {
                self.state.set_node(id, version);
                format!("Observed connector {}", id)
            }
            SessionCommand::ConnectorLink { connector_id, link } => {
                let mut links = self.state.links(connector_id).to_vec();
                let link_id = link.link_id;
                links.push(link);
                self.state.set_links(connector_id, links);
                format!("Observed link {} of connector {}", link_id, connector_id)
            }
            SessionCommand::Create {
                location,
                confidence,
            } => {
                let title = self
                    .execute(CreateConnector::new(self.project, location, confidence).into())
                    .await?;
                if let Some(CommandOp::CreateConnector(create)) =
                    self.history.last().map(|e| e.command.op())
                {
                    if let Some(connector) = create.unmapped() {
                        self.state.set_node(connector.id, connector.version.clone());
                        self.state.set_links(connector.id, Vec::new());
                    }
                }
                title
            }
            SessionCommand::Remove { connector_id } => {
                let command = RemoveConnector::new(&self.state, self.project, connector_id)
                    .with_context(|| format!("connector {} was not observed", connector_id))?;
                self.execute(command.into()).await?
            }
            SessionCommand::Link {
                connector_id,
                node_id,
                link_type,
            } => {
                let command = LinkConnector::new(
                    &self.state,
                    self.project,
                    connector_id,
                    node_id,
                    link_type,
                )?;
                let title = self.execute(command.into()).await?;
                self.observe_created_link(connector_id).await?;
                title
            }
            SessionCommand::Unlink {
                connector_id,
                node_id,
            } => {
                let command =
                    UnlinkConnector::new(&self.state, self.project, connector_id, node_id)?;
                self.execute(command.into()).await?
            }
            SessionCommand::Undo => match self.history.undo(self.connectors).await? {
                Some(title) => format!("Undone: {}", title),
                None => "Nothing to undo".to_string(),
            },
            SessionCommand::Redo => match self.history.redo(self.connectors).await? {
                Some(title) => format!("Redone: {}", title),
                None => "Nothing to redo".to_string(),
            },
            SessionCommand::History => {
                let mut lines: Vec<String> = self
                    .history
                    .titles()
                    .into_iter()
                    .enumerate()
                    .map(|(i, t)| format!("{:>3}  {}", i + 1, t))
                    .collect();
                lines.extend(
                    self.history
                        .redo_titles()
                        .into_iter()
                        .map(|t| format!("  -  {} (undone)", t)),
                );
                if lines.is_empty() {
                    "History is empty".to_string()
                } else {
                    lines.join("\n")
                }
            }
            SessionCommand::Quit => return Ok(None),
        };
        Ok(Some(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catmaid_client::{MockTransport, Permissions};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_parse_commands() {
        assert_eq!(SessionCommand::parse("  ").unwrap(), None);
        assert_eq!(SessionCommand::parse("# note").unwrap(), None);
        assert_eq!(
            SessionCommand::parse("link 7 12 presynaptic_to").unwrap(),
            Some(SessionCommand::Link {
                connector_id: 7,
                node_id: 12,
                link_type: LinkType::presynaptic(),
            })
        );
        assert_eq!(
            SessionCommand::parse("create 1 2 3").unwrap(),
            Some(SessionCommand::Create {
                location: Location::new(1.0, 2.0, 3.0),
                confidence: Confidence::default(),
            })
        );
        assert_eq!(SessionCommand::parse("exit").unwrap(), Some(SessionCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(SessionCommand::parse("create 1 2").is_err());
        assert!(SessionCommand::parse("create 1 2 3 9").is_err());
        assert!(SessionCommand::parse("remove abc").is_err());
        assert!(SessionCommand::parse("fly 1").is_err());
    }

    #[tokio::test]
    async fn test_created_connector_can_be_linked() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            "1/connector/create",
            json!({"connector_id": 7, "connector_edition_time": "t7"}),
        )
        .on("1/link/create", json!({"link_id": 30, "link_edition_time": "l30"}))
        .on("1/connector/7/detail", detail_with_link(30));
        let connectors = Connectors::new(mock.clone(), Permissions::all(1));
        let mut session = Session::new(&connectors, 1, CommandHistory::with_capacity(10));

        for line in ["create 1 2 3", "node 12 n12", "link 7 12 presynaptic_to"] {
            let command = SessionCommand::parse(line).unwrap().unwrap();
            session.run(command).await.unwrap();
        }

        assert_eq!(session.history().len(), 2);
        let link_request = mock
            .requests()
            .into_iter()
            .find(|r| r.path == "1/link/create")
            .unwrap();
        assert_eq!(link_request.state(), Some(json!([[12, "n12"], [7, "t7"]])));
        let history = session.run(SessionCommand::History).await.unwrap().unwrap();
        assert!(history.contains("Link connector 7 with node 12"));
        assert_eq!(session.run(SessionCommand::Quit).await.unwrap(), None);
    }

    fn detail_with_link(link_id: EntityId) -> serde_json::Value {
        json!({
            "connector_id": 7,
            "x": 1.0,
            "y": 2.0,
            "z": 3.0,
            "confidence": 5,
            "partners": [{
                "link_id": link_id,
                "partner_id": 12,
                "confidence": 5,
                "skeleton_id": 40,
                "relation_id": 4,
                "relation_name": "presynaptic_to"
            }]
        })
    }

    #[tokio::test]
    async fn test_created_link_is_attested_on_remove() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            "1/connector/create",
            json!({"connector_id": 7, "connector_edition_time": "t7"}),
        )
        .on("1/link/create", json!({"link_id": 30, "link_edition_time": "l30"}))
        .on("1/connector/7/detail", detail_with_link(30))
        .on(
            "1/connector/delete",
            json!({
                "connector_id": 7,
                "confidence": 5,
                "x": 1.0,
                "y": 2.0,
                "z": 3.0,
                "partners": []
            }),
        );
        let connectors = Connectors::new(mock.clone(), Permissions::all(1));
        let mut session = Session::new(&connectors, 1, CommandHistory::with_capacity(10));

        for line in ["create 1 2 3", "node 12 n12", "link 7 12 presynaptic_to", "remove 7"] {
            let command = SessionCommand::parse(line).unwrap().unwrap();
            session.run(command).await.unwrap();
        }

        assert_eq!(
            mock.last_request().unwrap().state(),
            Some(json!({"edition_time": "t7", "c_links": [[30, "l30"]]}))
        );
    }

    #[tokio::test]
    async fn test_remove_requires_observed_connector() {
        let mock = Arc::new(MockTransport::new());
        let connectors = Connectors::new(mock.clone(), Permissions::all(1));
        let mut session = Session::new(&connectors, 1, CommandHistory::with_capacity(10));

        let err = session
            .run(SessionCommand::Remove { connector_id: 5 })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not observed"));
        assert_eq!(mock.request_count(), 0);
    }
}
