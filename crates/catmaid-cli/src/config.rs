//! Command-line arguments and environment handling

use clap::{Parser, Subcommand};

use catmaid_client::{ClientConfig, ConnectorFilter, EntityId, ProjectId};

/// Connector editing against a CATMAID server
#[derive(Parser, Debug, Clone)]
#[command(name = "catmaid")]
#[command(about = "Inspect and edit CATMAID connectors with undo/redo")]
pub struct Args {
    /// Base URL of the CATMAID instance
    #[arg(long, env = "CATMAID_URL", default_value = "http://localhost:8000")]
    pub url: String,

    /// API token, sent as `X-Authorization: Token <token>`
    #[arg(long, env = "CATMAID_API_TOKEN")]
    pub api_token: Option<String>,

    /// Project to operate on
    #[arg(long, env = "CATMAID_PROJECT", default_value = "1")]
    pub project: ProjectId,

    /// Request timeout in seconds
    #[arg(long, env = "CATMAID_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,

    /// Number of commands kept for undo
    #[arg(long, env = "CATMAID_HISTORY_CAPACITY", default_value = "50")]
    pub history_capacity: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Show location, confidence and partners of a connector
    Info {
        connector_id: EntityId,
    },

    /// List connectors matching a filter
    List {
        /// Connector ids
        #[arg(long, value_delimiter = ',')]
        connectors: Vec<EntityId>,
        /// Skeletons linked to the connectors
        #[arg(long, value_delimiter = ',')]
        skeletons: Vec<EntityId>,
        /// Presynaptic skeletons
        #[arg(long, value_delimiter = ',')]
        pre: Vec<EntityId>,
        /// Postsynaptic skeletons
        #[arg(long, value_delimiter = ',')]
        post: Vec<EntityId>,
    },

    /// Read editing commands from stdin, one per line
    Session,
}

impl Commands {
    /// Filter for the `list` subcommand
    pub fn filter(&self) -> Option<ConnectorFilter> {
        match self {
            Commands::List {
                connectors,
                skeletons,
                pre,
                post,
            } => Some(
                ConnectorFilter::new()
                    .with_connectors(connectors.clone())
                    .with_skeletons(skeletons.clone())
                    .with_pre_skeletons(pre.clone())
                    .with_post_skeletons(post.clone()),
            ),
            _ => None,
        }
    }
}

impl Args {
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(self.url.clone())
            .with_timeout_secs(self.timeout_secs)
            .with_history_capacity(self.history_capacity);
        match &self.api_token {
            Some(token) => config.with_api_token(token.clone()),
            None => config,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.project <= 0 {
            return Err("CATMAID_PROJECT must be a positive id".to_string());
        }
        self.client_config().validate().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_filter_from_args() {
        let args = Args::parse_from(["catmaid", "list", "--pre", "3,4"]);
        let filter = args.command.filter().unwrap();
        assert_eq!(filter.pre_skeleton_ids, vec![3, 4]);
        assert!(filter.connector_ids.is_empty());
    }

    #[test]
    fn test_validate() {
        let args = Args::parse_from(["catmaid", "--project", "0", "session"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from(["catmaid", "--url", "https://catmaid.example.org", "session"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.client_config().base_url, "https://catmaid.example.org");
    }
}
