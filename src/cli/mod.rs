pub mod broker;
pub mod data;
pub mod process;
pub mod registry;
pub mod report;
pub mod request;

use clap::{Parser, Subcommand};

use crate::automation::ConfigPatch;
use crate::db::models::{BrokerCategory, Difficulty, OptOutMethod, RequestStatus};

#[derive(Parser)]
#[command(
    name = "data-breaker",
    version,
    about = "Break what data brokers do: find them, opt out, track removal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Automation timeout per submission, in milliseconds (1-120000)
    #[arg(long, global = true)]
    pub timeout_ms: Option<i64>,

    /// User agent reported by the automation engine
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Run automation with a visible browser window
    #[arg(long, global = true)]
    pub headful: bool,
}

impl Cli {
    /// Automation overrides given on the command line.
    pub fn automation_patch(&self) -> ConfigPatch {
        ConfigPatch {
            headless: self.headful.then_some(false),
            timeout_ms: self.timeout_ms,
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage the broker registry
    Registry {
        #[command(subcommand)]
        command: RegistryCommand,
    },
    /// List, inspect and search data brokers
    Broker {
        #[command(subcommand)]
        command: BrokerCommand,
    },
    /// Create and manage removal requests
    Request {
        #[command(subcommand)]
        command: RequestCommand,
    },
    /// Submit every pending removal request
    Process,
    /// Export, import or wipe stored data
    Data {
        #[command(subcommand)]
        command: DataCommand,
    },
    /// Generate a report of removal request status
    Report {
        /// Output format
        #[arg(long, default_value = "terminal", value_parser = ["terminal", "json"])]
        format: String,
        /// Output file path (stdout if not specified)
        #[arg(long)]
        output: Option<String>,
    },
    /// Serve the JSON API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
    },
}

#[derive(Subcommand)]
pub enum RegistryCommand {
    /// Load the built-in broker catalog
    Seed,
    /// Fetch the latest broker registry and add new brokers
    Update,
    /// Show registry metadata
    Info,
}

#[derive(Subcommand)]
pub enum BrokerCommand {
    /// List known data brokers
    List {
        /// Filter by category (e.g. people-search)
        #[arg(long)]
        category: Option<BrokerCategory>,
    },
    /// Show details about a specific broker
    Info {
        /// Broker name
        name: String,
    },
    /// Add a broker to the catalog
    Add {
        #[arg(long)]
        name: String,
        /// Opt-out page URL
        #[arg(long)]
        url: Option<String>,
        #[arg(long, default_value = "other")]
        category: BrokerCategory,
        #[arg(long, default_value = "form")]
        method: OptOutMethod,
        #[arg(long, default_value = "medium")]
        difficulty: Difficulty,
        /// Kinds of data held (comma-separated)
        #[arg(long, value_delimiter = ',')]
        data_types: Vec<String>,
        /// Typical response time, e.g. "7-14 days"
        #[arg(long)]
        response_time: Option<String>,
        /// Regions covered (comma-separated)
        #[arg(long, value_delimiter = ',')]
        regions: Vec<String>,
        /// Privacy laws that apply (comma-separated)
        #[arg(long, value_delimiter = ',')]
        laws: Vec<String>,
        /// Opting out requires a paid account
        #[arg(long)]
        premium: bool,
    },
    /// Remove a broker from the catalog
    Delete {
        /// Broker ID
        id: String,
    },
    /// Rank brokers by how likely they hold data for an email address
    Search {
        email: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum RequestCommand {
    /// List removal requests
    List {
        /// Filter by status (pending, sent, responded, completed)
        #[arg(long)]
        status: Option<RequestStatus>,
    },
    /// Create a removal request for one broker
    Create {
        /// Broker name
        #[arg(long)]
        broker: String,
        #[arg(long)]
        email: String,
        /// Submit the opt-out form right away
        #[arg(long)]
        automate: bool,
        /// Detect the form's fields before submitting
        #[arg(long, requires = "automate")]
        detect_fields: bool,
    },
    /// Set the status of a request
    Update {
        /// Request ID
        id: String,
        #[arg(long)]
        status: RequestStatus,
        /// Broker response to record
        #[arg(long)]
        response: Option<String>,
    },
    /// Delete a request
    Delete {
        /// Request ID
        id: String,
    },
    /// Recompute and show removal progress for a request
    Track {
        /// Request ID
        id: String,
    },
    /// Create pending requests for every broker likely to hold an email's data
    Queue { email: String },
}

#[derive(Subcommand)]
pub enum DataCommand {
    /// Export brokers and requests as JSON
    Export {
        /// Output file path (stdout if not specified)
        #[arg(long)]
        output: Option<String>,
    },
    /// Import a previous export
    Import { file: String },
    /// Delete every broker and request
    Wipe {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

/// First eight characters of an id, for table columns.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_typed_arguments() {
        let cli = Cli::parse_from([
            "data-breaker",
            "broker",
            "list",
            "--category",
            "people-search",
        ]);
        match cli.command {
            Command::Broker {
                command: BrokerCommand::List { category },
            } => assert_eq!(category, Some(BrokerCategory::PeopleSearch)),
            _ => panic!("expected broker list"),
        }

        assert!(
            Cli::try_parse_from(["data-breaker", "request", "list", "--status", "lost"]).is_err()
        );
    }

    #[test]
    fn test_automation_flags() {
        let cli = Cli::parse_from([
            "data-breaker",
            "process",
            "--timeout-ms",
            "5000",
            "--headful",
        ]);
        let patch = cli.automation_patch();
        assert_eq!(patch.timeout_ms, Some(5000));
        assert_eq!(patch.headless, Some(false));
        assert!(patch.user_agent.is_none());

        let quiet = Cli::parse_from(["data-breaker", "process"]).automation_patch();
        assert!(quiet.headless.is_none());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
