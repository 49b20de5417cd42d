mod automation;
mod broker;
mod cli;
mod config;
mod db;
mod error;
mod removal;
mod report;
mod server;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use cli::{BrokerCommand, Cli, Command, DataCommand, RegistryCommand, RequestCommand};

use crate::automation::{AutomationConfig, AutomationEngine, LiveRuntime};
use crate::db::models::NewBroker;
use crate::removal::{RequestOrchestrator, Submission};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let file_config = config::load()?;

    // Open database
    let db_path = config::db_path()?;
    let db = Arc::new(db::Database::open(&db_path)?);
    broker::catalog::seed_if_new(&db)?;

    // Build automation engine; flags win over config.json
    let mut engine = AutomationEngine::new(AutomationConfig::default(), Box::new(LiveRuntime))
        .with_allowed_domains(file_config.allowed_domains.iter().cloned());
    engine.configure(file_config.automation.clone().overlay(cli.automation_patch()));
    let user_agent = engine.config().user_agent.clone();
    let orchestrator = RequestOrchestrator::new(db.clone(), Arc::new(engine));

    match cli.command {
        Command::Registry { command } => match command {
            RegistryCommand::Seed => cli::registry::seed(&db)?,
            RegistryCommand::Update => {
                cli::registry::update_registry(&db, file_config.registry_url(), &user_agent)
                    .await?
            }
            RegistryCommand::Info => cli::registry::registry_info(&db)?,
        },
        Command::Broker { command } => match command {
            BrokerCommand::List { category } => cli::broker::list_brokers(&db, category)?,
            BrokerCommand::Info { name } => cli::broker::broker_info(&db, &name)?,
            BrokerCommand::Add {
                name,
                url,
                category,
                method,
                difficulty,
                data_types,
                response_time,
                regions,
                laws,
                premium,
            } => {
                let data = NewBroker {
                    name,
                    opt_out_url: url,
                    category,
                    opt_out_method: method,
                    data_types: data_types.into_iter().collect(),
                    difficulty,
                    response_time,
                    regions,
                    laws,
                    premium,
                };
                cli::broker::add_broker(&db, data)?;
            }
            BrokerCommand::Delete { id } => cli::broker::delete_broker(&db, &id)?,
            BrokerCommand::Search { email, json } => cli::broker::search(&db, &email, json)?,
        },
        Command::Request { command } => match command {
            RequestCommand::List { status } => cli::request::list_requests(&db, status)?,
            RequestCommand::Create {
                broker,
                email,
                automate,
                detect_fields,
            } => {
                let submission = Submission {
                    broker_name: broker,
                    email,
                    automate,
                    detect_fields,
                };
                cli::request::create_request(&orchestrator, submission).await?;
            }
            RequestCommand::Update {
                id,
                status,
                response,
            } => cli::request::update_request(&orchestrator, &id, status, response)?,
            RequestCommand::Delete { id } => cli::request::delete_request(&db, &id)?,
            RequestCommand::Track { id } => cli::request::track_request(&orchestrator, &id)?,
            RequestCommand::Queue { email } => {
                cli::request::queue_requests(&orchestrator, &email)?
            }
        },
        Command::Process => cli::process::process(&orchestrator).await?,
        Command::Data { command } => match command {
            DataCommand::Export { output } => cli::data::export(&db, output.as_deref())?,
            DataCommand::Import { file } => cli::data::import(&db, Path::new(&file))?,
            DataCommand::Wipe { yes } => cli::data::wipe(&db, yes)?,
        },
        Command::Report { format, output } => {
            cli::report::generate_report(&db, &format, output.as_deref())?;
        }
        Command::Serve { addr } => {
            let addr: SocketAddr = addr.parse()?;
            let state = server::AppState { repo: db.clone() };
            server::serve(state, addr).await?;
        }
    }

    Ok(())
}
