use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use property_chat::config::ENDPOINT_ENV;
use property_chat::{
    format, logging, ChatLog, ChatRole, ChatSession, Config, LocalStorage, Outcome,
    PropertyApiClient, QueryTransport, UserId,
};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "property-chat")]
#[command(version, about = "Chat with a property search assistant from the terminal")]
struct Cli {
    /// Property search API endpoint (overrides the config file)
    #[arg(short, long, global = true, env = ENDPOINT_ENV)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single query and print the reply
    Ask {
        /// What to search for
        query: String,
    },
    /// Print the identifier this installation sends with every query
    Whoami,
    /// Save the API endpoint to the config file
    SetEndpoint {
        /// Absolute http(s) URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        None => run_tui(&config, cli.endpoint.as_deref()).await,
        Some(Commands::Ask { query }) => ask(&config, cli.endpoint.as_deref(), &query).await,
        Some(Commands::Whoami) => whoami(&config),
        Some(Commands::SetEndpoint { url }) => set_endpoint(&url),
    }
}

/// Storage-backed identity plus a client for the resolved endpoint
fn connect(config: &Config, endpoint: Option<&str>) -> Result<(UserId, PropertyApiClient)> {
    let mut storage = LocalStorage::open(config.storage_path()?)?;
    let user_id = UserId::load_or_create(&mut storage)?;
    let client = PropertyApiClient::new(config.resolve_endpoint(endpoint)?);
    Ok((user_id, client))
}

async fn run_tui(config: &Config, endpoint: Option<&str>) -> Result<()> {
    logging::init_file(&config.log_path()?)?;
    let (user_id, client) = connect(config, endpoint)?;
    tracing::info!(user_id = %user_id, endpoint = %client.endpoint(), "starting chat");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = event_loop(&mut terminal, user_id, Arc::new(client)).await;

    // Restore the terminal before surfacing any error
    tui::restore()?;
    result
}

async fn event_loop(
    terminal: &mut tui::Tui,
    user_id: UserId,
    transport: Arc<dyn QueryTransport>,
) -> Result<()> {
    let mut events = EventHandler::new();
    let session = ChatSession::new(user_id, ChatLog::new());
    let mut app = App::new(session, transport, events.sender());

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event),
            None => break,
        }
    }

    Ok(())
}

async fn ask(config: &Config, endpoint: Option<&str>, query: &str) -> Result<()> {
    logging::init_stderr("warn")?;
    let (user_id, client) = connect(config, endpoint)?;

    let mut session = ChatSession::new(user_id, ChatLog::new());
    let outcome = session.send_message(query, &client).await;

    for reply in ask_output(outcome, session.view())? {
        println!("{}", reply);
    }

    Ok(())
}

/// Assistant replies to print, or the reason the one-shot query produced none
fn ask_output(outcome: Outcome, log: &ChatLog) -> Result<Vec<String>> {
    match outcome {
        Outcome::Ignored => bail!("Nothing to ask: the query is empty"),
        Outcome::Failed { reason } => bail!("Property query failed: {}", reason),
        Outcome::Greeted | Outcome::Answered => Ok(log
            .turns()
            .filter(|t| t.role == ChatRole::Assistant)
            .map(|t| format::plain_text(&t.body))
            .collect()),
    }
}

fn whoami(config: &Config) -> Result<()> {
    let mut storage = LocalStorage::open(config.storage_path()?)?;
    let user_id = UserId::load_or_create(&mut storage)?;
    println!("{}", user_id);
    Ok(())
}

fn set_endpoint(url: &str) -> Result<()> {
    let endpoint = Config::save_endpoint(url)
        .with_context(|| format!("Could not save endpoint {}", url))?;
    println!("Endpoint set to {}", endpoint);
    Ok(())
}
