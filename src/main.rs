#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use symbol_sync::config::{
    DEFAULT_API_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, RegistryConfig, RegistryTimeouts,
};
use symbol_sync::fragment::Fragment;
use symbol_sync::registry::{HttpRegistry, RegistryClient};
use symbol_sync::symbol::SymbolPatch;
use symbol_sync::{RegistryError, Scope};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] RegistryError),
    #[error("no team selected: pass --team-id or set SYMBOLS_TEAM_ID")]
    MissingTeam,
    #[error("{0}")]
    Registry(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "symbols", about = "Manage shared symbols in the registry")]
struct Cli {
    #[arg(long, global = true, env = "SYMBOLS_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    base_url: String,

    #[arg(long, global = true, env = "SYMBOLS_SESSION_TOKEN")]
    session_token: Option<String>,

    #[arg(long, global = true, env = "SYMBOLS_TEAM_ID")]
    team_id: Option<Uuid>,

    #[arg(long, global = true, env = "SYMBOLS_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    #[arg(long, global = true, env = "SYMBOLS_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every symbol visible to the team.
    List {
        #[arg(long, value_parser = parse_scope)]
        scope: Option<Scope>,
    },
    /// Create a symbol from a fragment JSON payload.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_scope, default_value = "team")]
        scope: Scope,
        #[arg(long)]
        prototype_id: Option<Uuid>,
        #[arg(long)]
        data: String,
    },
    Rename {
        symbol_id: Uuid,
        #[arg(long)]
        name: String,
    },
    /// Replace a symbol's fragment content.
    UpdateData {
        symbol_id: Uuid,
        #[arg(long)]
        data: String,
    },
    Delete {
        symbol_id: Uuid,
    },
    /// Copy a symbol to a broader scope.
    Promote {
        symbol_id: Uuid,
        #[arg(long, value_parser = parse_scope)]
        to: Scope,
    },
}

fn parse_scope(raw: &str) -> Result<Scope, String> {
    Scope::parse(raw).ok_or_else(|| format!("unknown scope `{raw}`; expected prototype, team or organization"))
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let team_id = cli.team_id.ok_or(CliError::MissingTeam)?;
    let config = RegistryConfig::new(
        cli.base_url,
        cli.session_token.filter(|t| !t.trim().is_empty()),
        RegistryTimeouts { request_secs: cli.request_timeout_secs, connect_secs: cli.connect_timeout_secs },
    )?;
    let api = HttpRegistry::new(&config)?;
    let client = RegistryClient::new(Arc::new(api), Some(team_id));

    run(&client, cli.command).await
}

async fn run(client: &RegistryClient, command: Command) -> Result<(), CliError> {
    match command {
        Command::List { scope } => {
            let symbols = load(client).await?;
            let symbols: Vec<_> = symbols
                .into_iter()
                .filter(|s| scope.is_none_or(|scope| s.scope == scope))
                .collect();
            print_json(&symbols)
        }
        Command::Create { name, scope, prototype_id, data } => {
            let fragment = parse_fragment(&data)?;
            load(client).await?;
            let created = client.create(&name, fragment, scope, prototype_id).await;
            print_json(&settled(client, created)?)
        }
        Command::Rename { symbol_id, name } => {
            load(client).await?;
            let updated = client.update(symbol_id, SymbolPatch::rename(name)).await;
            print_json(&settled(client, updated)?)
        }
        Command::UpdateData { symbol_id, data } => {
            let fragment = parse_fragment(&data)?;
            load(client).await?;
            let updated = client.update(symbol_id, SymbolPatch::content(fragment)).await;
            print_json(&settled(client, updated)?)
        }
        Command::Delete { symbol_id } => {
            load(client).await?;
            if client.remove(symbol_id).await {
                eprintln!("deleted symbol: {symbol_id}");
                Ok(())
            } else {
                Err(failure(client))
            }
        }
        Command::Promote { symbol_id, to } => {
            load(client).await?;
            let promoted = client.promote(symbol_id, to).await;
            print_json(&settled(client, promoted)?)
        }
    }
}

/// Fetch the team's symbols; mutations check ids against this snapshot.
async fn load(client: &RegistryClient) -> Result<Vec<symbol_sync::Symbol>, CliError> {
    let symbols = client.list().await;
    match client.last_error() {
        Some(message) => Err(CliError::Registry(message)),
        None => Ok(symbols),
    }
}

fn settled<T>(client: &RegistryClient, result: Option<T>) -> Result<T, CliError> {
    result.ok_or_else(|| failure(client))
}

fn failure(client: &RegistryClient) -> CliError {
    CliError::Registry(
        client
            .last_error()
            .unwrap_or_else(|| "registry request failed".to_owned()),
    )
}

fn parse_fragment(data: &str) -> Result<Fragment, CliError> {
    let value = serde_json::from_str::<Value>(data)?;
    Ok(Fragment::new(value))
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
