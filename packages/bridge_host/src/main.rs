use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use devtools_bridge::transport::connect_io;
use devtools_bridge::{
    Action, ActionCreatorSource, BridgeActor, BridgeFileConfig, BridgeHandle, CreatorTree,
    FilterConfig, Instrument, enhance,
};

#[derive(Parser)]
#[command(name = "devtools-host")]
#[command(about = "Serve a counter store to a remote devtools client over TCP")]
struct Cli {
    /// Address to accept the devtools client on
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    listen: SocketAddr,

    /// Directory holding devtools.toml
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Override the configured max age
    #[arg(long)]
    max_age: Option<usize>,

    /// Hide these action types (regex, repeatable)
    #[arg(long)]
    blacklist: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn counter(state: &Value, action: &Action) -> Result<Value, String> {
    let count = state.as_i64().unwrap_or(0);
    let by = action
        .get("by")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(1);
    match action.action_type() {
        Some("INCREMENT") => Ok(Value::from(count + by)),
        Some("DECREMENT") => Ok(Value::from(count - by)),
        Some("RESET") => Ok(Value::from(0)),
        _ => Ok(state.clone()),
    }
}

fn counter_creators() -> CreatorTree {
    CreatorTree::new()
        .creator("increment", &["by"], |args| {
            let by = args.first().and_then(Value::as_f64).unwrap_or(1.0) as i64;
            Ok(Action::new("INCREMENT").with("by", by))
        })
        .creator("decrement", &["by"], |args| {
            let by = args.first().and_then(Value::as_f64).unwrap_or(1.0) as i64;
            Ok(Action::new("DECREMENT").with("by", by))
        })
        .creator("reset", &[], |_| Ok(Action::new("RESET")))
}

/// A bare word is an action type; anything else is a JSON5 action object.
fn parse_line(line: &str) -> Result<Action> {
    let line = line.trim();
    if line.starts_with('{') {
        let value: Value = json5::from_str(line).context("invalid action literal")?;
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(Action::new(line))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.debug {
        "devtools_bridge=debug,devtools_host=debug,info"
    } else {
        "devtools_bridge=info,devtools_host=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let mut file_config = BridgeFileConfig::load(&cli.config_dir)?;
    if let Some(max_age) = cli.max_age {
        file_config.max_age = max_age;
    }
    if !cli.blacklist.is_empty() {
        let filters = file_config.filters.get_or_insert_with(FilterConfig::default);
        filters.blacklist = Some(cli.blacklist.clone());
    }
    let heartbeat = file_config.heartbeat();

    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    info!("Waiting for devtools client on {}", listener.local_addr()?);
    let (socket, peer) = listener.accept().await?;
    info!(%peer, "devtools client connected");

    let (reader, writer) = socket.into_split();
    let (transport, inbound) = connect_io(reader, writer);

    let mut options = file_config.into_options();
    options.action_creators = Some(ActionCreatorSource::deferred(counter_creators));
    let store = enhance(options, transport, Instrument::creator(counter, Value::from(0)))?;
    let (handle, task) = BridgeActor::spawn(store, inbound, heartbeat);

    run_console(&handle).await?;

    handle.shutdown().await?;
    let store = task.await?;
    info!(state = %store.get_state(), "devtools host stopped");
    Ok(())
}

/// Dispatch one action per stdin line until EOF or Ctrl-C.
async fn run_console(handle: &BridgeHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let dispatched = match parse_line(&line) {
                    Ok(action) => handle.dispatch(action).await,
                    Err(e) => Err(e),
                };
                match dispatched {
                    Ok(_) => println!("state: {}", handle.state().await?),
                    Err(e) => warn!("{:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_words_are_action_types() {
        let action = parse_line("  INCREMENT ").unwrap();
        assert_eq!(action, Action::new("INCREMENT"));
    }

    #[test]
    fn braces_parse_as_json5() {
        let action = parse_line("{type: 'INCREMENT', by: 3}").unwrap();
        assert_eq!(action.action_type(), Some("INCREMENT"));
        let state = counter(&Value::from(1), &action).unwrap();
        assert_eq!(state.as_i64(), Some(4));
        assert!(parse_line("{type: ").is_err());
    }
}
