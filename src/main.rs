//! iproto - Command-line interface for IProto servers
//!
//! Provides both a REPL and one-shot command execution.

mod commands;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use iproto_client::{Client, ConnectionConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "iproto")]
#[command(about = "Command-line client for IProto binary protocol servers")]
#[command(version)]
struct Cli {
    /// Server host
    #[arg(short = 'H', long, env = "IPROTO_HOST")]
    host: Option<String>,

    /// Server port
    #[arg(short, long, env = "IPROTO_PORT")]
    port: Option<u16>,

    /// User name (anonymous if omitted)
    #[arg(short, long, env = "IPROTO_USER")]
    user: Option<String>,

    /// Password
    #[arg(long, env = "IPROTO_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Send/receive timeout in milliseconds
    #[arg(short, long, env = "IPROTO_TIMEOUT_MS")]
    timeout: Option<u64>,

    /// Call semantics: old or new
    #[arg(long, env = "IPROTO_CALL")]
    call: Option<String>,

    /// YAML configuration file
    #[arg(short, long, env = "IPROTO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start interactive REPL
    Repl,

    /// Ping the server
    Ping,

    /// Show the server greeting
    Greeting,

    /// Select tuples from a space
    Select {
        /// Space name or id
        space: String,

        /// Index name or id
        #[arg(default_value = "0")]
        index: String,

        /// Key (JSON value or array; omit for all tuples)
        key: Option<String>,

        /// Maximum tuples to return
        #[arg(short, long)]
        limit: Option<u32>,

        /// Tuples to skip
        #[arg(short, long, default_value = "0")]
        offset: u32,

        /// Iterator (EQ, REQ, ALL, LT, LE, GE, GT, BITSET_ALL_SET, ...)
        #[arg(short, long, default_value = "EQ")]
        iterator: String,
    },

    /// Insert a tuple
    Insert {
        /// Space name or id
        space: String,

        /// Tuple JSON array (or @file.json)
        tuple: String,
    },

    /// Insert or replace a tuple
    Replace {
        /// Space name or id
        space: String,

        /// Tuple JSON array (or @file.json)
        tuple: String,
    },

    /// Delete a tuple by primary key
    Delete {
        /// Space name or id
        space: String,

        /// Key (JSON value or array)
        key: String,
    },

    /// Update a tuple
    Update {
        /// Space name or id
        space: String,

        /// Index name or id
        index: String,

        /// Key (JSON value or array)
        key: String,

        /// Operators, e.g. '[["=", 2, "x"], ["+", 3, 1]]'
        ops: String,
    },

    /// Update a tuple, or insert it if absent
    Upsert {
        /// Space name or id
        space: String,

        /// Key (JSON value or array)
        key: String,

        /// Operators applied when the tuple exists
        ops: String,

        /// Tuple inserted when it does not
        tuple: String,
    },

    /// Call a stored procedure
    Call {
        /// Function name
        function: String,

        /// Arguments JSON array
        args: Option<String>,
    },

    /// Evaluate an expression on the server
    Eval {
        /// Expression
        expression: String,

        /// Arguments JSON array
        args: Option<String>,
    },
}

fn build_config(cli: &Cli) -> Result<ConnectionConfig, Box<dyn std::error::Error>> {
    let mut config = match cli.config {
        Some(ref path) => ConnectionConfig::from_file(path)?,
        None => ConnectionConfig::default(),
    };

    if let Some(ref host) = cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ref user) = cli.user {
        config.user = Some(user.clone());
    }
    if let Some(ref password) = cli.password {
        config.password = Some(password.clone());
    }
    if let Some(timeout) = cli.timeout {
        config = config.with_timeout(Duration::from_millis(timeout));
    }
    if let Some(ref call) = cli.call {
        config = config.with_call_semantics_name(call)?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Configuration error".red(), e);
            std::process::exit(2);
        }
    };
    tracing::debug!(
        "Using {} (call semantics: {})",
        config.pool_key(),
        config.call_semantics
    );
    let mut client: Client = Client::new(config);

    match cli.command {
        Some(Commands::Repl) | None => {
            repl::run(client).await?;
        }
        Some(cmd) => {
            // Connect for one-shot command
            client.connect().await.map_err(|e| {
                eprintln!("{}: {}", "Connection failed".red(), e);
                e
            })?;

            let result = commands::execute(&mut client, cmd).await;

            match result {
                Ok(output) => {
                    println!("{}", output);
                }
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    client.disconnect().await;
                    std::process::exit(1);
                }
            }

            client.disconnect().await;
        }
    }

    Ok(())
}
