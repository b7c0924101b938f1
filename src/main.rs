use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use powchain::api::{self, AppState, ChainResponse};
use powchain::chain::Chain;
use powchain::config::Config;
use powchain::logging::{self, LogFormat};
use powchain::pow::ProofOfWork;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "powchain",
    version,
    about = "Append-only proof-of-work chain with an HTTP API"
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short = 'c', env = "POWCHAIN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log output format (overrides the config file)
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve /mine_block, /get_chain and /is_valid over HTTP
    Serve {
        /// Listen address, e.g. 127.0.0.1:5000
        #[arg(long)]
        bind: Option<String>,
        /// Genesis block payload
        #[arg(long)]
        genesis: Option<String>,
        /// Give up a mining request after N proof candidates
        #[arg(long)]
        max_attempts: Option<u64>,
    },
    /// Mine payloads onto a fresh in-memory chain and print it
    Mine {
        /// Payloads as JSON; anything that is not valid JSON is stored as a string
        #[arg(required = true)]
        payloads: Vec<String>,
        /// Genesis block payload
        #[arg(long)]
        genesis: Option<String>,
        /// Print the full chain as JSON instead of one line per block
        #[arg(long)]
        json: bool,
    },
    /// Find the golden nonce following a proof
    Proof {
        #[arg(allow_hyphen_values = true)]
        previous_proof: i64,
        /// Give up after N candidates
        #[arg(long)]
        max_attempts: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = Config::load(cli.config.as_deref())
        .context("failed to load configuration")
        .and_then(|mut config| {
            let format = cli.log_format.unwrap_or(config.logging.format);
            logging::init_logging(&config.logging.level, format);

            match cli.command {
                Commands::Serve {
                    bind,
                    genesis,
                    max_attempts,
                } => {
                    if let Some(bind) = bind {
                        config.server.bind = bind;
                    }
                    if let Some(genesis) = genesis {
                        config.chain.genesis_data = genesis;
                    }
                    if max_attempts.is_some() {
                        config.chain.max_attempts = max_attempts;
                    }
                    cmd_serve(&config)
                }
                Commands::Mine {
                    payloads,
                    genesis,
                    json,
                } => {
                    let genesis = genesis.unwrap_or(config.chain.genesis_data);
                    cmd_mine(&genesis, &payloads, json)
                }
                Commands::Proof {
                    previous_proof,
                    max_attempts,
                } => cmd_proof(previous_proof, max_attempts.or(config.chain.max_attempts)),
            }
        });

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn cmd_serve(config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(serve(config))
}

async fn serve(config: &Config) -> Result<()> {
    let state = AppState::from_config(&config.chain).context("failed to create chain")?;
    let router = api::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!(
        bind = %config.server.bind,
        genesis = %config.chain.genesis_data,
        max_attempts = ?config.chain.max_attempts,
        "powchain listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("server error")?;

    tracing::info!("powchain stopped");
    Ok(())
}

fn cmd_mine(genesis: &str, payloads: &[String], json: bool) -> Result<()> {
    let mut chain = Chain::new(genesis)?;
    for payload in payloads {
        chain.mine(parse_payload(payload))?;
    }

    if json {
        let listing = ChainResponse {
            length: chain.len(),
            chain: chain.list_blocks(),
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for block in chain.blocks() {
        println!(
            "[{}] {} proof={} prev={} {}",
            block.index(),
            short(block.hash()),
            block.proof(),
            short(block.previous_hash()),
            block.data(),
        );
    }
    println!("{}", chain.verify().message());
    Ok(())
}

fn cmd_proof(previous_proof: i64, max_attempts: Option<u64>) -> Result<()> {
    let pow = match max_attempts {
        Some(max) => ProofOfWork::new().with_max_attempts(max),
        None => ProofOfWork::new(),
    };
    let proof = pow.search(previous_proof)?;
    println!("{}", proof);
    Ok(())
}

/// JSON when it parses, otherwise the raw text as a JSON string.
fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn short(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

/// Resolves on Ctrl+C or SIGTERM and stops any in-flight proof search.
async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
    state.shutdown();
}
