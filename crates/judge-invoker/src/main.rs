//! Judge Invoker Entrypoint
//!
//! Usage: judge-invoker [--config <path>] [--cache-path <dir>] [--storage-path <dir>]
//!
//! Serves line-delimited JSON RPC on stdin/stdout until stdin closes.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use judge_invoker::{logging, FsStorage, Invoker, InvokerConfig, RpcHandler};

#[derive(Debug, Parser)]
#[command(name = "judge-invoker", version, about = "Judge invoker RPC node")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override `cache.path`.
    #[arg(long)]
    cache_path: Option<PathBuf>,

    /// Override `storage.path`.
    #[arg(long)]
    storage_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => InvokerConfig::load(path),
        None => Ok(InvokerConfig::default()),
    };
    let config = match loaded.and_then(|config| config.with_overrides(cli.cache_path, cli.storage_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("judge-invoker: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.log_level);

    let storage = match FsStorage::new(&config.storage.path) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!(path = %config.storage.path.display(), error = %e, "cannot open storage");
            return ExitCode::FAILURE;
        }
    };

    let invoker = Arc::new(Invoker::new(config, Arc::new(storage)));

    let on_signal = Arc::clone(&invoker);
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("interrupted, shutting down");
        on_signal.shutdown();
        std::process::exit(130);
    }) {
        tracing::warn!(error = %e, "cannot install signal handler");
    }

    let handler = RpcHandler::new(Arc::clone(&invoker));
    let result = handler.run();
    invoker.shutdown();

    if let Err(e) = result {
        tracing::error!(error = %e, "rpc handler failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
