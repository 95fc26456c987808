#![doc = include_str!("../../README.md")]

/// Clap argument definitions
mod args;

/// Config command handlers
mod config;

/// `show`, `set`, `add`, `remove`, `update` and `category` commands
mod content;

/// Image attachment
mod image;

/// `init` and `save` commands
mod sync;

/// `export` and `import` commands
mod transfer;

/// Shared CLI utilities
mod util;

use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use folio_core::broadcast::ChangeBroadcaster;
use folio_core::config::Config;
use folio_core::load::LoadOutcome;
use folio_core::{ContentStore, FolioError, Result};

pub use args::Cli;
use args::{CategoryCommands, Commands};

/// Everything a command handler needs: the effective config and a runtime
/// for the async core APIs.
pub struct CliContext {
    pub config: Config,
    /// Where the config was (or would be) read from
    pub config_path: Option<PathBuf>,
    runtime: tokio::runtime::Runtime,
}

impl CliContext {
    /// Run an async operation to completion.
    pub fn block_on<F: Future>(&self, f: F) -> F::Output {
        self.runtime.block_on(f)
    }

    /// A store over the configured local cache, without loading anything.
    pub fn store(&self) -> ContentStore {
        ContentStore::new(
            Arc::new(self.config.file_cache()),
            ChangeBroadcaster::new(),
        )
    }

    /// A store populated from the cache or, failing that, the read sources.
    pub fn open_store(&self) -> Result<(ContentStore, LoadOutcome)> {
        let store = self.store();
        let loader = self.config.load_orchestrator()?;
        let outcome = self.block_on(loader.resolve(&store))?;
        log::info!("document source: {}", outcome.source);
        for failure in &outcome.failures {
            log::info!("read source failed: {}", failure);
        }
        Ok((store, outcome))
    }

    /// Like [`open_store`](Self::open_store), but a missing document is an
    /// error.
    pub fn open_document_store(&self) -> Result<ContentStore> {
        let (store, outcome) = self.open_store()?;
        if !outcome.is_loaded() {
            return Err(FolioError::DocumentMissing);
        }
        Ok(store)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

/// Main entry point for the CLI
pub fn run_cli() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Could not start the async runtime: {}", e);
            std::process::exit(1);
        }
    };
    let ctx = CliContext {
        config: Config::load_or_default(cli.config.as_deref()),
        config_path: cli.config.clone().or_else(Config::config_path),
        runtime,
    };

    // Execute commands and track success
    let success = match cli.command {
        Commands::Init { data_dir } => sync::handle_init(&ctx, data_dir),

        Commands::Show { section } => content::handle_show(&ctx, section.as_deref()),

        Commands::Save => sync::handle_save(&ctx),

        Commands::Set { section, json } => content::handle_set(&ctx, &section, &json),

        Commands::Add { collection, json } => {
            content::handle_add(&ctx, &collection, json.as_deref())
        }

        Commands::Remove { collection, id } => content::handle_remove(&ctx, &collection, id),

        Commands::Update {
            collection,
            id,
            field,
            value,
        } => content::handle_update(&ctx, &collection, id, &field, &value),

        Commands::Category { command } => match command {
            CategoryCommands::Add { name } => content::handle_category_add(&ctx, &name),
            CategoryCommands::Remove { name } => content::handle_category_remove(&ctx, &name),
        },

        Commands::Image {
            collection,
            id,
            file,
        } => image::handle_image(&ctx, &collection, id, &file),

        Commands::Export { path } => transfer::handle_export(&ctx, &path),

        Commands::Import { path } => transfer::handle_import(&ctx, &path),

        Commands::Config { command } => config::handle_config_command(&ctx, command),
    };

    if !success {
        std::process::exit(1);
    }
}
