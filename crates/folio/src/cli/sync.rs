//! `init` and `save`

use std::path::PathBuf;
use std::sync::Arc;

use folio_core::broadcast::ChangeBroadcaster;
use folio_core::cache::LocalCache;
use folio_core::config::Config;
use folio_core::model::default_document;
use folio_core::save::{SaveReport, WriteOutcome};
use folio_core::{ContentStore, FolioError};

use crate::cli::CliContext;
use crate::cli::util::report_error;

/// Handle the init command
/// Returns true on success, false on error
pub fn handle_init(ctx: &CliContext, data_dir: Option<PathBuf>) -> bool {
    let Some(config_path) = ctx.config_path.clone() else {
        report_error(&FolioError::NoConfigDir);
        return false;
    };

    let config = if config_path.exists() {
        println!("  Config already exists: {}", config_path.display());
        if data_dir.is_some() {
            println!("  Leaving its data_dir unchanged; edit the file to move the cache.");
        }
        ctx.config.clone()
    } else {
        let mut config = match data_dir {
            Some(dir) => Config::new(dir),
            None => Config::default(),
        };
        config.apply_env();
        // Credentials from the environment stay out of the file.
        let mut on_disk = config.clone();
        if let Some(store) = on_disk.object_store.as_mut() {
            store.token = None;
        }
        if let Some(kv) = on_disk.key_value.as_mut() {
            kv.token = None;
        }
        if let Some(commit) = on_disk.commit_api.as_mut() {
            commit.token = None;
        }
        if let Err(e) = on_disk.save_to(&config_path) {
            eprintln!("✗ Error writing config: {}", e);
            return false;
        }
        println!("✓ Initialized folio configuration");
        println!("  Config file: {}", config_path.display());
        config
    };

    let cache = config.file_cache();
    if cache.read().is_some() {
        println!("  Local cache already holds content: {}", cache.path().display());
        return true;
    }
    let store = ContentStore::new(Arc::new(cache), ChangeBroadcaster::new());
    match store.replace(default_document()) {
        Ok(_) => {
            println!("✓ Seeded local cache with default content");
            println!("  Cache file: {}", config.file_cache().path().display());
            true
        }
        Err(e) => {
            report_error(&e);
            false
        }
    }
}

/// Handle the save command
///
/// Remote failures are reported but do not fail the command: the document
/// is always kept in the local cache.
pub fn handle_save(ctx: &CliContext) -> bool {
    let store = match ctx.open_document_store() {
        Ok(store) => store,
        Err(e) => {
            report_error(&e);
            return false;
        }
    };
    let orchestrator = match ctx.config.save_orchestrator() {
        Ok(o) => o,
        Err(e) => {
            report_error(&e);
            return false;
        }
    };

    match ctx.block_on(orchestrator.save(&store)) {
        Ok(report) => {
            print_report(&report);
            true
        }
        Err(e) => {
            report_error(&e);
            eprintln!("  The document was kept locally but not sent anywhere.");
            false
        }
    }
}

fn print_report(report: &SaveReport) {
    println!("✓ Saved to local cache");
    for line in &report.backends {
        match &line.outcome {
            WriteOutcome::Succeeded { detail } => println!("✓ {}: {}", line.backend, detail),
            WriteOutcome::Unavailable { reason } => {
                println!("· {}: not reachable ({})", line.backend, reason)
            }
            WriteOutcome::Skipped => println!("· {}: skipped", line.backend),
            WriteOutcome::Rejected { status, detail } => {
                println!("⚠ {}: rejected ({}): {}", line.backend, status, detail)
            }
            WriteOutcome::Conflict { detail } => println!(
                "⚠ {}: conflict, save again to retry: {}",
                line.backend, detail
            ),
            WriteOutcome::Invalid { reason } => println!("⚠ {}: {}", line.backend, reason),
        }
    }
    if report.backends.is_empty() {
        println!("  No backends configured; changes stay on this machine.");
    } else if !report.published() {
        println!("  Not published; changes stay on this machine until the next save.");
    }
}
