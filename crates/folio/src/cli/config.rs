//! Config command handlers

use folio_core::config::Config;

use crate::cli::CliContext;
use crate::cli::args::ConfigCommands;

pub fn handle_config_command(ctx: &CliContext, command: ConfigCommands) -> bool {
    match command {
        ConfigCommands::Show => {
            show_config(ctx);
            true
        }
    }
}

fn credential(token: &Option<String>) -> &'static str {
    match token {
        Some(t) if !t.is_empty() => "set",
        _ => "missing",
    }
}

/// Show the effective configuration, with credentials masked
fn show_config(ctx: &CliContext) {
    let cfg: &Config = &ctx.config;

    println!("Folio Configuration");
    println!("===================");
    match &ctx.config_path {
        Some(path) if path.exists() => println!("Config file: {}", path.display()),
        Some(path) => println!("Config file: {} (not created; using defaults)", path.display()),
        None => println!("Config file: (no config directory)"),
    }
    println!("Data directory: {}", cfg.data_dir.display());
    println!("Cache file: {}", cfg.file_cache().path().display());
    println!("Document file: {}", cfg.document_path.display());
    println!("Timeout: {}s", cfg.timeout_secs);
    println!(
        "Save policy: retry unavailable x{}, stop after local server: {}",
        cfg.retry_unavailable, cfg.stop_after_sufficient
    );

    println!();
    println!("Backends");
    println!("--------");
    let mut any = false;
    if let Some(ls) = &cfg.local_server {
        any = true;
        println!("local-server  {}", ls.url);
    }
    if let Some(os) = &cfg.object_store {
        any = true;
        println!(
            "object-store  {}/{} (token {})",
            os.api_url.trim_end_matches('/'),
            os.pathname,
            credential(&os.token)
        );
        if let Some(public) = &os.public_url {
            println!("              public: {}", public);
        }
    }
    if let Some(kv) = &cfg.key_value {
        any = true;
        println!(
            "key-value     {} key {} (token {})",
            kv.url,
            kv.key,
            credential(&kv.token)
        );
    }
    if let Some(ca) = &cfg.commit_api {
        any = true;
        println!(
            "commit-api    {}@{}:{} (token {})",
            ca.repo,
            ca.branch,
            ca.path,
            credential(&ca.token)
        );
    }
    if !any {
        println!("(none; saves stay on this machine)");
    }
}
