//! `export` and `import`

use std::path::Path;

use folio_core::{ContentDocument, FolioError, Result};

use crate::cli::CliContext;
use crate::cli::content::finish;

/// Handle `export <path>`
pub fn handle_export(ctx: &CliContext, path: &Path) -> bool {
    finish(export(ctx, path))
}

fn export(ctx: &CliContext, path: &Path) -> Result<()> {
    let store = ctx.open_document_store()?;
    let text = store.get()?.to_pretty_json()?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text).map_err(|source| FolioError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    println!("✓ Exported to {}", path.display());
    Ok(())
}

/// Handle `import <path>`
pub fn handle_import(ctx: &CliContext, path: &Path) -> bool {
    finish(import(ctx, path))
}

fn import(ctx: &CliContext, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path).map_err(|source| FolioError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = ContentDocument::from_json_str(&text)?;
    if let Err(e) = doc.validate() {
        eprintln!("⚠ {}; saving will be refused until this is fixed", e);
    }

    let store = ctx.store();
    store.replace(doc)?;
    println!("✓ Imported {}", path.display());
    Ok(())
}
