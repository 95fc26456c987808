//! Image attachment

use std::path::Path;

use folio_core::images::{ImagePlacement, attach_image};
use folio_core::{CollectionPath, Result};

use crate::cli::CliContext;
use crate::cli::content::finish;

/// Handle `image <collection> <id> <file>`
pub fn handle_image(ctx: &CliContext, collection: &str, id: u64, file: &Path) -> bool {
    finish(attach(ctx, collection, id, file))
}

fn attach(ctx: &CliContext, collection: &str, id: u64, file: &Path) -> Result<()> {
    let path: CollectionPath = collection.parse()?;
    let store = ctx.open_document_store()?;
    let server = ctx.config.local_server()?;

    match ctx.block_on(attach_image(&store, server.as_ref(), path, id, file))? {
        ImagePlacement::Uploaded(stored) => {
            println!("✓ Uploaded image for {} entry {}", path, id);
            println!("  Stored as {}", stored);
        }
        ImagePlacement::Embedded(bytes) => {
            println!("✓ Embedded image for {} entry {} ({} bytes)", path, id, bytes);
            println!("  The local server was not reachable, so the image lives in the document.");
        }
    }
    Ok(())
}
