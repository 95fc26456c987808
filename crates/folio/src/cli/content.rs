//! Document editing commands

use folio_core::model::default_document;
use folio_core::{CollectionPath, Result, Section};
use serde_json::Value;

use crate::cli::CliContext;
use crate::cli::util::{parse_json, parse_value, print_json, report_error};

/// Turn a handler result into the CLI's success flag.
pub fn finish(result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            report_error(&e);
            false
        }
    }
}

/// Handle `show [section]`
pub fn handle_show(ctx: &CliContext, section: Option<&str>) -> bool {
    match shown_value(ctx, section) {
        Ok(value) => print_json(&value),
        Err(e) => {
            report_error(&e);
            false
        }
    }
}

fn shown_value(ctx: &CliContext, section: Option<&str>) -> Result<Value> {
    let section: Option<Section> = section.map(str::parse).transpose()?;
    let (store, outcome) = ctx.open_store()?;
    let doc = if outcome.is_loaded() {
        store.get()?
    } else {
        eprintln!("No saved content found; showing the defaults.");
        default_document()
    };

    Ok(match section {
        Some(section) => doc.section(section).cloned().unwrap_or(Value::Null),
        None => doc.into_value(),
    })
}

/// Handle `set <section> <json>`
pub fn handle_set(ctx: &CliContext, section: &str, json: &str) -> bool {
    finish(set_section(ctx, section, json))
}

fn set_section(ctx: &CliContext, section: &str, json: &str) -> Result<()> {
    let section: Section = section.parse()?;
    let value = parse_json(json)?;
    let store = ctx.open_document_store()?;
    if store.set_section(section, value)? {
        println!("✓ Updated {}", section);
    } else {
        println!("{} unchanged", section);
    }
    Ok(())
}

/// Handle `add <collection> [json]`
pub fn handle_add(ctx: &CliContext, collection: &str, json: Option<&str>) -> bool {
    finish(add_entry(ctx, collection, json))
}

fn add_entry(ctx: &CliContext, collection: &str, json: Option<&str>) -> Result<()> {
    let path: CollectionPath = collection.parse()?;
    let template = json.map(parse_json).transpose()?;
    let store = ctx.open_document_store()?;
    let id = store.add_entry(path, template)?;
    println!("✓ Added {} entry {}", path, id);
    Ok(())
}

/// Handle `remove <collection> <id>`
pub fn handle_remove(ctx: &CliContext, collection: &str, id: u64) -> bool {
    finish(remove_entry(ctx, collection, id))
}

fn remove_entry(ctx: &CliContext, collection: &str, id: u64) -> Result<()> {
    let path: CollectionPath = collection.parse()?;
    let store = ctx.open_document_store()?;
    if store.remove_entry(path, id)? {
        println!("✓ Removed {} entry {}", path, id);
    } else {
        println!("No {} entry with id {}", path, id);
    }
    Ok(())
}

/// Handle `update <collection> <id> <field> <value>`
pub fn handle_update(
    ctx: &CliContext,
    collection: &str,
    id: u64,
    field: &str,
    value: &str,
) -> bool {
    finish(update_field(ctx, collection, id, field, value))
}

fn update_field(
    ctx: &CliContext,
    collection: &str,
    id: u64,
    field: &str,
    value: &str,
) -> Result<()> {
    let path: CollectionPath = collection.parse()?;
    let store = ctx.open_document_store()?;
    if store.update_entry_field(path, id, field, parse_value(value))? {
        println!("✓ Updated {} of {} entry {}", field, path, id);
    } else {
        println!("{} of {} entry {} unchanged", field, path, id);
    }
    Ok(())
}

/// Handle `category add <name>`
pub fn handle_category_add(ctx: &CliContext, name: &str) -> bool {
    finish(add_category(ctx, name))
}

fn add_category(ctx: &CliContext, name: &str) -> Result<()> {
    let store = ctx.open_document_store()?;
    if store.add_category(name)? {
        println!("✓ Added category {}", name.trim());
    } else {
        println!("Category {} already exists", name.trim());
    }
    Ok(())
}

/// Handle `category remove <name>`
pub fn handle_category_remove(ctx: &CliContext, name: &str) -> bool {
    finish(remove_category(ctx, name))
}

fn remove_category(ctx: &CliContext, name: &str) -> Result<()> {
    let store = ctx.open_document_store()?;
    match store.remove_category(name)? {
        Some(0) => println!("✓ Removed category {}", name),
        Some(moved) => println!(
            "✓ Removed category {} ({} item(s) moved to Others)",
            name, moved
        ),
        None => println!("No category named {}", name),
    }
    Ok(())
}
