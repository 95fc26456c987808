//! Shared CLI utilities

use folio_core::{CollectionPath, FolioError, Section};
use serde_json::Value;

/// Print an error with a hint for the common cases.
pub fn report_error(e: &FolioError) {
    eprintln!("✗ {}", e);
    match e {
        FolioError::DocumentMissing => {
            eprintln!("  Run 'folio init' or 'folio import <file>' first.");
        }
        FolioError::UnknownSection(_) => {
            let names: Vec<&str> = Section::ALL.iter().map(|s| s.key()).collect();
            eprintln!("  Sections: {}", names.join(", "));
        }
        FolioError::UnknownCollection(_) => {
            let names: Vec<&str> = CollectionPath::ALL.iter().map(|c| c.label()).collect();
            eprintln!("  Collections: {}", names.join(", "));
        }
        _ => {}
    }
}

/// Parse JSON given on the command line.
pub fn parse_json(text: &str) -> Result<Value, FolioError> {
    Ok(serde_json::from_str(text)?)
}

/// Parse a field value: JSON when it parses, otherwise the raw text as a
/// string.
pub fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &Value) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            true
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            false
        }
    }
}
