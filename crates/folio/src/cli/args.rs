//! Command-line argument structures and enums

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Edit portfolio website content and publish it", long_about = None)]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config and seed the local cache with default content
    Init {
        /// Directory for the local cache (default: platform data dir)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Print the document, or one section of it, as JSON
    Show {
        /// Section to print (e.g. "about", "portfolio")
        section: Option<String>,
    },

    /// Save the document to every configured backend
    Save,

    /// Replace a section with a JSON value
    Set {
        /// Section name
        section: String,

        /// New value as JSON
        json: String,
    },

    /// Add an entry to a collection (template used when no JSON is given)
    Add {
        /// Collection: services, clients, experience, education, skills, portfolio
        collection: String,

        /// Entry fields as a JSON object
        json: Option<String>,
    },

    /// Remove an entry from a collection
    #[command(alias = "rm")]
    Remove {
        /// Collection name
        collection: String,

        /// Entry id
        id: u64,
    },

    /// Change one field of an entry
    Update {
        /// Collection name
        collection: String,

        /// Entry id
        id: u64,

        /// Field name
        field: String,

        /// New value as JSON (plain text is taken as a string)
        value: String,
    },

    /// Manage portfolio categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },

    /// Attach an image to an entry (uploaded, or embedded when offline)
    Image {
        /// Collection name
        collection: String,

        /// Entry id
        id: u64,

        /// Image file
        file: PathBuf,
    },

    /// Write the document to a JSON file
    Export {
        /// Destination file
        path: PathBuf,
    },

    /// Replace the document with the contents of a JSON file
    Import {
        /// Source file
        path: PathBuf,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Add a category
    Add {
        /// Category name
        name: String,
    },

    /// Remove a category, moving its items to "Others"
    Remove {
        /// Category name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
}
