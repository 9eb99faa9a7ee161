//! Skiff CLI - minimal content-addressable version control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Skiff - minimal git-compatible object store and fetch client
#[derive(Parser, Debug)]
#[command(name = "skiff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Repository working directory (default: current directory)
    #[arg(short = 'C', long, default_value = ".")]
    path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a new repository
    Init,

    /// Print an object's content
    CatFile {
        /// Pretty-print the object content
        #[arg(short = 'p')]
        pretty: bool,
        /// Object id (40 hex characters)
        id: String,
    },

    /// Hash a file into a blob object
    HashObject {
        /// Write the object into the store
        #[arg(short = 'w')]
        write: bool,
        /// File to hash
        file: PathBuf,
    },

    /// List a tree object's entries
    LsTree {
        /// Print entry names only
        #[arg(long)]
        name_only: bool,
        /// Tree object id
        id: String,
    },

    /// Write the working directory as a tree object
    WriteTree,

    /// Create a commit object from a tree
    CommitTree {
        /// Tree object id
        tree: String,
        /// Parent commit id (repeatable)
        #[arg(short = 'p', long = "parent")]
        parents: Vec<String>,
        /// Commit message
        #[arg(short = 'm', long = "message")]
        message: String,
    },

    /// Clone a remote repository over smart HTTP
    Clone {
        /// Remote repository URL
        url: String,
        /// Destination directory
        dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("skiff={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Init => commands::init(&cli.path),
        Commands::CatFile { pretty, id } => commands::cat_file(&cli.path, &id, pretty),
        Commands::HashObject { write, file } => commands::hash_object(&cli.path, &file, write),
        Commands::LsTree { name_only, id } => commands::ls_tree(&cli.path, &id, name_only),
        Commands::WriteTree => commands::write_tree(&cli.path),
        Commands::CommitTree {
            tree,
            parents,
            message,
        } => commands::commit_tree(&cli.path, &tree, &parents, &message),
        Commands::Clone { url, dir } => commands::clone(&url, &dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
