//! CLI argument parsing for CraftChain.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "craft",
    about = "Crafting dependency graphs with gated progress tracking",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/craftchain/logs/craftchain.log"
)]
pub struct Cli {
    /// Path to the directory holding .craftchain (default: current directory)
    #[arg(short = 'd', long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new craftchain store in the current directory
    Init,

    /// Create a new item
    Create {
        /// Project the item belongs to
        project: String,

        /// Item name
        name: String,

        /// Quantity that must be crafted
        required: i64,

        /// Dependency as ITEM_ID:QTY (repeatable)
        #[arg(long = "dep", value_name = "ITEM_ID:QTY")]
        deps: Vec<String>,
    },

    /// Add a dependency edge between two items by name
    Link {
        /// Project both items belong to
        project: String,

        /// Item that needs the dependency
        parent: String,

        /// Item being depended on
        dependency: String,

        /// Quantity required
        #[arg(default_value = "1")]
        qty: i64,
    },

    /// Bulk insert items from a JSON array file
    Import {
        /// Path to a JSON file containing an array of items
        file: PathBuf,
    },

    /// Show the full dependency tree of an item
    Tree {
        /// Root item ID
        id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List items of a project
    List {
        /// Project ID
        project: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a single item
    Show {
        /// Item ID
        id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record crafted quantity (requires dependencies to be complete)
    Craft {
        /// Item ID
        id: String,

        /// Quantity crafted
        #[arg(default_value = "1")]
        qty: i64,

        /// Acting user
        #[arg(short, long)]
        user: String,
    },

    /// Record a raw contribution (no dependency gate)
    Contribute {
        /// Item ID
        id: String,

        /// Quantity contributed
        qty: i64,

        /// Acting user
        #[arg(short, long)]
        user: String,
    },

    /// Remove a contribution
    Uncontribute {
        /// Item ID
        item_id: String,

        /// Contribution ID
        contribution_id: String,

        /// Acting user
        #[arg(short, long)]
        user: String,
    },

    /// Show recent craft activity for a project
    Activity {
        /// Project ID
        project: String,

        /// Maximum records (default from config.yaml)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show crafted and contributed progress for a project
    Progress {
        /// Project ID
        project: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the daemon in foreground
    Daemon,

    /// Stop the running daemon
    DaemonStop,

    /// Check daemon status
    DaemonStatus,
}
