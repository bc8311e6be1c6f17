//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint};

/// Build, compare and convert BEAST alarm trees from detector hierarchy and alarm databases
#[derive(Parser, Debug)]
#[command(name = "alarmtree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Config file layered over the global one
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Which store a tree is read from.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    /// Legacy detector hierarchy, attributes derived
    Hierarchy,
    /// Alarm configuration database, read as stored
    Alarm,
}

/// What makes two components the same when diffing.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Names and attributes must match
    Attributes,
    /// Names only
    Name,
}

/// Where to read trees from (shared by most subcommands).
#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// Store to read
    #[arg(short, long, value_enum, default_value_t = StoreKind::Hierarchy)]
    pub store: StoreKind,

    /// Database file (default: hierarchy_db / alarm_db from config)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Only the tree whose root has this name
    #[arg(long)]
    pub detector: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List root components
    Roots {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print trees
    Tree {
        #[command(flatten)]
        source: SourceArgs,

        /// Show leaf paths instead of the tree drawing
        #[arg(long)]
        leaves: bool,
    },

    /// Compare the hierarchy (reference) with the alarm database (candidate)
    Diff {
        /// Legacy hierarchy database
        #[arg(long, value_hint = ValueHint::FilePath)]
        hierarchy_db: Option<PathBuf>,

        /// Alarm configuration database
        #[arg(long, value_hint = ValueHint::FilePath)]
        alarm_db: Option<PathBuf>,

        /// Comparison mode
        #[arg(short, long, value_enum, default_value_t = ModeArg::Attributes)]
        mode: ModeArg,

        /// Only compare the tree with this root name
        #[arg(long)]
        detector: Option<String>,
    },

    /// Look up a component by path below a root
    Resolve {
        #[command(flatten)]
        source: SourceArgs,

        /// Root component name
        root: String,

        /// Path relative to the root, segments joined by the path separator
        path: String,
    },

    /// Write trees as BEAST XML configuration
    ExportXml {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file (default: stdout)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Copy hierarchy trees into the alarm database
    Populate {
        /// Legacy hierarchy database
        #[arg(long, value_hint = ValueHint::FilePath)]
        hierarchy_db: Option<PathBuf>,

        /// Alarm configuration database (created if missing)
        #[arg(long, value_hint = ValueHint::FilePath)]
        alarm_db: Option<PathBuf>,

        /// Only copy the tree with this root name
        #[arg(long)]
        detector: Option<String>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings as TOML
    Show,

    /// Show the global config file location
    Path,

    /// Write a template global config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
