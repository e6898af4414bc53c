use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rfv_crypto::DigestAlgorithm;

#[derive(Parser)]
#[command(
    name = "rfv",
    about = "Repository fidelity verifier: prove an object-store copy matches a local repository",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compare a remote copy against a local repository tree
    Verify(VerifyArgs),
    /// Print the normalized local file set
    ListLocal(ListLocalArgs),
    /// Print the normalized remote object set
    ListRemote(ListRemoteArgs),
}

/// Where the remote copy lives.
#[derive(Args, Clone, Debug)]
pub struct RemoteArgs {
    /// Directory whose subdirectories are buckets
    #[arg(long)]
    pub store_root: Option<PathBuf>,
    #[arg(long)]
    pub bucket: String,
    /// Key prefix of the repository inside the bucket
    #[arg(long, default_value = "")]
    pub prefix: String,
}

/// Exclusion and config-file flags shared by every subcommand.
#[derive(Args, Clone, Debug, Default)]
pub struct FilterArgs {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Drop the stock fixture exclusions (.gitkeep, ocfl_1.1.md, ocfl_1.0.txt)
    #[arg(long)]
    pub no_default_exclusions: bool,
    /// Exclude files with this name at any depth
    #[arg(long = "exclude-name")]
    pub exclude_names: Vec<String>,
    /// Exclude this exact relative path
    #[arg(long = "exclude-path")]
    pub exclude_paths: Vec<String>,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Known-good local repository root
    #[arg(long)]
    pub local: PathBuf,
    #[command(flatten)]
    pub remote: RemoteArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    #[arg(long)]
    pub algorithm: Option<DigestAlgorithm>,
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Keys requested per listing page
    #[arg(long)]
    pub page_size: Option<usize>,
    /// Abort the run after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args)]
pub struct ListLocalArgs {
    pub root: PathBuf,
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args)]
pub struct ListRemoteArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
}
