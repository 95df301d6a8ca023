//! CLI argument parsing.
//!
//! Keys are read from flags or their environment variables here and passed
//! to the pipeline explicitly; nothing below the CLI reads the environment.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "geotag",
    version,
    about = "Geotag and score social media posts with an LM and a geocoder",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enrich a JSON array of posts
    Run(RunArgs),
    /// Print the default run config as JSON
    ConfigStub,
}

/// Inputs for `geotag run`.
#[derive(Parser, Debug)]
#[command(about = "Extract, geocode and score posts, writing checkpoints and a final snapshot")]
pub struct RunArgs {
    /// JSON array of posts
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory for checkpoint and final snapshots (default: input's directory)
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Snapshot file name prefix (default: processed_<input stem>)
    #[arg(long, value_name = "NAME")]
    pub prefix: Option<String>,

    /// JSON run config; flags below override it
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Posts processed between checkpoints
    #[arg(long, value_name = "N")]
    pub checkpoint_interval: Option<usize>,

    /// Region hint for geocoding (e.g. "us")
    #[arg(long, value_name = "CODE")]
    pub region: Option<String>,

    /// Result language for geocoding
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Local LM command used instead of the HTTP completion endpoint
    #[arg(long, value_name = "CMD")]
    pub lm_command: Option<String>,

    /// Stop the run when a geocoding lookup fails instead of skipping the place
    #[arg(long)]
    pub abort_on_geocode_error: bool,

    /// Geocoding API key
    #[arg(long, env = "GEOTAG_MAPS_API_KEY", hide_env_values = true)]
    pub maps_key: String,

    /// Completion API key (not needed with a local LM command)
    #[arg(long, env = "GEOTAG_COMPLETION_API_KEY", hide_env_values = true)]
    pub completion_key: Option<String>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Log prompts and per-candidate geocoding detail
    #[arg(long)]
    pub verbose: bool,
}
