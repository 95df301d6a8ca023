use anyhow::Result;
use clap::Parser;
use post_geotag::config::{config_stub, load_config, validate_config};
use post_geotag::store::{load_posts, ArtifactStore};
use post_geotag::{Credentials, EnrichmentPipeline, GeocodeFailurePolicy, RunConfig};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Command, RootArgs, RunArgs};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    match args.command {
        Command::Run(args) => run(args),
        Command::ConfigStub => {
            println!("{}", config_stub()?);
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    init_tracing(args.verbose);

    let config = resolve_config(&args)?;
    let credentials = Credentials {
        maps_api_key: args.maps_key.clone(),
        completion_api_key: args.completion_key.clone(),
    };
    let store = resolve_store(&args);
    let pipeline = EnrichmentPipeline::from_config(&config, &credentials, store)?;

    let posts = load_posts(&args.input);
    tracing::info!(count = posts.len(), input = %args.input.display(), "loaded posts");

    let output = pipeline.run(posts)?;
    let summary = &output.summary;
    if args.json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    match &summary.final_artifact {
        Some(path) => println!(
            "Processed {} posts, {} valid, saved to {}",
            summary.processed,
            summary.retained,
            path.display()
        ),
        None => println!(
            "Processed {} posts, {} valid (final snapshot not saved)",
            summary.processed, summary.retained
        ),
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file (or defaults), then CLI overrides, then validation.
fn resolve_config(args: &RunArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => RunConfig::default(),
    };
    if let Some(interval) = args.checkpoint_interval {
        config.checkpoint_interval = interval;
    }
    if let Some(region) = &args.region {
        config.region = Some(region.clone());
    }
    if let Some(language) = &args.language {
        config.language = language.clone();
    }
    if let Some(command) = &args.lm_command {
        config.completion.command = Some(command.clone());
    }
    if args.abort_on_geocode_error {
        config.geocode_failure = GeocodeFailurePolicy::Abort;
    }
    validate_config(&config)?;
    Ok(config)
}

fn resolve_store(args: &RunArgs) -> ArtifactStore {
    let default = ArtifactStore::for_input(&args.input);
    match (&args.out_dir, &args.prefix) {
        (None, None) => default,
        (dir, prefix) => {
            let dir = dir.clone().unwrap_or_else(|| default.dir().to_path_buf());
            let prefix = prefix
                .clone()
                .unwrap_or_else(|| default.prefix().to_string());
            ArtifactStore::new(dir, prefix)
        }
    }
}
