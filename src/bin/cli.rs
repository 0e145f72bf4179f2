// src/bin/cli.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! CLI supporting `get`, `locate`, and `region`.
//!
//! Examples:
//! ```bash
//! s3fetch get     s3://bucket/pkg/archive.zip -o archive.zip
//! s3fetch get     s3://bucket/packages.json > packages.json
//! s3fetch locate  https://bucket.s3.amazonaws.com/pkg/archive.zip
//! s3fetch --profile ci region
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use s3fetch::{
    parse_storage_address, AwsClientBuilder, ConsoleIo, DownloadOutcome, Downloader, EnvLookup,
    HomeProfileLoader, IoSink, MissingRegionPolicy, Overrides, ProcessEnv,
    ProfileFileLoader, RegionResolver, StorageClientFactory,
};
use s3fetch::constants::{DEFAULT_REGION, KEY_ENDPOINT, KEY_PROFILE, KEY_REGION};

/// Macro to safely print with broken pipe handling
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug",
    )]
    verbose: u8,

    /// JSON file with the `amazon-aws` settings bundle.
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Region override (wins over the environment and profile file).
    #[arg(long)]
    region: Option<String>,

    /// Profile to read from `~/.aws/config`.
    #[arg(long)]
    profile: Option<String>,

    /// Custom endpoint for S3-compatible services.
    #[arg(long)]
    endpoint: Option<String>,

    /// What to do when no region is configured anywhere.
    /// Defaults to S3FETCH_MISSING_REGION, then `fixed`.
    #[arg(long = "missing-region", value_enum)]
    missing_region: Option<MissingRegion>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MissingRegion {
    /// Fall back to a fixed region (S3FETCH_FALLBACK_REGION or us-east-1).
    Fixed,
    /// Leave the region unset and discover each bucket's region.
    Discover,
}

#[derive(Subcommand)]
enum Command {
    /// Download one object to a file, or to stdout when no file is given.
    Get {
        /// Object URL (s3://bucket/key or https://bucket.s3.amazonaws.com/key)
        url: String,

        /// Destination file.
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,

        /// Suppress the progress indicator.
        #[arg(long = "no-progress")]
        no_progress: bool,
    },
    /// Print the bucket and key an URL addresses.
    Locate {
        url: String,
    },
    /// Print the region the current settings resolve to.
    Region,
}

fn load_overrides(cli: &Cli) -> Result<Overrides> {
    let mut overrides = match cli.config {
        Some(ref path) => Overrides::from_file(path)?,
        None => Overrides::new(),
    };
    if let Some(ref region) = cli.region {
        overrides.set(KEY_REGION, region);
    }
    if let Some(ref profile) = cli.profile {
        overrides.set(KEY_PROFILE, profile);
    }
    if let Some(ref endpoint) = cli.endpoint {
        overrides.set(KEY_ENDPOINT, endpoint);
    }
    Ok(overrides)
}

fn missing_region_policy(flag: Option<MissingRegion>, env: &dyn EnvLookup) -> MissingRegionPolicy {
    match flag {
        Some(MissingRegion::Discover) => MissingRegionPolicy::Discover,
        Some(MissingRegion::Fixed) => match MissingRegionPolicy::from_env(env) {
            fixed @ MissingRegionPolicy::Fixed(_) => fixed,
            MissingRegionPolicy::Discover => MissingRegionPolicy::Fixed(DEFAULT_REGION.to_string()),
        },
        None => MissingRegionPolicy::from_env(env),
    }
}

fn resolver(policy: MissingRegionPolicy) -> RegionResolver {
    let env: Arc<dyn EnvLookup> = Arc::new(ProcessEnv);
    let profiles: Arc<dyn ProfileFileLoader> = Arc::new(HomeProfileLoader);
    RegionResolver::new(env, profiles, policy)
}

fn get_cmd(url: &str, output: Option<PathBuf>, progress: bool, overrides: Overrides, policy: MissingRegionPolicy) -> Result<()> {
    // `progress` gates the download lines; advisories always reach the console
    let io: Arc<dyn IoSink> = Arc::new(ConsoleIo::new());
    let factory = StorageClientFactory::new(resolver(policy), Box::new(AwsClientBuilder), Arc::clone(&io));
    let downloader = Downloader::new(Arc::new(factory), overrides, Arc::clone(&io));

    let outcome = downloader
        .download(url, progress, output.as_deref())
        .with_context(|| format!("failed to download {url}"))?;

    match outcome {
        DownloadOutcome::Saved { path, size } => {
            info!("saved {} bytes to {}", size, path.display());
        }
        DownloadOutcome::Body(body) => {
            let mut out = io::stdout().lock();
            match out.write_all(&body).and_then(|_| out.flush()) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e).context("failed to write object to stdout"),
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let overrides = load_overrides(&cli)?;
    let policy = missing_region_policy(cli.missing_region, &ProcessEnv);

    match cli.cmd {
        Command::Get { url, output, no_progress } => {
            get_cmd(&url, output, !no_progress, overrides, policy)?;
        }

        Command::Locate { url } => {
            let address = parse_storage_address(&url);
            safe_println!("bucket: {}", address.bucket);
            safe_println!("key:    {}", address.key);
        }

        Command::Region => {
            let resolved = resolver(policy).resolve(&overrides);
            safe_println!("region:  {}", resolved.region.as_deref().unwrap_or("(discovered per bucket)"));
            safe_println!("source:  {}", resolved.region_source);
            safe_println!("profile: {}", resolved.profile.as_deref().unwrap_or("(none)"));
        }
    }

    Ok(())
}
