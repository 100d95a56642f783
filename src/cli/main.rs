// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Upload Intelligence - Upload Filter Bypass Prober
 * Standalone CLI for authorized upload endpoint assessment
 *
 * Features:
 * - Baseline and probe uploads to learn the filter
 * - Hypothesis-driven strategy ranking
 * - Bounded attack loop with early stop
 * - Optional lab login
 *
 * (c) 2026 Bountyy Oy
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;
use validator::Validate;

use upload_intel::auth::{LabAuthenticator, LoginCredentials};
use upload_intel::config::{load_config_with_overrides, AppConfig};
use upload_intel::errors::ScanError;
use upload_intel::http_client::HttpClient;
use upload_intel::types::ScanResult;
use upload_intel::Director;

/// Upload Intelligence - confidence-guided upload filter bypass prober
#[derive(Parser)]
#[command(name = "upload-intel")]
#[command(author = "Bountyy Oy <info@bountyy.fi>")]
#[command(version)]
#[command(about = "Probe an upload endpoint and adaptively bypass its filters.", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    /// Configuration file path (YAML, TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an upload endpoint
    Scan {
        /// Upload endpoint URL
        #[arg(short, long)]
        url: String,

        /// Base URL for locating stored files (defaults to the upload URL's origin)
        #[arg(long)]
        base_url: Option<String>,

        /// Session cookie value or full `name=value` pair
        #[arg(long, conflicts_with = "auto_login")]
        cookie: Option<String>,

        /// Log in at {base}/login before scanning
        #[arg(long)]
        auto_login: bool,

        #[arg(long, default_value = "wiener", requires = "auto_login")]
        username: String,

        #[arg(long, default_value = "peter", requires = "auto_login")]
        password: String,

        /// File the execution payload should print
        #[arg(long)]
        read_file: Option<String>,

        /// Maximum strategy attempts
        #[arg(long)]
        max_attempts: Option<usize>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config_with_overrides(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(format) = cli.log_format {
        config.observability.log_json = format == LogFormat::Json;
    }
    init_logging(&config, cli.verbose);

    // Strategies run strictly one after another
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let succeeded = runtime.block_on(async_main(cli.command, config))?;
    std::process::exit(if succeeded { 0 } else { 1 });
}

fn init_logging(config: &AppConfig, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        config.observability.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if config.observability.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .init();
    }
}

async fn async_main(command: Commands, mut config: AppConfig) -> Result<bool> {
    match command {
        Commands::Scan {
            url,
            base_url,
            cookie,
            auto_login,
            username,
            password,
            read_file,
            max_attempts,
            json,
        } => {
            if let Some(path) = read_file {
                config.payload.read_file = Some(path);
            }
            if let Some(max) = max_attempts {
                config.director.max_attempts = max;
            }
            config.validate().context("Invalid scan settings")?;

            let base_url = match base_url {
                Some(base) => base.trim_end_matches('/').to_string(),
                None => origin_of(&url)?,
            };

            let session = if auto_login {
                let authenticator = LabAuthenticator::new(&config.http);
                let credentials = LoginCredentials::new(&username, &password);
                Some(
                    authenticator
                        .login(&base_url, &credentials)
                        .await
                        .map_err(|e| ScanError::Authentication(format!("{:#}", e)))?,
                )
            } else {
                cookie
            };
            if session.is_none() {
                warn!("No session cookie supplied; the upload form may require login");
            }

            let client = HttpClient::with_config(&url, &config.http, session.as_deref())
                .context("Failed to create HTTP client")?;
            let mut director = Director::new(&url, &base_url, Arc::new(client), &config)?;

            let result = tokio::select! {
                result = director.run() => result,
                _ = tokio::signal::ctrl_c() => {
                    error!("Interrupted");
                    return Err(ScanError::Interrupted.into());
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_report(&result);
                println!();
                println!("{}", director.intelligence_report());
            }

            Ok(result.vulnerabilities_found)
        }
    }
}

fn origin_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid upload URL: {}", url))?;
    Ok(parsed.origin().ascii_serialization())
}

fn print_report(result: &ScanResult) {
    println!("=== Scan Result ===");
    if result.vulnerabilities_found {
        info!("[SUCCESS] Upload filter bypassed");
        println!(
            "Bypass: {}",
            result.successful_strategy.as_deref().unwrap_or("unknown")
        );
    } else {
        println!("Bypass: none");
    }
    if let Some(secret) = &result.secret_extracted {
        println!("Secret: {}", secret);
    }
    println!("Attack state: {}", result.attack_state.as_str());
    println!("Strategies tried: {}", result.strategies_tried);
    println!("Observations: {}", result.observations_count);
    for (name, status) in &result.strategy_results {
        println!("  {:<24} {}", name, status);
    }
}
