//! awssh CLI
//!
//! Opens an interactive SSH session on an EC2 instance without inbound
//! network access: the key is pushed with EC2 Instance Connect and the
//! connection runs through a Session Manager port-forwarding tunnel.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use awssh::aws::AwsControlPlane;
use awssh::output::{format_targets, print_error, print_info, print_success, print_warning};
use awssh::select::{select_profile, select_target};
use awssh_core::config::{
    self, ConfigFile, SessionOptions, DEFAULT_HELPER, DEFAULT_PROFILE,
};
use awssh_core::traits::ControlPlane;
use awssh_core::{SessionError, TargetId};
use awssh_session::tunnel::verify_helper;
use awssh_session::{CrosstermTerminal, HelperProcessLauncher, Orchestrator, SshConnector};

#[derive(Parser)]
#[command(name = "awssh")]
#[command(author, version, about = "SSH into EC2 instances through Session Manager port forwarding")]
struct Cli {
    /// Instance ID (i-xxxxxxxx); prompts with a list of running instances if omitted
    #[arg(value_parser = TargetId::parse)]
    target: Option<TargetId>,

    /// Login username
    #[arg(short, long)]
    username: Option<String>,

    /// Private key used to authenticate
    #[arg(short = 'i', long = "identity-file")]
    identity_file: Option<PathBuf>,

    /// Public key to push (defaults to the identity file with .pub appended)
    #[arg(short = 'P', long = "publickey")]
    public_key: Option<PathBuf>,

    /// Remote SSH port
    #[arg(short, long)]
    port: Option<u16>,

    /// Port-forwarding helper executable
    #[arg(short = 'c', long = "helper", visible_alias = "external-command")]
    helper: Option<PathBuf>,

    /// AWS profile
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Choose the AWS profile interactively from those with a role_arn
    #[arg(long)]
    select_profile: bool,

    /// Skip the background AMI snapshot
    #[arg(long)]
    disable_snapshot: bool,

    /// List running instances and exit
    #[arg(short, long, conflicts_with = "target")]
    list: bool,

    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{:#}", e));
            exit_code(&e)
        }
    };

    std::process::exit(code);
}

/// Exit code for a failed invocation
fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<SessionError>()
        .map(SessionError::exit_code)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> Result<i32> {
    let config_file = load_config_file(cli.config.as_ref())?;
    let defaults = &config_file.session;

    let profile = if cli.select_profile {
        let path = config::aws_config_path();
        let profiles = config::list_role_profiles(&path)
            .with_context(|| format!("Failed to read profiles from {:?}", path))?;
        select_profile(&profiles)?
    } else {
        cli.profile
            .clone()
            .or_else(|| defaults.profile.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    };

    let control_plane = Arc::new(
        AwsControlPlane::connect(&profile)
            .await
            .context("Failed to load AWS configuration")?,
    );

    if cli.list {
        let targets = control_plane.list_targets().await?;
        println!("{}", format_targets(&targets));
        return Ok(0);
    }

    let helper = cli
        .helper
        .clone()
        .or_else(|| defaults.helper.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HELPER));
    verify_helper(&helper)
        .await
        .with_context(|| format!("{} not found", helper.display()))?;

    let target = match cli.target.clone() {
        Some(id) => id,
        None => {
            let targets = control_plane.list_targets().await?;
            select_target(&targets)?.id
        }
    };

    let mut options = SessionOptions::new(target).with_defaults(defaults);
    options.helper = helper;
    if let Some(username) = cli.username {
        options.username = username;
    }
    if let Some(identity_file) = cli.identity_file {
        options.identity_file = identity_file;
    }
    if let Some(public_key) = cli.public_key {
        options.public_key_file = Some(public_key);
    }
    if let Some(port) = cli.port {
        options.remote_port = port;
    }
    if cli.disable_snapshot {
        options.snapshot = false;
    }

    let target_label = options.target.to_string();
    print_info(&format!(
        "Connecting to {} as {} (profile {})",
        target_label, options.username, profile
    ));

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let orchestrator = Orchestrator::new(
        control_plane,
        Arc::new(HelperProcessLauncher::new()),
        Arc::new(SshConnector::new()),
        Arc::new(CrosstermTerminal::new()),
    );

    let outcome = orchestrator.run(options, cancel).await?;
    tracing::info!(
        exit_code = outcome.exit_code,
        local_port = outcome.local_port,
        "Session finished"
    );
    if outcome.exit_code == 0 {
        print_success(&format!("Disconnected from {}", target_label));
    } else {
        print_warning(&format!(
            "Remote shell on {} exited with status {}",
            target_label, outcome.exit_code
        ));
    }

    Ok(i32::try_from(outcome.exit_code).unwrap_or(1))
}

/// Load the config file, falling back to defaults when the default path is absent
fn load_config_file(explicit: Option<&PathBuf>) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        config::load_config(&default_path)
            .with_context(|| format!("Failed to load config from {:?}", default_path))
    } else {
        tracing::debug!("Using default configuration");
        Ok(ConfigFile::default())
    }
}

/// Cancel the session on Ctrl+C or SIGTERM
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::debug!("SIGTERM handler unavailable: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, cancelling session...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, cancelling session...");
            }
        }

        cancel.cancel();
    });
}
