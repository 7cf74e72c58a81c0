//! Command-line front end

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::{ProfileStorage, ProjectProfile};
use crate::ssh::{self, DeployKeypair, DEFAULT_TIMEOUT_SECS};

/// Deployment target SSH checks
#[derive(Debug, Parser)]
#[command(name = "shipcheck", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify the profile's SSH target accepts its key
    Verify {
        /// Profile JSON (default: ~/.shipcheck/profile.json)
        profile: Option<PathBuf>,
    },
    /// Print a known_hosts line for a host
    HostKey {
        host: String,
        #[arg(default_value_t = 22)]
        port: u16,
        /// Handshake timeout in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },
    /// Generate an RSA deploy keypair into a directory
    Keygen {
        dir: PathBuf,
        #[arg(long, default_value_t = ssh::keygen::DEPLOY_KEY_BITS)]
        bits: usize,
    },
}

/// File names written by `keygen`
const DEPLOY_KEY_FILE: &str = "deploy_id_rsa";
const DEPLOY_PUBLIC_KEY_FILE: &str = "deploy_id_rsa.pub";

pub async fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Verify { profile } => verify_profile(profile).await,
        Command::HostKey {
            host,
            port,
            timeout,
        } => ssh::fetch_known_hosts_line(&host, port, timeout)
            .await
            .map(|line| println!("{}", line))
            .map_err(|e| vec![e.to_string()]),
        Command::Keygen { dir, bits } => keygen(&dir, bits).await.map_err(|e| vec![e]),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(messages) => {
            for message in messages {
                eprintln!("{}", message);
            }
            ExitCode::FAILURE
        }
    }
}

async fn load_profile(path: Option<PathBuf>) -> Result<ProjectProfile, String> {
    let storage = match path {
        Some(path) => ProfileStorage::with_path(path),
        None => ProfileStorage::new().map_err(|e| e.to_string())?,
    };
    storage
        .load()
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Profile not found: {}", storage.path().display()))
}

async fn verify_profile(path: Option<PathBuf>) -> Result<(), Vec<String>> {
    let profile = load_profile(path).await.map_err(|e| vec![e])?;

    let missing = profile.missing_fields();
    if !missing.is_empty() {
        return Err(missing);
    }

    let result = ssh::verify(&profile.ssh).await;
    if !result.success {
        return Err(result.messages);
    }

    println!(
        "{}: SSH access to {} verified",
        profile.project_name,
        profile.ssh.primary_target()
    );
    Ok(())
}

async fn keygen(dir: &Path, bits: usize) -> Result<(), String> {
    let keypair = tokio::task::spawn_blocking(move || ssh::generate_rsa_keypair_with_bits(bits))
        .await
        .map_err(|e| format!("Key generation task failed: {}", e))?
        .map_err(|e| e.to_string())?;

    write_keypair(dir, &keypair)
        .await
        .map_err(|e| format!("Failed to write keypair to {}: {}", dir.display(), e))?;

    println!("{}", keypair.public_key_openssh);
    Ok(())
}

async fn write_keypair(dir: &Path, keypair: &DeployKeypair) -> std::io::Result<()> {
    fs::create_dir_all(dir).await?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut private = options.open(dir.join(DEPLOY_KEY_FILE)).await?;
    private.write_all(keypair.private_key_pem.as_bytes()).await?;
    private.sync_all().await?;

    fs::write(
        dir.join(DEPLOY_PUBLIC_KEY_FILE),
        format!("{}\n", keypair.public_key_openssh),
    )
    .await
}
