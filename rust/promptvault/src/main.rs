#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::{Parser, Subcommand};
use log::{debug, LevelFilter};
use promptvault::crypto::{fill_random, GCM_NONCE_SIZE, GCM_TAG_SIZE};
use promptvault::{
    ArtifactFormat, CipherBlob, EncryptionKey, Encryptor, Error, FailurePolicy, Result, Vault,
    VaultConfig, KEY_SIZE,
};
use std::path::PathBuf;
use std::process::ExitCode;
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Environment variable holding the hex-encoded 32-byte key
    #[arg(long, global = true, default_value = "PROMPTVAULT_KEY")]
    key_env: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a plaintext payload into a sealed artifact
    Seal {
        /// Plaintext payload to seal
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the sealed artifact
        #[arg(short, long, default_value = promptvault::config::DEFAULT_ARTIFACT_PATH)]
        output: PathBuf,

        /// `raw` seals the payload itself, `unit` wraps it in a provider unit
        #[arg(short, long, default_value_t = ArtifactFormat::Raw)]
        format: ArtifactFormat,

        /// Delete the plaintext input after sealing
        #[arg(long)]
        remove_source: bool,
    },

    /// Load a sealed artifact the way the runtime does and report the outcome
    Verify {
        /// Sealed artifact (defaults to PROMPTVAULT_ARTIFACT, then prompt.bin.enc)
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        /// Artifact format (defaults to PROMPTVAULT_FORMAT, then raw)
        #[arg(short, long)]
        format: Option<ArtifactFormat>,

        /// Staging directory for unit-format artifacts
        #[arg(long)]
        transient_dir: Option<PathBuf>,
    },

    /// Show the layout of a sealed artifact without decrypting it
    Inspect {
        /// Sealed artifact
        #[arg(default_value = promptvault::config::DEFAULT_ARTIFACT_PATH)]
        artifact: PathBuf,
    },

    /// Generate a random key and print it hex-encoded
    GenerateKey,
}

fn key_from_env(var: &str) -> Result<EncryptionKey> {
    let encoded = std::env::var(var)
        .map(Zeroizing::new)
        .map_err(|_| Error::Config(format!("{var} is not set; export the hex-encoded key")))?;
    EncryptionKey::from_hex(&encoded)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Seal {
            input,
            output,
            format,
            remove_source,
        } => {
            let key = key_from_env(&cli.key_env)?;
            let report = Encryptor::new(key)
                .with_format(format)
                .with_remove_source(remove_source)
                .encrypt_file(&input, &output)?;

            println!(
                "sealed {} bytes into {} ({} bytes, {} format)",
                report.plaintext_len,
                output.display(),
                report.artifact_len,
                format
            );
            if report.source_removed {
                println!("removed plaintext source {}", input.display());
            }
        }

        Commands::Verify {
            artifact,
            format,
            transient_dir,
        } => {
            securememory::signal::catch_interrupt()?;
            securememory::disable_core_dumps()?;

            let mut config = VaultConfig::from_env_with_key_var(&cli.key_env)?
                .with_failure_policy(FailurePolicy::Permanent);
            if config.key.is_none() {
                return Err(Error::Config(format!(
                    "{} is not set; export the hex-encoded key",
                    cli.key_env
                )));
            }
            if let Some(artifact) = artifact {
                config = config.with_artifact_path(artifact);
            }
            if let Some(format) = format {
                config = config.with_format(format);
            }
            if let Some(dir) = transient_dir {
                config = config.with_transient_dir(dir);
            }

            let vault = Vault::new(config)?;
            vault.preload()?;
            let handle = vault.provider_handle()?;
            let secret = vault.load_secret()?;

            println!(
                "ok: {} bytes loaded from {} via {} activation{} (locked: {})",
                handle.secret_len(),
                vault.artifact_path().display(),
                handle.activator(),
                handle
                    .symbol()
                    .map(|s| format!(", accessor `{s}`"))
                    .unwrap_or_default(),
                secret.is_locked()
            );
            vault.purge()?;
        }

        Commands::Inspect { artifact } => {
            let blob = CipherBlob::read(&artifact)?;
            println!("artifact:   {}", artifact.display());
            println!("total:      {} bytes", blob.len());
            println!("nonce:      {} bytes", GCM_NONCE_SIZE);
            println!(
                "ciphertext: {} bytes (sealed payload)",
                blob.ciphertext().len().saturating_sub(GCM_TAG_SIZE)
            );
            println!("tag:        {} bytes", GCM_TAG_SIZE);
        }

        Commands::GenerateKey => {
            let mut key = Zeroizing::new([0_u8; KEY_SIZE]);
            fill_random(key.as_mut_slice());
            println!("{}", hex::encode(key.as_slice()));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
    debug!("promptvault {}", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
