//! encsvc: encryption service command-line client
//!
//! Commands:
//!   keygen              - generate a key for an algorithm
//!   encrypt <input>     - encrypt a file into the artifact container format
//!   decrypt <input>     - decrypt an artifact
//!   inspect <input>     - print an artifact's header
//!   config show         - display current configuration
//!
//! Keys are taken from --key, --key-file, ENCSVC_KEY, or an interactive
//! prompt, in that order.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use encsvc_core::config::EncsvcConfig;
use encsvc_core::AlgorithmSpec;
use encsvc_crypto::{adapter_for, Header, KeySource, SealOptions, UserKey};
use encsvc_storage::names::{DECRYPTED_SUFFIX, ENCRYPTED_SUFFIX};
use indicatif::{ProgressBar, ProgressStyle};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const KEY_ENV: &str = "ENCSVC_KEY";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "encsvc",
    version,
    about = "Encryption service client",
    long_about = "encsvc: generate keys and encrypt, decrypt, or inspect files in the encsvc artifact format"
)]
struct Cli {
    /// Path to the TOML configuration file (crypto settings are read from it)
    #[arg(long, short = 'c', env = "ENCSVC_CONFIG", default_value = "/etc/encsvc/config.toml")]
    config: PathBuf,

    /// Hide progress bars
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a key (hex for symmetric algorithms, a PEM pair for rsa)
    Keygen {
        /// aes128, aes256, blowfish, or rsa
        #[arg(long, short = 'a', default_value = "aes256")]
        algorithm: String,
        /// Key length: bytes for symmetric algorithms, modulus bits for rsa
        #[arg(long, short = 'l')]
        length: Option<usize>,
        /// Write the key here instead of stdout (rsa also writes <output>.pub)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Encrypt a file
    Encrypt {
        /// File to encrypt
        input: PathBuf,
        /// aes128, aes256, blowfish, or rsa
        #[arg(long, short = 'a')]
        algorithm: String,
        /// Destination (default: <input>.enc)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Replace the destination if it exists
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Decrypt an artifact
    Decrypt {
        /// Artifact to decrypt
        input: PathBuf,
        /// Expected algorithm (default: whatever the artifact header records)
        #[arg(long, short = 'a')]
        algorithm: Option<String>,
        /// Destination (default: <input> without .enc, or <input>.dec)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Replace the destination if it exists
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Show the header of an artifact without decrypting it
    Inspect {
        /// Artifact to inspect
        input: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// Hex key, passphrase, or PEM text (visible in process listings; prefer --key-file)
    #[arg(long, short = 'k')]
    key: Option<String>,
    /// Read the key from a file (PEM keys, hex keys, or a passphrase)
    #[arg(long, short = 'K')]
    key_file: Option<PathBuf>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Keygen { algorithm, length, output } => {
            cmd_keygen(&algorithm, length, output.as_deref())
        }
        Commands::Encrypt { input, algorithm, output, force, key } => {
            let output = output.unwrap_or_else(|| default_encrypt_output(&input));
            cmd_encrypt(&config, &input, &algorithm, &output, force, &key, cli.quiet)
        }
        Commands::Decrypt { input, algorithm, output, force, key } => {
            let output = output.unwrap_or_else(|| default_decrypt_output(&input));
            cmd_decrypt(&input, algorithm.as_deref(), &output, force, &key, cli.quiet)
        }
        Commands::Inspect { input, json } => cmd_inspect(&input, json),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_env("ENCSVC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Result<EncsvcConfig> {
    if path.exists() {
        EncsvcConfig::from_file(path)
            .with_context(|| format!("loading config: {}", path.display()))
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(EncsvcConfig::default())
    }
}

// ── Key input ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyPurpose {
    Encrypt,
    Decrypt,
}

/// Pick the key from the first source that has one: flag, file, environment.
///
/// Returns `None` when every source is empty so the caller can prompt.
fn key_from_sources(
    flag: Option<&str>,
    file: Option<&Path>,
    env: Option<String>,
) -> Result<Option<String>> {
    if let Some(key) = flag {
        return Ok(Some(key.to_string()));
    }
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading key file: {}", path.display()))?;
        let trimmed = content.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            anyhow::bail!("key file is empty: {}", path.display());
        }
        return Ok(Some(trimmed.to_string()));
    }
    Ok(env.filter(|v| !v.is_empty()))
}

fn read_key(args: &KeyArgs, purpose: KeyPurpose) -> Result<UserKey> {
    let found = key_from_sources(
        args.key.as_deref(),
        args.key_file.as_deref(),
        std::env::var(KEY_ENV).ok(),
    )?;
    let key = match found {
        Some(key) => key,
        None => prompt_key(purpose)?,
    };
    Ok(UserKey::new(key)?)
}

fn prompt_key(purpose: KeyPurpose) -> Result<String> {
    let key = rpassword::prompt_password("Key: ").context("reading key from terminal")?;
    if purpose == KeyPurpose::Encrypt {
        let confirm =
            rpassword::prompt_password("Confirm key: ").context("reading key from terminal")?;
        if confirm != key {
            anyhow::bail!("keys do not match");
        }
    }
    Ok(key)
}

// ── Paths and output files ────────────────────────────────────────────────────

fn default_encrypt_output(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(ENCRYPTED_SUFFIX);
    PathBuf::from(name)
}

fn default_decrypt_output(input: &Path) -> PathBuf {
    let raw = input.as_os_str().to_string_lossy();
    match raw.strip_suffix(ENCRYPTED_SUFFIX) {
        Some(stem) if !stem.is_empty() && !stem.ends_with(['/', '\\']) => PathBuf::from(stem),
        _ => {
            let mut name = OsString::from(input.as_os_str());
            name.push(DECRYPTED_SUFFIX);
            PathBuf::from(name)
        }
    }
}

/// Temp file beside `dest`, persisted only once the whole stream succeeded.
fn begin_output(dest: &Path, force: bool) -> Result<tempfile::NamedTempFile> {
    if dest.exists() && !force {
        anyhow::bail!("{} already exists (use --force to replace it)", dest.display());
    }
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(".encsvc-")
        .tempfile_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))
}

fn finish_output(tmp: tempfile::NamedTempFile, dest: &Path) -> Result<()> {
    tmp.as_file().sync_all().context("syncing output")?;
    tmp.persist(dest)
        .with_context(|| format!("writing {}", dest.display()))?;
    Ok(())
}

// ── Progress bars ─────────────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str, quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}"
        )?
        .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

// ── `encsvc keygen` ───────────────────────────────────────────────────────────

fn cmd_keygen(algorithm: &str, length: Option<usize>, output: Option<&Path>) -> Result<()> {
    let algorithm: AlgorithmSpec = algorithm.parse()?;
    let length = length.unwrap_or_else(|| algorithm.default_key_length());
    encsvc_crypto::validate_length(algorithm, length)?;
    let generated = encsvc_crypto::generate_key(algorithm, length)?;

    let Some(path) = output else {
        println!("{}", generated.expose_key());
        if let Some(public) = &generated.public_key {
            print!("{public}");
        }
        return Ok(());
    };

    write_private(path, generated.expose_key())?;
    eprintln!("{algorithm} key ({length}) written to {}", path.display());
    if let Some(public) = &generated.public_key {
        let mut pub_path = OsString::from(path.as_os_str());
        pub_path.push(".pub");
        let pub_path = PathBuf::from(pub_path);
        std::fs::write(&pub_path, public)
            .with_context(|| format!("writing {}", pub_path.display()))?;
        eprintln!("public key written to {}", pub_path.display());
    }
    Ok(())
}

/// Create `path` readable by the owner only and write `secret` to it.
fn write_private(path: &Path, secret: &str) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("creating {}", path.display()))?;
    file.write_all(secret.as_bytes())?;
    if !secret.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    Ok(())
}

// ── `encsvc encrypt` ──────────────────────────────────────────────────────────

fn cmd_encrypt(
    config: &EncsvcConfig,
    input: &Path,
    algorithm: &str,
    output: &Path,
    force: bool,
    key_args: &KeyArgs,
    quiet: bool,
) -> Result<()> {
    let algorithm: AlgorithmSpec = algorithm.parse()?;
    let key = read_key(key_args, KeyPurpose::Encrypt)?;
    let opts = SealOptions::from(&config.crypto);

    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let total = file.metadata()?.len();
    let tmp = begin_output(output, force)?;

    let pb = make_progress_bar(total, "encrypt", quiet)?;
    let mut reader = BufReader::new(pb.wrap_read(file));
    let mut writer = BufWriter::new(tmp.as_file());
    let plaintext = adapter_for(algorithm)
        .encrypt_stream(&mut reader, &mut writer, &key, &opts)
        .with_context(|| format!("encrypting {}", input.display()))?;
    writer.flush()?;
    drop(writer);
    pb.finish_and_clear();

    finish_output(tmp, output)?;
    tracing::info!(%algorithm, plaintext, output = %output.display(), "encrypted");
    println!("{} -> {} ({algorithm}, {plaintext} bytes)", input.display(), output.display());
    Ok(())
}

// ── `encsvc decrypt` ──────────────────────────────────────────────────────────

fn cmd_decrypt(
    input: &Path,
    algorithm: Option<&str>,
    output: &Path,
    force: bool,
    key_args: &KeyArgs,
    quiet: bool,
) -> Result<()> {
    let recorded = read_header(input)?.algorithm;
    let algorithm = match algorithm {
        Some(name) => name.parse::<AlgorithmSpec>()?,
        None => recorded,
    };
    let key = read_key(key_args, KeyPurpose::Decrypt)?;

    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let total = file.metadata()?.len();
    let tmp = begin_output(output, force)?;

    let pb = make_progress_bar(total, "decrypt", quiet)?;
    let mut reader = BufReader::new(pb.wrap_read(file));
    let mut writer = BufWriter::new(tmp.as_file());
    // On failure `tmp` is dropped and the partial plaintext removed
    let plaintext = adapter_for(algorithm)
        .decrypt_stream(&mut reader, &mut writer, &key)
        .with_context(|| format!("decrypting {}", input.display()))?;
    writer.flush()?;
    drop(writer);
    pb.finish_and_clear();

    finish_output(tmp, output)?;
    tracing::info!(%algorithm, plaintext, output = %output.display(), "decrypted");
    println!("{} -> {} ({algorithm}, {plaintext} bytes)", input.display(), output.display());
    Ok(())
}

// ── `encsvc inspect` ──────────────────────────────────────────────────────────

fn read_header(input: &Path) -> Result<Header> {
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let mut reader = BufReader::new(file);
    let (header, _) = Header::read_from(&mut reader)
        .with_context(|| format!("reading header of {}", input.display()))?;
    Ok(header)
}

fn cmd_inspect(input: &Path, json: bool) -> Result<()> {
    let header = read_header(input)?;
    let size = std::fs::metadata(input)?.len();

    if json {
        let mut doc = serde_json::json!({
            "file": input.display().to_string(),
            "size_bytes": size,
            "algorithm": header.algorithm,
            "key_source": header.key_source.describe(),
            "frame_size": header.frame_size,
        });
        match &header.key_source {
            KeySource::Passphrase { params, .. } => {
                doc["argon2"] = serde_json::json!({
                    "mem_cost_kib": params.mem_cost_kib,
                    "time_cost": params.time_cost,
                    "parallelism": params.parallelism,
                });
            }
            KeySource::RsaWrapped { wrapped_key } => {
                doc["wrapped_key_bytes"] = wrapped_key.len().into();
            }
            KeySource::Raw => {}
        }
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("File:        {}", input.display());
    println!("Size:        {size} bytes");
    println!("Algorithm:   {}", header.algorithm);
    println!("Key source:  {}", header.key_source.describe());
    println!("Frame size:  {} bytes", header.frame_size);
    match &header.key_source {
        KeySource::Passphrase { params, .. } => println!(
            "Argon2id:    m={} KiB, t={}, p={}",
            params.mem_cost_kib, params.time_cost, params.parallelism
        ),
        KeySource::RsaWrapped { wrapped_key } => {
            println!("Wrapped key: {} bytes", wrapped_key.len())
        }
        KeySource::Raw => {}
    }
    Ok(())
}

// ── `encsvc config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &EncsvcConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config)
        .context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
