//! Command-line interface for building Apple Wallet passes.
//!
//! Builds signed `.pkpass` archives from a `pass.json` and asset files,
//! packs existing passes into `.pkpasses` bundles, and sends update pushes.

use clap::{Args, Parser, Subcommand};
use pkpass::{PassBuilder, PassBundle, PassData, PushNotifier, SignedPass, SigningAssets};
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pkpass")]
#[command(about = "Apple Wallet pass signing and packaging tool")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build and sign a single .pkpass
    Create(CreateArgs),
    /// Pack existing .pkpass files into a .pkpasses bundle
    Bundle(BundleArgs),
    /// Send an update notification for a pass
    Push(PushArgs),
}

#[derive(Args)]
struct CreateArgs {
    /// pass.json document
    #[arg(short, long)]
    data: PathBuf,

    /// Asset file to include (repeatable)
    #[arg(short, long = "asset")]
    assets: Vec<PathBuf>,

    /// Localized asset as LANG=FILE (repeatable)
    #[arg(long = "locale-asset", value_parser = parse_locale_asset)]
    locale_assets: Vec<(String, PathBuf)>,

    /// PKCS#12 file (.p12)
    #[arg(short = 'p', long, conflicts_with_all = ["certificate", "private_key"])]
    pkcs12: Option<PathBuf>,

    /// Certificate file (PEM format)
    #[arg(short = 'c', long, requires = "private_key")]
    certificate: Option<PathBuf>,

    /// Private key file (PEM format)
    #[arg(short = 'k', long, requires = "certificate")]
    private_key: Option<PathBuf>,

    /// Password for private key or PKCS#12
    #[arg(long, env = "PKPASS_PASSWORD")]
    password: Option<String>,

    /// Apple WWDR intermediate certificate (PEM or DER)
    #[arg(short, long)]
    wwdr: Option<PathBuf>,

    /// ZIP compression level (0-9, default: 6)
    #[arg(short = 'z', long, default_value = "6")]
    zip_level: u32,

    /// Output file
    #[arg(short, long, default_value = "pass.pkpass")]
    output: PathBuf,
}

#[derive(Args)]
struct BundleArgs {
    /// Signed .pkpass files, in bundle order
    #[arg(required = true)]
    passes: Vec<PathBuf>,

    /// Directory for the scratch archive
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// ZIP compression level (0-9, default: 6)
    #[arg(short = 'z', long, default_value = "6")]
    zip_level: u32,

    /// Output file
    #[arg(short, long, default_value = "passes.pkpasses")]
    output: PathBuf,
}

#[derive(Args)]
struct PushArgs {
    /// Pass type identifier (apns-topic)
    #[arg(long, env = "PKPASS_PUSH_BUNDLE_ID")]
    bundle_id: String,

    /// APNs auth key id
    #[arg(long, env = "PKPASS_PUSH_KEY_ID")]
    key_id: String,

    /// Developer team id
    #[arg(long, env = "PKPASS_PUSH_TEAM_ID")]
    team_id: String,

    /// APNs auth key (.p8)
    #[arg(long, env = "PKPASS_PUSH_AUTH_KEY")]
    auth_key: PathBuf,

    /// Use the development gateway
    #[arg(long)]
    sandbox: bool,

    /// Device push token
    token: String,

    /// Alert title
    title: String,

    /// Alert body
    body: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Create(args) => create(args),
        Command::Bundle(args) => bundle(args),
        Command::Push(args) => push(args),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "pkpass=debug,info",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn create(args: CreateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let signer = load_signer(&args)?;

    let json = std::fs::read_to_string(&args.data)?;
    let mut builder = PassBuilder::new(&signer)
        .compression_level(args.zip_level)
        .set_data(PassData::from_json(&json)?);

    for asset in &args.assets {
        builder = builder.add_file(asset, None)?;
    }
    for (language, asset) in &args.locale_assets {
        builder = builder.add_locale_file(language, asset, None)?;
    }

    builder.write_to_file(&args.output)?;
    info!(output = %args.output.display(), "pass written");
    println!("Created: {}", args.output.display());
    Ok(())
}

fn bundle(args: BundleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut bundle = PassBundle::new().compression_level(args.zip_level);
    if let Some(dir) = args.temp_dir {
        bundle = bundle.temp_dir(dir);
    }

    for path in &args.passes {
        bundle = bundle.add(SignedPass::from_bytes(std::fs::read(path)?)?);
    }

    bundle.write_to_file(&args.output)?;
    println!(
        "Bundled {} passes: {}",
        bundle.len(),
        args.output.display()
    );
    Ok(())
}

fn push(args: PushArgs) -> Result<(), Box<dyn std::error::Error>> {
    let notifier = PushNotifier::new()
        .bundle_id(args.bundle_id)
        .key_id(args.key_id)
        .team_id(args.team_id)
        .auth_key_path(args.auth_key)
        .production(!args.sandbox);

    let response = notifier.push(&args.token, &args.title, &args.body)?;
    println!("Delivered (HTTP {})", response.status);
    Ok(())
}

fn load_signer(args: &CreateArgs) -> Result<SigningAssets, Box<dyn std::error::Error>> {
    let password = args.password.clone().map(SecretString::new);

    let signer = if let Some(ref p12_path) = args.pkcs12 {
        SigningAssets::from_p12(p12_path, password.as_ref())?
    } else if let (Some(cert_path), Some(key_path)) = (&args.certificate, &args.private_key) {
        SigningAssets::from_pem(cert_path, key_path, password.as_ref())?
    } else {
        return Err("Must provide either --pkcs12 or both --certificate and --private-key".into());
    };

    match &args.wwdr {
        Some(wwdr) => Ok(signer.with_wwdr_certificate(wwdr)?),
        None => Ok(signer),
    }
}

fn parse_locale_asset(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((language, path)) if !language.is_empty() && !path.is_empty() => {
            Ok((language.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected LANG=FILE, got '{}'", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_locale_asset() {
        assert_eq!(
            parse_locale_asset("fr=strings/fr.strings").unwrap(),
            ("fr".to_string(), PathBuf::from("strings/fr.strings"))
        );
        assert!(parse_locale_asset("fr").is_err());
        assert!(parse_locale_asset("=file").is_err());
    }

    #[test]
    fn test_bundle_args() {
        let cli = Cli::try_parse_from(["pkpass", "bundle", "a.pkpass", "b.pkpass", "-o", "out.pkpasses"])
            .unwrap();
        match cli.command {
            Command::Bundle(args) => {
                assert_eq!(args.passes.len(), 2);
                assert_eq!(args.output, PathBuf::from("out.pkpasses"));
            }
            _ => panic!("expected bundle command"),
        }
    }

    #[test]
    fn test_bundle_requires_passes() {
        assert!(Cli::try_parse_from(["pkpass", "bundle"]).is_err());
    }
}
