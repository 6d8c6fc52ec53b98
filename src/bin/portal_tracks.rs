use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use portal_tracks::app::{App, IndexResult};
use portal_tracks::auth::EnvTokenProvider;
use portal_tracks::bridge::{DesktopBridgeClient, HttpBridgeTransport};
use portal_tracks::clock::SystemClock;
use portal_tracks::config::{ConfigLoader, ResolvedConfig};
use portal_tracks::domain::{RemoteObjectRef, RestoreTier};
use portal_tracks::error::PortalError;
use portal_tracks::locator::StorageObjectLocator;
use portal_tracks::output::JsonOutput;
use portal_tracks::portal::{Disposition, PortalHttpClient, PresignOptions};

type HttpApp = App<PortalHttpClient<EnvTokenProvider>, HttpBridgeTransport, SystemClock>;

#[derive(Parser)]
#[command(name = "portal-tracks")]
#[command(about = "Remote file access and genome-browser track tooling for the data portal")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Derive the index file path for a base file")]
    Index(IndexArgs),
    #[command(flatten)]
    Portal(PortalCommands),
}

/// Commands that talk to the portal or the desktop companion.
#[derive(Subcommand)]
enum PortalCommands {
    #[command(about = "Show the archive status of an object")]
    Status(ObjectArgs),
    #[command(about = "Issue a presigned URL for an object")]
    Presign(PresignArgs),
    #[command(about = "Request a restore of an archived object")]
    Restore(RestoreArgs),
    #[command(about = "Compose the track name for a path")]
    Name(NameArgs),
    #[command(about = "Open an object in the desktop genome browser")]
    Open(OpenArgs),
}

#[derive(Args)]
struct ObjectArgs {
    /// s3://bucket/key#id or gds://volume/path#id
    object: String,
}

#[derive(Args)]
struct PresignArgs {
    object: String,

    #[arg(long)]
    attachment: bool,

    #[arg(long)]
    content_type: Option<String>,
}

#[derive(Args)]
struct RestoreArgs {
    object: String,

    #[arg(long)]
    days: Option<u32>,

    #[arg(long)]
    tier: Option<RestoreTier>,
}

#[derive(Args)]
struct NameArgs {
    path: String,

    #[arg(long)]
    subject: String,
}

#[derive(Args)]
struct IndexArgs {
    path: String,
}

#[derive(Args)]
struct OpenArgs {
    object: String,

    #[arg(long)]
    subject: String,
}

fn map_exit_code(error: &PortalError) -> u8 {
    match error {
        PortalError::InvalidObjectRef(_)
        | PortalError::NoIndexAvailable(_)
        | PortalError::UnsupportedTrackFormat(_)
        | PortalError::MissingConfig
        | PortalError::ConfigRead(_)
        | PortalError::ConfigParse(_)
        | PortalError::InvalidConfig(_)
        | PortalError::TokenUnavailable(_) => 2,
        PortalError::StatusUnavailable { .. }
        | PortalError::RestoreRejected { .. }
        | PortalError::PresignFailed { .. }
        | PortalError::IndexObjectNotFound(_)
        | PortalError::PortalHttp(_)
        | PortalError::PortalStatus { .. } => 3,
        PortalError::NeedsRestore { .. } | PortalError::BridgeUnreachable { .. } => 4,
        _ => 1,
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(portal) = report.downcast_ref::<PortalError>() {
            return ExitCode::from(map_exit_code(portal));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Index(args) => {
            let result = IndexResult::for_path(&args.path)?;
            return JsonOutput::print(&result).into_diagnostic();
        }
        Commands::Portal(command) => command,
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    runtime.block_on(async move {
        let app = build_app(&config)?;
        run_command(command, app, config).await
    })
}

fn build_app(config: &ResolvedConfig) -> Result<HttpApp, PortalError> {
    let portal = PortalHttpClient::new(&config.api_base_url, EnvTokenProvider)?;
    let locator = StorageObjectLocator::with_clock(
        portal,
        SystemClock,
        config.presign_cache_ttl,
        config.presign_cache_capacity,
    );
    let bridge = DesktopBridgeClient::new(config.bridge_port)?;
    Ok(App::new(Arc::new(locator), bridge, config.restore_gated))
}

async fn run_command(
    command: PortalCommands,
    app: HttpApp,
    config: ResolvedConfig,
) -> miette::Result<()> {
    match command {
        PortalCommands::Status(args) => {
            let object = parse_object(&args.object)?;
            let result = app.status(&object).await?;
            JsonOutput::print(&result).into_diagnostic()
        }
        PortalCommands::Presign(args) => {
            let object = parse_object(&args.object)?;
            let options = PresignOptions {
                disposition: if args.attachment {
                    Disposition::Attachment
                } else {
                    Disposition::Inline
                },
                content_type: args.content_type,
            };
            let result = app.presign(&object, &options).await?;
            JsonOutput::print(&result).into_diagnostic()
        }
        PortalCommands::Restore(args) => {
            let object = parse_object(&args.object)?;
            let days = args.days.unwrap_or(config.restore_days);
            let tier = args.tier.unwrap_or(config.restore_tier);
            let result = app.restore(&object, days, tier).await?;
            JsonOutput::print(&result).into_diagnostic()
        }
        PortalCommands::Name(args) => {
            let result = app.name(&args.path, &args.subject).await?;
            JsonOutput::print(&result).into_diagnostic()
        }
        PortalCommands::Open(args) => {
            let object = parse_object(&args.object)?;
            let result = app.open(&object, &args.subject).await?;
            JsonOutput::print(&result).into_diagnostic()?;
            Ok(result.outcome.into_result()?)
        }
    }
}

fn parse_object(raw: &str) -> miette::Result<RemoteObjectRef> {
    Ok(raw.parse::<RemoteObjectRef>()?)
}
