use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use vetiverde::acquisition;
use vetiverde::config::AppConfig;
use vetiverde::decoder::KamadakDecoder;
use vetiverde::device::{FileImageSource, FixedLocation, GeoFix};
use vetiverde::identity_clients::appwrite::AppwriteIdentity;
use vetiverde::metadata::NormalizedRecord;
use vetiverde::normalizer::{Normalizer, TimePolicy};
use vetiverde::session::{SessionContext, SessionState};
use vetiverde::submission::{HttpSubmitter, Submitter};

#[derive(Parser, Debug)]
#[command(name = "vetiverde", about = "Georeference waste photos and submit them for classification")]
struct Cli {
    #[command(flatten)]
    auth: AuthArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct AuthArgs {
    /// Owner id to stamp on records, bypassing the identity backend
    #[arg(long, global = true)]
    owner: Option<String>,

    #[arg(long, global = true, requires = "password")]
    email: Option<String>,

    #[arg(long, global = true, requires = "email")]
    password: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a photo from the library, reading position and date from EXIF
    Import {
        file: PathBuf,
        /// JSON tag dump to use instead of decoding the file's EXIF
        #[arg(long)]
        tags: Option<PathBuf>,
        #[arg(long)]
        submit: bool,
        /// Print the full submission payload
        #[arg(long)]
        json: bool,
    },
    /// Treat a file as a fresh camera shot taken at the given position
    Capture {
        file: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,
        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,
        #[arg(long)]
        submit: bool,
        #[arg(long)]
        json: bool,
    },
    /// Manage the identity session
    #[command(subcommand)]
    Session(SessionCommand),
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    Check,
    Register {
        #[arg(long)]
        name: String,
    },
    Recover {
        email: String,
    },
    Signout,
}

async fn resolve_owner(
    auth: &AuthArgs,
    session: &mut SessionContext<AppwriteIdentity>,
) -> Result<Option<String>> {
    if let Some(owner) = &auth.owner {
        return Ok(Some(owner.clone()));
    }
    if let (Some(email), Some(password)) = (&auth.email, &auth.password) {
        session.signin(email, password).await?;
    } else {
        session.check_auth().await;
    }
    Ok(session.owner_id().map(str::to_string))
}

async fn finish(
    record: NormalizedRecord,
    submit: bool,
    json: bool,
    config: &AppConfig,
) -> Result<()> {
    let payload = record.to_payload();
    if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("Latitude: {:.6}", payload.latitude);
        println!("Longitude: {:.6}", payload.longitude);
        println!("Date taken: {}", payload.date_taken);
    }

    if submit {
        HttpSubmitter::new(&config.submission_url)?
            .submit(&record)
            .await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::new()?;

    env_logger::Builder::new()
        .filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    info!("Starting vetiverde");

    let normalizer = Normalizer::new(TimePolicy::from_config(&config)?);
    let identity = AppwriteIdentity::new(&config.identity)?;
    let mut session = SessionContext::new(identity, config.identity.recovery_url.clone());

    match cli.command {
        Command::Import { file, tags, submit, json } => {
            let owner = resolve_owner(&cli.auth, &mut session).await?;
            let result = match tags {
                Some(tags_path) => {
                    let tags_json = tokio::fs::read_to_string(&tags_path).await?;
                    let file_bytes = tokio::fs::read(&file).await?;
                    acquisition::import_with_tags(file_bytes, Some(&tags_json), &normalizer, owner.as_deref())
                }
                None => {
                    acquisition::import_from_file(&file, &KamadakDecoder, &normalizer, owner.as_deref()).await
                }
            };
            let record = result.map_err(|e| anyhow!("{}", e.notice()))?;
            finish(record, submit, json, &config).await?;
        }
        Command::Capture { file, latitude, longitude, submit, json } => {
            let owner = resolve_owner(&cli.auth, &mut session).await?;
            let source = FileImageSource { path: file };
            let location = FixedLocation {
                fix: GeoFix { latitude, longitude },
            };
            let record = acquisition::capture_live(&source, &location, &normalizer, owner.as_deref())
                .await
                .map_err(|e| anyhow!("{}", e.notice()))?;
            finish(record, submit, json, &config).await?;
        }
        Command::Session(command) => {
            match command {
                SessionCommand::Check => {
                    resolve_owner(&cli.auth, &mut session).await?;
                }
                SessionCommand::Register { name } => {
                    let (Some(email), Some(password)) = (&cli.auth.email, &cli.auth.password) else {
                        return Err(anyhow!("register needs --email and --password"));
                    };
                    session.register(&name, email, password).await?;
                }
                SessionCommand::Recover { email } => session.reset_password(&email).await?,
                SessionCommand::Signout => {
                    resolve_owner(&cli.auth, &mut session).await?;
                    session.signout().await;
                }
            }
            match session.state() {
                SessionState::Authenticated { account, .. } => {
                    println!("Signed in as {} <{}> ({})", account.name, account.email, account.id)
                }
                _ => println!("Not signed in"),
            }
        }
    }

    info!("Vetiverde finished");

    Ok(())
}
