use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facemark_core::{mask_identity, CancelFlag, FaceEngine, FaceMaterial, RawImage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod store;

use config::Config;
use store::FaceStore;

#[derive(Parser)]
#[command(name = "facemark", about = "Facemark face enrollment and login CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the descriptor of an image as JSON
    Extract {
        /// Image file (PNG/JPEG, or a text file holding a data URL)
        image: PathBuf,
    },
    /// Compare two images
    Compare { a: PathBuf, b: PathBuf },
    /// Enroll a face under an identity
    Enroll {
        /// Identity to enroll (e.g. an email address)
        identity: String,
        image: PathBuf,
    },
    /// Match a face against all enrolled identities
    Login { image: PathBuf },
    /// List enrolled faces
    List,
    /// Remove an enrolled face
    Remove { identity: String },
    /// Show store and policy status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let engine = FaceEngine::new(config.matching);

    match cli.command {
        Commands::Extract { image } => {
            let descriptor = engine
                .extract(&read_image(&image)?)
                .await
                .with_context(|| format!("extracting descriptor from {}", image.display()))?;
            println!("{}", serde_json::to_string(&descriptor)?);
        }
        Commands::Compare { a, b } => {
            let similarity = engine
                .compare_images(&read_image(&a)?, &read_image(&b)?)
                .await;
            println!("similarity: {:.2}%", similarity.percent);
            if similarity.is_low_confidence() {
                println!("low confidence: at least one image could not be decoded");
            }
        }
        Commands::Enroll { identity, image } => {
            let store = FaceStore::open(&config.db_path)?;
            if store.contains(&identity)? {
                bail!("{} is already enrolled", mask_identity(&identity));
            }
            let capture = read_image(&image)?;
            let records = store.list_records()?;

            let cancel = cancel_on_ctrl_c();
            let check = engine
                .check_enrollment(&capture, &records, &cancel)
                .await?;
            if check.duplicate {
                let masked = check.masked_identity().unwrap_or_default();
                bail!("this face is already enrolled as {masked}");
            }

            let material = match engine.extract(&capture).await {
                Ok(descriptor) => FaceMaterial::Descriptor(descriptor),
                Err(e) => {
                    tracing::warn!(error = %e, "storing raw capture; descriptor unavailable");
                    FaceMaterial::Image(capture)
                }
            };
            let id = store.insert(&identity, &material)?;
            println!("Enrolled {} ({id})", mask_identity(&identity));
        }
        Commands::Login { image } => {
            let store = FaceStore::open(&config.db_path)?;
            let capture = read_image(&image)?;
            let records = store.list_records()?;

            let cancel = cancel_on_ctrl_c();
            let result = engine.match_login(&capture, &records, &cancel).await?;
            if !result.matched {
                bail!(
                    "no matching face (best {:.2}%, threshold {:.2}%)",
                    result.best_score,
                    engine.config().match_threshold
                );
            }
            let identity = result.identity.as_deref().unwrap_or_default();
            println!("Matched {identity} ({:.2}%)", result.best_score);
            if result.is_low_confidence() {
                println!("low confidence: matched on raw payload comparison");
            }
        }
        Commands::List => {
            let faces = FaceStore::open(&config.db_path)?.list()?;
            if faces.is_empty() {
                println!("No faces enrolled");
            }
            for face in faces {
                println!(
                    "{}  {:<32}  {:<10}  {}",
                    face.id,
                    mask_identity(&face.identity),
                    face.material,
                    face.created_at
                );
            }
        }
        Commands::Remove { identity } => {
            if FaceStore::open(&config.db_path)?.remove(&identity)? {
                println!("Removed {}", mask_identity(&identity));
            } else {
                bail!("{} is not enrolled", mask_identity(&identity));
            }
        }
        Commands::Status => {
            let enrolled = FaceStore::open(&config.db_path)?.count()?;
            let status = serde_json::json!({
                "db_path": config.db_path,
                "enrolled": enrolled,
                "matching": engine.config(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

fn read_image(path: &Path) -> Result<RawImage> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(RawImage::new(bytes))
}

/// Cancel flag raised when the user presses Ctrl-C.
fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; cancelling scan");
            flag.cancel();
        }
    });
    cancel
}
