use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use teamsight_core::color::{self, DEFAULT_SATURATION_THRESHOLD};
use teamsight_core::quantizer::DEFAULT_CLUSTERS;
use teamsight_core::{team, ColorQuantizer, KmeansQuantizer};
use teamsight_store::SqliteSessionStore;

#[derive(Parser)]
#[command(name = "teamsight", about = "Teamsight session inspection and color diagnostics")]
struct Cli {
    /// Session database path
    #[arg(long, env = "TEAMSIGHT_DB_PATH", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recorded sessions, newest first
    Sessions {
        /// Maximum number of sessions to print
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Only sessions that have not been closed
        #[arg(long)]
        open: bool,
    },
    /// Classify the dominant colors of an image treated as a shirt region
    Classify {
        image: PathBuf,
        #[arg(long, default_value_t = DEFAULT_SATURATION_THRESHOLD)]
        saturation_threshold: f32,
        #[arg(long, default_value_t = DEFAULT_CLUSTERS)]
        clusters: usize,
        /// Seed for cluster initialization
        #[arg(long)]
        seed: Option<u64>,
        /// Longest side the region is downscaled to before clustering
        #[arg(long)]
        max_side: Option<u32>,
    },
    /// Check that the session store opens and has its schema
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(teamsight_store::default_db_path);

    match cli.command {
        Commands::Sessions { limit, open } => {
            let store = SqliteSessionStore::open(&db_path)
                .await
                .with_context(|| format!("opening {}", db_path.display()))?;
            let sessions = if open {
                let mut sessions = store.list_open().await?;
                sessions.truncate(limit);
                sessions
            } else {
                store.list(limit).await?
            };
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        Commands::Classify {
            image,
            saturation_threshold,
            clusters,
            seed,
            max_side,
        } => {
            let region = image::open(&image)
                .with_context(|| format!("loading {}", image.display()))?
                .to_rgb8();

            let mut quantizer = KmeansQuantizer::new(clusters);
            if let Some(seed) = seed {
                quantizer = quantizer.with_seed(seed);
            }
            if let Some(max_side) = max_side {
                quantizer = quantizer.with_max_side(max_side);
            }

            let dominant = quantizer.dominant_colors(&region)?;
            let names: Vec<_> = dominant
                .iter()
                .map(|d| color::classify_rgb(d.color, saturation_threshold))
                .collect();
            let colors: Vec<_> = dominant
                .iter()
                .zip(&names)
                .map(|(d, name)| {
                    json!({
                        "color": name,
                        "rating": d.share,
                        "rgb": d.color.to_hex(),
                    })
                })
                .collect();

            let report = json!({
                "image": image.display().to_string(),
                "colors": colors,
                "team": team::infer_team(names.iter().copied()),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Health => {
            let store = SqliteSessionStore::open(&db_path)
                .await
                .with_context(|| format!("opening {}", db_path.display()))?;
            let healthy = store.is_healthy().await;
            println!(
                "{}",
                json!({ "db_path": db_path.display().to_string(), "healthy": healthy })
            );
            if !healthy {
                bail!("session store at {} is not healthy", db_path.display());
            }
        }
    }

    Ok(())
}
