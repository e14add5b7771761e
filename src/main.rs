mod browser;
mod capture;
mod catalog;
mod config;
mod export;
mod extract;
mod pipeline;

use std::time::Instant;

use anyhow::bail;
use clap::{Parser, Subcommand};

use crate::config::{Config, CropPolicy};

#[derive(Parser)]
#[command(name = "forms_archiver", about = "Legal-form catalog scraper and document archiver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the catalog listing and persist it with all entries pending
    Init,
    /// Process every pending catalog entry in order
    Run {
        /// Max entries to process (default: all pending)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Zip each per-item folder and delete the raw folder
        #[arg(long)]
        archive: bool,
        /// Screenshot framing: full page, preview region, or OCR text-bottom crop
        #[arg(long, value_enum)]
        crop: Option<CropPolicy>,
        /// Emphasize breadcrumb / trust lines in the generated document
        #[arg(long)]
        highlight: bool,
        /// Run the browser with a visible window
        #[arg(long)]
        headful: bool,
    },
    /// Show catalog progress counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => {
            let cfg = Config::default();
            if cfg.catalog_path.exists() {
                bail!(
                    "{} already exists; delete it to refetch the catalog",
                    cfg.catalog_path.display()
                );
            }
            let session = browser::Session::launch(&cfg).await?;
            let outcome = catalog::load_or_bootstrap(&session, &cfg).await;
            session.close().await?;
            let entries = outcome?;
            println!(
                "Persisted {} catalog entries to {}",
                entries.len(),
                cfg.catalog_path.display()
            );
            Ok(())
        }
        Commands::Run { limit, archive, crop, highlight, headful } => {
            let mut cfg = Config::default();
            cfg.archive = archive;
            cfg.highlight = highlight;
            cfg.headless = !headful;
            if let Some(crop) = crop {
                cfg.crop = crop;
            }

            let session = browser::Session::launch(&cfg).await?;
            let outcome = run_pipeline(&session, &cfg, limit).await;
            session.close().await?;
            let stats = outcome?;
            stats.print();
            Ok(())
        }
        Commands::Stats => {
            let cfg = Config::default();
            let entries = catalog::load(&cfg.catalog_path)?;
            let pending = catalog::pending_count(&entries);
            println!("Total:   {}", entries.len());
            println!("Pending: {}", pending);
            println!("Done:    {}", entries.len() - pending);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run_pipeline(
    session: &browser::Session,
    cfg: &Config,
    limit: Option<usize>,
) -> anyhow::Result<pipeline::RunStats> {
    let mut entries = catalog::load_or_bootstrap(session, cfg).await?;
    if entries.is_empty() {
        println!("Catalog is empty. Nothing to do.");
        return Ok(pipeline::RunStats { processed: 0, failed: 0, skipped: 0 });
    }
    if catalog::pending_count(&entries) == 0 {
        println!("All catalog entries are done. Nothing to process.");
        return Ok(pipeline::RunStats { processed: 0, failed: 0, skipped: entries.len() });
    }
    pipeline::run(session, cfg, &mut entries, limit).await
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
