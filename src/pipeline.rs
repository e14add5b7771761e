use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::browser::Session;
use crate::capture;
use crate::catalog::{self, CatalogEntry, Status};
use crate::config::Config;
use crate::export::{self, ExportResult};
use crate::extract::{self, clean_text, ExtractedDocument};

const EXPAND_BUTTON: &str = "button.expand-button";
const TITLE_HEADING: &str = "h1.document-title";
const DEFINITIONS_BLOCK: &str = "div.definitions";
const FAQ_SECTION: &str = "section#seoFaqSection";
const BREADCRUMB_LIST: &str = "ol.breadcrumb-section-container";
const TRUST_COPY: &str = "span.trust-copy";
const CLOSE_BUTTON: &str = "button.close-button";

const SUMMARY_FILE: &str = "Summary.csv";

pub struct RunStats {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunStats {
    pub fn print(&self) {
        println!(
            "Done: {} processed, {} failed, {} skipped (already done).",
            self.processed, self.failed, self.skipped
        );
    }
}

/// Drive every pending catalog entry through extract -> capture -> export,
/// strictly in catalog order. The catalog file is rewritten after each
/// success and the summary CSV after each item, so both always reflect all
/// work completed so far.
pub async fn run(
    session: &Session,
    cfg: &Config,
    entries: &mut [CatalogEntry],
    limit: Option<usize>,
) -> Result<RunStats> {
    fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("failed to create {}", cfg.output_dir.display()))?;

    let todo = pending_indices(entries, limit);
    let pb = ProgressBar::new(todo.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut stats = RunStats {
        processed: 0,
        failed: 0,
        skipped: entries.len() - catalog::pending_count(entries),
    };
    let mut results: Vec<ExportResult> = Vec::new();

    for i in todo {
        let delay = rand::rng().random_range(cfg.min_item_delay..cfg.max_item_delay);
        tokio::time::sleep(Duration::from_secs_f64(delay)).await;

        let entry = entries[i].clone();
        info!("Processing document {}: {}", i + 1, entry.name);
        match process_entry(session, cfg, &entry).await {
            Ok(result) => {
                info!("Completed: {}", result.form_title);
                entries[i].status = Status::Done;
                catalog::persist(&cfg.catalog_path, entries)?;
                results.push(result);
                export::write_summary(&cfg.output_dir.join(SUMMARY_FILE), &results)?;
                stats.processed += 1;
            }
            Err(e) => {
                warn!("Skipped {}: {e:#}", entry.url);
                stats.failed += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Run finished: {} processed, {} failed, {} already done",
        stats.processed, stats.failed, stats.skipped
    );
    Ok(stats)
}

/// Indices of the entries this run will attempt: `done` entries are never
/// selected, order is catalog order, and `limit` caps the count.
fn pending_indices(entries: &[CatalogEntry], limit: Option<usize>) -> Vec<usize> {
    let pending = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.status == Status::Pending)
        .map(|(i, _)| i);
    match limit {
        Some(n) => pending.take(n).collect(),
        None => pending.collect(),
    }
}

/// Process one catalog entry. Any error here fails the whole item; partial
/// files in its folder are left behind for the next run to overwrite.
async fn process_entry(
    session: &Session,
    cfg: &Config,
    entry: &CatalogEntry,
) -> Result<ExportResult> {
    session
        .navigate_with_retry(&entry.url, EXPAND_BUTTON, cfg)
        .await?;

    let folder_name = export::sanitize_name(&entry.name, &entry.url);
    let folder = cfg.output_dir.join(&folder_name);
    fs::create_dir_all(&folder)
        .with_context(|| format!("failed to create {}", folder.display()))?;

    // A title is always produced once the page has loaded.
    let title = extract::meta::resolve_title(
        session.text_of(TITLE_HEADING).await?.as_deref(),
        &session.document_title().await?,
    );

    session.force_click(EXPAND_BUTTON).await?;
    session
        .wait_for(capture::DOCUMENT_REGION, cfg.nav_timeout)
        .await?;
    tokio::time::sleep(cfg.settle_delay).await;

    let png = capture::capture(session, cfg).await?;
    let screenshot_path = folder.join(format!("{folder_name}.png"));
    fs::write(&screenshot_path, &png)
        .with_context(|| format!("failed to write {}", screenshot_path.display()))?;

    let doc = extract_fields(session, title).await?;

    let docx_path = folder.join(format!("{folder_name}_Writer.docx"));
    export::write_docx(&doc, &entry.name, &docx_path, cfg.highlight)?;

    session.dismiss_overlay(CLOSE_BUTTON).await;

    if cfg.archive {
        let zip_path = export::archive_and_cleanup(&folder)?;
        Ok(ExportResult {
            link_name: entry.name.clone(),
            form_title: doc.title,
            docx_path: archived_path(&zip_path, &docx_path),
            screenshot_path: archived_path(&zip_path, &screenshot_path),
        })
    } else {
        Ok(ExportResult {
            link_name: entry.name.clone(),
            form_title: doc.title,
            docx_path: docx_path.display().to_string(),
            screenshot_path: screenshot_path.display().to_string(),
        })
    }
}

/// Pull the optional fields off the live page. Each absence is logged and
/// leaves the field empty; none of them fails the item.
async fn extract_fields(session: &Session, title: String) -> Result<ExtractedDocument> {
    let mut definitions = Vec::new();

    match session.inner_html(DEFINITIONS_BLOCK).await {
        Ok(Some(html)) => definitions.extend(extract::definitions::parse(&html)),
        Ok(None) => debug!("No definitions block on page"),
        Err(e) => warn!("Error reading definitions block: {e}"),
    }

    match session.inner_html(FAQ_SECTION).await {
        Ok(Some(html)) => definitions.extend(extract::faq::parse(&html)),
        Ok(None) => debug!("No FAQ section on page"),
        Err(e) => warn!("Error reading FAQ section: {e}"),
    }

    let breadcrumb = match session.inner_html(BREADCRUMB_LIST).await {
        Ok(Some(html)) => extract::meta::breadcrumb(&html).unwrap_or_default(),
        Ok(None) => {
            debug!("No breadcrumb on page");
            String::new()
        }
        Err(e) => {
            warn!("Error reading breadcrumb: {e}");
            String::new()
        }
    };

    let trust_text = match session.text_of(TRUST_COPY).await {
        Ok(Some(t)) => clean_text(&t),
        Ok(None) => {
            debug!("No trust copy on page");
            String::new()
        }
        Err(e) => {
            warn!("Error reading trust copy: {e}");
            String::new()
        }
    };

    Ok(ExtractedDocument { title, breadcrumb, trust_text, definitions })
}

fn archived_path(zip_path: &Path, inner: &Path) -> String {
    let file = inner
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{}", zip_path.display(), file)
}

// ── Tests ──
