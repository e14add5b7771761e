use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::browser::Session;
use crate::config::Config;
use crate::extract::clean_text;

pub const LISTING_URL: &str = "https://www.rocketlawyer.com/all-documents";
pub const BASE_URL: &str = "https://www.rocketlawyer.com";

const LISTING_CONTAINER: &str = "div.sitemap-section";
const COOKIE_ACCEPT: &str = "#onetrust-accept-btn-handler";

static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.sitemap-section ul.sitemap-section-links li a").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    // The legacy catalog file wrote "" for unprocessed entries.
    #[serde(rename = "pending", alias = "")]
    Pending,
    #[serde(rename = "done")]
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub url: String,
    pub status: Status,
}

/// Read and parse the persisted catalog. A malformed file is fatal.
pub fn load(path: &Path) -> Result<Vec<CatalogEntry>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("malformed catalog file {}", path.display()))
}

/// Rewrite the whole catalog file. Writes a sibling temp file first and
/// renames over the target so an interrupted write never truncates the
/// catalog.
pub fn persist(path: &Path, entries: &[CatalogEntry]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(entries)?;
    fs::write(&tmp, json)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Parse the listing page into catalog entries, all `pending`. Anchor text is
/// the entry name, href is resolved against the site origin. Duplicate URLs
/// keep their first occurrence, in listing order.
pub fn discover(listing_html: &str, base_url: &str) -> Result<Vec<CatalogEntry>> {
    let base = Url::parse(base_url).context("invalid base url")?;
    let doc = Html::parse_document(listing_html);

    let mut seen: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();
    for a in doc.select(&LINK_SEL) {
        let Some(href) = a.value().attr("href") else { continue };
        let Ok(url) = base.join(href) else { continue };
        let url = url.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }
        let name = clean_text(&a.text().collect::<Vec<_>>().join(" "));
        entries.push(CatalogEntry {
            name,
            url,
            status: Status::Pending,
        });
    }
    Ok(entries)
}

/// Load the persisted catalog if it exists, otherwise fetch the listing page
/// through the browser, discover entries, and persist them. The network fetch
/// is skipped entirely when the file is already present.
pub async fn load_or_bootstrap(session: &Session, cfg: &Config) -> Result<Vec<CatalogEntry>> {
    if cfg.catalog_path.exists() {
        let entries = load(&cfg.catalog_path)?;
        info!("Loaded {} catalog entries from {}", entries.len(), cfg.catalog_path.display());
        return Ok(entries);
    }

    let entries = fetch_listing(session, cfg).await?;
    persist(&cfg.catalog_path, &entries)?;
    info!("Discovered {} catalog entries, persisted to {}", entries.len(), cfg.catalog_path.display());
    Ok(entries)
}

async fn fetch_listing(session: &Session, cfg: &Config) -> Result<Vec<CatalogEntry>> {
    info!("Fetching document listing: {}", LISTING_URL);
    session.goto(LISTING_URL, cfg.nav_timeout).await?;

    // Cookie consent banner, when shown, sits over the listing. Best-effort.
    if session.wait_for(COOKIE_ACCEPT, Duration::from_secs(5)).await.is_ok() {
        if session.force_click(COOKIE_ACCEPT).await.is_ok() {
            info!("Cookie consent accepted");
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
    } else {
        info!("No cookie banner found");
    }

    session.wait_for(LISTING_CONTAINER, cfg.nav_timeout).await?;
    let html = session.content().await?;
    discover(&html, BASE_URL)
}

pub fn pending_count(entries: &[CatalogEntry]) -> usize {
    entries.iter().filter(|e| e.status == Status::Pending).count()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <div class="sitemap-section">
          <ul class="sitemap-section-links">
            <li><a href="/nda">  Non-Disclosure
                Agreement </a></li>
            <li><a href="/lease">Lease Agreement</a></li>
            <li><a href="/nda">Duplicate NDA</a></li>
          </ul>
        </div>
        <a href="/outside">Outside the container</a>
    "#;

    #[test]
    fn discover_parses_anchors_in_order() {
        let entries = discover(LISTING, "https://site.example").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Non-Disclosure Agreement");
        assert_eq!(entries[0].url, "https://site.example/nda");
        assert_eq!(entries[1].name, "Lease Agreement");
        assert!(entries.iter().all(|e| e.status == Status::Pending));
    }

    #[test]
    fn persist_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let entries = vec![
            CatalogEntry {
                name: "NDA".into(),
                url: "https://site/nda".into(),
                status: Status::Done,
            },
            CatalogEntry {
                name: "Lease".into(),
                url: "https://site/lease".into(),
                status: Status::Pending,
            },
        ];
        persist(&path, &entries).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].status, Status::Done);
        assert_eq!(loaded[1].status, Status::Pending);
    }

    #[test]
    fn malformed_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn legacy_empty_status_reads_as_pending() {
        let raw = r#"[{"name":"NDA","url":"https://site/nda","status":""}]"#;
        let entries: Vec<CatalogEntry> = serde_json::from_str(raw).unwrap();
        assert_eq!(entries[0].status, Status::Pending);
    }

    #[test]
    fn all_done_catalog_has_no_pending() {
        let entries = vec![CatalogEntry {
            name: "NDA".into(),
            url: "https://site/nda".into(),
            status: Status::Done,
        }];
        assert_eq!(pending_count(&entries), 0);
    }
}
