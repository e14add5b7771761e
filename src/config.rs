use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

/// How the captured screenshot is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CropPolicy {
    /// Whole rendered page.
    Full,
    /// The document preview region only.
    Region,
    /// Whole page, cropped below the lowest OCR-confident text line.
    TextBottom,
}

/// Immutable run configuration, built once in `main` and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub nav_timeout: Duration,
    pub wait_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    /// Uniform random sleep between items, in seconds.
    pub min_item_delay: f64,
    pub max_item_delay: f64,
    /// Settle time after expanding the preview, before the screenshot.
    pub settle_delay: Duration,
    pub viewport: (u32, u32),
    pub headless: bool,
    pub crop: CropPolicy,
    /// Emphasize breadcrumb / trust lines in the generated document.
    pub highlight: bool,
    /// Zip each per-item folder and delete the raw folder afterwards.
    pub archive: bool,
    pub output_dir: PathBuf,
    pub catalog_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nav_timeout: Duration::from_secs(40),
            wait_timeout: Duration::from_secs(20),
            retry_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            min_item_delay: 1.0,
            max_item_delay: 2.0,
            settle_delay: Duration::from_secs(3),
            viewport: (1280, 1280),
            headless: true,
            crop: CropPolicy::Region,
            highlight: false,
            archive: false,
            output_dir: PathBuf::from("Documents"),
            catalog_path: PathBuf::from("documents.json"),
        }
    }
}
