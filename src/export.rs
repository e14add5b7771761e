use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use docx_rs::{Docx, Paragraph, Run};
use regex::Regex;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::extract::{clean_text, ExtractedDocument};

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").unwrap());

/// One row of the run summary, kept in memory for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub link_name: String,
    pub form_title: String,
    pub docx_path: String,
    pub screenshot_path: String,
}

/// Folder-safe name for an entry: spaces become underscores and path-hostile
/// characters are dropped. An empty name falls back to the final URL path
/// segment.
pub fn sanitize_name(name: &str, url: &str) -> String {
    let cleaned = clean_text(name);
    let base = if cleaned.is_empty() {
        url.trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("document")
            .to_string()
    } else {
        cleaned
    };
    let sanitized = UNSAFE_CHARS.replace_all(&base.replace(' ', "_"), "").to_string();
    if sanitized.is_empty() {
        "document".to_string()
    } else {
        sanitized
    }
}

/// Generate the docx: breadcrumb line, trust line, top-level heading, then a
/// sub-heading + paragraph per definition, in extraction order. The
/// breadcrumb and trust lines are highlighted when `highlight` is set.
pub fn write_docx(
    doc: &ExtractedDocument,
    link_name: &str,
    path: &Path,
    highlight: bool,
) -> Result<()> {
    let mut docx = Docx::new();

    if !doc.breadcrumb.is_empty() {
        docx = docx.add_paragraph(meta_line(&doc.breadcrumb, highlight));
    }
    if !doc.trust_text.is_empty() {
        docx = docx.add_paragraph(meta_line(&doc.trust_text, highlight));
    }

    let heading = if doc.title.is_empty() { link_name } else { &doc.title };
    docx = docx.add_paragraph(
        Paragraph::new().add_run(Run::new().add_text(heading).bold().size(48)),
    );

    for def in &doc.definitions {
        docx = docx.add_paragraph(
            Paragraph::new().add_run(Run::new().add_text(&def.question).bold().size(32)),
        );
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(&def.answer)));
    }

    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    docx.build().pack(file).context("failed to write docx")?;
    Ok(())
}

fn meta_line(text: &str, highlight: bool) -> Paragraph {
    let mut run = Run::new().add_text(text);
    if highlight {
        run = run.highlight("yellow");
    }
    Paragraph::new().add_run(run)
}

/// Zip every file in `folder` (relative names, deflate) into a sibling
/// `<folder>.zip`, then remove the folder. After success only the archive
/// remains.
pub fn archive_and_cleanup(folder: &Path) -> Result<PathBuf> {
    let zip_path = folder.with_extension("zip");
    let mut files = Vec::new();
    collect_files(folder, folder, &mut files)?;
    files.sort_by(|a, b| a.1.cmp(&b.1));

    let file = File::create(&zip_path)
        .with_context(|| format!("failed to create {}", zip_path.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (path, rel) in files {
        writer.start_file(rel, options)?;
        writer.write_all(&fs::read(&path)?)?;
    }
    writer.finish()?;

    fs::remove_dir_all(folder)
        .with_context(|| format!("failed to remove {}", folder.display()))?;
    info!("Zipped and cleaned up: {}", zip_path.display());
    Ok(zip_path)
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, String)>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            let rel = path.strip_prefix(root)?.to_string_lossy().replace('\\', "/");
            out.push((path, rel));
        }
    }
    Ok(())
}

/// Rewrite the whole summary CSV from the in-memory result list, so the file
/// on disk always reflects every result so far.
pub fn write_summary(path: &Path, results: &[ExportResult]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writer.write_record(["Link Name", "Form Title", "ZIP File"])?;
    for r in results {
        writer.write_record([&r.link_name, &r.form_title, &r.docx_path])?;
    }
    writer.flush()?;
    Ok(())
}

// ── Tests ──
