// src/manifest.rs
use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::blake3::compute_blake3;

/// Informace o jednom zapsaném artefaktu.
#[derive(Debug, Serialize, Clone)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub blake3: String,
}

/// Artefakty jedné vyrenderované stránky.
#[derive(Debug, Serialize, Clone)]
pub struct PageEntry {
    pub name: String,
    pub image: FileInfo,
    pub boxes: FileInfo,
    pub translations: FileInfo,
    pub html: FileInfo,
    /// Počet panelů po seřazení (včetně později vyřazených).
    pub panel_count: usize,
    /// Počet panelů s překladem (hit-regiony v HTML).
    pub retained_count: usize,
}

/// Manifest celého běhu; zapisuje se do výstupního adresáře po
/// dokončení všech stránek.
#[derive(Debug, Serialize, Clone)]
pub struct RunManifest {
    pub input_dir: String,
    pub output_dir: String,
    pub generated: String,
    pub lang: String,
    pub model: String,
    pub page_count: usize,
    pub skipped_pages: Vec<String>,
    pub pages: Vec<PageEntry>,
}

/// Spočítá FileInfo (velikost + BLAKE3) pro daný soubor.
pub fn file_info(path: &Path) -> Result<FileInfo> {
    let meta = fs::metadata(path)
        .with_context(|| format!("Nelze přečíst metadata `{}`", path.display()))?;
    let hash = compute_blake3(path)?;
    Ok(FileInfo {
        path: path.to_string_lossy().to_string(),
        size: meta.len(),
        blake3: hash,
    })
}

/// Postaví manifest běhu z už spočítaných záznamů stránek.
pub fn build_run_manifest(
    input_dir: &Path,
    output_dir: &Path,
    lang: &str,
    model: &str,
    skipped_pages: Vec<String>,
    pages: Vec<PageEntry>,
) -> RunManifest {
    RunManifest {
        input_dir: input_dir.to_string_lossy().to_string(),
        output_dir: output_dir.to_string_lossy().to_string(),
        generated: Local::now().to_rfc3339(),
        lang: lang.to_string(),
        model: model.to_string(),
        page_count: pages.len(),
        skipped_pages,
        pages,
    }
}

/// Zapíše manifest.json a checksums.txt do výstupního adresáře.
pub fn write_manifest_and_checksums(manifest: &RunManifest, out_dir: &Path) -> Result<()> {
    let manifest_json = serde_json::to_string_pretty(manifest)?;
    fs::write(out_dir.join("manifest.json"), manifest_json)?;

    let mut checksums = String::new();
    let mut add = |fi: &FileInfo| {
        checksums.push_str(&format!("{}  {}\n", fi.blake3, fi.path));
    };

    for page in &manifest.pages {
        add(&page.image);
        add(&page.boxes);
        add(&page.translations);
        add(&page.html);
    }

    fs::write(out_dir.join("checksums.txt"), checksums)?;
    Ok(())
}
