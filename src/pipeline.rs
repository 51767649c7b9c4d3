// src/pipeline.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::annotate::{AnnotateOptions, AnnotatedPanel, Annotation, Annotator, annotate_page};
use crate::boxes::{BoundingBox, Page, sort_reading_order};
use crate::detect::Detector;
use crate::error::{PipelineError, Result};
use crate::html::{IndexEntry, render_index_html, render_page_html};
use crate::manifest::{PageEntry, build_run_manifest, file_info, write_manifest_and_checksums};

/// Přípony vstupních obrázků (velikost písmen se nerozlišuje).
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Konfigurace jednoho běhu orchestrátoru.
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Cílový jazyk (jen do manifestu; služba ho dostává přes svůj kontext).
    pub lang: String,
    /// Model služby (jen do manifestu).
    pub model: String,
    pub annotate: AnnotateOptions,
    /// Jen detekce a výpis; nic se nezapisuje a služba se nevolá.
    pub dry_run: bool,
}

/// Souhrn běhu pro závěrečný výpis a testy.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Stránky se zapsanými artefakty, v pořadí zpracování.
    pub rendered: Vec<String>,
    /// Stránky přeskočené kvůli chybějícím detekcím.
    pub skipped: Vec<String>,
    pub pages_processed: usize,
    pub panels_total: usize,
    pub panels_retained: usize,
}

/// Celý běh: objev obrázky → pro každou stránku detekce, identifikace,
/// čtecí pořadí, anotace, render → zapiš artefakty → index + manifest.
/// Artefakty stránky se zapisují až po úspěchu celé stránky; pozdější
/// selhání nechá hotové stránky na disku netknuté. Prázdný vstup je
/// samostatný signál `NoInput`, ne tiché "hotovo".
pub fn run(
    cfg: &RunConfig,
    detector: &dyn Detector,
    annotator: &dyn Annotator,
) -> Result<RunSummary> {
    let images = collect_images_in_dir(&cfg.input_dir)?;
    if images.is_empty() {
        return Err(PipelineError::NoInput(cfg.input_dir.clone()));
    }

    if !cfg.dry_run {
        fs::create_dir_all(&cfg.output_dir)?;
    }

    let mut summary = RunSummary::default();
    let mut index_entries: Vec<IndexEntry> = Vec::new();
    let mut page_entries: Vec<PageEntry> = Vec::new();

    for image_path in &images {
        let file_name = image_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let name = image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        println!("Stránka {file_name}");

        let raw = match detector.detect(image_path) {
            Ok(r) => r,
            Err(PipelineError::MissingSidecar { image, sidecar }) => {
                eprintln!(
                    "Chybí detekce pro `{}` (hledáno `{}`) – stránka přeskočena.",
                    image.display(),
                    sidecar.display()
                );
                summary.skipped.push(name);
                continue;
            }
            Err(e) => return Err(e),
        };

        // identifikátory + validace geometrie + čtecí pořadí
        let mut boxes: Vec<BoundingBox> = Vec::new();
        for r in raw {
            match BoundingBox::from_raw(r) {
                Ok(b) => boxes.push(b),
                Err(PipelineError::DegenerateBox { coords, .. }) => {
                    eprintln!("  ! degenerovaná detekce ({coords}) – ignorována");
                }
                Err(e) => return Err(e),
            }
        }
        sort_reading_order(&mut boxes);

        summary.pages_processed += 1;
        summary.panels_total += boxes.len();

        if cfg.dry_run {
            println!("  (dry-run) panelů: {}", boxes.len());
            continue;
        }

        let image = image::open(image_path)?;
        let (width, height) = (image.width(), image.height());
        let page = Page {
            name,
            file_name,
            path: image_path.clone(),
            image,
            width,
            height,
            boxes,
        };

        let retained = annotate_page(&page, annotator, &cfg.annotate)?;
        summary.panels_retained += retained.len();

        write_page_artifacts(cfg, &page, &retained, &mut index_entries, &mut page_entries)?;
        println!(
            "  ✓ panelů: {}, s překladem: {}",
            page.boxes.len(),
            retained.len()
        );
        summary.rendered.push(page.name);
    }

    if cfg.dry_run {
        return Ok(summary);
    }

    // index a manifest až po stránkách; přerušený běh nechá hotové
    // stránky platné, jen bez indexu
    fs::write(
        cfg.output_dir.join("index.html"),
        render_index_html(&index_entries),
    )?;

    let manifest = build_run_manifest(
        &cfg.input_dir,
        &cfg.output_dir,
        &cfg.lang,
        &cfg.model,
        summary.skipped.clone(),
        page_entries,
    );
    write_manifest_and_checksums(&manifest, &cfg.output_dir)?;

    Ok(summary)
}

/// Zapíše artefakty jedné stránky. Všechno se nejdřív sestaví v paměti,
/// na disk se sahá až potom.
fn write_page_artifacts(
    cfg: &RunConfig,
    page: &Page,
    retained: &[AnnotatedPanel],
    index_entries: &mut Vec<IndexEntry>,
    page_entries: &mut Vec<PageEntry>,
) -> Result<()> {
    let boxes_json = serde_json::to_string_pretty(&page.boxes)?;
    let annotations: Vec<&Annotation> = retained.iter().map(|p| &p.annotation).collect();
    let translations_json = serde_json::to_string_pretty(&annotations)?;
    let html = render_page_html(page, retained);

    let out_image = cfg.output_dir.join(&page.file_name);
    let out_boxes = cfg.output_dir.join(format!("{}.json", page.name));
    let out_translations = cfg.output_dir.join(format!("{}_translations.json", page.name));
    let out_html = cfg.output_dir.join(format!("{}.html", page.name));

    // kopie obrázku vedle artefaktů, aby HTML fungovalo samo o sobě;
    // při shodném zdroji a cíli se nekopíruje
    if fs::canonicalize(&page.path).ok() != fs::canonicalize(&out_image).ok() {
        fs::copy(&page.path, &out_image)?;
    }

    fs::write(&out_boxes, boxes_json)?;
    fs::write(&out_translations, translations_json)?;
    fs::write(&out_html, html)?;

    index_entries.push(IndexEntry {
        html_file: format!("{}.html", page.name),
        image_file: page.file_name.clone(),
        panel_count: retained.len(),
    });

    page_entries.push(PageEntry {
        name: page.name.clone(),
        image: file_info(&out_image)?,
        boxes: file_info(&out_boxes)?,
        translations: file_info(&out_translations)?,
        html: file_info(&out_html)?,
        panel_count: page.boxes.len(),
        retained_count: retained.len(),
    });

    Ok(())
}

/// Najde všechny obrázky v adresáři (jen první úroveň, ne rekurzivně),
/// seřazené abecedně – pořadí stránek je deterministické.
pub fn collect_images_in_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if !dir.is_dir() {
        return Ok(out);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                let ext_lower = ext.to_lowercase();
                if IMAGE_EXTENSIONS.contains(&ext_lower.as_str()) {
                    out.push(path);
                }
            }
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_discovery_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.jpg", "c.webp", "poznamky.txt", "d.JPEG"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let images = collect_images_in_dir(dir.path()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.webp", "d.JPEG"]);
    }

    #[test]
    fn missing_dir_yields_no_images() {
        assert!(collect_images_in_dir(Path::new("/neexistuje/vubec"))
            .unwrap()
            .is_empty());
    }
}
