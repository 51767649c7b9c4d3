// src/error.rs
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Chyby pipeline. Typované varianty odlišují stavy, na které orchestrátor
/// reaguje různě: přeskočení panelu, přeskočení stránky, nebo čisté
/// ukončení bez práce.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Vstupní adresář neobsahuje žádné obrázky – běh končí čistě.
    #[error("vstupní adresář `{}` neobsahuje žádné obrázky", .0.display())]
    NoInput(PathBuf),

    /// K obrázku chybí JSON s detekcemi – stránka se přeskočí, dávka pokračuje.
    #[error("k obrázku `{}` chybí soubor s detekcemi `{}`", .image.display(), .sidecar.display())]
    MissingSidecar { image: PathBuf, sidecar: PathBuf },

    /// Rámeček má po zaokrouhlení prázdnou plochu – panel se přeskočí,
    /// stránka pokračuje.
    #[error("panel `{id}` má po zaokrouhlení prázdnou plochu ({coords})")]
    DegenerateBox { id: String, coords: String },

    /// Selhání překladové služby; běh stránky končí.
    #[error("překladová služba selhala pro panel `{panel}`: {reason}")]
    AnnotationService { panel: String, reason: String },

    /// Selhání externího detektoru.
    #[error("detektor selhal pro `{}`: {reason}", .image.display())]
    Detector { image: PathBuf, reason: String },

    #[error("chyba V/V: {0}")]
    Io(#[from] io::Error),

    #[error("chyba při zpracování obrázku: {0}")]
    Image(#[from] image::ImageError),

    #[error("chyba JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
