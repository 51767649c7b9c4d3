// src/extract.rs
use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};

use crate::boxes::BoundingBox;
use crate::error::{PipelineError, Result};

/// Výřez jednoho panelu z celé stránky. Souřadnice se zaokrouhlují na
/// celé pixely a ořezávají na rozměry stránky; prázdný výsledek je
/// degenerovaný rámeček a volající panel přeskočí.
pub fn extract_panel(page: &DynamicImage, bx: &BoundingBox) -> Result<RgbImage> {
    let (w, h) = (i64::from(page.width()), i64::from(page.height()));

    let x1 = (bx.x1.round() as i64).clamp(0, w);
    let y1 = (bx.y1.round() as i64).clamp(0, h);
    let x2 = (bx.x2.round() as i64).clamp(0, w);
    let y2 = (bx.y2.round() as i64).clamp(0, h);

    if x2 <= x1 || y2 <= y1 {
        return Err(PipelineError::DegenerateBox {
            id: bx.id.clone(),
            coords: format!("{x1},{y1},{x2},{y2}"),
        });
    }

    // Výřez se vždy normalizuje na 3kanálové RGB bez ohledu na režim zdroje.
    let crop = page.crop_imm(x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32);
    Ok(crop.to_rgb8())
}

/// Zakóduje výřez do PNG bajtů – payload pro překladovou službu
/// i pro volitelné úložiště výřezů.
pub fn encode_png(crop: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    crop.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}
