// src/boxes.rs
use std::path::PathBuf;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::blake3::short_hash;
use crate::error::{PipelineError, Result};

/// Délka identifikátoru panelu v hex znacích. Pro počty panelů na jedné
/// stránce bohatě stačí a názvy zůstávají čitelné v HTML i JSON.
pub const BOX_ID_LEN: usize = 12;

/// Surový výstup detektoru – rámeček bez identifikátoru a pořadí.
/// Neznámá pole (např. `id` z cizích detekčních výstupů) se ignorují.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Jeden panel v pixelových souřadnicích zdrojové stránky. Identifikátor
/// je odvozen ze zaokrouhlené geometrie, takže je stabilní napříč běhy
/// a dá se na něj odkazovat z klientské strany i z cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub id: String,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Validace při konstrukci: souřadnice musí být konečné a rámeček
    /// musí mít kladnou plochu, jinak jde o degenerovanou detekci.
    pub fn from_raw(raw: RawBox) -> Result<Self> {
        let RawBox { x1, y1, x2, y2 } = raw;
        let finite = [x1, y1, x2, y2].iter().all(|v| v.is_finite());
        if !finite || x2 <= x1 || y2 <= y1 {
            let id = if finite {
                box_id(x1, y1, x2, y2)
            } else {
                "-".to_string()
            };
            return Err(PipelineError::DegenerateBox {
                id,
                coords: canonical_key(x1, y1, x2, y2),
            });
        }
        Ok(Self {
            id: box_id(x1, y1, x2, y2),
            x1,
            y1,
            x2,
            y2,
        })
    }
}

/// Kanonický řetězec geometrie: souřadnice zaokrouhlené na 2 desetinná
/// místa (pohltí šum detektoru v plovoucí čárce), spojené pomlčkami.
fn canonical_key(x1: f64, y1: f64, x2: f64, y2: f64) -> String {
    format!("{x1:.2}-{y1:.2}-{x2:.2}-{y2:.2}")
}

/// Stabilní identifikátor rámečku: zkrácený BLAKE3 hash kanonického
/// řetězce. Shodné rámečky (do 0,01 px) dostanou v každém běhu stejný
/// identifikátor.
pub fn box_id(x1: f64, y1: f64, x2: f64, y2: f64) -> String {
    short_hash(canonical_key(x1, y1, x2, y2).as_bytes(), BOX_ID_LEN)
}

/// Čtecí pořadí pro komiks vázaný zprava: shora dolů (`y1` vzestupně),
/// při shodné výšce zprava doleva (`x1` sestupně). Bez shlukování do
/// řádků – panel přesahující přes více řádků se může seřadit
/// neintuitivně; známé omezení heuristiky. Řazení je stabilní, shodné
/// klíče zachovají pořadí detekce.
pub fn sort_reading_order(boxes: &mut [BoundingBox]) {
    boxes.sort_by(|a, b| a.y1.total_cmp(&b.y1).then_with(|| b.x1.total_cmp(&a.x1)));
}

/// Jedna stránka komiksu: zdrojový obrázek, rozměry a panely
/// v čtecím pořadí.
pub struct Page {
    /// Základ názvů artefaktů (stem souboru obrázku).
    pub name: String,
    /// Název souboru obrázku; kopíruje se vedle artefaktů.
    pub file_name: String,
    pub path: PathBuf,
    pub image: DynamicImage,
    pub width: u32,
    pub height: u32,
    pub boxes: Vec<BoundingBox>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bx(x1: f64, y1: f64, x2: f64, y2: f64) -> BoundingBox {
        BoundingBox::from_raw(RawBox { x1, y1, x2, y2 }).unwrap()
    }

    #[test]
    fn id_absorbs_detector_noise() {
        // obě sady se zaokrouhlí na stejná 2 desetinná místa
        let a = box_id(100.001, 50.004, 300.0, 250.0);
        let b = box_id(100.0039, 49.9961, 299.999, 250.001);
        assert_eq!(a, b);
    }

    #[test]
    fn id_differs_for_distinct_boxes() {
        let a = box_id(100.0, 50.0, 300.0, 250.0);
        let b = box_id(100.0, 50.0, 300.0, 250.02);
        assert_ne!(a, b);
    }

    #[test]
    fn id_is_short_hex() {
        let id = box_id(1.0, 2.0, 3.0, 4.0);
        assert_eq!(id.len(), BOX_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn reading_order_top_then_right() {
        let mut boxes = vec![
            bx(50.0, 10.0, 60.0, 20.0),
            bx(5.0, 10.0, 15.0, 20.0),
            bx(0.0, 20.0, 10.0, 30.0),
        ];
        sort_reading_order(&mut boxes);
        let order: Vec<(f64, f64)> = boxes.iter().map(|b| (b.y1, b.x1)).collect();
        assert_eq!(order, vec![(10.0, 50.0), (10.0, 5.0), (20.0, 0.0)]);
    }

    #[test]
    fn reading_order_is_stable_on_ties() {
        // shodné (y1, x1), liší se jen šířkou – pořadí detekce se drží
        let mut boxes = vec![bx(10.0, 10.0, 60.0, 20.0), bx(10.0, 10.0, 70.0, 20.0)];
        sort_reading_order(&mut boxes);
        assert_eq!(boxes[0].x2, 60.0);
        assert_eq!(boxes[1].x2, 70.0);
    }

    #[test]
    fn from_raw_rejects_degenerate_geometry() {
        for raw in [
            RawBox { x1: 10.0, y1: 10.0, x2: 10.0, y2: 20.0 },
            RawBox { x1: 10.0, y1: 10.0, x2: 5.0, y2: 20.0 },
            RawBox { x1: f64::NAN, y1: 0.0, x2: 1.0, y2: 1.0 },
        ] {
            assert!(matches!(
                BoundingBox::from_raw(raw),
                Err(PipelineError::DegenerateBox { .. })
            ));
        }
    }
}
