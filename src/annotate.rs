// src/annotate.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::blake3::short_hash;
use crate::boxes::{BoundingBox, Page};
use crate::error::{PipelineError, Result};
use crate::extract::{encode_png, extract_panel};

/// Sentinel, kterým služba hlásí panel bez čitelného textu.
pub const SENTINEL: &str = "ERROR";

/// Délka klíče v obsahově adresovaném úložišti výřezů.
const CROP_KEY_LEN: usize = 16;

/// Porovnání se sentinelem – bez ohledu na velikost písmen a okolní
/// bílé znaky.
pub fn is_sentinel(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(SENTINEL)
}

/// Překlad/anotace jednoho panelu, svázaná s jeho identifikátorem.
/// Tvar odpovídá záznamu v `<stránka>_translations.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub translation: String,
    /// Volitelný vložený náhled výřezu (base64 PNG).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Panel, který prošel filtrem platnosti: rámeček + jeho anotace.
#[derive(Debug, Clone)]
pub struct AnnotatedPanel {
    pub bx: BoundingBox,
    pub annotation: Annotation,
}

/// Překladová služba: PNG výřez → volný text (případně sentinel).
/// Trait existuje kvůli záměně za stub v testech; produkční
/// implementace je [`OpenAiAnnotator`].
pub trait Annotator {
    fn annotate(&self, png: &[u8]) -> anyhow::Result<String>;
}

/// Volby korelace nad rámec povinného kontraktu.
#[derive(Debug, Clone, Default)]
pub struct AnnotateOptions {
    /// Adresář obsahově adresovaného úložiště výřezů; `None` = nezapisovat.
    pub crops_dir: Option<PathBuf>,
    /// Vkládat base64 PNG výřezu do anotace.
    pub embed_crops: bool,
}

/// Pro každý panel stránky: výřez → služba → anotace svázaná
/// s identifikátorem panelu. Degenerované rámečky se přeskočí
/// s varováním, sentinelové odpovědi panel vyřadí ze všech artefaktů.
/// Pořadí výsledku kopíruje čtecí pořadí panelů. Selhání služby po
/// vyčerpání opakování ukončí zpracování stránky.
pub fn annotate_page(
    page: &Page,
    annotator: &dyn Annotator,
    opts: &AnnotateOptions,
) -> Result<Vec<AnnotatedPanel>> {
    let mut retained = Vec::new();

    for bx in &page.boxes {
        let crop = match extract_panel(&page.image, bx) {
            Ok(c) => c,
            Err(PipelineError::DegenerateBox { id, coords }) => {
                eprintln!("  ! panel {id} má prázdný výřez ({coords}) – přeskočen");
                continue;
            }
            Err(e) => return Err(e),
        };
        let png = encode_png(&crop)?;

        if let Some(dir) = &opts.crops_dir {
            store_crop(dir, &png)?;
        }

        let text = annotator
            .annotate(&png)
            .map_err(|e| PipelineError::AnnotationService {
                panel: bx.id.clone(),
                reason: format!("{e:#}"),
            })?;

        if is_sentinel(&text) {
            eprintln!("  - panel {}: bez čitelného textu – vyřazen", bx.id);
            continue;
        }

        let image = opts
            .embed_crops
            .then(|| base64::engine::general_purpose::STANDARD.encode(&png));

        retained.push(AnnotatedPanel {
            bx: bx.clone(),
            annotation: Annotation {
                id: bx.id.clone(),
                translation: text.trim().to_string(),
                image,
            },
        });
    }

    Ok(retained)
}

/// Uloží PNG výřez do obsahově adresovaného úložiště:
/// `<dir>/<prefix BLAKE3>.png`. Úložiště je jen aditivní, pipeline
/// ho nikdy nečte zpět.
pub fn store_crop(dir: &Path, png: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let key = short_hash(png, CROP_KEY_LEN);
    let path = dir.join(format!("{key}.png"));
    if !path.exists() {
        fs::write(&path, png)?;
    }
    Ok(path)
}

/// Konfigurace klienta překladové služby.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// URL chat-completions endpointu (OpenAI-kompatibilní).
    pub endpoint: String,
    /// Klíč z prostředí; nikdy se neloguje.
    pub api_key: String,
    pub model: String,
    /// Cílový jazyk překladu (kód, např. "cs").
    pub lang: String,
    /// Časový limit jednoho HTTP požadavku.
    pub timeout: Duration,
    /// Počet opakování po neúspěšném volání (navíc k prvnímu pokusu).
    pub retries: u32,
}

/// Klient OpenAI-kompatibilního vision API. Jedno synchronní volání
/// na panel; omezené opakování s exponenciálním čekáním.
pub struct OpenAiAnnotator {
    client: reqwest::blocking::Client,
    cfg: ServiceConfig,
    system_prompt: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text { r#type: String, text: String },
    Image { r#type: String, image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAiAnnotator {
    pub fn new(cfg: ServiceConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("Nelze vytvořit HTTP klienta")?;
        let system_prompt = system_prompt(&cfg.lang);
        Ok(Self {
            client,
            cfg,
            system_prompt,
        })
    }

    fn call_once(&self, request: &ChatRequest<'_>) -> anyhow::Result<String> {
        let response = self
            .client
            .post(&self.cfg.endpoint)
            .header("Authorization", format!("Bearer {}", self.cfg.api_key))
            .json(request)
            .send()
            .context("Požadavek na překladovou službu selhal")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("služba vrátila {status}: {}", body.trim());
        }

        let chat: ChatResponse = response
            .json()
            .context("Odpověď služby nejde přečíst jako JSON")?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        Ok(content.trim().to_string())
    }
}

impl Annotator for OpenAiAnnotator {
    fn annotate(&self, png: &[u8]) -> anyhow::Result<String> {
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(png);
        let image_url = format!("data:image/png;base64,{image_b64}");

        let request = ChatRequest {
            model: &self.cfg.model,
            messages: vec![
                Message {
                    role: "system",
                    content: MessageContent::Text(self.system_prompt.clone()),
                },
                Message {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            r#type: "text".to_string(),
                            text: "Přelož a vysvětli tento panel.".to_string(),
                        },
                        ContentPart::Image {
                            r#type: "image_url".to_string(),
                            image_url: ImageUrl { url: image_url },
                        },
                    ]),
                },
            ],
            max_tokens: 1024,
            temperature: 0.2,
        };

        let mut last_err = anyhow::anyhow!("překladová služba nebyla zavolána");
        for attempt in 0..=self.cfg.retries {
            if attempt > 0 {
                let backoff = Duration::from_secs(1 << attempt.min(5));
                eprintln!(
                    "  … opakuji volání služby (pokus {}/{}) za {} s",
                    attempt + 1,
                    self.cfg.retries + 1,
                    backoff.as_secs()
                );
                thread::sleep(backoff);
            }
            match self.call_once(&request) {
                Ok(text) => return Ok(text),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }
}

/// Pevný systémový kontext služby: přelož a vysvětli panel, využij
/// znalost postav série, žádné doptávání, žádné nadpisy, a při panelu
/// bez čitelného textu přesně sentinel.
fn system_prompt(lang: &str) -> String {
    format!(
        "Jsi zkušený překladatel komiksů. Dostaneš výřez jednoho panelu komiksové stránky. \
         Přelož veškerý text v panelu do {} a stručně vysvětli, co se v panelu děje. \
         Využívej znalost postav a reálií dané série. \
         Nikdy nepokládej doplňující otázky. \
         Nepřidávej žádné nadpisy ani úvodní fráze. \
         Pokud panel neobsahuje žádný čitelný text, odpověz přesně řetězcem {SENTINEL}.",
        target_language(lang)
    )
}

/// Lidsky čitelný název cílového jazyka (2. pád); neznámé kódy se
/// předají tak, jak jsou.
fn target_language(lang: &str) -> &str {
    match lang {
        "cs" | "ces" => "češtiny",
        "sk" | "slk" => "slovenštiny",
        "pl" | "pol" => "polštiny",
        "en" | "eng" => "angličtiny",
        "de" | "deu" => "němčiny",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::RawBox;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Stub služby: vrací připravené odpovědi v pořadí volání.
    struct ScriptedAnnotator {
        replies: Mutex<VecDeque<anyhow::Result<String>>>,
    }

    impl ScriptedAnnotator {
        fn new(replies: Vec<anyhow::Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    impl Annotator for ScriptedAnnotator {
        fn annotate(&self, _png: &[u8]) -> anyhow::Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("stub vyčerpán")))
        }
    }

    fn test_page(raw: Vec<RawBox>) -> Page {
        let img = image::RgbImage::from_pixel(100, 80, image::Rgb([200, 200, 200]));
        let mut boxes: Vec<BoundingBox> = raw
            .into_iter()
            .filter_map(|r| BoundingBox::from_raw(r).ok())
            .collect();
        crate::boxes::sort_reading_order(&mut boxes);
        Page {
            name: "strana01".to_string(),
            file_name: "strana01.png".to_string(),
            path: PathBuf::from("strana01.png"),
            image: image::DynamicImage::ImageRgb8(img),
            width: 100,
            height: 80,
            boxes,
        }
    }

    #[test]
    fn sentinel_matching_is_lenient() {
        assert!(is_sentinel("ERROR"));
        assert!(is_sentinel("  error \n"));
        assert!(is_sentinel("Error"));
        assert!(!is_sentinel("ERROR."));
        assert!(!is_sentinel("Ahoj"));
    }

    #[test]
    fn sentinel_and_degenerate_panels_are_dropped() {
        // čtecí pořadí: (60,10) před (10,10); třetí rámeček se zaokrouhlí
        // na nulovou šířku a služba se pro něj vůbec nevolá
        let page = test_page(vec![
            RawBox { x1: 10.0, y1: 10.0, x2: 40.0, y2: 40.0 },
            RawBox { x1: 60.0, y1: 10.0, x2: 90.0, y2: 40.0 },
            RawBox { x1: 50.2, y1: 50.0, x2: 50.4, y2: 70.0 },
        ]);
        let stub = ScriptedAnnotator::new(vec![
            Ok("Ahoj!".to_string()),
            Ok("error".to_string()),
        ]);

        let retained = annotate_page(&page, &stub, &AnnotateOptions::default()).unwrap();
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].bx.x1, 60.0);
        assert_eq!(retained[0].annotation.id, retained[0].bx.id);
        assert_eq!(retained[0].annotation.translation, "Ahoj!");
        // stub spotřeboval obě odpovědi – degenerovaný panel nic nevolal
        assert!(stub.replies.lock().unwrap().is_empty());
    }

    #[test]
    fn service_failure_is_tagged_with_panel_id() {
        let page = test_page(vec![RawBox { x1: 10.0, y1: 10.0, x2: 40.0, y2: 40.0 }]);
        let stub = ScriptedAnnotator::new(vec![Err(anyhow::anyhow!("HTTP 500"))]);

        let err = annotate_page(&page, &stub, &AnnotateOptions::default()).unwrap_err();
        match err {
            PipelineError::AnnotationService { panel, reason } => {
                assert_eq!(panel, page.boxes[0].id);
                assert!(reason.contains("HTTP 500"));
            }
            other => panic!("neočekávaná chyba: {other}"),
        }
    }

    #[test]
    fn embedded_crop_roundtrips_as_png() {
        let page = test_page(vec![RawBox { x1: 0.0, y1: 0.0, x2: 16.0, y2: 16.0 }]);
        let stub = ScriptedAnnotator::new(vec![Ok("text".to_string())]);
        let opts = AnnotateOptions {
            embed_crops: true,
            ..Default::default()
        };

        let retained = annotate_page(&page, &stub, &opts).unwrap();
        let b64 = retained[0].annotation.image.as_deref().unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn crop_store_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let png = b"ne-tak-docela-png";
        let path = store_crop(dir.path(), png).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, format!("{}.png", short_hash(png, CROP_KEY_LEN)));
        assert_eq!(std::fs::read(&path).unwrap(), png);

        // opakované uložení stejného obsahu nevytvoří další soubor
        store_crop(dir.path(), png).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
