// src/main.rs
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use lazycomictrans::annotate::{AnnotateOptions, OpenAiAnnotator, ServiceConfig};
use lazycomictrans::detect::{CommandDetector, Detector, SidecarDetector};
use lazycomictrans::error::PipelineError;
use lazycomictrans::pipeline::{RunConfig, run};

/// Dávkový překladač komiksových stránek: detekované panely → výřezy →
/// překladová služba → interaktivní HTML s klikací mapou panelů.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Vstupní adresář s obrázky stránek (jpg/jpeg/png/webp)
    #[arg(short, long, default_value = "comic")]
    input: PathBuf,

    /// Výstupní adresář pro artefakty (JSON, HTML, kopie obrázků)
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Adresář s předpočítanými detekcemi `<stem>.json`
    /// (výchozí: vstupní adresář)
    #[arg(long)]
    boxes_dir: Option<PathBuf>,

    /// Externí detektor: příkaz, který dostane cestu k obrázku a na
    /// stdout vypíše JSON pole rámečků {x1,y1,x2,y2}.
    /// Má přednost před --boxes-dir.
    #[arg(long)]
    detect_cmd: Option<String>,

    /// Model překladové služby
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Endpoint překladové služby (OpenAI-kompatibilní chat completions)
    #[arg(long, default_value = "https://api.openai.com/v1/chat/completions")]
    endpoint: String,

    /// Cílový jazyk překladu (např. cs, sk, pl, en)
    #[arg(long, default_value = "cs")]
    lang: String,

    /// Časový limit jednoho volání služby (sekundy)
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Počet opakování neúspěšného volání služby (navíc k prvnímu pokusu)
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Vkládat base64 PNG výřezu panelu do překladů (větší artefakty)
    #[arg(long)]
    embed_crops: bool,

    /// Ukládat výřezy do obsahově adresovaného úložiště `<output>/crops`
    #[arg(long)]
    save_crops: bool,

    /// Dry-run – jen detekce a výpis počtů, nic se nezapisuje
    /// a překladová služba se nevolá
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let detector: Box<dyn Detector> = match &args.detect_cmd {
        Some(cmdline) => Box::new(
            CommandDetector::from_cmdline(cmdline).context("Prázdný příkaz v --detect-cmd")?,
        ),
        None => Box::new(SidecarDetector::new(
            args.boxes_dir.clone().unwrap_or_else(|| args.input.clone()),
        )),
    };

    // klíč ke službě jde výhradně z prostředí; při dry-run není potřeba
    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(k) if !k.is_empty() => k,
        _ if args.dry_run => String::new(),
        _ => anyhow::bail!(
            "Chybí OPENAI_API_KEY v prostředí (bez něj jde spustit jen --dry-run)"
        ),
    };

    let annotator = OpenAiAnnotator::new(ServiceConfig {
        endpoint: args.endpoint.clone(),
        api_key,
        model: args.model.clone(),
        lang: args.lang.clone(),
        timeout: Duration::from_secs(args.timeout),
        retries: args.retries,
    })?;

    let cfg = RunConfig {
        input_dir: args.input.clone(),
        output_dir: args.output.clone(),
        lang: args.lang.clone(),
        model: args.model.clone(),
        annotate: AnnotateOptions {
            crops_dir: args.save_crops.then(|| args.output.join("crops")),
            embed_crops: args.embed_crops,
        },
        dry_run: args.dry_run,
    };

    match run(&cfg, detector.as_ref(), &annotator) {
        Ok(summary) => {
            if args.dry_run {
                println!(
                    "Dry-run hotov: stránek {}, panelů {} (přeskočeno stránek: {}).",
                    summary.pages_processed,
                    summary.panels_total,
                    summary.skipped.len()
                );
            } else {
                println!(
                    "Hotovo: {} stránek, {} panelů ({} s překladem) → `{}`.",
                    summary.rendered.len(),
                    summary.panels_total,
                    summary.panels_retained,
                    args.output.display()
                );
                if !summary.skipped.is_empty() {
                    println!(
                        "Přeskočeno bez detekcí: {}.",
                        summary.skipped.join(", ")
                    );
                }
            }
            Ok(())
        }
        // prázdný vstup není chyba – čisté ukončení s jasným hlášením
        Err(PipelineError::NoInput(dir)) => {
            println!("Žádné obrázky v `{}` – není co dělat.", dir.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
