// src/detect.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::boxes::RawBox;
use crate::error::{PipelineError, Result};

/// Externí detektor panelů: pro obrázek vrátí neuspořádané rámečky
/// v pixelových souřadnicích. Konkrétní backend je zaměnitelný –
/// pipeline se na nic dalšího nespoléhá.
pub trait Detector {
    fn detect(&self, image: &Path) -> Result<Vec<RawBox>>;
}

/// Čte předpočítané detekce ze souboru `<stem>.json` v zadaném adresáři.
/// Chybějící soubor znamená přeskočení stránky, ne konec dávky.
pub struct SidecarDetector {
    dir: PathBuf,
}

impl SidecarDetector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn sidecar_path(&self, image: &Path) -> PathBuf {
        let stem = image
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        self.dir.join(format!("{stem}.json"))
    }
}

impl Detector for SidecarDetector {
    fn detect(&self, image: &Path) -> Result<Vec<RawBox>> {
        let sidecar = self.sidecar_path(image);
        if !sidecar.is_file() {
            return Err(PipelineError::MissingSidecar {
                image: image.to_path_buf(),
                sidecar,
            });
        }
        let text = fs::read_to_string(&sidecar)?;
        let boxes: Vec<RawBox> = serde_json::from_str(&text)?;
        Ok(boxes)
    }
}

/// Spouští detektor jako externí proces: `program [args...] <obrázek>`.
/// Na stdout očekává JSON pole objektů `{x1, y1, x2, y2}`.
pub struct CommandDetector {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Rozdělí zadaný příkaz na program a argumenty. Jednoduché dělení
    /// podle mezer, bez shellového quotování.
    pub fn from_cmdline(cmdline: &str) -> Option<Self> {
        let mut parts = cmdline.split_whitespace();
        let program = PathBuf::from(parts.next()?);
        Some(Self {
            program,
            args: parts.map(str::to_string).collect(),
        })
    }
}

impl Detector for CommandDetector {
    fn detect(&self, image: &Path) -> Result<Vec<RawBox>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(image);
        eprintln!("{}", command_to_string("Detektor", &cmd));

        let output = cmd.output().map_err(|e| PipelineError::Detector {
            image: image.to_path_buf(),
            reason: format!("nelze spustit `{}`: {e}", self.program.display()),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Detector {
                image: image.to_path_buf(),
                reason: format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| PipelineError::Detector {
            image: image.to_path_buf(),
            reason: format!("neplatný JSON na stdout: {e}"),
        })
    }
}

/// Složí příkaz do jednořádkového logu (program + argumenty).
fn command_to_string(label: &str, cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().to_string())
        .collect();
    format!("[{label}] {program} {}", args.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_missing_file_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let det = SidecarDetector::new(dir.path());
        let err = det.detect(Path::new("strana01.jpg")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingSidecar { .. }));
    }

    #[test]
    fn sidecar_reads_boxes_and_ignores_extra_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("strana01.json"),
            r#"[{"id": "abc", "x1": 1.0, "y1": 2.0, "x2": 3.0, "y2": 4.0}]"#,
        )
        .unwrap();
        let det = SidecarDetector::new(dir.path());
        let boxes = det.detect(Path::new("strana01.jpg")).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].x2, 3.0);
    }

    #[test]
    fn cmdline_splits_program_and_args() {
        let det = CommandDetector::from_cmdline("python3 detect.py --weights model.pt").unwrap();
        assert_eq!(det.program, PathBuf::from("python3"));
        assert_eq!(det.args, vec!["detect.py", "--weights", "model.pt"]);
        assert!(CommandDetector::from_cmdline("   ").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn command_detector_parses_stdout() {
        // sh -c dostane obrázek jako $0 a ignoruje ho
        let det = CommandDetector::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"echo '[{"x1":1,"y1":2,"x2":3,"y2":4}]'"#.to_string(),
            ],
        );
        let boxes = det.detect(Path::new("ignorovany.jpg")).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].y2, 4.0);
    }

    #[cfg(unix)]
    #[test]
    fn command_detector_reports_failure() {
        let det = CommandDetector::new(
            "sh",
            vec!["-c".to_string(), "echo chyba >&2; exit 3".to_string()],
        );
        let err = det.detect(Path::new("x.jpg")).unwrap_err();
        match err {
            PipelineError::Detector { reason, .. } => {
                assert!(reason.contains("exit code 3"));
                assert!(reason.contains("chyba"));
            }
            other => panic!("neočekávaná chyba: {other}"),
        }
    }
}
