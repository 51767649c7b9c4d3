// src/blake3.rs
use std::{fs::File, io::Read, path::Path};

use anyhow::{Context, Result};

/// BLAKE3 hash souboru, streamovaně (stránky můžou být velké).
pub fn compute_blake3(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Nelze otevřít `{}` pro BLAKE3", path.display()))?;

    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 16384];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// BLAKE3 hash bajtů v paměti.
pub fn hash_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Zkrácený hex prefix hashe – identifikátory panelů a klíče úložiště
/// výřezů nepotřebují celých 64 znaků.
pub fn short_hash(data: &[u8], len: usize) -> String {
    let mut hex = hash_bytes(data);
    hex.truncate(len);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_bytes_is_stable() {
        assert_eq!(hash_bytes(b"abc"), hash_bytes(b"abc"));
        assert_ne!(hash_bytes(b"abc"), hash_bytes(b"abd"));
    }

    #[test]
    fn short_hash_is_prefix() {
        let full = hash_bytes(b"panel");
        let short = short_hash(b"panel", 12);
        assert_eq!(short.len(), 12);
        assert!(full.starts_with(&short));
    }

    #[test]
    fn file_hash_matches_byte_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"obsah souboru").unwrap();
        assert_eq!(compute_blake3(&path).unwrap(), hash_bytes(b"obsah souboru"));
    }
}
