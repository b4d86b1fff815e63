use std::path::{Path, PathBuf};

use anyhow::Context;

// .wav files directly inside `dir`, sorted by path
pub fn index_wav_in_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if path.is_file() && is_wav {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

// Raw bytes, decoding happens in the store at the session rate
pub fn read_sample(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read sample {}", path.display()))
}
