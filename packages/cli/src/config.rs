use anyhow::{Context, Result};
use sop_editor::EditorConfig;
use std::path::{Path, PathBuf};

/// Resolve the editor config: an explicit `--config` file must exist,
/// otherwise `sop.config.json` in `cwd` is used when present.
pub fn load(cwd: &str, explicit: Option<&Path>) -> Result<EditorConfig> {
    match explicit {
        Some(path) => {
            let path = resolve(cwd, path);
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Cannot read config {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid config {}", path.display()))
        }
        None => EditorConfig::load(Path::new(cwd)).context("Cannot load sop.config.json"),
    }
}

/// Interpret `path` relative to `cwd` unless it is absolute
pub fn resolve(cwd: &str, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        PathBuf::from(cwd).join(path)
    }
}
