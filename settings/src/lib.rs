//! Agent configuration: one JSON file, normalized on load.
//!
//! The file is the user-facing surface, so parsing is forgiving (every field
//! has a default) and `normalize` is idempotent: saving a normalized config
//! and loading it again yields the same value.

pub mod model;
pub mod normalize;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use model::*;
pub use normalize::{ConfigIssue, normalize, validate};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Load, parse and normalize the config file.
pub fn load(path: &Path) -> Result<AgentConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg: AgentConfig = serde_json::from_str(&raw)?;
    normalize(&mut cfg);
    Ok(cfg)
}

/// Persist raw JSON through a sibling temp file + rename so a crash mid-write
/// never leaves a truncated config behind.
pub fn save_raw(path: &Path, raw_json: &str) -> Result<(), ConfigError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, raw_json).map_err(|source| ConfigError::Write {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Stable content hash (FNV-1a 64) used for the HTTP compare-and-swap flow.
pub fn config_hash(raw_json: &str) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    for b in raw_json.as_bytes() {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(PRIME);
    }
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        let a = config_hash("{\"characters\":[]}");
        let b = config_hash("{\"characters\":[]}");
        let c = config_hash("{\"characters\":[1]}");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");

        let mut cfg = AgentConfig::default();
        cfg.characters.push(CharacterSettings {
            name: "Worker".into(),
            ..Default::default()
        });
        normalize(&mut cfg);

        save_raw(&path, &serde_json::to_string_pretty(&cfg).unwrap()).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }
}
