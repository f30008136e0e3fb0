// FILE: src/cli/config.rs

use crate::error::{CompilerError, Result};
use crate::hash::ArchiveSpec;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub base_dir: Option<String>,
    /// Declared in file order; appended after `-D` definitions
    pub macros: Option<IndexMap<String, String>>,
    pub changes: Option<String>,
    pub archive: Option<ArchiveSpec>,
    pub hash_required: Option<bool>,
    pub pretty: Option<bool>,
    pub offline: Option<bool>,
    pub fetch_timeout_secs: Option<u64>,
    pub fetch_retries: Option<u32>,
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("Config file {}: {}", config_path, e),
    })?;

    let config = if config_path.ends_with(".json") {
        serde_json::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })?
    } else if config_path.ends_with(".toml") {
        toml::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })?
    } else {
        return Err(CompilerError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        });
    };

    log::info!("Loaded configuration from {}", config_path);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plgc.toml");
        fs::write(
            &path,
            r#"
pretty = true
changes = "CHANGELOG.md"

[macros]
author = "someone"

[archive]
command = "makepkg"
args = ["-c", "y", "&name;.txz"]
output = "&name;.txz"
"#,
        )
        .unwrap();

        let config = load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.pretty, Some(true));
        assert_eq!(config.changes.as_deref(), Some("CHANGELOG.md"));
        assert_eq!(config.macros.unwrap()["author"], "someone");
        let archive = config.archive.unwrap();
        assert_eq!(archive.command, "makepkg");
        assert_eq!(archive.args.len(), 3);
        assert_eq!(config.hash_required, None);
    }

    #[test]
    fn test_load_json_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plgc.json");
        fs::write(&path, r#"{"offline": true, "archive": {"command": "tar", "output": "out.tar"}}"#).unwrap();

        let config = load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.offline, Some(true));
        assert!(config.archive.unwrap().args.is_empty());
    }

    #[test]
    fn test_macros_keep_file_order() {
        let dir = TempDir::new().unwrap();
        let toml_path = dir.path().join("plgc.toml");
        fs::write(&toml_path, "[macros]\nzeta = \"z\"\nalpha = \"a\"\nmid = \"m\"\n").unwrap();
        let json_path = dir.path().join("plgc.json");
        fs::write(&json_path, r#"{"macros": {"zeta": "z", "alpha": "a", "mid": "m"}}"#).unwrap();

        for path in [toml_path, json_path] {
            let config = load(path.to_str().unwrap()).unwrap();
            let names: Vec<_> = config.macros.unwrap().keys().cloned().collect();
            assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        }
    }

    #[test]
    fn test_rejects_unknown_extension_and_bad_syntax() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("plgc.yaml");
        fs::write(&yaml, "pretty: true").unwrap();
        assert!(matches!(load(yaml.to_str().unwrap()), Err(CompilerError::InvalidFormat { .. })));

        let json = dir.path().join("bad.json");
        fs::write(&json, "{pretty: ").unwrap();
        assert!(matches!(load(json.to_str().unwrap()), Err(CompilerError::InvalidFormat { .. })));

        assert!(matches!(load("/nonexistent/plgc.toml"), Err(CompilerError::FileNotFound { .. })));
    }
}
