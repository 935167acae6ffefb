//! Loading of TOML/JSON documents (catalogs, inventories, config)

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Errors raised while reading or decoding a document file
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read `path` and decode it as JSON when the extension is `.json`,
/// as TOML otherwise
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, DocumentError> {
    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&content).map_err(|source| DocumentError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        toml::from_str(&content).map_err(|source| DocumentError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
    }

    #[test]
    fn test_loads_toml_and_json_by_extension() {
        let dir = tempdir().unwrap();
        let toml_path = dir.path().join("sample.toml");
        let json_path = dir.path().join("sample.JSON");
        fs::write(&toml_path, "name = \"leaf1\"\n").unwrap();
        fs::write(&json_path, r#"{"name": "leaf2"}"#).unwrap();

        let from_toml: Sample = load_document(&toml_path).unwrap();
        let from_json: Sample = load_document(&json_path).unwrap();

        assert_eq!(from_toml.name, "leaf1");
        assert_eq!(from_json.name, "leaf2");
    }

    #[test]
    fn test_reports_missing_and_malformed_files() {
        let dir = tempdir().unwrap();

        let missing = load_document::<Sample>(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(DocumentError::Io { .. })));

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "name = ").unwrap();
        let err = load_document::<Sample>(&bad).unwrap_err();
        assert!(matches!(err, DocumentError::Toml { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }
}
