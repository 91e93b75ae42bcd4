//! Whole-file JSON log: read, classify, and atomically rewrite.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use super::records::{ENTRY_TYPE_FIELD, ENTRY_TYPE_NOTE};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("knowledge base {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("knowledge base {path} must contain a JSON array of records")]
    NotAnArray { path: PathBuf },

    #[error("snapshot for {document_id} could not be decoded: {source}")]
    Decode {
        document_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("persistence task failed: {0}")]
    Join(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read every record. A missing or blank file is an empty log.
pub fn read_entries(path: &Path) -> StoreResult<Vec<Value>> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(&data).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Array(entries) => Ok(entries),
        _ => Err(StoreError::NotAnArray {
            path: path.to_path_buf(),
        }),
    }
}

/// Rewrite the whole log through a sibling temp file and rename.
pub fn write_entries(path: &Path, entries: &[Value]) -> StoreResult<()> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    let tmp = temp_path(path);
    fs::write(&tmp, json).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(write_err)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Discriminator of a raw record. Missing means "note"; `None` for
/// non-object records or a non-string tag.
pub fn entry_type(entry: &Value) -> Option<&str> {
    let object = entry.as_object()?;
    match object.get(ENTRY_TYPE_FIELD) {
        None | Some(Value::Null) => Some(ENTRY_TYPE_NOTE),
        Some(Value::String(tag)) if tag.is_empty() => Some(ENTRY_TYPE_NOTE),
        Some(Value::String(tag)) => Some(tag.as_str()),
        Some(_) => None,
    }
}

/// Document id of a raw record, read without full decoding.
pub fn document_id(entry: &Value) -> Option<&str> {
    entry
        .get("documentId")
        .or_else(|| entry.get("paperId"))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn missing_and_blank_files_are_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kb.json");
        assert!(read_entries(&path).unwrap().is_empty());
        fs::write(&path, "  \n").unwrap();
        assert!(read_entries(&path).unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kb.json");
        fs::write(&path, "[{\"title\": ").unwrap();
        assert!(matches!(read_entries(&path), Err(StoreError::Corrupt { .. })));
        fs::write(&path, "{\"title\": \"x\"}").unwrap();
        assert!(matches!(read_entries(&path), Err(StoreError::NotAnArray { .. })));
    }

    #[test]
    fn write_creates_parents_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/kb.json");
        write_entries(&path, &[json!({"entryType": "note", "title": "a"})]).unwrap();
        assert_eq!(read_entries(&path).unwrap().len(), 1);
        assert!(!dir.path().join("nested/dir/kb.json.tmp").exists());
    }

    #[test]
    fn entry_type_defaults_to_note() {
        assert_eq!(entry_type(&json!({"title": "a"})), Some("note"));
        assert_eq!(entry_type(&json!({"entryType": ""})), Some("note"));
        assert_eq!(entry_type(&json!({"entryType": "conversation"})), Some("conversation"));
        assert_eq!(entry_type(&json!({"entryType": 7})), None);
        assert_eq!(entry_type(&json!("stray string")), None);
    }

    #[test]
    fn document_id_reads_legacy_field() {
        assert_eq!(document_id(&json!({"paperId": "p"})), Some("p"));
        assert_eq!(document_id(&json!({"documentId": "d"})), Some("d"));
        assert_eq!(document_id(&json!({})), None);
    }
}
