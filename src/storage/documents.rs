//! Flat JSON document store under `data/`.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde_json::Value;
use tracing::info;

use super::StorageError;

/// Strip everything but ASCII letters, digits, `_`, `.` and `-`. A name that
/// ends up empty, `.` or `..` is rejected.
pub fn sanitize_document_name(name: &str) -> Result<String, StorageError> {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => Err(StorageError::InvalidSegment(name.to_string())),
        _ => Ok(cleaned),
    }
}

/// JSON documents saved and loaded whole, keyed by sanitized filename.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.dir.join(sanitize_document_name(name)?))
    }

    /// Replace the document with `value`, pretty-printed.
    pub fn save(&self, name: &str, value: &Value) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        info!("Saved document {:?}", path);
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Value, StorageError> {
        let path = self.path_for(name)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound("Data file not found".to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(StorageError::NotFound("Data file not found".to_string()));
        }
        fs::remove_file(&path)?;
        info!("Deleted document {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> DocumentStore {
        DocumentStore::new(tmp.path().join("data"))
    }

    #[test]
    fn test_sanitize_document_name() {
        assert_eq!(sanitize_document_name("history.json").unwrap(), "history.json");
        assert_eq!(sanitize_document_name("../history.json").unwrap(), "..history.json");
        assert_eq!(sanitize_document_name("my file!.json").unwrap(), "myfile.json");
        assert!(sanitize_document_name("..").is_err());
        assert!(sanitize_document_name("/./").is_err());
        assert!(sanitize_document_name("").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let doc = json!({"items": [1, 2, 3], "theme": "dark"});

        store.save("history.json", &doc).unwrap();

        assert_eq!(store.load("history.json").unwrap(), doc);
        let raw = fs::read_to_string(tmp.path().join("data/history.json")).unwrap();
        assert!(raw.contains("\n  \"items\""));
    }

    #[test]
    fn test_save_overwrites_wholesale() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.save("s.json", &json!({"a": 1, "b": 2})).unwrap();
        store.save("s.json", &json!({"c": 3})).unwrap();

        assert_eq!(store.load("s.json").unwrap(), json!({"c": 3}));
    }

    #[test]
    fn test_load_missing() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            store(&tmp).load("nope.json"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_traversal_stays_in_data_dir() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.save("../../escape.json", &json!(1)).unwrap();

        assert!(tmp.path().join("data/....escape.json").is_file());
        assert!(!tmp.path().join("escape.json").exists());
    }

    #[test]
    fn test_delete() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.save("x.json", &json!(null)).unwrap();

        store.delete("x.json").unwrap();
        assert!(matches!(store.delete("x.json"), Err(StorageError::NotFound(_))));
    }
}
