use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed metadata store: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataFile {
    documents: HashMap<String, HashMap<String, String>>,
}

/// Key-value metadata attributes per document, persisted as a JSON sidecar
/// file. Documents are keyed by path; attributes hold opaque strings.
pub struct MetadataStore {
    path: PathBuf,
    entries: MetadataFile,
}

impl MetadataStore {
    /// Open a store backed by `path`. A missing file is an empty store.
    pub fn open(path: PathBuf) -> Result<Self, MetadataError> {
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => MetadataFile::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, entries })
    }

    pub fn get(&self, document: &Path, attribute: &str) -> Option<&str> {
        self.entries
            .documents
            .get(&store_key(document))?
            .get(attribute)
            .map(String::as_str)
    }

    /// Set or clear one attribute. `None` removes the attribute, and the
    /// document's whole entry once its last attribute is gone.
    pub fn set(&mut self, document: &Path, attribute: &str, value: Option<&str>) {
        let key = store_key(document);
        match value {
            Some(value) => {
                self.entries
                    .documents
                    .entry(key)
                    .or_default()
                    .insert(attribute.to_string(), value.to_string());
            }
            None => {
                if let Some(attributes) = self.entries.documents.get_mut(&key) {
                    attributes.remove(attribute);
                    if attributes.is_empty() {
                        self.entries.documents.remove(&key);
                    }
                }
            }
        }
    }

    pub fn save(&self) -> Result<(), MetadataError> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn store_key(document: &Path) -> String {
    document.to_string_lossy().into_owned()
}
