//! Document sources: where raw document bytes come from.

use std::path::PathBuf;

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::error::Result;
use crate::types::FileType;

/// A named blob of document bytes, as offered by a source.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl DocumentFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Where documents come from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// List every document this source offers, in a stable order.
    async fn list_documents(&self) -> Result<Vec<DocumentFile>>;

    fn name(&self) -> &str;
}

/// Recursively reads supported files from a directory.
///
/// Document names are paths relative to the root, so files in nested
/// directories stay unique within the session.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentSource for DirectorySource {
    async fn list_documents(&self) -> Result<Vec<DocumentFile>> {
        let mut paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(FileType::from_name)
                    .is_some()
            })
            .collect();
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path
                .strip_prefix(&self.root)
                .unwrap_or(&path)
                .display()
                .to_string();
            let data = tokio::fs::read(&path).await?;
            files.push(DocumentFile::new(name, data));
        }
        Ok(files)
    }

    fn name(&self) -> &str {
        "directory"
    }
}

/// Serves documents already held in memory; used by tests and hosts that
/// receive uploads directly.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Vec<DocumentFile>,
}

impl MemorySource {
    pub fn new(files: Vec<DocumentFile>) -> Self {
        Self { files }
    }

    pub fn push(&mut self, file: DocumentFile) {
        self.files.push(file);
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn list_documents(&self) -> Result<Vec<DocumentFile>> {
        Ok(self.files.clone())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
