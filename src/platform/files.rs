//! Application file storage.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;

use crate::platform::{PlatformError, PlatformResult};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub file_id: String,
    pub file_name: String,
    pub content_type: String,
    pub length: u64,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub metadata: FileMetadata,
    pub content: Bytes,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn download(&self, file_id: &str) -> PlatformResult<Option<StoredFile>>;

    async fn metadata(&self, file_id: &str) -> PlatformResult<Option<FileMetadata>>;

    async fn upload(&self, file_name: &str, content_type: Option<&str>, content: Bytes) -> PlatformResult<FileMetadata>;
}

#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: DashMap<String, StoredFile>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn download(&self, file_id: &str) -> PlatformResult<Option<StoredFile>> {
        Ok(self.files.get(file_id).map(|entry| entry.value().clone()))
    }

    async fn metadata(&self, file_id: &str) -> PlatformResult<Option<FileMetadata>> {
        Ok(self.files.get(file_id).map(|entry| entry.value().metadata.clone()))
    }

    async fn upload(&self, file_name: &str, content_type: Option<&str>, content: Bytes) -> PlatformResult<FileMetadata> {
        if file_name.trim().is_empty() {
            return Err(PlatformError::File("file name must not be blank".to_string()));
        }

        let metadata = FileMetadata {
            file_id: uuid::Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            content_type: content_type
                .filter(|ct| !ct.trim().is_empty())
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            length: content.len() as u64,
        };
        self.files.insert(
            metadata.file_id.clone(),
            StoredFile {
                metadata: metadata.clone(),
                content,
            },
        );
        Ok(metadata)
    }
}
