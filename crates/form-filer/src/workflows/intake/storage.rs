use std::fmt::Debug;

use serde::Serialize;

/// Folder-like container in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerRef {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Metadata for a stored file looked up by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("storage operation failed: {0}")]
    Backend(String),
    #[error("storage runtime unavailable: {0}")]
    Runtime(String),
}

/// Storage collaborator used by the file router, orchestrator, and reclassifier.
pub trait StorageGateway: Debug + Send + Sync {
    fn create_container(&self, parent_id: &str, name: &str) -> Result<ContainerRef, StorageError>;
    fn get_file(&self, file_id: &str) -> Result<StoredFile, StorageError>;
    fn rename_file(&self, file_id: &str, new_name: &str) -> Result<(), StorageError>;
    fn move_file(&self, file: &StoredFile, destination: &ContainerRef) -> Result<(), StorageError>;

    /// Direct child containers of `parent_id`.
    fn list_containers(&self, parent_id: &str) -> Result<Vec<ContainerRef>, StorageError>;
    fn find_container(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<ContainerRef>, StorageError>;
    fn move_container(
        &self,
        container: &ContainerRef,
        from_parent_id: &str,
        to_parent_id: &str,
    ) -> Result<(), StorageError>;

    /// Returns the named child of `parent_id`, creating it when absent.
    fn ensure_container(&self, parent_id: &str, name: &str) -> Result<ContainerRef, StorageError> {
        match self.find_container(parent_id, name)? {
            Some(existing) => Ok(existing),
            None => self.create_container(parent_id, name),
        }
    }
}
