use form_filer::config::AppConfig;
use form_filer::error::AppError;
use form_filer::workflows::intake::{
    ContainerRef, GoogleDriveClient, MailError, Mailer, OutboundEmail, StorageError,
    StorageGateway, StoredFile,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Drive when a service-account key is configured, otherwise process memory.
pub(crate) async fn build_storage(
    config: &AppConfig,
    force_in_memory: bool,
) -> Result<Arc<dyn StorageGateway>, AppError> {
    match (&config.drive_service_account_key, force_in_memory) {
        (Some(key), false) => {
            let client = GoogleDriveClient::from_service_account_key(key).await?;
            info!(key = %key.display(), "using Google Drive storage");
            Ok(Arc::new(client))
        }
        _ => {
            warn!("no Drive credentials in use; files live in process memory only");
            Ok(Arc::new(InMemoryStorage::default()))
        }
    }
}

#[derive(Debug, Default)]
struct Tree {
    files: HashMap<String, StoredFile>,
    // (parent id, container) in creation order
    containers: Vec<(String, ContainerRef)>,
}

/// Process-local storage used by the demo and when no Drive key is configured.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemoryStorage {
    tree: Arc<Mutex<Tree>>,
}

impl InMemoryStorage {
    pub(crate) fn seed_file(&self, id: &str, name: &str, parent_id: &str) {
        let mut guard = self.tree.lock().expect("storage mutex poisoned");
        guard.files.insert(
            id.to_string(),
            StoredFile {
                id: id.to_string(),
                name: name.to_string(),
                parents: vec![parent_id.to_string()],
            },
        );
    }

    pub(crate) fn seed_container(&self, parent_id: &str, id: &str, name: &str) {
        let mut guard = self.tree.lock().expect("storage mutex poisoned");
        guard.containers.push((
            parent_id.to_string(),
            ContainerRef {
                id: id.to_string(),
                name: name.to_string(),
                url: None,
            },
        ));
    }

    pub(crate) fn files_in(&self, container_id: &str) -> Vec<StoredFile> {
        let guard = self.tree.lock().expect("storage mutex poisoned");
        let mut files: Vec<StoredFile> = guard
            .files
            .values()
            .filter(|file| file.parents.iter().any(|parent| parent == container_id))
            .cloned()
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        files
    }
}

impl StorageGateway for InMemoryStorage {
    fn create_container(&self, parent_id: &str, name: &str) -> Result<ContainerRef, StorageError> {
        let mut guard = self.tree.lock().expect("storage mutex poisoned");
        let id = format!("mem-folder-{}", guard.containers.len() + 1);
        let container = ContainerRef {
            url: Some(format!("memory://{id}")),
            id,
            name: name.to_string(),
        };
        guard
            .containers
            .push((parent_id.to_string(), container.clone()));
        Ok(container)
    }

    fn get_file(&self, file_id: &str) -> Result<StoredFile, StorageError> {
        let guard = self.tree.lock().expect("storage mutex poisoned");
        guard
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: "file",
                id: file_id.to_string(),
            })
    }

    fn rename_file(&self, file_id: &str, new_name: &str) -> Result<(), StorageError> {
        let mut guard = self.tree.lock().expect("storage mutex poisoned");
        let file = guard
            .files
            .get_mut(file_id)
            .ok_or_else(|| StorageError::NotFound {
                kind: "file",
                id: file_id.to_string(),
            })?;
        file.name = new_name.to_string();
        Ok(())
    }

    fn move_file(&self, file: &StoredFile, destination: &ContainerRef) -> Result<(), StorageError> {
        let mut guard = self.tree.lock().expect("storage mutex poisoned");
        let stored = guard
            .files
            .get_mut(&file.id)
            .ok_or_else(|| StorageError::NotFound {
                kind: "file",
                id: file.id.clone(),
            })?;
        stored.parents = vec![destination.id.clone()];
        Ok(())
    }

    fn list_containers(&self, parent_id: &str) -> Result<Vec<ContainerRef>, StorageError> {
        let guard = self.tree.lock().expect("storage mutex poisoned");
        Ok(guard
            .containers
            .iter()
            .filter(|(parent, _)| parent == parent_id)
            .map(|(_, container)| container.clone())
            .collect())
    }

    fn find_container(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<ContainerRef>, StorageError> {
        Ok(self
            .list_containers(parent_id)?
            .into_iter()
            .find(|container| container.name == name))
    }

    fn move_container(
        &self,
        container: &ContainerRef,
        from_parent_id: &str,
        to_parent_id: &str,
    ) -> Result<(), StorageError> {
        let mut guard = self.tree.lock().expect("storage mutex poisoned");
        let entry = guard
            .containers
            .iter_mut()
            .find(|(parent, existing)| existing.id == container.id && parent == from_parent_id)
            .ok_or_else(|| StorageError::NotFound {
                kind: "folder",
                id: container.id.clone(),
            })?;
        entry.0 = to_parent_id.to_string();
        Ok(())
    }
}

/// Keeps every message in memory; used by the demo and route tests.
#[derive(Debug, Default, Clone)]
pub(crate) struct OutboxMailer {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl OutboxMailer {
    pub(crate) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("outbox mutex poisoned").clone()
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        if email.to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        self.sent
            .lock()
            .expect("outbox mutex poisoned")
            .push(email.clone());
        Ok(())
    }
}

/// Writes each message to the log instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        if email.to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        info!(
            to = %email.to.join(", "),
            subject = %email.subject,
            body_bytes = email.html_body.len(),
            "outbound email"
        );
        Ok(())
    }
}
