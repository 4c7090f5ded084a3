use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use crate::config::RoutingConfig;
use crate::workflows::intake::notification::{MailError, Mailer, OutboundEmail};
use crate::workflows::intake::storage::{ContainerRef, StorageError, StorageGateway, StoredFile};

#[derive(Debug, Default)]
pub(super) struct MemoryStorage {
    pub(super) files: Mutex<BTreeMap<String, StoredFile>>,
    pub(super) containers: Mutex<Vec<(String, ContainerRef)>>,
    pub(super) fail_create: bool,
    pub(super) fail_move: HashSet<String>,
    pub(super) fail_rename: HashSet<String>,
    pub(super) calls: Mutex<Vec<String>>,
}

impl MemoryStorage {
    pub(super) fn with_files(files: &[(&str, &str)]) -> Self {
        let storage = Self::default();
        {
            let mut guard = storage.files.lock().expect("files mutex");
            for (id, name) in files {
                guard.insert(
                    id.to_string(),
                    StoredFile {
                        id: id.to_string(),
                        name: name.to_string(),
                        parents: vec!["uploads".to_string()],
                    },
                );
            }
        }
        storage
    }

    pub(super) fn file(&self, id: &str) -> StoredFile {
        self.files
            .lock()
            .expect("files mutex")
            .get(id)
            .cloned()
            .expect("file exists")
    }

    pub(super) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls mutex").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls mutex").push(call);
    }
}

impl StorageGateway for MemoryStorage {
    fn create_container(&self, parent_id: &str, name: &str) -> Result<ContainerRef, StorageError> {
        self.record(format!("create:{name}"));
        if self.fail_create {
            return Err(StorageError::Backend("folder quota exceeded".to_string()));
        }
        let mut guard = self.containers.lock().expect("containers mutex");
        let container = ContainerRef {
            id: format!("folder-{}", guard.len() + 1),
            name: name.to_string(),
            url: Some(format!("https://drive.example/folder-{}", guard.len() + 1)),
        };
        guard.push((parent_id.to_string(), container.clone()));
        Ok(container)
    }

    fn get_file(&self, file_id: &str) -> Result<StoredFile, StorageError> {
        self.record(format!("get:{file_id}"));
        self.files
            .lock()
            .expect("files mutex")
            .get(file_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: "file",
                id: file_id.to_string(),
            })
    }

    fn rename_file(&self, file_id: &str, new_name: &str) -> Result<(), StorageError> {
        self.record(format!("rename:{file_id}"));
        if self.fail_rename.contains(file_id) {
            return Err(StorageError::Backend("rename rejected".to_string()));
        }
        let mut guard = self.files.lock().expect("files mutex");
        let file = guard.get_mut(file_id).ok_or_else(|| StorageError::NotFound {
            kind: "file",
            id: file_id.to_string(),
        })?;
        file.name = new_name.to_string();
        Ok(())
    }

    fn move_file(&self, file: &StoredFile, destination: &ContainerRef) -> Result<(), StorageError> {
        self.record(format!("move:{}", file.id));
        if self.fail_move.contains(&file.id) {
            return Err(StorageError::Backend("move rejected".to_string()));
        }
        let mut guard = self.files.lock().expect("files mutex");
        if let Some(stored) = guard.get_mut(&file.id) {
            stored.parents = vec![destination.id.clone()];
        }
        Ok(())
    }

    fn list_containers(&self, parent_id: &str) -> Result<Vec<ContainerRef>, StorageError> {
        Ok(self
            .containers
            .lock()
            .expect("containers mutex")
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
        let mut guard = self.containers.lock().expect("containers mutex");
        for (parent, existing) in guard.iter_mut() {
            if existing.id == container.id && parent == from_parent_id {
                *parent = to_parent_id.to_string();
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(super) struct RecordingMailer {
    pub(super) sent: Mutex<Vec<OutboundEmail>>,
    pub(super) fail_for: Option<String>,
}

impl RecordingMailer {
    pub(super) fn failing_for(recipient: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: Some(recipient.to_string()),
        }
    }

    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("mail mutex").clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        if let Some(recipient) = &self.fail_for {
            if email.to.iter().any(|to| to == recipient) {
                return Err(MailError::Transport("relay refused connection".to_string()));
            }
        }
        self.sent.lock().expect("mail mutex").push(email.clone());
        Ok(())
    }
}

pub(super) fn routing_config() -> RoutingConfig {
    RoutingConfig {
        destination_container_id: "intake-root".to_string(),
        recipients: vec!["ops@example.com".to_string()],
        admin_address: "admin@example.com".to_string(),
        subject_template: "New submission from {Company}".to_string(),
        standard_file_template: "{Company} - {QuestionTitle}".to_string(),
        special_file_prefix_template: "{Company}".to_string(),
        special_question_title: "Supporting Documents".to_string(),
        folder_name_exclusions: BTreeSet::from(["Email".to_string()]),
        email_body_exclusions: BTreeSet::from(["Internal Notes".to_string()]),
        timestamp_format: "%Y%m%d-%H%M".to_string(),
    }
}
