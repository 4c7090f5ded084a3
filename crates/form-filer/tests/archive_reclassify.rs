use std::collections::HashMap;
use std::sync::Mutex;

use form_filer::config::{ArchiveConfig, KeywordRule};
use form_filer::workflows::archive::{FolderReclassifier, MoveStatus, ReclassifyError};
use form_filer::workflows::intake::{ContainerRef, StorageError, StorageGateway, StoredFile};

/// Folder tree keyed by parent id.
#[derive(Debug, Default)]
struct Archive {
    children: Mutex<HashMap<String, Vec<ContainerRef>>>,
    unreadable: Option<String>,
    created: Mutex<usize>,
}

impl Archive {
    fn add(&self, parent: &str, id: &str, name: &str) {
        self.children
            .lock()
            .expect("archive mutex")
            .entry(parent.to_string())
            .or_default()
            .push(ContainerRef {
                id: id.to_string(),
                name: name.to_string(),
                url: None,
            });
    }

    fn names_under(&self, parent: &str) -> Vec<String> {
        self.children
            .lock()
            .expect("archive mutex")
            .get(parent)
            .map(|folders| folders.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default()
    }

    fn id_of(&self, parent: &str, name: &str) -> String {
        self.find_container(parent, name)
            .expect("lookup")
            .map(|folder| folder.id)
            .expect("folder exists")
    }
}

impl StorageGateway for Archive {
    fn create_container(&self, parent_id: &str, name: &str) -> Result<ContainerRef, StorageError> {
        let mut created = self.created.lock().expect("counter mutex");
        *created += 1;
        let id = format!("created-{}", *created);
        drop(created);
        self.add(parent_id, &id, name);
        Ok(ContainerRef {
            id,
            name: name.to_string(),
            url: None,
        })
    }

    fn get_file(&self, file_id: &str) -> Result<StoredFile, StorageError> {
        Err(StorageError::NotFound {
            kind: "file",
            id: file_id.to_string(),
        })
    }

    fn rename_file(&self, _file_id: &str, _new_name: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn move_file(&self, _file: &StoredFile, _destination: &ContainerRef) -> Result<(), StorageError> {
        Ok(())
    }

    fn list_containers(&self, parent_id: &str) -> Result<Vec<ContainerRef>, StorageError> {
        if self.unreadable.as_deref() == Some(parent_id) {
            return Err(StorageError::Backend("403 forbidden".to_string()));
        }
        Ok(self
            .children
            .lock()
            .expect("archive mutex")
            .get(parent_id)
            .cloned()
            .unwrap_or_default())
    }

    fn find_container(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<ContainerRef>, StorageError> {
        Ok(self
            .list_containers(parent_id)?
            .into_iter()
            .find(|folder| folder.name == name))
    }

    fn move_container(
        &self,
        container: &ContainerRef,
        from_parent_id: &str,
        to_parent_id: &str,
    ) -> Result<(), StorageError> {
        let mut children = self.children.lock().expect("archive mutex");
        let siblings = children.entry(from_parent_id.to_string()).or_default();
        siblings.retain(|folder| folder.id != container.id);
        children
            .entry(to_parent_id.to_string())
            .or_default()
            .push(container.clone());
        Ok(())
    }
}

fn config() -> ArchiveConfig {
    ArchiveConfig {
        root_container_id: "archive".to_string(),
        keyword_rules: vec![KeywordRule {
            keyword: "Lease".to_string(),
            category: "Leasing".to_string(),
        }],
        fallback_category: "Uncategorized".to_string(),
        timestamp_format: "%Y%m%d-%H%M".to_string(),
    }
}

#[test]
fn sorts_submissions_found_at_any_depth() {
    let archive = Archive::default();
    archive.add("archive", "inbox", "Inbox");
    archive.add("inbox", "s1", "20240229-2359_PENDING_Initech_LEASE renewal");
    archive.add("archive", "s2", "20240301-0000_PENDING_Globex");

    let report = FolderReclassifier::new(&archive, &config())
        .run()
        .expect("pass succeeds");

    assert_eq!(report.moves.len(), 2);
    assert!(report.moves.iter().all(|m| m.status == MoveStatus::Moved));
    assert_eq!(report.moves[0].from_path, "Inbox");
    assert_eq!(report.moves[0].to_path, "2024/02 - February/Leasing");

    let year = archive.id_of("archive", "2024");
    assert_eq!(archive.names_under(&year), vec!["02 - February", "03 - March"]);
    let march = archive.id_of(&year, "03 - March");
    let uncategorized = archive.id_of(&march, "Uncategorized");
    assert_eq!(
        archive.names_under(&uncategorized),
        vec!["20240301-0000_PENDING_Globex"]
    );
    assert!(archive.names_under("inbox").is_empty());
    assert!(archive.names_under("archive").contains(&"Inbox".to_string()));
}

#[test]
fn unreadable_root_aborts_the_pass() {
    let archive = Archive {
        unreadable: Some("archive".to_string()),
        ..Archive::default()
    };

    let err = FolderReclassifier::new(&archive, &config())
        .run()
        .expect_err("listing fails");

    assert!(matches!(err, ReclassifyError::Listing { ref path, .. } if path == "/"));
}
