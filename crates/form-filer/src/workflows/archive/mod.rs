//! Periodic reclassification of submission folders into `year/month/category`.

use std::io::Write;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ArchiveConfig;
use crate::workflows::intake::storage::{ContainerRef, StorageError, StorageGateway};

/// Where a submission folder belongs under the archive root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTarget {
    pub year: String,
    pub month: String,
    pub category: String,
}

impl ArchiveTarget {
    pub fn segments(&self) -> [&str; 3] {
        [&self.year, &self.month, &self.category]
    }
}

/// Computes the target for a folder whose name starts with a run timestamp in
/// `config.timestamp_format` followed by `_`; other names yield `None`.
pub fn classify(name: &str, config: &ArchiveConfig) -> Option<ArchiveTarget> {
    let date = submission_date(name, &config.timestamp_format)?;
    let lowered = name.to_lowercase();
    let category = config
        .keyword_rules
        .iter()
        .find(|rule| lowered.contains(&rule.keyword.to_lowercase()))
        .map(|rule| rule.category.clone())
        .unwrap_or_else(|| config.fallback_category.clone());

    Some(ArchiveTarget {
        year: date.format("%Y").to_string(),
        month: date.format("%m - %B").to_string(),
        category,
    })
}

fn submission_date(name: &str, timestamp_format: &str) -> Option<NaiveDate> {
    // Date-only formats fail the date-time parse with too little input.
    let (date, rest) = match NaiveDateTime::parse_and_remainder(name, timestamp_format) {
        Ok((stamp, rest)) => (stamp.date(), rest),
        Err(_) => NaiveDate::parse_and_remainder(name, timestamp_format).ok()?,
    };
    rest.starts_with('_').then_some(date)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveStatus {
    Moved,
    Planned,
    Failed,
}

/// One submission folder the pass relocated (or would relocate).
#[derive(Debug, Clone, Serialize)]
pub struct ReclassifiedFolder {
    pub container_id: String,
    pub name: String,
    pub from_path: String,
    pub to_path: String,
    pub status: MoveStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReclassifyReport {
    pub moves: Vec<ReclassifiedFolder>,
    pub already_filed: usize,
    pub visited: usize,
}

impl ReclassifyReport {
    pub fn failures(&self) -> usize {
        self.moves
            .iter()
            .filter(|entry| entry.status == MoveStatus::Failed)
            .count()
    }

    /// Writes one CSV row per planned or attempted move.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for entry in &self.moves {
            csv_writer.serialize(entry)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReclassifyError {
    #[error("unable to list folders under '{path}'")]
    Listing {
        path: String,
        #[source]
        source: StorageError,
    },
}

/// Walks the archive root and moves submission folders into their target path.
#[derive(Debug)]
pub struct FolderReclassifier<'a, S: ?Sized> {
    storage: &'a S,
    config: &'a ArchiveConfig,
    dry_run: bool,
}

impl<'a, S> FolderReclassifier<'a, S>
where
    S: StorageGateway + ?Sized,
{
    pub fn new(storage: &'a S, config: &'a ArchiveConfig) -> Self {
        Self {
            storage,
            config,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn run(&self) -> Result<ReclassifyReport, ReclassifyError> {
        let mut report = ReclassifyReport::default();

        // Snapshot the tree first so folders moved during the pass are not revisited.
        let mut found = Vec::new();
        self.collect(&self.config.root_container_id, &mut Vec::new(), &mut found)?;

        for (parent_id, path, container) in found {
            report.visited += 1;
            let Some(target) = classify(&container.name, self.config) else {
                continue;
            };

            let target_path = target.segments().join("/");
            if path.join("/") == target_path {
                report.already_filed += 1;
                continue;
            }

            let entry = self.relocate(&container, &parent_id, &path, &target);
            report.moves.push(entry);
        }

        info!(
            visited = report.visited,
            moved = report.moves.len(),
            failed = report.failures(),
            already_filed = report.already_filed,
            dry_run = self.dry_run,
            "folder reclassification finished"
        );
        Ok(report)
    }

    fn collect(
        &self,
        parent_id: &str,
        path: &mut Vec<String>,
        found: &mut Vec<(String, Vec<String>, ContainerRef)>,
    ) -> Result<(), ReclassifyError> {
        let children =
            self.storage
                .list_containers(parent_id)
                .map_err(|source| ReclassifyError::Listing {
                    path: display_path(path),
                    source,
                })?;

        for child in children {
            if submission_date(&child.name, &self.config.timestamp_format).is_some() {
                found.push((parent_id.to_string(), path.clone(), child));
            } else {
                path.push(child.name.clone());
                self.collect(&child.id, path, found)?;
                path.pop();
                found.push((parent_id.to_string(), path.clone(), child));
            }
        }
        Ok(())
    }

    fn relocate(
        &self,
        container: &ContainerRef,
        parent_id: &str,
        path: &[String],
        target: &ArchiveTarget,
    ) -> ReclassifiedFolder {
        let mut entry = ReclassifiedFolder {
            container_id: container.id.clone(),
            name: container.name.clone(),
            from_path: display_path(path),
            to_path: target.segments().join("/"),
            status: MoveStatus::Planned,
            error: None,
        };
        if self.dry_run {
            return entry;
        }

        let result = self.ensure_target(target).and_then(|destination| {
            self.storage
                .move_container(container, parent_id, &destination.id)
        });
        match result {
            Ok(()) => {
                info!(folder = %container.name, to = %entry.to_path, "reclassified folder");
                entry.status = MoveStatus::Moved;
            }
            Err(err) => {
                warn!(folder = %container.name, error = %err, "unable to reclassify folder");
                entry.status = MoveStatus::Failed;
                entry.error = Some(err.to_string());
            }
        }
        entry
    }

    fn ensure_target(&self, target: &ArchiveTarget) -> Result<ContainerRef, StorageError> {
        let mut parent = ContainerRef {
            id: self.config.root_container_id.clone(),
            name: String::new(),
            url: None,
        };
        for segment in target.segments() {
            parent = self.storage.ensure_container(&parent.id, segment)?;
        }
        Ok(parent)
    }
}

fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.join("/")
    }
}
