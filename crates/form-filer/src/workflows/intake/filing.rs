use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{FileRef, ItemResponse};
use super::naming::{sanitize, special_file_name, standard_file_name};
use super::responses::ResponseMap;
use super::storage::{ContainerRef, StorageError, StorageGateway, StoredFile};
use super::template;
use crate::config::RoutingConfig;

/// Override key exposing the current question title to the standard template.
pub const QUESTION_TITLE_TOKEN: &str = "QuestionTitle";

/// Which naming rule applied to an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    Standard,
    Special,
}

/// Result of filing one attachment.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RouteOutcome {
    Moved {
        file_id: String,
        question_title: String,
        strategy: NamingStrategy,
        original_name: String,
        final_name: String,
    },
    Failed {
        file_id: String,
        question_title: String,
        #[serde(serialize_with = "serialize_reason")]
        reason: FileRoutingError,
    },
}

impl RouteOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RouteOutcome::Failed { .. })
    }

    pub fn file_id(&self) -> &str {
        match self {
            RouteOutcome::Moved { file_id, .. } | RouteOutcome::Failed { file_id, .. } => file_id,
        }
    }
}

/// Stage at which filing one attachment failed. The storage cause is part of
/// the message, since outcomes are rendered on a single line.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FileRoutingError {
    #[error("lookup failed: {0}")]
    Lookup(StorageError),
    #[error("rename failed: {0}")]
    Rename(StorageError),
    #[error("move failed: {0}")]
    Move(StorageError),
    #[error("generated name for '{original_name}' is blank")]
    BlankName { original_name: String },
}

fn serialize_reason<S>(reason: &FileRoutingError, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(reason)
}

/// Names and relocates every uploaded file of a submission.
#[derive(Debug)]
pub struct FileRouter<'a, S: ?Sized> {
    storage: &'a S,
    config: &'a RoutingConfig,
}

impl<'a, S> FileRouter<'a, S>
where
    S: StorageGateway + ?Sized,
{
    pub fn new(storage: &'a S, config: &'a RoutingConfig) -> Self {
        Self { storage, config }
    }

    /// Files uploads in submission order, then upload order within a question.
    /// Failures are recorded per file and never stop the remaining files.
    pub fn route(
        &self,
        items: &[ItemResponse],
        destination: &ContainerRef,
        responses: &ResponseMap,
    ) -> Vec<RouteOutcome> {
        let mut outcomes = Vec::new();

        for item in items.iter().filter(|item| item.is_file_upload()) {
            let files = item.uploaded_files();
            if files.is_empty() {
                continue;
            }

            let namer = self.namer_for(item, responses);
            for (index, file) in files.iter().enumerate() {
                let outcome = match self.route_file(file, &namer, index + 1, files.len(), destination)
                {
                    Ok((original_name, final_name)) => {
                        info!(
                            file_id = %file.0,
                            question = item.question_title(),
                            %final_name,
                            "filed attachment"
                        );
                        RouteOutcome::Moved {
                            file_id: file.0.clone(),
                            question_title: item.question_title().to_string(),
                            strategy: namer.strategy(),
                            original_name,
                            final_name,
                        }
                    }
                    Err(reason) => {
                        warn!(
                            file_id = %file.0,
                            question = item.question_title(),
                            error = %reason,
                            "unable to file attachment"
                        );
                        RouteOutcome::Failed {
                            file_id: file.0.clone(),
                            question_title: item.question_title().to_string(),
                            reason,
                        }
                    }
                };
                outcomes.push(outcome);
            }
        }

        outcomes
    }

    fn namer_for(&self, item: &ItemResponse, responses: &ResponseMap) -> Namer {
        if self.config.is_special_question(item.question_title()) {
            let prefix = template::resolve(
                &self.config.special_file_prefix_template,
                responses.as_map(),
                &HashMap::new(),
            );
            Namer::Special {
                prefix: sanitize(&prefix),
            }
        } else {
            let overrides = HashMap::from([(
                QUESTION_TITLE_TOKEN.to_string(),
                item.question_title().to_string(),
            )]);
            let base = template::resolve(
                &self.config.standard_file_template,
                responses.as_map(),
                &overrides,
            );
            Namer::Standard {
                base: sanitize(&base),
            }
        }
    }

    fn route_file(
        &self,
        file: &FileRef,
        namer: &Namer,
        position: usize,
        files_on_question: usize,
        destination: &ContainerRef,
    ) -> Result<(String, String), FileRoutingError> {
        let stored: StoredFile = self
            .storage
            .get_file(&file.0)
            .map_err(FileRoutingError::Lookup)?;

        let final_name = namer.name(&stored.name, position, files_on_question);
        if final_name.trim().is_empty() {
            return Err(FileRoutingError::BlankName {
                original_name: stored.name,
            });
        }

        self.storage
            .rename_file(&stored.id, &final_name)
            .map_err(FileRoutingError::Rename)?;
        self.storage
            .move_file(&stored, destination)
            .map_err(FileRoutingError::Move)?;

        Ok((stored.name, final_name))
    }
}

/// Naming rule resolved once per question.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Namer {
    Standard { base: String },
    Special { prefix: String },
}

impl Namer {
    fn strategy(&self) -> NamingStrategy {
        match self {
            Namer::Standard { .. } => NamingStrategy::Standard,
            Namer::Special { .. } => NamingStrategy::Special,
        }
    }

    fn name(&self, original_name: &str, position: usize, files_on_question: usize) -> String {
        match self {
            Namer::Standard { base } => {
                standard_file_name(base, original_name, position, files_on_question)
            }
            Namer::Special { prefix } => special_file_name(prefix, original_name),
        }
    }
}
