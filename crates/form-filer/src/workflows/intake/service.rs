use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeSet;
use std::error::Error as _;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{error, info, warn};

use super::domain::SubmissionEvent;
use super::filing::{FileRouter, RouteOutcome};
use super::naming::compose_folder_name;
use super::notification::{
    compose_fatal_report, compose_submission_email, FatalContext, MailError, Mailer,
};
use super::responses::ResponseMap;
use super::storage::{ContainerRef, StorageError, StorageGateway};
use super::template;
use super::filing::QUESTION_TITLE_TOKEN;
use crate::config::{check_timestamp_format, ConfigError, RoutingConfig};

/// Summary of a run that reached the end of the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub container: ContainerRef,
    pub outcomes: Vec<RouteOutcome>,
    pub notified: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub duplicate_titles: Vec<String>,
}

impl RunReport {
    pub fn moved(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_failure()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }
}

/// Summary of a run aborted by a fatal fault.
#[derive(Debug, Clone, Serialize)]
pub struct FatalReport {
    pub message: String,
    pub diagnostics: String,
    pub context: FatalContext,
    pub admin_notified: bool,
}

/// Overall outcome of processing one submission.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Completed(RunReport),
    CompletedWithFileFailures(RunReport),
    Fatal(FatalReport),
}

impl SubmissionOutcome {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SubmissionOutcome::Fatal(_))
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            SubmissionOutcome::Completed(report)
            | SubmissionOutcome::CompletedWithFileFailures(report) => Some(report),
            SubmissionOutcome::Fatal(_) => None,
        }
    }
}

/// Faults that abort the remainder of a run.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("routing configuration is invalid")]
    Configuration(#[source] ConfigError),
    #[error("unable to create destination folder '{folder_name}'")]
    ContainerCreation {
        folder_name: String,
        #[source]
        source: StorageError,
    },
    #[error("unable to send submission notification")]
    Notification(#[source] MailError),
}

/// Sequences naming, filing, and notification for one submission, and reports
/// anything outside the per-file boundary to the administrator exactly once.
pub struct SubmissionOrchestrator<S: ?Sized, M: ?Sized> {
    storage: Arc<S>,
    mailer: Arc<M>,
    config: RoutingConfig,
}

impl<S, M> SubmissionOrchestrator<S, M>
where
    S: StorageGateway + ?Sized,
    M: Mailer + ?Sized,
{
    pub fn new(storage: Arc<S>, mailer: Arc<M>, config: RoutingConfig) -> Self {
        Self {
            storage,
            mailer,
            config,
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn process(&self, event: &SubmissionEvent) -> SubmissionOutcome {
        self.process_at(event, Local::now())
    }

    /// Processes `event` using `now` as the run timestamp.
    pub fn process_at(&self, event: &SubmissionEvent, now: DateTime<Local>) -> SubmissionOutcome {
        let timestamp = self.run_timestamp(now);
        let mut context = FatalContext {
            timestamp: timestamp.clone(),
            submission_id: event.submission_id.clone(),
            created_at: event.created_at.map(|created| created.to_rfc3339()),
            folder_name: None,
        };

        info!(
            %timestamp,
            submission = event.submission_id.as_deref().unwrap_or("-"),
            items = event.items.len(),
            "processing form submission"
        );

        match self.run(event, &timestamp, &mut context) {
            Ok(report) if report.failed() > 0 => {
                warn!(
                    moved = report.moved(),
                    failed = report.failed(),
                    folder = %report.container.name,
                    "submission filed with attachment failures"
                );
                SubmissionOutcome::CompletedWithFileFailures(report)
            }
            Ok(report) => {
                info!(
                    moved = report.moved(),
                    folder = %report.container.name,
                    "submission filed"
                );
                SubmissionOutcome::Completed(report)
            }
            Err(fault) => SubmissionOutcome::Fatal(self.report_fatal(&fault, context)),
        }
    }

    fn run(
        &self,
        event: &SubmissionEvent,
        timestamp: &str,
        context: &mut FatalContext,
    ) -> Result<RunReport, FatalError> {
        self.config.validate().map_err(FatalError::Configuration)?;

        let responses = ResponseMap::build(&event.items);
        self.log_unmatched_placeholders(&responses);

        let folder_name =
            compose_folder_name(&event.items, timestamp, &self.config.folder_name_exclusions);
        context.folder_name = Some(folder_name.clone());

        let container = self
            .storage
            .create_container(&self.config.destination_container_id, &folder_name)
            .map_err(|source| FatalError::ContainerCreation {
                folder_name: folder_name.clone(),
                source,
            })?;

        let outcomes =
            FileRouter::new(&*self.storage, &self.config).route(&event.items, &container, &responses);

        let email = compose_submission_email(
            &self.config.recipients,
            &self.config.subject_template,
            responses.as_map(),
            &event.items,
            &self.config.email_body_exclusions,
            &container,
            &outcomes,
        );
        self.mailer.send(&email).map_err(FatalError::Notification)?;

        Ok(RunReport {
            timestamp: timestamp.to_string(),
            container,
            outcomes,
            notified: email.to,
            duplicate_titles: responses.duplicate_titles().to_vec(),
        })
    }

    /// Formats `now` with the configured format. An unusable format falls back
    /// to RFC 3339 so the fatal report still carries a time; `run` rejects the
    /// configuration before anything is named with it.
    fn run_timestamp(&self, now: DateTime<Local>) -> String {
        match check_timestamp_format(&self.config.timestamp_format) {
            Ok(()) => now.format(&self.config.timestamp_format).to_string(),
            Err(_) => now.to_rfc3339(),
        }
    }

    fn log_unmatched_placeholders(&self, responses: &ResponseMap) {
        for token in unmatched_placeholders(&self.config, responses) {
            warn!(placeholder = %token, "template placeholder matches no question; it will render as N/A");
        }
    }

    fn report_fatal(&self, fault: &FatalError, context: FatalContext) -> FatalReport {
        let message = fault.to_string();
        let diagnostics = diagnostics(fault);
        error!(error = %message, detail = %diagnostics, "submission processing aborted");

        let email = compose_fatal_report(&self.config.admin_address, &message, &diagnostics, &context);
        let admin_notified = match self.mailer.send(&email) {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "unable to notify administrator of failed submission");
                false
            }
        };

        FatalReport {
            message,
            diagnostics,
            context,
            admin_notified,
        }
    }
}

/// Placeholders across the configured templates that no question title answers.
/// `{QuestionTitle}` is only supplied while rendering standard file names.
pub(crate) fn unmatched_placeholders(
    config: &RoutingConfig,
    responses: &ResponseMap,
) -> BTreeSet<String> {
    let standard = template::placeholders(&config.standard_file_template)
        .into_iter()
        .filter(|token| token != QUESTION_TITLE_TOKEN);
    template::placeholders(&config.subject_template)
        .into_iter()
        .chain(template::placeholders(&config.special_file_prefix_template))
        .chain(standard)
        .filter(|token| responses.get(token).is_none())
        .collect()
}

/// Error chain plus a captured backtrace when `RUST_BACKTRACE` enables one.
fn diagnostics(fault: &FatalError) -> String {
    let mut detail = fault.to_string();
    let mut source = fault.source();
    while let Some(cause) = source {
        let _ = write!(detail, "\ncaused by: {cause}");
        source = cause.source();
    }

    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        let _ = write!(detail, "\n\nbacktrace:\n{backtrace}");
    }
    detail
}
