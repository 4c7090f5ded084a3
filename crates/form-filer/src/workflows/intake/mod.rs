//! Submission intake: naming, filing, and announcing one form submission.

pub mod domain;
pub mod drive;
pub mod filing;
pub mod naming;
pub mod notification;
pub mod responses;
pub mod router;
pub mod service;
pub mod storage;
pub mod template;

#[cfg(test)]
mod tests;

pub use domain::{Answer, FileRef, ItemKind, ItemResponse, SubmissionDecodeError, SubmissionEvent};
pub use drive::GoogleDriveClient;
pub use filing::{FileRouter, FileRoutingError, NamingStrategy, RouteOutcome};
pub use notification::{FatalContext, MailError, Mailer, OutboundEmail};
pub use responses::ResponseMap;
pub use router::submission_router;
pub use service::{FatalError, FatalReport, RunReport, SubmissionOrchestrator, SubmissionOutcome};
pub use storage::{ContainerRef, StorageError, StorageGateway, StoredFile};
