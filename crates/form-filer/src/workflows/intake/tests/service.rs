use std::sync::Arc;

use chrono::{Local, TimeZone};

use super::common::*;
use crate::workflows::intake::domain::{ItemResponse, SubmissionEvent};
use crate::workflows::intake::responses::ResponseMap;
use crate::workflows::intake::service::{
    unmatched_placeholders, SubmissionOrchestrator, SubmissionOutcome,
};

fn run_time() -> chrono::DateTime<Local> {
    Local
        .with_ymd_and_hms(2025, 1, 1, 8, 0, 0)
        .single()
        .expect("unambiguous local time")
}

fn sample_event() -> SubmissionEvent {
    SubmissionEvent {
        submission_id: Some("resp-42".to_string()),
        created_at: None,
        items: vec![
            ItemResponse::text("Company", "Acme"),
            ItemResponse::text("Email", "jane@example.com"),
            ItemResponse::choices("Products", ["Widgets"]),
            ItemResponse::text("Internal Notes", "call back <soon>"),
            ItemResponse::files("Invoices", ["f1", "f2"]),
            ItemResponse::files("Supporting Documents", ["f3"]),
        ],
    }
}

fn sample_storage() -> MemoryStorage {
    MemoryStorage::with_files(&[
        ("f1", "jan.pdf"),
        ("f2", "feb.pdf"),
        ("f3", "Tax Return - Jane Doe.pdf"),
    ])
}

#[test]
fn completed_run_files_everything_and_notifies_once() {
    let storage = Arc::new(sample_storage());
    let mailer = Arc::new(RecordingMailer::default());
    let orchestrator =
        SubmissionOrchestrator::new(storage.clone(), mailer.clone(), routing_config());

    let outcome = orchestrator.process_at(&sample_event(), run_time());

    let report = match outcome {
        SubmissionOutcome::Completed(report) => report,
        other => panic!("expected completed run, got {other:?}"),
    };
    assert_eq!(report.timestamp, "20250101-0800");
    assert_eq!(
        report.container.name,
        "20250101-0800_PENDING_Acme_Widgets_call back <soon>"
    );
    assert_eq!(report.moved(), 3);
    assert_eq!(storage.file("f1").name, "Acme - Invoices (1).pdf");
    assert_eq!(storage.file("f3").name, "Acme - Tax Return.pdf");

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["ops@example.com"]);
    assert_eq!(sent[0].subject, "New submission from Acme");
    assert!(sent[0].html_body.contains("<strong>Email</strong>: jane@example.com"));
    assert!(!sent[0].html_body.contains("Internal Notes"));
    assert!(!sent[0].html_body.contains("Invoices"));
}

#[test]
fn file_failures_do_not_abort_the_run() {
    let mut storage = sample_storage();
    storage.fail_move.insert("f1".to_string());
    let storage = Arc::new(storage);
    let mailer = Arc::new(RecordingMailer::default());
    let orchestrator =
        SubmissionOrchestrator::new(storage.clone(), mailer.clone(), routing_config());

    let outcome = orchestrator.process_at(&sample_event(), run_time());

    let report = match outcome {
        SubmissionOutcome::CompletedWithFileFailures(report) => report,
        other => panic!("expected partial run, got {other:?}"),
    };
    assert_eq!(report.moved(), 2);
    assert_eq!(report.failed(), 1);
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html_body.contains("<li>f1 (Invoices): move failed"));
}

#[test]
fn container_failure_is_fatal_and_reported_once() {
    let storage = Arc::new(MemoryStorage {
        fail_create: true,
        ..sample_storage()
    });
    let mailer = Arc::new(RecordingMailer::default());
    let orchestrator =
        SubmissionOrchestrator::new(storage.clone(), mailer.clone(), routing_config());

    let outcome = orchestrator.process_at(&sample_event(), run_time());

    let fatal = match outcome {
        SubmissionOutcome::Fatal(report) => report,
        other => panic!("expected fatal run, got {other:?}"),
    };
    assert!(fatal.admin_notified);
    assert!(fatal.message.contains("unable to create destination folder"));
    assert!(fatal
        .diagnostics
        .contains("caused by: storage operation failed: folder quota exceeded"));
    assert_eq!(fatal.context.submission_id.as_deref(), Some("resp-42"));
    assert_eq!(
        fatal.context.folder_name.as_deref(),
        Some("20250101-0800_PENDING_Acme_Widgets_call back <soon>")
    );

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1, "only the admin report is sent");
    assert_eq!(sent[0].to, vec!["admin@example.com"]);
    assert!(
        storage
            .calls()
            .iter()
            .all(|call| call.starts_with("create:")),
        "no file routing after a fatal fault: {:?}",
        storage.calls()
    );
}

#[test]
fn notification_failure_is_fatal() {
    let storage = Arc::new(sample_storage());
    let mailer = Arc::new(RecordingMailer::failing_for("ops@example.com"));
    let orchestrator =
        SubmissionOrchestrator::new(storage.clone(), mailer.clone(), routing_config());

    let outcome = orchestrator.process_at(&sample_event(), run_time());

    match outcome {
        SubmissionOutcome::Fatal(report) => {
            assert!(report.message.contains("submission notification"));
            assert!(report.admin_notified);
        }
        other => panic!("expected fatal run, got {other:?}"),
    }
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["admin@example.com"]);
}

#[test]
fn invalid_configuration_is_fatal_before_any_storage_call() {
    let storage = Arc::new(sample_storage());
    let mailer = Arc::new(RecordingMailer::default());
    let mut config = routing_config();
    config.special_file_prefix_template = "   ".to_string();
    let orchestrator = SubmissionOrchestrator::new(storage.clone(), mailer.clone(), config);

    let outcome = orchestrator.process_at(&sample_event(), run_time());

    match outcome {
        SubmissionOutcome::Fatal(report) => {
            assert!(report.message.contains("configuration"));
            assert!(report.context.folder_name.is_none());
        }
        other => panic!("expected fatal run, got {other:?}"),
    }
    assert!(storage.calls().is_empty());
    assert_eq!(mailer.sent().len(), 1);
}

#[test]
fn unknown_timestamp_specifier_is_fatal_and_reported_once() {
    let storage = Arc::new(sample_storage());
    let mailer = Arc::new(RecordingMailer::default());
    let mut config = routing_config();
    config.timestamp_format = "%Y%m%d-%Q".to_string();
    let orchestrator = SubmissionOrchestrator::new(storage.clone(), mailer.clone(), config);

    let outcome = orchestrator.process_at(&sample_event(), run_time());

    match outcome {
        SubmissionOutcome::Fatal(report) => {
            assert!(report.admin_notified);
            assert!(report.diagnostics.contains("unsupported specifier"));
            assert!(report.context.timestamp.starts_with("2025-01-01T08:00:00"));
            assert!(report.context.folder_name.is_none());
        }
        other => panic!("expected fatal run, got {other:?}"),
    }
    assert!(storage.calls().is_empty());
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["admin@example.com"]);
}

#[test]
fn question_title_is_only_supplied_to_standard_file_names() {
    let mut config = routing_config();
    config.subject_template = "{QuestionTitle} from {Company}".to_string();
    config.special_file_prefix_template = "{Company} {Region}".to_string();
    let responses = ResponseMap::build(&sample_event().items);

    let unmatched = unmatched_placeholders(&config, &responses);

    assert_eq!(
        unmatched.into_iter().collect::<Vec<_>>(),
        vec!["QuestionTitle".to_string(), "Region".to_string()]
    );

    let clean = unmatched_placeholders(&routing_config(), &responses);
    assert!(clean.is_empty(), "standard template keeps its override: {clean:?}");
}

#[test]
fn admin_delivery_failure_is_flagged_not_retried() {
    let storage = Arc::new(MemoryStorage {
        fail_create: true,
        ..sample_storage()
    });
    let mailer = Arc::new(RecordingMailer::failing_for("admin@example.com"));
    let orchestrator =
        SubmissionOrchestrator::new(storage.clone(), mailer.clone(), routing_config());

    let outcome = orchestrator.process_at(&sample_event(), run_time());

    match outcome {
        SubmissionOutcome::Fatal(report) => assert!(!report.admin_notified),
        other => panic!("expected fatal run, got {other:?}"),
    }
    assert!(mailer.sent().is_empty());
}

#[test]
fn duplicate_titles_are_reported() {
    let storage = Arc::new(sample_storage());
    let mailer = Arc::new(RecordingMailer::default());
    let orchestrator =
        SubmissionOrchestrator::new(storage.clone(), mailer.clone(), routing_config());
    let mut event = sample_event();
    event.items.push(ItemResponse::text("Company", "Acme Holdings"));

    let outcome = orchestrator.process_at(&event, run_time());

    let report = outcome.report().expect("run completes");
    assert_eq!(report.duplicate_titles, vec!["Company".to_string()]);
    assert_eq!(mailer.sent()[0].subject, "New submission from Acme Holdings");
}
