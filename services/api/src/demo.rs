use crate::infra::{InMemoryStorage, OutboxMailer};
use chrono::Local;
use clap::Args;
use form_filer::config::{ArchiveConfig, KeywordRule, RoutingConfig};
use form_filer::error::AppError;
use form_filer::workflows::archive::FolderReclassifier;
use form_filer::workflows::intake::{
    RouteOutcome, SubmissionEvent, SubmissionOrchestrator, SubmissionOutcome,
};
use std::collections::BTreeSet;
use std::sync::Arc;

const DEMO_DESTINATION: &str = "demo-intake";
const DEMO_UPLOADS: &str = "demo-uploads";

pub(crate) const DEMO_SUBMISSION: &str = r#"{
    "submissionId": "demo-0001",
    "items": [
        {"questionTitle": "Company Name", "kind": "TEXT", "answer": "Acme Roofing"},
        {"questionTitle": "Contact Email", "kind": "TEXT", "answer": "owner@acme-roofing.example"},
        {"questionTitle": "Service Requested", "kind": "MULTIPLE_CHOICE", "answer": "Roof inspection"},
        {"questionTitle": "Site Photos", "kind": "FILE_UPLOAD", "answer": ["demo-photo-1", "demo-photo-2"]},
        {"questionTitle": "Supporting Documents", "kind": "FILE_UPLOAD", "answer": ["demo-doc-1"]},
        {"questionTitle": "Internal Notes", "kind": "PARAGRAPH_TEXT", "answer": null}
    ]
}"#;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the archive reclassification portion of the demo.
    #[arg(long)]
    pub(crate) skip_reclassify: bool,
}

pub(crate) fn demo_routing_config() -> RoutingConfig {
    RoutingConfig {
        destination_container_id: DEMO_DESTINATION.to_string(),
        recipients: vec!["intake@acme-roofing.example".to_string()],
        admin_address: "it@acme-roofing.example".to_string(),
        subject_template: "New request from {Company Name}: {Service Requested}".to_string(),
        standard_file_template: "{Company Name} - {QuestionTitle}".to_string(),
        special_file_prefix_template: "{Company Name}".to_string(),
        special_question_title: "Supporting Documents".to_string(),
        folder_name_exclusions: BTreeSet::from(["Contact Email".to_string()]),
        email_body_exclusions: BTreeSet::from(["Internal Notes".to_string()]),
        timestamp_format: form_filer::config::DEFAULT_TIMESTAMP_FORMAT.to_string(),
    }
}

fn demo_archive_config() -> ArchiveConfig {
    ArchiveConfig {
        root_container_id: DEMO_DESTINATION.to_string(),
        keyword_rules: vec![
            KeywordRule {
                keyword: "inspection".to_string(),
                category: "Inspections".to_string(),
            },
            KeywordRule {
                keyword: "repair".to_string(),
                category: "Repairs".to_string(),
            },
        ],
        fallback_category: form_filer::config::DEFAULT_FALLBACK_CATEGORY.to_string(),
        timestamp_format: form_filer::config::DEFAULT_TIMESTAMP_FORMAT.to_string(),
    }
}

pub(crate) fn seed_demo_uploads(storage: &InMemoryStorage) {
    storage.seed_file("demo-photo-1", "IMG_2041.jpg", DEMO_UPLOADS);
    storage.seed_file("demo-photo-2", "IMG_2042.HEIC", DEMO_UPLOADS);
    storage.seed_file(
        "demo-doc-1",
        "Insurance certificate - Wile E Coyote.pdf",
        DEMO_UPLOADS,
    );
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let storage = InMemoryStorage::default();
    seed_demo_uploads(&storage);
    // an older submission still waiting at the top level
    storage.seed_container(
        DEMO_DESTINATION,
        "demo-old",
        "20240911-1015_PENDING_Globex_Gutter repair",
    );
    let mailer = OutboxMailer::default();

    let orchestrator = SubmissionOrchestrator::new(
        Arc::new(storage.clone()),
        Arc::new(mailer.clone()),
        demo_routing_config(),
    );
    let event = SubmissionEvent::from_json(DEMO_SUBMISSION)?;

    println!("Form submission demo");
    let outcome = orchestrator.process_at(&event, Local::now());
    render_outcome(&outcome);

    for email in mailer.sent() {
        println!("\nEmail to {}", email.to.join(", "));
        println!("Subject: {}", email.subject);
        println!("{}", email.html_body);
    }

    if args.skip_reclassify {
        return Ok(());
    }

    let archive = demo_archive_config();
    let report = FolderReclassifier::new(&storage, &archive).run()?;
    println!("\nArchive reclassification");
    for entry in &report.moves {
        println!(
            "- {} | {} -> {} ({:?})",
            entry.name, entry.from_path, entry.to_path, entry.status
        );
    }
    println!(
        "{} folders visited, {} already filed",
        report.visited, report.already_filed
    );

    Ok(())
}

pub(crate) fn render_outcome(outcome: &SubmissionOutcome) {
    match outcome {
        SubmissionOutcome::Fatal(report) => {
            println!("Run aborted: {}", report.message);
            println!(
                "Administrator notified: {}",
                if report.admin_notified { "yes" } else { "no" }
            );
        }
        SubmissionOutcome::Completed(report)
        | SubmissionOutcome::CompletedWithFileFailures(report) => {
            println!("Folder: {} ({})", report.container.name, report.container.id);
            for file in &report.outcomes {
                match file {
                    RouteOutcome::Moved {
                        original_name,
                        final_name,
                        strategy,
                        ..
                    } => println!("- {original_name} -> {final_name} [{strategy:?}]"),
                    RouteOutcome::Failed {
                        file_id, reason, ..
                    } => println!("- {file_id} FAILED: {reason}"),
                }
            }
            for title in &report.duplicate_titles {
                println!("! duplicate question title '{title}': last answer kept");
            }
        }
    }
}
