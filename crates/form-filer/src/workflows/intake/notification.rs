use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::fmt::Write as _;

use serde::Serialize;

use super::domain::ItemResponse;
use super::filing::RouteOutcome;
use super::storage::ContainerRef;
use super::template;

/// Fully composed message handed to the mail collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("message has no recipients")]
    NoRecipients,
}

/// Outbound mail hook (SMTP relay, mail API, or test outbox).
pub trait Mailer: Debug + Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

/// Renders the submission announcement.
///
/// One `<strong>title</strong>: answer` fragment per non-file question that is
/// not excluded, followed by a folder link and any attachment failures.
pub fn compose_submission_email(
    recipients: &[String],
    subject_template: &str,
    responses: &HashMap<String, String>,
    items: &[ItemResponse],
    excluded: &BTreeSet<String>,
    container: &ContainerRef,
    outcomes: &[RouteOutcome],
) -> OutboundEmail {
    let subject = template::resolve(subject_template, responses, &HashMap::new());

    let mut html = String::new();
    for item in items
        .iter()
        .filter(|item| !item.is_file_upload())
        .filter(|item| !excluded.contains(item.question_title()))
    {
        let _ = write!(
            html,
            "<strong>{}</strong>: {}<br/><br/>",
            escape_html(item.question_title()),
            escape_html(&item.answer().flatten())
        );
    }

    if let Some(url) = &container.url {
        let _ = write!(
            html,
            "<p>Folder: <a href=\"{}\">{}</a></p>",
            escape_html(url),
            escape_html(&container.name)
        );
    }

    let failures = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            RouteOutcome::Failed {
                file_id,
                question_title,
                reason,
            } => Some((file_id, question_title, reason)),
            RouteOutcome::Moved { .. } => None,
        })
        .collect::<Vec<_>>();
    if !failures.is_empty() {
        html.push_str("<p><strong>Attachments that could not be filed</strong></p><ul>");
        for (file_id, question, reason) in failures {
            let _ = write!(
                html,
                "<li>{} ({}): {}</li>",
                escape_html(file_id),
                escape_html(question),
                escape_html(&reason.to_string())
            );
        }
        html.push_str("</ul>");
    }

    OutboundEmail {
        to: recipients.to_vec(),
        subject,
        html_body: html,
    }
}

/// Context attached to the administrative report of a fatal run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FatalContext {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
}

/// Renders the single administrative message sent when a run aborts.
pub fn compose_fatal_report(
    admin_address: &str,
    message: &str,
    diagnostics: &str,
    context: &FatalContext,
) -> OutboundEmail {
    let mut html = String::new();
    let _ = write!(
        html,
        "<p><strong>Form submission processing failed</strong></p><p>{}</p>",
        escape_html(message)
    );

    html.push_str("<ul>");
    let _ = write!(html, "<li>Run timestamp: {}</li>", escape_html(&context.timestamp));
    if let Some(id) = &context.submission_id {
        let _ = write!(html, "<li>Submission: {}</li>", escape_html(id));
    }
    if let Some(created_at) = &context.created_at {
        let _ = write!(html, "<li>Submitted at: {}</li>", escape_html(created_at));
    }
    if let Some(folder) = &context.folder_name {
        let _ = write!(html, "<li>Folder name: {}</li>", escape_html(folder));
    }
    html.push_str("</ul>");

    let _ = write!(html, "<pre>{}</pre>", escape_html(diagnostics));

    OutboundEmail {
        to: vec![admin_address.to_string()],
        subject: format!("Form processing error ({})", context.timestamp),
        html_body: html,
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::intake::domain::ItemKind;
    use crate::workflows::intake::filing::FileRoutingError;
    use crate::workflows::intake::storage::StorageError;
    use crate::workflows::intake::ResponseMap;

    fn container(url: Option<&str>) -> ContainerRef {
        ContainerRef {
            id: "folder-1".to_string(),
            name: "20250101-0800_PENDING_Acme".to_string(),
            url: url.map(str::to_string),
        }
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"<b>"hi"</b>"#),
            "&lt;b&gt;&quot;hi&quot;&lt;/b&gt;"
        );
        assert_eq!(escape_html("Tom & Jerry's"), "Tom &amp; Jerry&#39;s");
    }

    #[test]
    fn body_lists_non_file_non_excluded_items() {
        let items = vec![
            ItemResponse::text("Company", "Acme <Ltd>"),
            ItemResponse::text("Internal", "secret"),
            ItemResponse::files("Photos", ["f1"]),
            ItemResponse::unanswered("Notes", ItemKind::ParagraphText),
        ];
        let responses = ResponseMap::build(&items);
        let excluded = BTreeSet::from(["Internal".to_string()]);

        let email = compose_submission_email(
            &["ops@example.com".to_string()],
            "New lead: {Company}",
            responses.as_map(),
            &items,
            &excluded,
            &container(None),
            &[],
        );

        assert_eq!(email.to, vec!["ops@example.com"]);
        assert_eq!(email.subject, "New lead: Acme <Ltd>");
        assert_eq!(
            email.html_body,
            "<strong>Company</strong>: Acme &lt;Ltd&gt;<br/><br/><strong>Notes</strong>: <br/><br/>"
        );
    }

    #[test]
    fn body_links_folder_and_reports_failed_attachments() {
        let items = vec![ItemResponse::text("Company", "Acme")];
        let responses = ResponseMap::build(&items);
        let outcomes = vec![RouteOutcome::Failed {
            file_id: "f2".to_string(),
            question_title: "Photos".to_string(),
            reason: FileRoutingError::Move(StorageError::Backend("quota".to_string())),
        }];

        let email = compose_submission_email(
            &["ops@example.com".to_string()],
            "{Company}",
            responses.as_map(),
            &items,
            &BTreeSet::new(),
            &container(Some("https://drive.example/folder-1")),
            &outcomes,
        );

        assert!(email
            .html_body
            .contains("<a href=\"https://drive.example/folder-1\">20250101-0800_PENDING_Acme</a>"));
        assert!(email.html_body.contains("<li>f2 (Photos): "));
        assert!(email.html_body.contains("quota"));
    }

    #[test]
    fn fatal_report_carries_context() {
        let context = FatalContext {
            timestamp: "20250101-0800".to_string(),
            submission_id: Some("resp-42".to_string()),
            created_at: None,
            folder_name: Some("20250101-0800_PENDING_Acme".to_string()),
        };

        let email = compose_fatal_report(
            "admin@example.com",
            "container creation failed",
            "caused by: <quota>",
            &context,
        );

        assert_eq!(email.to, vec!["admin@example.com"]);
        assert_eq!(email.subject, "Form processing error (20250101-0800)");
        assert!(email.html_body.contains("<li>Submission: resp-42</li>"));
        assert!(email.html_body.contains("<pre>caused by: &lt;quota&gt;</pre>"));
        assert!(!email.html_body.contains("Submitted at"));
    }
}
