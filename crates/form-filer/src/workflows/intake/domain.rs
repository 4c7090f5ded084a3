use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque storage identifier for one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef(pub String);

/// Question types a form can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    Text,
    ParagraphText,
    MultipleChoice,
    List,
    Checkbox,
    Scale,
    Date,
    Time,
    #[serde(rename = "DATETIME")]
    DateTime,
    Duration,
    Grid,
    CheckboxGrid,
    FileUpload,
}

impl ItemKind {
    pub fn parse(raw: &str) -> Option<Self> {
        let kind = match raw.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Self::Text,
            "PARAGRAPH_TEXT" => Self::ParagraphText,
            "MULTIPLE_CHOICE" => Self::MultipleChoice,
            "LIST" => Self::List,
            "CHECKBOX" => Self::Checkbox,
            "SCALE" => Self::Scale,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "DATETIME" => Self::DateTime,
            "DURATION" => Self::Duration,
            "GRID" => Self::Grid,
            "CHECKBOX_GRID" => Self::CheckboxGrid,
            "FILE_UPLOAD" => Self::FileUpload,
            _ => return None,
        };
        Some(kind)
    }

    pub const fn is_file_upload(self) -> bool {
        matches!(self, Self::FileUpload)
    }
}

/// Answer payload, shaped by the question kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Empty,
    Text(String),
    List(Vec<String>),
    Files(Vec<FileRef>),
}

impl Answer {
    /// Flattens the answer for lookups and display; lists are joined with `", "`.
    pub fn flatten(&self) -> String {
        match self {
            Answer::Empty => String::new(),
            Answer::Text(text) => text.clone(),
            Answer::List(values) => values.join(", "),
            Answer::Files(files) => files
                .iter()
                .map(|file| file.0.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn files(&self) -> &[FileRef] {
        match self {
            Answer::Files(files) => files,
            _ => &[],
        }
    }
}

/// One answered question in a submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawItemResponse")]
pub struct ItemResponse {
    question_title: String,
    kind: ItemKind,
    answer: Answer,
}

impl ItemResponse {
    pub fn new(
        question_title: impl Into<String>,
        kind: ItemKind,
        answer: Answer,
    ) -> Result<Self, SubmissionDecodeError> {
        let question_title = question_title.into();
        let shape_ok = match (&answer, kind.is_file_upload()) {
            (Answer::Empty, _) => true,
            (Answer::Files(_), true) => true,
            (Answer::Text(_) | Answer::List(_), false) => true,
            _ => false,
        };
        if !shape_ok {
            return Err(SubmissionDecodeError::AnswerShape {
                question: question_title,
                kind,
            });
        }
        Ok(Self {
            question_title,
            kind,
            answer,
        })
    }

    pub fn text(question_title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            question_title: question_title.into(),
            kind: ItemKind::Text,
            answer: Answer::Text(value.into()),
        }
    }

    pub fn choices<I, S>(question_title: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            question_title: question_title.into(),
            kind: ItemKind::Checkbox,
            answer: Answer::List(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn files<I, S>(question_title: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            question_title: question_title.into(),
            kind: ItemKind::FileUpload,
            answer: Answer::Files(ids.into_iter().map(|id| FileRef(id.into())).collect()),
        }
    }

    pub fn unanswered(question_title: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            question_title: question_title.into(),
            kind,
            answer: Answer::Empty,
        }
    }

    pub fn question_title(&self) -> &str {
        &self.question_title
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn answer(&self) -> &Answer {
        &self.answer
    }

    pub fn is_file_upload(&self) -> bool {
        self.kind.is_file_upload()
    }

    pub fn uploaded_files(&self) -> &[FileRef] {
        self.answer.files()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItemResponse {
    question_title: String,
    kind: String,
    #[serde(default)]
    answer: Value,
}

impl TryFrom<RawItemResponse> for ItemResponse {
    type Error = SubmissionDecodeError;

    fn try_from(raw: RawItemResponse) -> Result<Self, Self::Error> {
        let kind = ItemKind::parse(&raw.kind).ok_or_else(|| SubmissionDecodeError::UnknownKind {
            question: raw.question_title.clone(),
            kind: raw.kind.clone(),
        })?;

        let answer = if kind.is_file_upload() {
            decode_files(&raw.question_title, raw.answer)?
        } else {
            decode_values(&raw.question_title, raw.answer)?
        };

        ItemResponse::new(raw.question_title, kind, answer)
    }
}

fn decode_files(question: &str, value: Value) -> Result<Answer, SubmissionDecodeError> {
    let entries = match value {
        Value::Null => return Ok(Answer::Empty),
        Value::String(id) => vec![Value::String(id)],
        Value::Array(entries) => entries,
        _ => return Err(malformed(question)),
    };

    let files = entries
        .into_iter()
        .map(|entry| match entry {
            Value::String(id) => Ok(FileRef(id)),
            Value::Object(mut map) => match map.remove("id") {
                Some(Value::String(id)) => Ok(FileRef(id)),
                _ => Err(malformed(question)),
            },
            _ => Err(malformed(question)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Answer::Files(files))
}

fn decode_values(question: &str, value: Value) -> Result<Answer, SubmissionDecodeError> {
    match value {
        Value::Null => Ok(Answer::Empty),
        Value::String(text) => Ok(Answer::Text(text)),
        Value::Number(number) => Ok(Answer::Text(number.to_string())),
        Value::Bool(flag) => Ok(Answer::Text(flag.to_string())),
        Value::Array(entries) => entries
            .into_iter()
            .map(|entry| match entry {
                Value::String(text) => Ok(text),
                Value::Null => Ok(String::new()),
                // grid rows arrive as nested arrays
                Value::Array(row) => row
                    .into_iter()
                    .map(|cell| match cell {
                        Value::String(text) => Ok(text),
                        Value::Null => Ok(String::new()),
                        _ => Err(malformed(question)),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(|cells| cells.join(", ")),
                _ => Err(malformed(question)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Answer::List),
        Value::Object(_) => Err(malformed(question)),
    }
}

fn malformed(question: &str) -> SubmissionDecodeError {
    SubmissionDecodeError::MalformedAnswer {
        question: question.to_string(),
    }
}

/// Inbound event describing one form submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEvent {
    #[serde(default)]
    pub submission_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub items: Vec<ItemResponse>,
}

impl SubmissionEvent {
    pub fn new(items: Vec<ItemResponse>) -> Self {
        Self {
            submission_id: None,
            created_at: None,
            items,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionDecodeError {
    #[error("question '{question}' has unrecognized kind '{kind}'")]
    UnknownKind { question: String, kind: String },
    #[error("question '{question}' has an answer that does not match its kind {kind:?}")]
    AnswerShape { question: String, kind: ItemKind },
    #[error("question '{question}' has a malformed answer")]
    MalformedAnswer { question: String },
}
