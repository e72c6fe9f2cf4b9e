//! Domain models for the intake portal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// Processing status of an uploaded document.
///
/// Observed sequences are always a prefix of `uploading, analysing, ready`
/// or `uploading, analysing, error`. Re-analysis moves a `ready` or `error`
/// document back to `analysing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploading,
    Analysing,
    Ready,
    Error,
}

impl DocumentStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [DocumentStatus; 4] = [
        DocumentStatus::Uploading,
        DocumentStatus::Analysing,
        DocumentStatus::Ready,
        DocumentStatus::Error,
    ];

    /// Statuses from which a new analysis run may claim the document.
    pub const CLAIMABLE: [DocumentStatus; 3] = [
        DocumentStatus::Uploading,
        DocumentStatus::Ready,
        DocumentStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Analysing => "analysing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Whether a lifecycle run may start from this status.
    pub fn is_claimable(&self) -> bool {
        Self::CLAIMABLE.contains(self)
    }

    /// Whether the document has finished its latest attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uploading" => Ok(Self::Uploading),
            "analysing" => Ok(Self::Analysing),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid document status: {}", s)),
        }
    }
}

/// Declared file type, derived from the uploaded file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Image,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Image => "image",
        }
    }

    /// Derive the declared type from a file name's extension.
    ///
    /// `pdf` maps to [`FileType::Pdf`], `docx` and `doc` to [`FileType::Docx`],
    /// and everything else (including no extension) to [`FileType::Image`].
    pub fn from_file_name(file_name: &str) -> Self {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "docx" | "doc" => Self::Docx,
            _ => Self::Image,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FileType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "image" => Ok(Self::Image),
            _ => Err(format!("Invalid file type: {}", s)),
        }
    }
}

/// One uploaded client file and its processing status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub file_type: FileType,
    pub status: DocumentStatus,
    /// Opaque token granting unauthenticated read access. Never regenerated.
    pub share_token: Uuid,
    /// Reason for the most recent failed run, cleared when a new run claims the document.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Last time `status` was written. Used to find runs that never finished.
    pub status_changed_at: DateTime<Utc>,
}

/// Fields needed to create a document row at intake.
#[derive(Debug, Clone)]
pub struct CreateDocumentRequest {
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub file_type: FileType,
}

/// Document row joined with its client name, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub client_id: Uuid,
    pub client_name: String,
    pub file_name: String,
    pub file_type: FileType,
    pub status: DocumentStatus,
    pub latest_version: Option<i32>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// ANALYSIS TYPES
// =============================================================================

/// One extracted question/answer unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaBlock {
    pub question: String,
    pub original_response: String,
    pub improved_response: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Ambiguities the agency should clarify. Empty means no issues.
    #[serde(default)]
    pub flags: Vec<String>,
}

impl QaBlock {
    /// Name of the first required text field that is blank, if any.
    pub fn first_blank_field(&self) -> Option<&'static str> {
        if self.question.trim().is_empty() {
            Some("question")
        } else if self.original_response.trim().is_empty() {
            Some("original_response")
        } else if self.improved_response.trim().is_empty() {
            Some("improved_response")
        } else {
            None
        }
    }
}

/// One versioned analysis snapshot for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Starts at 1; the highest version is the current analysis.
    pub version: i32,
    pub structured_result: Vec<QaBlock>,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// Output of a successful Analysis Client call, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub structured_result: Vec<QaBlock>,
    pub summary: String,
}

/// Document with its full analysis history, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentWithAnalyses {
    #[serde(flatten)]
    pub document: Document,
    pub client_name: String,
    pub analyses: Vec<Analysis>,
    pub latest_analysis: Option<Analysis>,
}

// =============================================================================
// ACCOUNT TYPES
// =============================================================================

/// An agency user. Authentication happens upstream; this row holds contact details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub agency_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A client of the agency, owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
