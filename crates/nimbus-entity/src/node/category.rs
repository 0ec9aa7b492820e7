//! File type categories derived from MIME types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coarse grouping used by list filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCategory {
    /// Folders only.
    Folders,
    /// Text and word-processing documents.
    Documents,
    /// Spreadsheets and CSV.
    Spreadsheets,
    /// Slide decks.
    Presentations,
    /// `video/*`.
    Videos,
    /// `image/*`.
    Photos,
    /// `application/pdf`.
    Pdfs,
    /// Compressed archives.
    Archives,
    /// `audio/*`.
    Audio,
}

const SPREADSHEET_TYPES: &[&str] = &[
    "text/csv",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml",
    "application/vnd.oasis.opendocument.spreadsheet",
];

const DOCUMENT_TYPES: &[&str] = &[
    "text/",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml",
    "application/vnd.oasis.opendocument.text",
    "application/rtf",
];

const PRESENTATION_TYPES: &[&str] = &[
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml",
    "application/vnd.oasis.opendocument.presentation",
];

const ARCHIVE_TYPES: &[&str] = &[
    "application/zip",
    "application/x-rar-compressed",
    "application/x-tar",
    "application/gzip",
    "application/x-7z-compressed",
];

impl TypeCategory {
    /// Classify a file by MIME type. Unknown types belong to no category.
    pub fn classify(mime_type: &str) -> Option<Self> {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime.is_empty() {
            return None;
        }
        let contains_any = |patterns: &[&str]| patterns.iter().any(|p| mime.contains(p));

        // CSV is text/*, so spreadsheets are checked before documents.
        if contains_any(SPREADSHEET_TYPES) {
            Some(Self::Spreadsheets)
        } else if contains_any(DOCUMENT_TYPES) {
            Some(Self::Documents)
        } else if contains_any(PRESENTATION_TYPES) {
            Some(Self::Presentations)
        } else if mime.starts_with("video/") {
            Some(Self::Videos)
        } else if mime.starts_with("image/") {
            Some(Self::Photos)
        } else if mime == "application/pdf" {
            Some(Self::Pdfs)
        } else if contains_any(ARCHIVE_TYPES) {
            Some(Self::Archives)
        } else if mime.starts_with("audio/") {
            Some(Self::Audio)
        } else {
            None
        }
    }

    /// Whether a node with the given shape belongs to this category.
    pub fn matches(&self, is_folder: bool, mime_type: &str) -> bool {
        match self {
            Self::Folders => is_folder,
            category => !is_folder && Self::classify(mime_type) == Some(*category),
        }
    }

    /// Return the category as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folders => "folders",
            Self::Documents => "documents",
            Self::Spreadsheets => "spreadsheets",
            Self::Presentations => "presentations",
            Self::Videos => "videos",
            Self::Photos => "photos",
            Self::Pdfs => "pdfs",
            Self::Archives => "archives",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TypeCategory {
    type Err = nimbus_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "folders" => Ok(Self::Folders),
            "documents" => Ok(Self::Documents),
            "spreadsheets" => Ok(Self::Spreadsheets),
            "presentations" => Ok(Self::Presentations),
            "videos" => Ok(Self::Videos),
            "photos" => Ok(Self::Photos),
            "pdfs" => Ok(Self::Pdfs),
            "archives" => Ok(Self::Archives),
            "audio" => Ok(Self::Audio),
            _ => Err(nimbus_core::AppError::validation(format!(
                "Invalid type filter: '{s}'"
            ))),
        }
    }
}
