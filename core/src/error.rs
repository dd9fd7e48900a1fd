use thiserror::Error;

/// Result type for srcat operations
pub type Result<T> = std::result::Result<T, SrcatError>;

/// Error types for srcat operations
#[derive(Error, Debug)]
pub enum SrcatError {
    /// DICOM reading error
    #[error("DICOM error: {0}")]
    DicomError(String),

    /// Tag not found in DICOM file
    #[error("Tag not found: {0}")]
    TagNotFound(String),

    /// Invalid tag value
    #[error("Invalid tag value: {0}")]
    InvalidValue(String),

    /// A display set was requested for an empty series
    #[error("No instances were provided")]
    NoInstances,

    /// An instance of the series belongs to another study
    #[error("Instance {sop_instance_uid} does not belong to study {study_instance_uid}")]
    StudyMismatch {
        sop_instance_uid: String,
        study_instance_uid: String,
    },

    /// Bulk data retrieval failed for one branch of the content tree
    #[error("Bulk data retrieval failed for {uri} at {path}: {reason}")]
    BulkData {
        uri: String,
        path: String,
        reason: String,
    },

    /// Generic extraction error
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// Helper conversions
impl From<String> for SrcatError {
    fn from(s: String) -> Self {
        SrcatError::ExtractionError(s)
    }
}

impl From<&str> for SrcatError {
    fn from(s: &str) -> Self {
        SrcatError::ExtractionError(s.to_string())
    }
}

// Convert dicom-object errors
impl From<dicom_object::ReadError> for SrcatError {
    fn from(e: dicom_object::ReadError) -> Self {
        SrcatError::DicomError(format!("{}", e))
    }
}

impl From<dicom_core::value::ConvertValueError> for SrcatError {
    fn from(e: dicom_core::value::ConvertValueError) -> Self {
        SrcatError::InvalidValue(format!("{}", e))
    }
}
