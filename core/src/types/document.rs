use crate::error::Result;
use crate::extraction::codes::{COMPREHENSIVE_3D_SR_STORAGE, IMAGING_MEASUREMENT_REPORT};
use crate::extraction::normalize::{first_integer, one_or_many};
use crate::types::Code;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// One DICOM SR instance
///
/// The content tree is kept in its raw naturalized-JSON form until bulk data
/// has been resolved; it is decoded into typed content items on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrDocument {
    #[serde(rename = "StudyInstanceUID")]
    pub study_instance_uid: String,

    #[serde(rename = "SeriesInstanceUID")]
    pub series_instance_uid: String,

    #[serde(rename = "SOPInstanceUID")]
    pub sop_instance_uid: String,

    #[serde(rename = "SOPClassUID")]
    pub sop_class_uid: String,

    #[serde(rename = "Modality", default)]
    pub modality: Option<String>,

    #[serde(rename = "InstanceNumber", default, deserialize_with = "first_integer")]
    pub instance_number: Option<i64>,

    #[serde(rename = "SeriesDescription", default)]
    pub series_description: Option<String>,

    #[serde(rename = "SeriesNumber", default, deserialize_with = "first_integer")]
    pub series_number: Option<i64>,

    #[serde(rename = "SeriesDate", default)]
    pub series_date: Option<String>,

    #[serde(rename = "SeriesTime", default)]
    pub series_time: Option<String>,

    #[serde(rename = "ContentDate", default)]
    pub content_date: Option<String>,

    #[serde(rename = "ContentTime", default)]
    pub content_time: Option<String>,

    #[serde(rename = "ConceptNameCodeSequence", default, deserialize_with = "one_or_many")]
    pub concept_name_code_sequence: Vec<Code>,

    /// Root content sequence, possibly holding `{"BulkDataURI": ...}` placeholders
    #[serde(rename = "ContentSequence", default)]
    pub content_sequence: Value,
}

impl SrDocument {
    /// Parses an SR instance from naturalized DICOM JSON
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Document title (first concept name code)
    pub fn concept_name(&self) -> Option<&Code> {
        self.concept_name_code_sequence.first()
    }

    /// Checks for the TID 1500 Imaging Measurement Report title
    pub fn is_imaging_measurement_report(&self) -> bool {
        self.concept_name()
            .map(|c| c.has_value(IMAGING_MEASUREMENT_REPORT))
            .unwrap_or(false)
    }

    /// Checks for the Comprehensive 3D SR SOP class
    pub fn is_3d(&self) -> bool {
        self.sop_class_uid == COMPREHENSIVE_3D_SR_STORAGE
    }

    /// Creation ordering used to pick the active instance
    ///
    /// InstanceNumber first, then ContentDate/ContentTime, then SOPInstanceUID.
    /// Missing values sort first.
    pub fn creation_order(&self, other: &SrDocument) -> Ordering {
        self.instance_number
            .cmp(&other.instance_number)
            .then_with(|| self.content_date.cmp(&other.content_date))
            .then_with(|| self.content_time.cmp(&other.content_time))
            .then_with(|| self.sop_instance_uid.cmp(&other.sop_instance_uid))
    }
}

/// Sorts instances so that the most recently created one is last
pub fn sort_study_instances(instances: &mut [SrDocument]) {
    instances.sort_by(|a, b| a.creation_order(b));
}
