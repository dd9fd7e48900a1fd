//! Coded concepts and SOP classes recognised in SR content trees

use crate::types::Code;

// SR SOP Classes
pub const BASIC_TEXT_SR_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.88.11";
pub const ENHANCED_SR_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.88.22";
pub const COMPREHENSIVE_SR_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.88.33";
pub const COMPREHENSIVE_3D_SR_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.88.34";

// Coding scheme designators
pub const DCM: &str = "DCM";
pub const SRT: &str = "SRT";
pub const SCT: &str = "SCT";

/// Designators under which free-text findings are written by the viewer tools
pub const CORNERSTONE_CODING_SCHEMES: [&str; 2] = ["Cornerstone3DTools", "CST4"];
pub const CORNERSTONE_FREE_TEXT: &str = "CORNERSTONEFREETEXT";

// TID 1500 structure (concept name code values)
pub const IMAGING_MEASUREMENT_REPORT: &str = "126000";
pub const IMAGE_LIBRARY: &str = "111028";
pub const IMAGE_LIBRARY_GROUP: &str = "126200";
pub const IMAGING_MEASUREMENTS: &str = "126010";
pub const MEASUREMENT_GROUP: &str = "125007";
pub const TRACKING_IDENTIFIER: &str = "112039";
pub const TRACKING_UNIQUE_IDENTIFIER: &str = "112040";
pub const FINDING: &str = "121071";
pub const FINDING_SITE: &str = "G-C0E3";
pub const FINDING_SITE_SCT: &str = "363698007";

/// A designator/value pair to match concept names against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRef {
    pub designator: &'static str,
    pub value: &'static str,
    pub meaning: &'static str,
}

impl CodeRef {
    pub fn matches(&self, code: &Code) -> bool {
        code.matches(self.designator, self.value)
    }

    pub fn to_code(&self) -> Code {
        Code::new(self.designator, self.value, self.meaning)
    }
}

/// Free-text comment attached to a measurement group
pub const COMMENT: CodeRef = CodeRef {
    designator: DCM,
    value: "121106",
    meaning: "Comment",
};

/// SCOORD that only positions the label of another graphic
pub const TEXT_ANNOTATION_POSITION: CodeRef = CodeRef {
    designator: DCM,
    value: "111010",
    meaning: "Text Annotation Position",
};

/// Returns whether the code is a viewer free-text code
pub fn is_cornerstone_free_text(code: &Code) -> bool {
    code.coding_scheme_designator
        .as_deref()
        .map(|d| CORNERSTONE_CODING_SCHEMES.contains(&d))
        .unwrap_or(false)
        && code.has_value(CORNERSTONE_FREE_TEXT)
}
