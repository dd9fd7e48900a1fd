use crate::extraction::normalize::{
    content_items, first_number, first_text, first_unsigned, number_list, one_or_many,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SR content item value type (0040,A040)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    Text,
    Num,
    Code,
    Uidref,
    Scoord,
    Scoord3d,
    Container,
    Image,
    /// Any value type this crate does not interpret (DATE, PNAME, TCOORD, ...)
    #[default]
    #[serde(other)]
    Other,
}

impl ValueType {
    /// Returns whether this is a SCOORD or SCOORD3D item
    pub fn is_spatial(&self) -> bool {
        matches!(self, ValueType::Scoord | ValueType::Scoord3d)
    }

    /// Returns the DICOM code string
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Text => "TEXT",
            ValueType::Num => "NUM",
            ValueType::Code => "CODE",
            ValueType::Uidref => "UIDREF",
            ValueType::Scoord => "SCOORD",
            ValueType::Scoord3d => "SCOORD3D",
            ValueType::Container => "CONTAINER",
            ValueType::Image => "IMAGE",
            ValueType::Other => "OTHER",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Graphic type (0070,0023) of a spatial coordinate item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GraphicType {
    Point,
    Multipoint,
    Polyline,
    Polygon,
    Circle,
    Ellipse,
    Ellipsoid,
    #[serde(other)]
    Unknown,
}

impl GraphicType {
    /// Returns the DICOM code string
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphicType::Point => "POINT",
            GraphicType::Multipoint => "MULTIPOINT",
            GraphicType::Polyline => "POLYLINE",
            GraphicType::Polygon => "POLYGON",
            GraphicType::Circle => "CIRCLE",
            GraphicType::Ellipse => "ELLIPSE",
            GraphicType::Ellipsoid => "ELLIPSOID",
            GraphicType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for GraphicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A coded entry (code sequence item)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Code {
    #[serde(rename = "CodeValue", default, deserialize_with = "first_text")]
    pub code_value: Option<String>,

    #[serde(rename = "CodingSchemeDesignator", default, deserialize_with = "first_text")]
    pub coding_scheme_designator: Option<String>,

    #[serde(rename = "CodeMeaning", default, deserialize_with = "first_text")]
    pub code_meaning: Option<String>,
}

impl Code {
    /// Creates a fully populated code
    pub fn new(designator: &str, value: &str, meaning: &str) -> Self {
        Self {
            code_value: Some(value.to_string()),
            coding_scheme_designator: Some(designator.to_string()),
            code_meaning: Some(meaning.to_string()),
        }
    }

    /// Checks the code value only
    pub fn has_value(&self, value: &str) -> bool {
        self.code_value.as_deref() == Some(value)
    }

    /// Checks both the coding scheme designator and the code value
    pub fn matches(&self, designator: &str, value: &str) -> bool {
        self.coding_scheme_designator.as_deref() == Some(designator) && self.has_value(value)
    }

    /// Returns `designator:value` when both parts are present
    pub fn qualified_value(&self) -> Option<String> {
        match (&self.coding_scheme_designator, &self.code_value) {
            (Some(designator), Some(value)) if !designator.is_empty() && !value.is_empty() => {
                Some(format!("{}:{}", designator, value))
            }
            _ => None,
        }
    }
}

/// Reference to a SOP instance (ReferencedSOPSequence item)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReferencedSop {
    #[serde(rename = "ReferencedSOPClassUID", default, deserialize_with = "first_text")]
    pub referenced_sop_class_uid: Option<String>,

    #[serde(rename = "ReferencedSOPInstanceUID", default, deserialize_with = "first_text")]
    pub referenced_sop_instance_uid: Option<String>,

    /// Only the first frame number is kept when several are listed
    #[serde(rename = "ReferencedFrameNumber", default, deserialize_with = "first_unsigned")]
    pub referenced_frame_number: Option<u32>,
}

/// Numeric value with its units (MeasuredValueSequence item)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasuredValue {
    #[serde(rename = "NumericValue", default, deserialize_with = "first_number")]
    pub numeric_value: Option<f64>,

    #[serde(
        rename = "MeasurementUnitsCodeSequence",
        default,
        deserialize_with = "one_or_many"
    )]
    pub measurement_units_code_sequence: Vec<Code>,
}

/// A node of an SR content tree
///
/// Every sequence attribute is a list here, whatever shape the source used.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "ValueType", default)]
    pub value_type: ValueType,

    #[serde(rename = "RelationshipType", default, deserialize_with = "first_text")]
    pub relationship_type: Option<String>,

    #[serde(rename = "ConceptNameCodeSequence", default, deserialize_with = "one_or_many")]
    pub concept_name_code_sequence: Vec<Code>,

    #[serde(rename = "ConceptCodeSequence", default, deserialize_with = "one_or_many")]
    pub concept_code_sequence: Vec<Code>,

    #[serde(rename = "ContentSequence", default, deserialize_with = "content_items")]
    pub content_sequence: Vec<ContentItem>,

    #[serde(rename = "TextValue", default, deserialize_with = "first_text")]
    pub text_value: Option<String>,

    #[serde(rename = "UID", default, deserialize_with = "first_text")]
    pub uid: Option<String>,

    #[serde(rename = "GraphicType", default)]
    pub graphic_type: Option<GraphicType>,

    #[serde(rename = "GraphicData", default, deserialize_with = "number_list")]
    pub graphic_data: Vec<f64>,

    #[serde(rename = "MeasuredValueSequence", default, deserialize_with = "one_or_many")]
    pub measured_value_sequence: Vec<MeasuredValue>,

    #[serde(rename = "ReferencedSOPSequence", default, deserialize_with = "one_or_many")]
    pub referenced_sop_sequence: Vec<ReferencedSop>,

    #[serde(
        rename = "ReferencedFrameOfReferenceUID",
        default,
        deserialize_with = "first_text"
    )]
    pub referenced_frame_of_reference_uid: Option<String>,
}

impl ContentItem {
    /// Creates an empty item of the given value type
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            ..Default::default()
        }
    }

    /// First concept name code, if any
    pub fn concept_name(&self) -> Option<&Code> {
        self.concept_name_code_sequence.first()
    }

    /// First concept code (the coded value of a CODE item), if any
    pub fn concept_code(&self) -> Option<&Code> {
        self.concept_code_sequence.first()
    }

    /// Checks the code value of the concept name
    pub fn has_concept_value(&self, value: &str) -> bool {
        self.concept_name().map(|c| c.has_value(value)).unwrap_or(false)
    }

    /// Checks designator and value of the concept name
    pub fn has_concept(&self, designator: &str, value: &str) -> bool {
        self.concept_name()
            .map(|c| c.matches(designator, value))
            .unwrap_or(false)
    }

    /// Returns whether this is a SCOORD or SCOORD3D item
    pub fn is_spatial(&self) -> bool {
        self.value_type.is_spatial()
    }

    // Builders used to assemble trees in code

    pub fn with_concept_name(mut self, code: Code) -> Self {
        self.concept_name_code_sequence = vec![code];
        self
    }

    pub fn with_concept_code(mut self, code: Code) -> Self {
        self.concept_code_sequence = vec![code];
        self
    }

    pub fn with_children(mut self, children: Vec<ContentItem>) -> Self {
        self.content_sequence = children;
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text_value = Some(text.to_string());
        self
    }

    pub fn with_uid(mut self, uid: &str) -> Self {
        self.uid = Some(uid.to_string());
        self
    }

    pub fn with_graphic(mut self, graphic_type: GraphicType, data: Vec<f64>) -> Self {
        self.graphic_type = Some(graphic_type);
        self.graphic_data = data;
        self
    }

    pub fn with_measured_value(mut self, value: f64, unit: Option<Code>) -> Self {
        self.measured_value_sequence = vec![MeasuredValue {
            numeric_value: Some(value),
            measurement_units_code_sequence: unit.into_iter().collect(),
        }];
        self
    }

    pub fn with_referenced_sop(mut self, reference: ReferencedSop) -> Self {
        self.referenced_sop_sequence = vec![reference];
        self
    }

    pub fn with_frame_of_reference(mut self, uid: &str) -> Self {
        self.referenced_frame_of_reference_uid = Some(uid.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_type_parsing() {
        let item: ContentItem = serde_json::from_value(json!({"ValueType": "SCOORD3D"})).unwrap();
        assert_eq!(item.value_type, ValueType::Scoord3d);
        assert!(item.is_spatial());

        let item: ContentItem = serde_json::from_value(json!({"ValueType": "PNAME"})).unwrap();
        assert_eq!(item.value_type, ValueType::Other);
    }

    #[test]
    fn test_unknown_graphic_type() {
        let item: ContentItem =
            serde_json::from_value(json!({"ValueType": "SCOORD", "GraphicType": "SPLINE"}))
                .unwrap();
        assert_eq!(item.graphic_type, Some(GraphicType::Unknown));
    }

    #[test]
    fn test_code_qualified_value() {
        let code = Code::new("DCM", "111030", "Image Region");
        assert_eq!(code.qualified_value(), Some("DCM:111030".to_string()));

        let partial = Code {
            code_value: Some("111030".to_string()),
            ..Default::default()
        };
        assert_eq!(partial.qualified_value(), None);
    }

    #[test]
    fn test_empty_concept_sequence_is_absent() {
        let item: ContentItem =
            serde_json::from_value(json!({"ValueType": "TEXT", "ConceptNameCodeSequence": []}))
                .unwrap();
        assert!(item.concept_name().is_none());
        assert!(!item.has_concept_value("112039"));
    }
}
