//! Content tree normalization
//!
//! DICOM JSON encoders may collapse a one-item sequence into a bare object and
//! may write numbers as decimal strings. Both are folded away here, while the
//! raw tree is decoded into [`ContentItem`]s, so extraction code only ever sees
//! lists and numbers.

use crate::types::ContentItem;
use log::warn;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrText::Number(n) => Some(*n),
            NumberOrText::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Deserializes a sequence that may be absent, a single item, or a list
pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<OneOrMany<T>>::deserialize(deserializer)?
        .map(OneOrMany::into_vec)
        .unwrap_or_default())
}

/// Deserializes a string attribute, keeping the first value of a multi-valued one
pub fn first_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OneOrMany<Option<String>>>::deserialize(deserializer)?
        .and_then(|values| values.into_vec().into_iter().next().flatten()))
}

/// Deserializes a numeric attribute written as a number or a decimal string
///
/// Unparseable text degrades to `None`.
pub fn first_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OneOrMany<Option<NumberOrText>>>::deserialize(deserializer)?
        .and_then(|values| values.into_vec().into_iter().next().flatten())
        .and_then(|value| value.as_f64()))
}

/// Deserializes an integer attribute (IS) such as InstanceNumber
pub fn first_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(first_number(deserializer)?
        .filter(|v| v.is_finite())
        .map(|v| v.round() as i64))
}

/// Deserializes a positive integer attribute such as ReferencedFrameNumber
pub fn first_unsigned<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(first_integer(deserializer)?
        .filter(|v| *v >= 0 && *v <= u32::MAX as i64)
        .map(|v| v as u32))
}

/// Deserializes a flat list of numbers (GraphicData)
///
/// `null` entries, which is how non-finite floats come out of JSON, become NaN.
pub fn number_list<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OneOrMany<Option<NumberOrText>>>::deserialize(deserializer)?
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(|value| value.and_then(|v| v.as_f64()).unwrap_or(f64::NAN))
        .collect())
}

/// Deserializes a nested ContentSequence item by item
///
/// Children that cannot be decoded are dropped with a warning, so one bad
/// leaf never takes its siblings or ancestors with it.
pub fn content_items<'de, D>(deserializer: D) -> Result<Vec<ContentItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(normalize_content_sequence(&raw))
}

/// Returns the items of a raw sequence, wrapping a singleton and ignoring `null`
pub fn sequence_items(sequence: &Value) -> Vec<&Value> {
    match sequence {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Decodes a raw content sequence into typed content items
///
/// Decoding is per item at every level: an item that cannot be decoded (for
/// instance GraphicData still pointing at unresolved bulk data) is skipped
/// with a warning and the rest of the report is kept.
pub fn normalize_content_sequence(sequence: &Value) -> Vec<ContentItem> {
    sequence_items(sequence)
        .into_iter()
        .enumerate()
        .filter_map(|(index, raw)| match ContentItem::deserialize(raw) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping undecodable content item {}: {}", index, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GraphicType, ValueType};
    use serde_json::json;

    #[test]
    fn test_singleton_and_array_sequences_are_equivalent() {
        let single = json!({
            "ValueType": "CONTAINER",
            "ContentSequence": {"ValueType": "TEXT", "TextValue": "a"}
        });
        let array = json!({
            "ValueType": "CONTAINER",
            "ContentSequence": [{"ValueType": "TEXT", "TextValue": "a"}]
        });

        let single: ContentItem = serde_json::from_value(single).unwrap();
        let array: ContentItem = serde_json::from_value(array).unwrap();
        assert_eq!(single, array);
        assert_eq!(single.content_sequence.len(), 1);
    }

    #[test]
    fn test_concept_name_singleton() {
        let item: ContentItem = serde_json::from_value(json!({
            "ValueType": "UIDREF",
            "ConceptNameCodeSequence": {"CodeValue": "112040", "CodingSchemeDesignator": "DCM"},
            "UID": "1.2.3"
        }))
        .unwrap();
        assert!(item.has_concept_value("112040"));
        assert_eq!(item.uid.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn test_numbers_as_strings() {
        let item: ContentItem = serde_json::from_value(json!({
            "ValueType": "NUM",
            "MeasuredValueSequence": {"NumericValue": ["31.0"]},
            "GraphicData": ["1", 2.5]
        }))
        .unwrap();
        assert_eq!(item.measured_value_sequence[0].numeric_value, Some(31.0));
        assert_eq!(item.graphic_data, vec![1.0, 2.5]);
    }

    #[test]
    fn test_unparseable_number_is_absent() {
        let item: ContentItem = serde_json::from_value(json!({
            "ValueType": "NUM",
            "MeasuredValueSequence": {"NumericValue": "n/a"}
        }))
        .unwrap();
        assert_eq!(item.measured_value_sequence[0].numeric_value, None);
    }

    #[test]
    fn test_frame_number_takes_first_value() {
        let item: ContentItem = serde_json::from_value(json!({
            "ValueType": "IMAGE",
            "ReferencedSOPSequence": {
                "ReferencedSOPInstanceUID": "1.2.3",
                "ReferencedFrameNumber": ["4", "5"]
            }
        }))
        .unwrap();
        assert_eq!(item.referenced_sop_sequence[0].referenced_frame_number, Some(4));
    }

    #[test]
    fn test_normalize_skips_undecodable_items() {
        let raw = json!([
            {"ValueType": "SCOORD", "GraphicType": "POINT", "GraphicData": [1, 2]},
            {"ValueType": "SCOORD", "GraphicData": {"BulkDataURI": "http://x/1"}}
        ]);
        let items = normalize_content_sequence(&raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].graphic_type, Some(GraphicType::Point));
    }

    #[test]
    fn test_malformed_nested_item_keeps_siblings() {
        let raw = json!({
            "ValueType": "CONTAINER",
            "ConceptNameCodeSequence": {"CodeValue": "126010", "CodingSchemeDesignator": "DCM"},
            "ContentSequence": [
                {
                    "ValueType": "CONTAINER",
                    "ConceptNameCodeSequence": {"CodeValue": "125007", "CodingSchemeDesignator": "DCM"},
                    "ContentSequence": [
                        {"ValueType": "UIDREF", "UID": "2.25.7"},
                        {"ValueType": "SCOORD", "GraphicType": "POINT", "GraphicData": [1, 2]}
                    ]
                },
                {"ValueType": "TEXT", "TextValue": 42}
            ]
        });

        let items = normalize_content_sequence(&raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content_sequence.len(), 1);
        assert_eq!(items[0].content_sequence[0].content_sequence.len(), 2);
    }

    #[test]
    fn test_normalize_singleton_root() {
        let raw = json!({"ValueType": "CONTAINER"});
        let items = normalize_content_sequence(&raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].value_type, ValueType::Container);
        assert!(normalize_content_sequence(&Value::Null).is_empty());
    }
}
