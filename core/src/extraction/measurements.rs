//! Measurement extraction from TID 1500 content trees
//!
//! The Imaging Measurements container is searched for Measurement Groups,
//! groups are merged by Tracking Unique Identifier and each merged group is
//! turned into one [`Measurement`]: TID 1410 style when it carries geometry,
//! non-geometric otherwise.

use crate::config::SrConfig;
use crate::extraction::codes::{
    is_cornerstone_free_text, COMMENT, CORNERSTONE_FREE_TEXT, FINDING, FINDING_SITE,
    FINDING_SITE_SCT, IMAGING_MEASUREMENTS, MEASUREMENT_GROUP, SCT, SRT,
    TEXT_ANNOTATION_POSITION, TRACKING_IDENTIFIER, TRACKING_UNIQUE_IDENTIFIER,
};
use crate::types::{
    Code, ContentItem, Coordinate, GraphicType, Label, Measurement, MeasurementType, ValueType,
};
use log::{debug, warn};
use std::collections::HashMap;
use uuid::Uuid;

/// Extracts measurements from a report content sequence with default settings
///
/// # Arguments
///
/// * `report` - Normalized root content sequence of an Imaging Measurement Report
///
/// # Returns
///
/// The measurements in order of first appearance of their tracking identifier
pub fn extract_measurements(report: &[ContentItem]) -> Vec<Measurement> {
    extract_measurements_with(report, &SrConfig::default())
}

/// Extracts measurements from a report content sequence
///
/// Groups without a Tracking Unique Identifier and geometric groups without a
/// usable SCOORD/SCOORD3D are skipped with a warning. The result depends only
/// on the content tree, so repeated calls return equal measurements.
pub fn extract_measurements_with(report: &[ContentItem], config: &SrConfig) -> Vec<Measurement> {
    let Some(container) = report
        .iter()
        .find(|item| item.has_concept_value(IMAGING_MEASUREMENTS))
    else {
        // Some encoders put the geometry straight into the report
        if has_geometry(report) {
            let measurement = process_tid1410_measurement(None, report, config);
            log_fallback("top-level", measurement.as_ref());
            return measurement.into_iter().collect();
        }
        return Vec::new();
    };

    let container_items = &container.content_sequence;
    let groups: Vec<&ContentItem> = container_items
        .iter()
        .filter(|item| item.has_concept_value(MEASUREMENT_GROUP))
        .collect();

    if groups.is_empty() && has_geometry(container_items) {
        let measurement = process_tid1410_measurement(None, container_items, config);
        log_fallback("container", measurement.as_ref());
        return measurement.into_iter().collect();
    }

    merge_by_tracking_unique_identifier(&groups)
        .into_iter()
        .filter_map(|(uid, items)| process_measurement(&uid, &items, config))
        .collect()
}

fn log_fallback(kind: &str, measurement: Option<&Measurement>) {
    if let Some(coordinate) = measurement.and_then(|m| m.primary_coordinate()) {
        debug!(
            "Parsed {} fallback measurement: {} {} {:?}",
            kind,
            coordinate.value_type,
            coordinate.graphic_type,
            &coordinate.graphic_data[..coordinate.graphic_data.len().min(6)]
        );
    }
}

/// Merges measurement groups that share a Tracking Unique Identifier
///
/// The first group contributes all of its items. Later groups only add items
/// that are not already present, and never their identifier item. Order is
/// the order of first appearance.
pub fn merge_by_tracking_unique_identifier(
    groups: &[&ContentItem],
) -> Vec<(String, Vec<ContentItem>)> {
    let mut merged: Vec<(String, Vec<ContentItem>)> = Vec::new();
    let mut index_by_uid: HashMap<String, usize> = HashMap::new();

    for group in groups {
        let items = &group.content_sequence;
        let Some(uid) = items
            .iter()
            .find(|item| item.has_concept_value(TRACKING_UNIQUE_IDENTIFIER))
            .and_then(|item| item.uid.clone())
        else {
            warn!("No Tracking Unique Identifier, skipping ambiguous measurement");
            continue;
        };

        match index_by_uid.get(&uid) {
            None => {
                index_by_uid.insert(uid.clone(), merged.len());
                merged.push((uid, items.clone()));
            }
            Some(&index) => {
                let target = &mut merged[index].1;
                for item in items {
                    if item.has_concept_value(TRACKING_UNIQUE_IDENTIFIER) || target.contains(item) {
                        continue;
                    }
                    target.push(item.clone());
                }
            }
        }
    }

    merged
}

/// Returns whether the item only positions the label of another graphic
pub fn is_text_position(item: &ContentItem) -> bool {
    item.concept_name()
        .map(|code| TEXT_ANNOTATION_POSITION.matches(code))
        .unwrap_or(false)
}

/// Returns whether the item is a SCOORD/SCOORD3D that defines geometry
pub fn is_geometry(item: &ContentItem) -> bool {
    item.is_spatial() && !is_text_position(item)
}

fn is_comment(item: &ContentItem) -> bool {
    item.concept_name()
        .map(|code| COMMENT.matches(code))
        .unwrap_or(false)
}

fn has_geometry(items: &[ContentItem]) -> bool {
    items.iter().any(is_geometry)
}

fn process_measurement(uid: &str, items: &[ContentItem], config: &SrConfig) -> Option<Measurement> {
    if has_geometry(items) {
        process_tid1410_measurement(Some(uid), items, config)
    } else {
        Some(process_non_geometric_measurement(Some(uid), items, config))
    }
}

/// Builds a TID 1410 measurement around its graphic item
///
/// The graphic item is the first SCOORD/SCOORD3D, text positions included.
/// Returns `None` (with a warning) when no SCOORD/SCOORD3D is present.
fn process_tid1410_measurement(
    merge_key: Option<&str>,
    items: &[ContentItem],
    config: &SrConfig,
) -> Option<Measurement> {
    let Some(graphic_item) = items.iter().find(|item| item.is_spatial()) else {
        warn!("No SCOORD/SCOORD3D found, skipping annotation");
        return None;
    };

    let coordinate = coordinate_from_graphic_item(graphic_item);
    let concept = graphic_item.concept_name();
    let points_length = if coordinate.is_3d_point() {
        debug!(
            "SCOORD3D POINT with {} values treated as a single point ({})",
            coordinate.graphic_data.len(),
            concept
                .and_then(|c| c.code_meaning.as_deref())
                .unwrap_or("unnamed")
        );
        1
    } else {
        coordinate.graphic_data.len() / coordinate.dimensions()
    };

    let tracking_identifier = tracking_identifier_text(items)
        .or_else(|| concept.and_then(|c| c.code_meaning.clone()))
        .unwrap_or_else(|| config.default_tracking_identifier.clone());

    let mut measurement = Measurement::new(
        tracking_unique_identifier(items, merge_key),
        tracking_identifier,
    );
    measurement.graphic_type = Some(coordinate.graphic_type);
    measurement.graphic_code = concept.and_then(Code::qualified_value);
    measurement.is_3d_measurement = coordinate.is_3d();
    measurement.points_length = points_length;
    measurement.measurement_type = coordinate.is_3d_point().then_some(MeasurementType::Point);
    measurement.frame_of_reference_uid = coordinate.referenced_frame_of_reference_uid.clone();
    measurement.coords.push(coordinate);

    measurement.labels.extend(
        items
            .iter()
            .filter(|item| item.value_type == ValueType::Num)
            .filter_map(label_from_measured_value),
    );

    if let Some(label) = items
        .iter()
        .find(|item| item.has_concept(SCT, FINDING_SITE_SCT))
        .and_then(finding_site_label)
    {
        measurement.labels.push(label);
    }

    Some(measurement)
}

/// Builds a measurement from NUM, finding and comment items
///
/// Coordinates are only collected from NUM items "inferred from" a nested
/// SCOORD/SCOORD3D.
fn process_non_geometric_measurement(
    merge_key: Option<&str>,
    items: &[ContentItem],
    config: &SrConfig,
) -> Measurement {
    let mut measurement = Measurement::new(
        tracking_unique_identifier(items, merge_key),
        tracking_identifier_text(items)
            .unwrap_or_else(|| config.default_tracking_identifier.clone()),
    );

    for comment in items.iter().filter(|item| is_comment(item)) {
        if let Some(text) = comment.text_value.as_deref().filter(|t| !t.is_empty()) {
            measurement.labels.push(Label::new(text, ""));
        }
    }

    if let Some(label) = items
        .iter()
        .find(|item| item.has_concept_value(FINDING))
        .and_then(free_text_label)
    {
        measurement.labels.push(label);
    }

    if let Some(label) = items
        .iter()
        .filter(|item| item.has_concept(SRT, FINDING_SITE))
        .find_map(free_text_label)
    {
        measurement.labels.push(label);
    }

    for item in items.iter().filter(|item| item.value_type == ValueType::Num) {
        match item.content_sequence.first() {
            Some(nested) if nested.is_spatial() => {
                let coordinate = coordinate_from_graphic_item(nested);
                if !coordinate.graphic_data.is_empty() {
                    measurement.coords.push(coordinate);
                }
            }
            Some(nested) => {
                warn!("Graphic {} not currently supported, skipping annotation", nested.value_type);
                continue;
            }
            None => {}
        }

        if let Some(label) = label_from_measured_value(item) {
            measurement.labels.push(label);
        }
    }

    measurement
}

/// Text of the Tracking Identifier (112039) item
fn tracking_identifier_text(items: &[ContentItem]) -> Option<String> {
    items
        .iter()
        .find(|item| item.has_concept_value(TRACKING_IDENTIFIER))
        .and_then(|item| item.text_value.clone())
}

/// Resolves the identity of a measurement
///
/// Uses the first UIDREF item, then the merge key. Reports without either get
/// a UID derived from their content so extraction stays repeatable.
fn tracking_unique_identifier(items: &[ContentItem], merge_key: Option<&str>) -> String {
    items
        .iter()
        .filter(|item| item.value_type == ValueType::Uidref)
        .find_map(|item| item.uid.clone())
        .or_else(|| merge_key.map(str::to_string))
        .unwrap_or_else(|| {
            let fingerprint = serde_json::to_vec(items).unwrap_or_default();
            let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, &fingerprint);
            format!("2.25.{}", uuid.as_u128())
        })
}

/// Converts a SCOORD/SCOORD3D item into a coordinate
///
/// The image reference comes from the item itself or its nested IMAGE item;
/// the frame of reference from the item or any nested item.
pub fn coordinate_from_graphic_item(item: &ContentItem) -> Coordinate {
    let referenced_sop = item
        .referenced_sop_sequence
        .first()
        .or_else(|| {
            item.content_sequence
                .iter()
                .find_map(|child| child.referenced_sop_sequence.first())
        })
        .cloned();

    let referenced_frame_of_reference_uid = item
        .referenced_frame_of_reference_uid
        .clone()
        .or_else(|| {
            item.content_sequence
                .iter()
                .find_map(|child| child.referenced_frame_of_reference_uid.clone())
        });

    Coordinate {
        value_type: item.value_type,
        graphic_type: item.graphic_type.unwrap_or(GraphicType::Unknown),
        graphic_data: item.graphic_data.clone(),
        referenced_sop,
        referenced_frame_of_reference_uid,
    }
}

/// Formats a NUM item as a label
///
/// The value has two decimals followed by the unit code value when present,
/// e.g. `Long Axis: 31.00 mm`. Returns `None` for items without a measured value.
pub fn label_from_measured_value(item: &ContentItem) -> Option<Label> {
    let measured = item.measured_value_sequence.first()?;
    let label = item
        .concept_name()
        .and_then(|c| c.code_meaning.clone())
        .unwrap_or_default();
    let number = measured
        .numeric_value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_default();
    let value = match measured
        .measurement_units_code_sequence
        .first()
        .and_then(|unit| unit.code_value.as_deref())
        .filter(|unit| !unit.is_empty())
    {
        Some(unit) => format!("{} {}", number, unit),
        None => number,
    };
    Some(Label::new(label, value))
}

fn finding_site_label(item: &ContentItem) -> Option<Label> {
    let value = item.concept_code()?.code_meaning.clone()?;
    let label = item
        .concept_name()
        .and_then(|c| c.code_meaning.clone())
        .unwrap_or_else(|| "Finding Site".to_string());
    Some(Label::new(label, value))
}

fn free_text_label(item: &ContentItem) -> Option<Label> {
    let code = item.concept_code().filter(|c| is_cornerstone_free_text(c))?;
    Some(Label::new(
        CORNERSTONE_FREE_TEXT,
        code.code_meaning.clone().unwrap_or_default(),
    ))
}
