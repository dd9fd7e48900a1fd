use crate::types::{GraphicType, Label};
use serde::Serialize;
use std::collections::BTreeMap;

/// A point in image (2 values) or world (3 values) coordinates
pub type Point = Vec<f64>;

/// Renderable annotation handed to the annotation store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(rename = "annotationUID")]
    pub annotation_uid: String,
    pub highlighted: bool,
    pub is_locked: bool,
    pub invalidated: bool,
    pub metadata: AnnotationMetadata,
    pub data: AnnotationData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationMetadata {
    pub tool_name: String,
    #[serde(rename = "FrameOfReferenceUID")]
    pub frame_of_reference_uid: Option<String>,
    /// Absent for frame-of-reference anchored (3D) annotations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_image_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationData {
    pub label: Option<String>,
    /// Newline-joined `label: value` pairs
    pub label_text: String,
    pub handles: Handles,
    pub frame_number: Option<u32>,
    /// Points of every coordinate, grouped by graphic type
    pub renderable_data: BTreeMap<GraphicType, Vec<Vec<Point>>>,
    #[serde(rename = "TrackingUniqueIdentifier")]
    pub tracking_unique_identifier: String,
    pub labels: Vec<Label>,
    #[serde(rename = "is3DMeasurement")]
    pub is_3d_measurement: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Handles {
    pub points: Vec<Point>,
    pub active_handle_index: Option<usize>,
}
