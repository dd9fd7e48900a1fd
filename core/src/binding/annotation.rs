//! Conversion of measurements into renderable annotations

use crate::binding::lock;
use crate::config::SrConfig;
use crate::types::{Annotation, AnnotationData, AnnotationMetadata, GraphicType, Handles, Measurement, Point};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Tool rendering SR measurements anchored to an image
pub const DICOM_SR_DISPLAY_TOOL: &str = "DICOMSRDisplay";

/// Tool rendering SCOORD3D points in world coordinates
pub const SR_SCOORD3D_POINT_TOOL: &str = "SRSCOORD3DPoint";

/// Builds [`Annotation`]s from measurements
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationBuilder {
    point_handle_offset: [f64; 3],
}

impl Default for AnnotationBuilder {
    fn default() -> Self {
        Self::new(&SrConfig::default())
    }
}

impl AnnotationBuilder {
    pub fn new(config: &SrConfig) -> Self {
        Self {
            point_handle_offset: config.point_handle_offset,
        }
    }

    /// Converts a measurement into an annotation
    ///
    /// A 3D point becomes a two-handle line (the point and the point moved by
    /// the configured offset) anchored to the frame of reference only. Every
    /// other measurement references the given image and frame.
    ///
    /// # Arguments
    ///
    /// * `measurement` - Measurement to convert, left untouched
    /// * `image_id` - Image the measurement was bound to, `None` for 3D binds
    /// * `frame_number` - Frame of that image
    pub fn build(
        &self,
        measurement: &Measurement,
        image_id: Option<&str>,
        frame_number: Option<u32>,
    ) -> Annotation {
        let renderable_data = renderable_data(measurement);
        let label_text = measurement
            .labels
            .iter()
            .map(|label| label.to_string())
            .collect::<Vec<_>>()
            .join("\n");

        if let Some(point) = self.point_handles(measurement) {
            let label = if measurement.tracking_identifier.is_empty() {
                "SR Annotation".to_string()
            } else {
                measurement.tracking_identifier.clone()
            };
            return Annotation {
                annotation_uid: measurement.tracking_unique_identifier.clone(),
                highlighted: false,
                is_locked: false,
                invalidated: false,
                metadata: AnnotationMetadata {
                    tool_name: SR_SCOORD3D_POINT_TOOL.to_string(),
                    frame_of_reference_uid: measurement.frame_of_reference_uid.clone(),
                    referenced_image_id: None,
                },
                data: AnnotationData {
                    label: Some(label),
                    label_text,
                    handles: Handles {
                        points: point,
                        active_handle_index: None,
                    },
                    frame_number: None,
                    renderable_data,
                    tracking_unique_identifier: measurement.tracking_unique_identifier.clone(),
                    labels: measurement.labels.clone(),
                    is_3d_measurement: true,
                },
            };
        }

        let points = measurement
            .primary_coordinate()
            .map(|coordinate| coordinate.points())
            .unwrap_or_default();

        Annotation {
            annotation_uid: measurement.tracking_unique_identifier.clone(),
            highlighted: false,
            is_locked: false,
            invalidated: false,
            metadata: AnnotationMetadata {
                tool_name: DICOM_SR_DISPLAY_TOOL.to_string(),
                frame_of_reference_uid: measurement.frame_of_reference_uid.clone(),
                referenced_image_id: image_id.map(str::to_string),
            },
            data: AnnotationData {
                label: measurement.labels.first().map(|label| label.value.clone()),
                label_text,
                handles: Handles {
                    points,
                    active_handle_index: None,
                },
                frame_number,
                renderable_data,
                tracking_unique_identifier: measurement.tracking_unique_identifier.clone(),
                labels: measurement.labels.clone(),
                is_3d_measurement: measurement.is_3d_measurement,
            },
        }
    }

    /// Start and end handle of a 3D point measurement
    fn point_handles(&self, measurement: &Measurement) -> Option<Vec<Point>> {
        let coordinate = measurement.primary_coordinate()?;
        if !coordinate.is_3d_point() || coordinate.graphic_data.len() < 3 {
            return None;
        }
        let start = coordinate.graphic_data[..3].to_vec();
        let end = start
            .iter()
            .zip(self.point_handle_offset.iter())
            .map(|(value, offset)| value + offset)
            .collect();
        Some(vec![start, end])
    }
}

/// Builds an annotation with the default handle offset
pub fn build_annotation(
    measurement: &Measurement,
    image_id: Option<&str>,
    frame_number: Option<u32>,
) -> Annotation {
    AnnotationBuilder::default().build(measurement, image_id, frame_number)
}

/// Point groups of every coordinate, keyed by graphic type
fn renderable_data(measurement: &Measurement) -> BTreeMap<GraphicType, Vec<Vec<Point>>> {
    let mut data: BTreeMap<GraphicType, Vec<Vec<Point>>> = BTreeMap::new();
    for coordinate in &measurement.coords {
        data.entry(coordinate.graphic_type)
            .or_default()
            .push(coordinate.points());
    }
    data
}

/// Sink for built annotations
pub trait AnnotationStore: Send + Sync {
    fn add_annotation(&self, annotation: Annotation, frame_of_reference_uid: Option<&str>);
}

/// Annotation store keeping everything in memory
#[derive(Debug, Default)]
pub struct InMemoryAnnotationStore {
    annotations: Mutex<Vec<(Annotation, Option<String>)>>,
}

impl InMemoryAnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored annotations in insertion order
    pub fn annotations(&self) -> Vec<Annotation> {
        lock(&self.annotations)
            .iter()
            .map(|(annotation, _)| annotation.clone())
            .collect()
    }

    /// Finds an annotation by its UID
    pub fn get(&self, annotation_uid: &str) -> Option<Annotation> {
        lock(&self.annotations)
            .iter()
            .find(|(annotation, _)| annotation.annotation_uid == annotation_uid)
            .map(|(annotation, _)| annotation.clone())
    }

    pub fn len(&self) -> usize {
        lock(&self.annotations).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnnotationStore for InMemoryAnnotationStore {
    fn add_annotation(&self, annotation: Annotation, frame_of_reference_uid: Option<&str>) {
        lock(&self.annotations).push((annotation, frame_of_reference_uid.map(str::to_string)));
    }
}
