use crate::types::{GraphicType, ReferencedSop, ValueType};
use serde::Serialize;
use std::fmt;

/// One spatial coordinate of a measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// SCOORD or SCOORD3D
    pub value_type: ValueType,
    pub graphic_type: GraphicType,
    /// Flat list: 2 values per point for SCOORD, 3 for SCOORD3D
    pub graphic_data: Vec<f64>,
    /// Image anchor (2D)
    pub referenced_sop: Option<ReferencedSop>,
    /// Frame of reference anchor (3D)
    pub referenced_frame_of_reference_uid: Option<String>,
}

impl Coordinate {
    pub fn is_3d(&self) -> bool {
        self.value_type == ValueType::Scoord3d
    }

    /// Values per point
    pub fn dimensions(&self) -> usize {
        if self.is_3d() {
            3
        } else {
            2
        }
    }

    /// SCOORD3D with GraphicType POINT
    pub fn is_3d_point(&self) -> bool {
        self.is_3d() && self.graphic_type == GraphicType::Point
    }

    pub fn referenced_sop_instance_uid(&self) -> Option<&str> {
        self.referenced_sop
            .as_ref()
            .and_then(|r| r.referenced_sop_instance_uid.as_deref())
    }

    /// Referenced frame number, defaulting to 1
    pub fn referenced_frame_number(&self) -> u32 {
        self.referenced_sop
            .as_ref()
            .and_then(|r| r.referenced_frame_number)
            .unwrap_or(1)
    }

    /// GraphicData split into point vectors; a trailing partial point is dropped
    pub fn points(&self) -> Vec<Vec<f64>> {
        self.graphic_data
            .chunks_exact(self.dimensions())
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}

/// A `{label, value}` pair shown next to a measurement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub label: String,
    pub value: String,
}

impl Label {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.value)
    }
}

/// Special measurement shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    /// SCOORD3D POINT, always a single point
    Point,
}

impl MeasurementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementType::Point => "point",
        }
    }
}

/// A normalized measurement extracted from an SR document
///
/// The binding fields (`loaded`, `image_id`, `display_set_instance_uid`,
/// `referenced_sop_instance_uid`, `frame_number`) are written once by the
/// binder and never reset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    #[serde(rename = "TrackingUniqueIdentifier")]
    pub tracking_unique_identifier: String,
    #[serde(rename = "TrackingIdentifier")]
    pub tracking_identifier: String,
    pub labels: Vec<Label>,
    pub coords: Vec<Coordinate>,
    pub graphic_type: Option<GraphicType>,
    /// `designator:value` of the graphic item's concept name
    pub graphic_code: Option<String>,
    #[serde(rename = "is3DMeasurement")]
    pub is_3d_measurement: bool,
    pub points_length: usize,
    pub measurement_type: Option<MeasurementType>,
    pub loaded: bool,
    pub image_id: Option<String>,
    pub display_set_instance_uid: Option<String>,
    pub referenced_sop_instance_uid: Option<String>,
    pub frame_number: Option<u32>,
    pub frame_of_reference_uid: Option<String>,
}

impl Measurement {
    /// Creates an unbound measurement without geometry
    pub fn new(tracking_unique_identifier: String, tracking_identifier: String) -> Self {
        Self {
            tracking_unique_identifier,
            tracking_identifier,
            labels: Vec::new(),
            coords: Vec::new(),
            graphic_type: None,
            graphic_code: None,
            is_3d_measurement: false,
            points_length: 0,
            measurement_type: None,
            loaded: false,
            image_id: None,
            display_set_instance_uid: None,
            referenced_sop_instance_uid: None,
            frame_number: None,
            frame_of_reference_uid: None,
        }
    }

    /// The coordinate used for binding and rendering
    pub fn primary_coordinate(&self) -> Option<&Coordinate> {
        self.coords.first()
    }

    /// Single SCOORD3D POINT measurement
    pub fn is_3d_point(&self) -> bool {
        self.primary_coordinate()
            .map(|c| c.is_3d_point())
            .unwrap_or(false)
            && self.points_length == 1
    }

    /// Whether the measurement carries TID 1410 geometry
    pub fn is_geometric(&self) -> bool {
        self.graphic_type.is_some()
    }
}

/// An image the report depends on (Image Library entry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferencedImage {
    #[serde(rename = "ReferencedSOPClassUID")]
    pub referenced_sop_class_uid: String,
    #[serde(rename = "ReferencedSOPInstanceUID")]
    pub referenced_sop_instance_uid: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinate(value_type: ValueType, graphic_type: GraphicType, data: Vec<f64>) -> Coordinate {
        Coordinate {
            value_type,
            graphic_type,
            graphic_data: data,
            referenced_sop: None,
            referenced_frame_of_reference_uid: None,
        }
    }

    #[test]
    fn test_points_split_by_dimension() {
        let c = coordinate(
            ValueType::Scoord,
            GraphicType::Polyline,
            vec![10.0, 20.0, 30.0, 40.0],
        );
        assert_eq!(c.points(), vec![vec![10.0, 20.0], vec![30.0, 40.0]]);

        let c = coordinate(
            ValueType::Scoord3d,
            GraphicType::Polyline,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
        );
        assert_eq!(c.points().len(), 2);
    }

    #[test]
    fn test_referenced_frame_defaults_to_one() {
        let mut c = coordinate(ValueType::Scoord, GraphicType::Point, vec![1.0, 1.0]);
        assert_eq!(c.referenced_frame_number(), 1);

        c.referenced_sop = Some(ReferencedSop {
            referenced_sop_class_uid: None,
            referenced_sop_instance_uid: Some("1.2.3".to_string()),
            referenced_frame_number: Some(3),
        });
        assert_eq!(c.referenced_frame_number(), 3);
        assert_eq!(c.referenced_sop_instance_uid(), Some("1.2.3"));
    }

    #[test]
    fn test_label_display() {
        assert_eq!(Label::new("Long Axis", "31.00 mm").to_string(), "Long Axis: 31.00 mm");
    }
}
