//! Whether a loaded SR can be turned back into editable tool state

pub mod adapters;
pub mod mappings;

pub use adapters::{GraphicPattern, ToolAdapter, ToolAdapterRegistry, CORNERSTONE_3D_TAG};
pub use mappings::{ToolMapping, ToolMappingRegistry};

use crate::types::{GraphicType, Measurement, ValueType};
use log::{debug, warn};
use std::collections::HashSet;

/// Tool used to rehydrate SCOORD3D points
pub const ARROW_ANNOTATE: &str = "ArrowAnnotate";

/// Checks whether any measurement can be rehydrated with the registered tools
///
/// # Arguments
///
/// * `measurements` - Measurements of a loaded SR display set
/// * `mappings` - Tool mappings registered for the measurement source
/// * `adapters` - Known tool adapters
///
/// # Returns
///
/// `true` as soon as one measurement maps onto a registered tool, `false`
/// when no mappings are registered
pub fn is_rehydratable(
    measurements: &[Measurement],
    mappings: &[ToolMapping],
    adapters: &ToolAdapterRegistry,
) -> bool {
    if mappings.is_empty() {
        return false;
    }

    let registered: HashSet<&str> = mappings
        .iter()
        .map(|mapping| mapping.annotation_type.as_str())
        .collect();

    for measurement in measurements {
        if is_single_3d_point(measurement) && registered.contains(ARROW_ANNOTATE) {
            debug!(
                "SCOORD3D point {} can be rehydrated as {}",
                measurement.tracking_identifier, ARROW_ANNOTATE
            );
            return true;
        }

        if measurement.tracking_identifier.is_empty() && measurement.graphic_type.is_none() {
            warn!(
                "No tracking identifier or graphic type for measurement {}",
                measurement.tracking_unique_identifier
            );
            continue;
        }

        let by_identifier = adapters
            .adapter_for_tracking_identifier(&measurement.tracking_identifier)
            .is_some_and(|adapter| registered.contains(adapter.tool_type.as_str()));
        let hydratable = by_identifier
            || adapters
                .adapters_for_types(
                    measurement.graphic_code.as_deref(),
                    measurement.graphic_type,
                    measurement.points_length,
                )
                .iter()
                .any(|adapter| registered.contains(adapter.tool_type.as_str()));

        if hydratable {
            return true;
        }
        debug!(
            "Measurement {} is not rehydratable",
            measurement.tracking_unique_identifier
        );
    }

    debug!("No rehydratable measurements found");
    false
}

fn is_single_3d_point(measurement: &Measurement) -> bool {
    let Some(coordinate) = measurement.primary_coordinate() else {
        return false;
    };
    (measurement.is_3d_measurement || coordinate.value_type == ValueType::Scoord3d)
        && coordinate.graphic_type == GraphicType::Point
        && measurement.points_length == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;

    fn measurement(tracking_identifier: &str, graphic: Option<(ValueType, GraphicType, usize)>) -> Measurement {
        let mut m = Measurement::new("1.2.3".to_string(), tracking_identifier.to_string());
        if let Some((value_type, graphic_type, points_length)) = graphic {
            m.graphic_type = Some(graphic_type);
            m.points_length = points_length;
            m.is_3d_measurement = value_type == ValueType::Scoord3d;
            m.coords.push(Coordinate {
                value_type,
                graphic_type,
                graphic_data: vec![0.0; points_length * if m.is_3d_measurement { 3 } else { 2 }],
                referenced_sop: None,
                referenced_frame_of_reference_uid: None,
            });
        }
        m
    }

    fn mappings(types: &[&str]) -> Vec<ToolMapping> {
        types.iter().map(|t| ToolMapping::new(t)).collect()
    }

    #[test]
    fn test_no_mappings_is_never_rehydratable() {
        let measurements = vec![measurement(
            "Cornerstone3DTools@^0.1.0:Length",
            Some((ValueType::Scoord, GraphicType::Polyline, 2)),
        )];
        assert!(!is_rehydratable(&measurements, &[], &ToolAdapterRegistry::default()));
    }

    #[test]
    fn test_3d_point_needs_arrow_annotate() {
        let measurements = vec![measurement("Lesion", Some((ValueType::Scoord3d, GraphicType::Point, 1)))];
        let adapters = ToolAdapterRegistry::default();

        assert!(is_rehydratable(&measurements, &mappings(&["ArrowAnnotate"]), &adapters));
        assert!(!is_rehydratable(&measurements, &mappings(&["Angle"]), &adapters));
    }

    #[test]
    fn test_tracking_identifier_match() {
        let measurements = vec![measurement("Cornerstone3DTools@^0.1.0:Bidirectional", None)];
        let adapters = ToolAdapterRegistry::default();

        assert!(is_rehydratable(&measurements, &mappings(&["Bidirectional"]), &adapters));
        assert!(!is_rehydratable(&measurements, &mappings(&["Length"]), &adapters));
    }

    #[test]
    fn test_graphic_shape_match() {
        let measurements = vec![measurement("Lesion", Some((ValueType::Scoord, GraphicType::Polyline, 3)))];
        let adapters = ToolAdapterRegistry::default();

        assert!(is_rehydratable(&measurements, &mappings(&["Angle"]), &adapters));
        assert!(!is_rehydratable(&measurements, &mappings(&["Length"]), &adapters));
    }

    #[test]
    fn test_measurements_without_identity_are_skipped() {
        let measurements = vec![
            measurement("", None),
            measurement("Cornerstone3DTools@^0.1.0:Probe", None),
        ];
        assert!(is_rehydratable(
            &measurements,
            &mappings(&["Probe"]),
            &ToolAdapterRegistry::default()
        ));
        assert!(!is_rehydratable(
            &measurements[..1],
            &mappings(&["Probe"]),
            &ToolAdapterRegistry::default()
        ));
    }
}
