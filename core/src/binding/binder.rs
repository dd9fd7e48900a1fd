//! Binding of extracted measurements to image display sets
//!
//! A measurement is bound at most once. 3D measurements of a 3D report bind
//! to any display set sharing their frame of reference; everything else binds
//! to the image its primary coordinate references, looked up by
//! `SOPInstanceUID:frame` among the images of the candidate display set.

use crate::binding::annotation::{AnnotationBuilder, AnnotationStore};
use crate::binding::image_ids::{image_key, ImageIdSource};
use crate::types::{ImageDisplaySet, Measurement};
use log::{debug, warn};
use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Error type returned by customization hooks
pub type BoxError = Box<dyn Error + Send + Sync>;

/// The SR series measurements are bound for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSource {
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    /// Comprehensive 3D SR
    pub is_3d_report: bool,
}

/// Hook rewriting a measurement right before it is matched
///
/// The returned measurement is only used for the current attempt; binding
/// state is always recorded on the measurement owned by the display set.
pub trait MeasurementCustomization: Send + Sync {
    fn before_add_measurement(
        &self,
        measurement: &Measurement,
        source: &BindingSource,
    ) -> Result<Measurement, BoxError>;
}

/// Outcome of matching one measurement against one display set
#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    FrameOfReference,
    Image {
        image_id: String,
        sop_instance_uid: String,
        frame_number: u32,
    },
}

/// Matches measurements against display sets and emits their annotations
pub struct MeasurementBinder {
    image_ids: Arc<dyn ImageIdSource>,
    annotations: Arc<dyn AnnotationStore>,
    builder: AnnotationBuilder,
    customization: Option<Arc<dyn MeasurementCustomization>>,
}

impl MeasurementBinder {
    pub fn new(
        image_ids: Arc<dyn ImageIdSource>,
        annotations: Arc<dyn AnnotationStore>,
        builder: AnnotationBuilder,
    ) -> Self {
        Self {
            image_ids,
            annotations,
            builder,
            customization: None,
        }
    }

    pub fn with_customization(mut self, customization: Arc<dyn MeasurementCustomization>) -> Self {
        self.customization = Some(customization);
        self
    }

    /// Binds every still unbound measurement that matches the display set
    ///
    /// # Arguments
    ///
    /// * `measurements` - Canonical measurement list of an SR display set
    /// * `source` - The SR series the measurements come from
    /// * `display_set` - Candidate image display set
    ///
    /// # Returns
    ///
    /// The number of measurements bound by this pass
    pub fn bind_to_display_set(
        &self,
        measurements: &mut [Measurement],
        source: &BindingSource,
        display_set: &ImageDisplaySet,
    ) -> usize {
        let mut pending: Vec<usize> = measurements
            .iter()
            .enumerate()
            .filter(|(_, measurement)| !measurement.loaded)
            .map(|(index, _)| index)
            .collect();

        if pending.is_empty() || display_set.unsupported {
            return 0;
        }

        let images = self.image_lookup(display_set);
        let mut bound = 0;

        while let Some(index) = pending.pop() {
            let candidate = self.customize(&measurements[index], source);
            let Some(binding) = decide(&candidate, source, display_set, &images) else {
                continue;
            };

            let (image_id, frame_number) = match &binding {
                Binding::FrameOfReference => {
                    debug!(
                        "Binding 3D measurement {} to display set {} (frame of reference {:?})",
                        candidate.tracking_unique_identifier,
                        display_set.display_set_instance_uid,
                        display_set.frame_of_reference_uid
                    );
                    (None, None)
                }
                Binding::Image {
                    image_id,
                    sop_instance_uid,
                    frame_number,
                } => {
                    debug!(
                        "Binding measurement {} to image {} ({} frame {})",
                        candidate.tracking_unique_identifier, image_id, sop_instance_uid, frame_number
                    );
                    (Some(image_id.as_str()), Some(*frame_number))
                }
            };

            let mut annotation = self.builder.build(&candidate, image_id, frame_number);
            if annotation.metadata.frame_of_reference_uid.is_none() {
                annotation.metadata.frame_of_reference_uid =
                    display_set.frame_of_reference_uid.clone();
            }
            let frame_of_reference_uid = annotation.metadata.frame_of_reference_uid.clone();
            self.annotations
                .add_annotation(annotation, frame_of_reference_uid.as_deref());

            record_binding(&mut measurements[index], binding, display_set);
            bound += 1;
        }

        bound
    }

    /// Runs a binding pass against each display set in turn
    pub fn bind_to_display_sets(
        &self,
        measurements: &mut [Measurement],
        source: &BindingSource,
        display_sets: &[ImageDisplaySet],
    ) -> usize {
        display_sets
            .iter()
            .map(|display_set| self.bind_to_display_set(measurements, source, display_set))
            .sum()
    }

    /// `SOPInstanceUID:frame` to image id for the display set's images
    fn image_lookup(&self, display_set: &ImageDisplaySet) -> HashMap<String, String> {
        self.image_ids
            .image_ids_for_display_set(display_set)
            .into_iter()
            .filter_map(|image_id| {
                let uids = self.image_ids.uids_from_image_id(&image_id)?;
                Some((uids.key(), image_id))
            })
            .collect()
    }

    /// Applies the customization hook, falling back to the measurement as is
    fn customize<'a>(&self, measurement: &'a Measurement, source: &BindingSource) -> Cow<'a, Measurement> {
        let Some(customization) = &self.customization else {
            return Cow::Borrowed(measurement);
        };
        match customization.before_add_measurement(measurement, source) {
            Ok(customized) => Cow::Owned(customized),
            Err(e) => {
                warn!(
                    "Measurement customization failed for {}: {}",
                    measurement.tracking_unique_identifier, e
                );
                Cow::Borrowed(measurement)
            }
        }
    }
}

impl fmt::Debug for MeasurementBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementBinder")
            .field("builder", &self.builder)
            .field("customization", &self.customization.is_some())
            .finish()
    }
}

fn decide(
    measurement: &Measurement,
    source: &BindingSource,
    display_set: &ImageDisplaySet,
    images: &HashMap<String, String>,
) -> Option<Binding> {
    let coordinate = measurement.primary_coordinate()?;

    if source.is_3d_report && coordinate.is_3d() {
        let same_frame_of_reference = matches!(
            (&coordinate.referenced_frame_of_reference_uid, &display_set.frame_of_reference_uid),
            (Some(a), Some(b)) if a == b
        );
        if same_frame_of_reference {
            return Some(Binding::FrameOfReference);
        }
    }

    let sop_instance_uid = coordinate.referenced_sop_instance_uid()?;
    let frame_number = coordinate.referenced_frame_number();
    let image_id = images.get(&image_key(sop_instance_uid, frame_number))?;

    if !references_sop_instance(measurement, sop_instance_uid) {
        return None;
    }

    Some(Binding::Image {
        image_id: image_id.clone(),
        sop_instance_uid: sop_instance_uid.to_string(),
        frame_number,
    })
}

fn references_sop_instance(measurement: &Measurement, sop_instance_uid: &str) -> bool {
    measurement
        .coords
        .iter()
        .any(|coordinate| coordinate.referenced_sop_instance_uid() == Some(sop_instance_uid))
}

fn record_binding(measurement: &mut Measurement, binding: Binding, display_set: &ImageDisplaySet) {
    measurement.loaded = true;
    measurement.display_set_instance_uid = Some(display_set.display_set_instance_uid.clone());
    if measurement.frame_of_reference_uid.is_none() {
        measurement.frame_of_reference_uid = display_set.frame_of_reference_uid.clone();
    }
    if let Binding::Image {
        image_id,
        sop_instance_uid,
        frame_number,
    } = binding
    {
        measurement.image_id = Some(image_id);
        measurement.referenced_sop_instance_uid = Some(sop_instance_uid);
        measurement.frame_number = Some(frame_number);
    }
}
