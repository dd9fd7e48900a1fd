use serde::Serialize;

/// An image display set a measurement can be bound to
///
/// Only the fields the binder needs are modelled: the identity, the frame of
/// reference and the image ids the viewer resolved for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDisplaySet {
    #[serde(rename = "displaySetInstanceUID")]
    pub display_set_instance_uid: String,
    #[serde(rename = "StudyInstanceUID")]
    pub study_instance_uid: Option<String>,
    #[serde(rename = "SeriesInstanceUID")]
    pub series_instance_uid: Option<String>,
    #[serde(rename = "FrameOfReferenceUID")]
    pub frame_of_reference_uid: Option<String>,
    pub image_ids: Vec<String>,
    /// Display sets the viewer cannot render are never bound to
    pub unsupported: bool,
}

impl ImageDisplaySet {
    pub fn new(display_set_instance_uid: impl Into<String>) -> Self {
        Self {
            display_set_instance_uid: display_set_instance_uid.into(),
            study_instance_uid: None,
            series_instance_uid: None,
            frame_of_reference_uid: None,
            image_ids: Vec::new(),
            unsupported: false,
        }
    }

    pub fn with_series(mut self, study_instance_uid: &str, series_instance_uid: &str) -> Self {
        self.study_instance_uid = Some(study_instance_uid.to_string());
        self.series_instance_uid = Some(series_instance_uid.to_string());
        self
    }

    pub fn with_frame_of_reference(mut self, uid: &str) -> Self {
        self.frame_of_reference_uid = Some(uid.to_string());
        self
    }

    pub fn with_image_ids(mut self, image_ids: Vec<String>) -> Self {
        self.image_ids = image_ids;
        self
    }

    pub fn unsupported(mut self) -> Self {
        self.unsupported = true;
        self
    }
}
