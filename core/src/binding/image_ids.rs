use crate::types::ImageDisplaySet;
use regex::Regex;
use std::sync::OnceLock;

/// SOP instance and frame addressed by an image id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUids {
    pub sop_instance_uid: String,
    pub frame_number: Option<u32>,
}

impl ImageUids {
    /// Binder lookup key, `SOPInstanceUID:frame` with the frame defaulting to 1
    pub fn key(&self) -> String {
        image_key(&self.sop_instance_uid, self.frame_number.unwrap_or(1))
    }
}

/// Builds the `SOPInstanceUID:frame` key used to match measurements to images
pub fn image_key(sop_instance_uid: &str, frame_number: u32) -> String {
    format!("{}:{}", sop_instance_uid, frame_number)
}

/// Resolves the images of a display set
pub trait ImageIdSource: Send + Sync {
    /// Image ids of every frame of the display set
    fn image_ids_for_display_set(&self, display_set: &ImageDisplaySet) -> Vec<String>;

    /// SOP instance and frame an image id points at
    fn uids_from_image_id(&self, image_id: &str) -> Option<ImageUids>;
}

/// Image id source for WADO-RS and WADO-URI style ids
///
/// Image ids are taken from the display set as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct WadoImageIdResolver;

impl ImageIdSource for WadoImageIdResolver {
    fn image_ids_for_display_set(&self, display_set: &ImageDisplaySet) -> Vec<String> {
        display_set.image_ids.clone()
    }

    fn uids_from_image_id(&self, image_id: &str) -> Option<ImageUids> {
        parse_image_id(image_id)
    }
}

/// Parses a WADO-RS or WADO-URI image id
///
/// # Examples
///
/// * `wadors:https://host/studies/1/series/2/instances/3/frames/4` gives `3`, frame 4
/// * `wadouri:https://host/wado?requestType=WADO&objectUID=3&frame=2` gives `3`, frame 2
///
/// # Returns
///
/// `None` when the id names no SOP instance
pub fn parse_image_id(image_id: &str) -> Option<ImageUids> {
    static WADO_RS: OnceLock<Regex> = OnceLock::new();
    static OBJECT_UID: OnceLock<Regex> = OnceLock::new();
    static FRAME: OnceLock<Regex> = OnceLock::new();

    let wado_rs = WADO_RS.get_or_init(|| {
        Regex::new(r"/instances/([^/?&#]+)(?:/frames/(\d+))?").expect("Failed to compile regex")
    });
    if let Some(captures) = wado_rs.captures(image_id) {
        return Some(ImageUids {
            sop_instance_uid: captures[1].to_string(),
            frame_number: captures.get(2).and_then(|m| m.as_str().parse().ok()),
        });
    }

    let object_uid = OBJECT_UID
        .get_or_init(|| Regex::new(r"[?&]objectUID=([^&#]+)").expect("Failed to compile regex"));
    let frame =
        FRAME.get_or_init(|| Regex::new(r"[?&]frame=(\d+)").expect("Failed to compile regex"));

    let sop_instance_uid = object_uid.captures(image_id)?[1].to_string();
    let frame_number = frame
        .captures(image_id)
        .and_then(|captures| captures[1].parse().ok());

    Some(ImageUids {
        sop_instance_uid,
        frame_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        "wadors:https://pacs/dicom-web/studies/1.2/series/1.2.3/instances/1.2.3.4/frames/5",
        "1.2.3.4",
        Some(5)
    )]
    #[case(
        "wadors:https://pacs/dicom-web/studies/1.2/series/1.2.3/instances/1.2.3.4",
        "1.2.3.4",
        None
    )]
    #[case(
        "wadouri:https://pacs/wado?requestType=WADO&studyUID=1.2&objectUID=1.2.3.9&frame=2",
        "1.2.3.9",
        Some(2)
    )]
    #[case("wadouri:file:///data/a.dcm?objectUID=1.2.3.7", "1.2.3.7", None)]
    fn test_parse_image_id(
        #[case] image_id: &str,
        #[case] sop_instance_uid: &str,
        #[case] frame_number: Option<u32>,
    ) {
        let uids = parse_image_id(image_id).unwrap();
        assert_eq!(uids.sop_instance_uid, sop_instance_uid);
        assert_eq!(uids.frame_number, frame_number);
    }

    #[test]
    fn test_unparseable_image_id() {
        assert_eq!(parse_image_id("dicomfile:/tmp/a.dcm"), None);
    }

    #[test]
    fn test_key_defaults_to_first_frame() {
        let uids = ImageUids {
            sop_instance_uid: "1.2.3".to_string(),
            frame_number: None,
        };
        assert_eq!(uids.key(), "1.2.3:1");
    }
}
