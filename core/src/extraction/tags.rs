use dicom_core::Tag;
use dicom_object::InMemDicomObject;

// Identification Tags
pub const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
pub const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);
pub const SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x0018);
pub const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
pub const MODALITY: Tag = Tag(0x0008, 0x0060);
pub const INSTANCE_NUMBER: Tag = Tag(0x0020, 0x0013);
pub const FRAME_OF_REFERENCE_UID: Tag = Tag(0x0020, 0x0052);
pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);

// Series Tags
pub const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);
pub const SERIES_NUMBER: Tag = Tag(0x0020, 0x0011);
pub const SERIES_DATE: Tag = Tag(0x0008, 0x0021);
pub const SERIES_TIME: Tag = Tag(0x0008, 0x0031);
pub const CONTENT_DATE: Tag = Tag(0x0008, 0x0023);
pub const CONTENT_TIME: Tag = Tag(0x0008, 0x0033);

// Code Sequence Item Tags
pub const CODE_VALUE: Tag = Tag(0x0008, 0x0100);
pub const CODING_SCHEME_DESIGNATOR: Tag = Tag(0x0008, 0x0102);
pub const CODE_MEANING: Tag = Tag(0x0008, 0x0104);

// SR Content Item Tags
pub const RELATIONSHIP_TYPE: Tag = Tag(0x0040, 0xA010);
pub const VALUE_TYPE: Tag = Tag(0x0040, 0xA040);
pub const CONCEPT_NAME_CODE_SEQUENCE: Tag = Tag(0x0040, 0xA043);
pub const CONCEPT_CODE_SEQUENCE: Tag = Tag(0x0040, 0xA168);
pub const CONTENT_SEQUENCE: Tag = Tag(0x0040, 0xA730);
pub const TEXT_VALUE: Tag = Tag(0x0040, 0xA160);
pub const UID: Tag = Tag(0x0040, 0xA124);
pub const MEASURED_VALUE_SEQUENCE: Tag = Tag(0x0040, 0xA300);
pub const NUMERIC_VALUE: Tag = Tag(0x0040, 0xA30A);
pub const MEASUREMENT_UNITS_CODE_SEQUENCE: Tag = Tag(0x0040, 0x08EA);

// Spatial Coordinate Tags
pub const GRAPHIC_DATA: Tag = Tag(0x0070, 0x0022);
pub const GRAPHIC_TYPE: Tag = Tag(0x0070, 0x0023);
pub const REFERENCED_FRAME_OF_REFERENCE_UID: Tag = Tag(0x3006, 0x0024);

// Reference Tags
pub const REFERENCED_SOP_SEQUENCE: Tag = Tag(0x0008, 0x1199);
pub const REFERENCED_SOP_CLASS_UID: Tag = Tag(0x0008, 0x1150);
pub const REFERENCED_SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x1155);
pub const REFERENCED_FRAME_NUMBER: Tag = Tag(0x0008, 0x1160);

/// Helper to get string value from DICOM tag
///
/// Returns `None` if the tag is not present or cannot be converted to string
pub fn get_string_value(dcm: &InMemDicomObject, tag: Tag) -> Option<String> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_str().ok())
        .map(|s| s.trim().trim_end_matches('\0').to_string())
}

/// Helper to get integer value from DICOM tag
///
/// Returns `None` if the tag is not present or cannot be converted to i32
pub fn get_int_value(dcm: &InMemDicomObject, tag: Tag) -> Option<i32> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_int::<i32>().ok())
}

/// Helper to get a decimal value (DS/FD/FL) from DICOM tag
pub fn get_float_value(dcm: &InMemDicomObject, tag: Tag) -> Option<f64> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_float64().ok())
}

/// Helper to get a list of floats (e.g. GraphicData, FL) from DICOM tag
pub fn get_float_values(dcm: &InMemDicomObject, tag: Tag) -> Option<Vec<f64>> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_multi_float32().ok())
        .map(|values| values.into_iter().map(f64::from).collect())
}

/// Helper to get the items of a sequence tag
///
/// Returns an empty slice if the tag is absent or not a sequence
pub fn get_sequence_items(dcm: &InMemDicomObject, tag: Tag) -> &[InMemDicomObject] {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.items())
        .unwrap_or(&[])
}
