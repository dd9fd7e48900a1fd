//! Reading SR and image instances from disk
//!
//! Part 10 SR files are converted to the same naturalized JSON tree that
//! `.json` inputs carry, so both go through one normalization path.

use crate::error::{Result, SrcatError};
use crate::extraction::tags::{
    get_float_value, get_float_values, get_int_value, get_sequence_items, get_string_value,
    CODE_MEANING, CODE_VALUE, CODING_SCHEME_DESIGNATOR, CONCEPT_CODE_SEQUENCE,
    CONCEPT_NAME_CODE_SEQUENCE, CONTENT_DATE, CONTENT_SEQUENCE, CONTENT_TIME,
    FRAME_OF_REFERENCE_UID, GRAPHIC_DATA, GRAPHIC_TYPE, INSTANCE_NUMBER,
    MEASUREMENT_UNITS_CODE_SEQUENCE, MEASURED_VALUE_SEQUENCE, MODALITY, NUMBER_OF_FRAMES,
    NUMERIC_VALUE, REFERENCED_FRAME_NUMBER, REFERENCED_FRAME_OF_REFERENCE_UID,
    REFERENCED_SOP_CLASS_UID, REFERENCED_SOP_INSTANCE_UID, REFERENCED_SOP_SEQUENCE,
    RELATIONSHIP_TYPE, SERIES_DATE, SERIES_DESCRIPTION, SERIES_INSTANCE_UID, SERIES_NUMBER,
    SERIES_TIME, SOP_CLASS_UID, SOP_INSTANCE_UID, STUDY_INSTANCE_UID, TEXT_VALUE, UID,
    VALUE_TYPE,
};
use crate::types::{Code, ImageDisplaySet, SrDocument};
use dicom_core::Tag;
use dicom_object::{open_file, InMemDicomObject};
use log::{info, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Reads one SR instance
///
/// Files ending in `.json` are parsed as naturalized DICOM JSON, anything
/// else as a DICOM Part 10 file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or lacks one of the
/// identifying UIDs.
pub fn read_sr_document(path: &Path) -> Result<SrDocument> {
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        let text = std::fs::read_to_string(path)?;
        SrDocument::from_json_str(&text)
    } else {
        let dcm = open_file(path)?;
        sr_document_from_dicom(&dcm)
    }
}

/// Converts an opened SR object into an [`SrDocument`]
pub fn sr_document_from_dicom(dcm: &InMemDicomObject) -> Result<SrDocument> {
    Ok(SrDocument {
        study_instance_uid: required_string(dcm, STUDY_INSTANCE_UID, "StudyInstanceUID")?,
        series_instance_uid: required_string(dcm, SERIES_INSTANCE_UID, "SeriesInstanceUID")?,
        sop_instance_uid: required_string(dcm, SOP_INSTANCE_UID, "SOPInstanceUID")?,
        sop_class_uid: required_string(dcm, SOP_CLASS_UID, "SOPClassUID")?,
        modality: get_string_value(dcm, MODALITY),
        instance_number: get_int_value(dcm, INSTANCE_NUMBER).map(i64::from),
        series_description: get_string_value(dcm, SERIES_DESCRIPTION),
        series_number: get_int_value(dcm, SERIES_NUMBER).map(i64::from),
        series_date: get_string_value(dcm, SERIES_DATE),
        series_time: get_string_value(dcm, SERIES_TIME),
        content_date: get_string_value(dcm, CONTENT_DATE),
        content_time: get_string_value(dcm, CONTENT_TIME),
        concept_name_code_sequence: get_sequence_items(dcm, CONCEPT_NAME_CODE_SEQUENCE)
            .iter()
            .map(code_from_item)
            .collect(),
        content_sequence: Value::Array(
            get_sequence_items(dcm, CONTENT_SEQUENCE)
                .iter()
                .map(content_item_to_json)
                .collect(),
        ),
    })
}

fn required_string(dcm: &InMemDicomObject, tag: Tag, name: &str) -> Result<String> {
    get_string_value(dcm, tag)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| SrcatError::TagNotFound(name.to_string()))
}

fn code_from_item(item: &InMemDicomObject) -> Code {
    Code {
        code_value: get_string_value(item, CODE_VALUE),
        coding_scheme_designator: get_string_value(item, CODING_SCHEME_DESIGNATOR),
        code_meaning: get_string_value(item, CODE_MEANING),
    }
}

fn code_to_json(item: &InMemDicomObject) -> Value {
    let mut fields = Map::new();
    insert_text(&mut fields, "CodeValue", get_string_value(item, CODE_VALUE));
    insert_text(
        &mut fields,
        "CodingSchemeDesignator",
        get_string_value(item, CODING_SCHEME_DESIGNATOR),
    );
    insert_text(&mut fields, "CodeMeaning", get_string_value(item, CODE_MEANING));
    Value::Object(fields)
}

fn insert_text(fields: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), Value::String(value));
    }
}

fn insert_sequence<F>(fields: &mut Map<String, Value>, key: &str, items: &[InMemDicomObject], f: F)
where
    F: Fn(&InMemDicomObject) -> Value,
{
    if !items.is_empty() {
        fields.insert(key.to_string(), Value::Array(items.iter().map(f).collect()));
    }
}

/// Converts a content item dataset into its naturalized JSON form
fn content_item_to_json(item: &InMemDicomObject) -> Value {
    let mut fields = Map::new();

    insert_text(&mut fields, "ValueType", get_string_value(item, VALUE_TYPE));
    insert_text(&mut fields, "RelationshipType", get_string_value(item, RELATIONSHIP_TYPE));
    insert_sequence(
        &mut fields,
        "ConceptNameCodeSequence",
        get_sequence_items(item, CONCEPT_NAME_CODE_SEQUENCE),
        code_to_json,
    );
    insert_sequence(
        &mut fields,
        "ConceptCodeSequence",
        get_sequence_items(item, CONCEPT_CODE_SEQUENCE),
        code_to_json,
    );
    insert_text(&mut fields, "TextValue", get_string_value(item, TEXT_VALUE));
    insert_text(&mut fields, "UID", get_string_value(item, UID));
    insert_text(&mut fields, "GraphicType", get_string_value(item, GRAPHIC_TYPE));

    if let Some(data) = get_float_values(item, GRAPHIC_DATA) {
        fields.insert(
            "GraphicData".to_string(),
            Value::Array(data.into_iter().map(Value::from).collect()),
        );
    }

    insert_sequence(
        &mut fields,
        "MeasuredValueSequence",
        get_sequence_items(item, MEASURED_VALUE_SEQUENCE),
        |measured| {
            let mut value = Map::new();
            if let Some(number) = get_float_value(measured, NUMERIC_VALUE) {
                value.insert("NumericValue".to_string(), Value::from(number));
            }
            insert_sequence(
                &mut value,
                "MeasurementUnitsCodeSequence",
                get_sequence_items(measured, MEASUREMENT_UNITS_CODE_SEQUENCE),
                code_to_json,
            );
            Value::Object(value)
        },
    );

    insert_sequence(
        &mut fields,
        "ReferencedSOPSequence",
        get_sequence_items(item, REFERENCED_SOP_SEQUENCE),
        |reference| {
            let mut value = Map::new();
            insert_text(
                &mut value,
                "ReferencedSOPClassUID",
                get_string_value(reference, REFERENCED_SOP_CLASS_UID),
            );
            insert_text(
                &mut value,
                "ReferencedSOPInstanceUID",
                get_string_value(reference, REFERENCED_SOP_INSTANCE_UID),
            );
            if let Some(frame) = get_int_value(reference, REFERENCED_FRAME_NUMBER) {
                value.insert("ReferencedFrameNumber".to_string(), Value::from(frame));
            }
            Value::Object(value)
        },
    );

    insert_text(
        &mut fields,
        "ReferencedFrameOfReferenceUID",
        get_string_value(item, REFERENCED_FRAME_OF_REFERENCE_UID),
    );
    insert_sequence(
        &mut fields,
        "ContentSequence",
        get_sequence_items(item, CONTENT_SEQUENCE),
        content_item_to_json,
    );

    Value::Object(fields)
}

/// Identity of one image Part 10 file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInstance {
    pub path: PathBuf,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
    pub frame_of_reference_uid: Option<String>,
    pub number_of_frames: u32,
}

impl ImageInstance {
    pub fn from_file(path: PathBuf) -> Result<Self> {
        let dcm = open_file(&path)?;
        Self::from_dicom(path, &dcm)
    }

    pub fn from_dicom(path: PathBuf, dcm: &InMemDicomObject) -> Result<Self> {
        Ok(Self {
            study_instance_uid: required_string(dcm, STUDY_INSTANCE_UID, "StudyInstanceUID")?,
            series_instance_uid: required_string(dcm, SERIES_INSTANCE_UID, "SeriesInstanceUID")?,
            sop_instance_uid: required_string(dcm, SOP_INSTANCE_UID, "SOPInstanceUID")?,
            frame_of_reference_uid: get_string_value(dcm, FRAME_OF_REFERENCE_UID)
                .filter(|uid| !uid.is_empty()),
            number_of_frames: get_int_value(dcm, NUMBER_OF_FRAMES)
                .filter(|frames| *frames > 0)
                .map(|frames| frames as u32)
                .unwrap_or(1),
            path,
        })
    }

    /// WADO-URI style image ids, one per frame
    pub fn image_ids(&self) -> Vec<String> {
        (1..=self.number_of_frames)
            .map(|frame| {
                format!(
                    "wadouri:file://{}?objectUID={}&frame={}",
                    self.path.display(),
                    self.sop_instance_uid,
                    frame
                )
            })
            .collect()
    }
}

/// Groups image instances into one display set per series
///
/// The frame of reference of the first instance that has one is used for the
/// whole series.
pub fn image_display_sets(instances: &[ImageInstance]) -> Vec<ImageDisplaySet> {
    let mut by_series: BTreeMap<&str, Vec<&ImageInstance>> = BTreeMap::new();
    for instance in instances {
        by_series
            .entry(instance.series_instance_uid.as_str())
            .or_default()
            .push(instance);
    }

    by_series
        .into_iter()
        .map(|(series_instance_uid, members)| {
            let first = members[0];
            let mut display_set = ImageDisplaySet::new(series_instance_uid)
                .with_series(&first.study_instance_uid, series_instance_uid)
                .with_image_ids(members.iter().flat_map(|m| m.image_ids()).collect());
            if let Some(uid) = members.iter().find_map(|m| m.frame_of_reference_uid.as_deref()) {
                display_set = display_set.with_frame_of_reference(uid);
            }
            display_set
        })
        .collect()
}

/// Reads every image file of a directory into display sets
///
/// Files that cannot be read are skipped with a warning.
pub fn read_image_display_sets(directory: &Path) -> Result<Vec<ImageDisplaySet>> {
    let mut instances = Vec::new();
    for path in collect_dicom_files(directory)? {
        match ImageInstance::from_file(path.clone()) {
            Ok(instance) => instances.push(instance),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    info!("Read {} image instances from {}", instances.len(), directory.display());
    Ok(image_display_sets(&instances))
}

/// Lists the DICOM files of a directory
///
/// Accepts `.dcm`/`.dicom` extensions and extensionless files that carry
/// the Part 10 header.
pub fn collect_dicom_files(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let accepted = match path.extension() {
            Some(ext) => ext.eq_ignore_ascii_case("dcm") || ext.eq_ignore_ascii_case("dicom"),
            None => is_dicom_file(&path),
        };
        if accepted {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Checks for the 128-byte preamble followed by the "DICM" magic
pub fn is_dicom_file(path: &Path) -> bool {
    use std::fs::File;
    use std::io::Read;

    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut buffer = [0u8; 132];
    match file.read_exact(&mut buffer) {
        Ok(()) => &buffer[128..132] == b"DICM",
        Err(_) => false,
    }
}
