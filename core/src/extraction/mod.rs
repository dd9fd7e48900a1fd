pub mod bulk_data;
pub mod codes;
pub mod measurements;
pub mod normalize;
pub mod reader;
pub mod referenced_images;
pub mod tags;

pub use bulk_data::{
    resolve_bulk_data, BulkDataRequest, BulkDataRetriever, FileBulkDataRetriever, InstanceUids,
};
pub use measurements::{extract_measurements, extract_measurements_with, label_from_measured_value};
pub use normalize::normalize_content_sequence;
pub use reader::{read_image_display_sets, read_sr_document, sr_document_from_dicom, ImageInstance};
pub use referenced_images::extract_referenced_images;
