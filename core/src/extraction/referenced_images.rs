use crate::extraction::codes::{IMAGE_LIBRARY, IMAGE_LIBRARY_GROUP};
use crate::types::{ContentItem, ReferencedImage};

/// Lists the images a report depends on
///
/// Walks Image Library → Image Library Group and emits one entry per
/// referenced SOP that names a SOP class. A report without an Image Library
/// yields an empty list.
pub fn extract_referenced_images(report: &[ContentItem]) -> Vec<ReferencedImage> {
    let Some(library_group) = report
        .iter()
        .find(|item| item.has_concept_value(IMAGE_LIBRARY))
        .and_then(|library| {
            library
                .content_sequence
                .iter()
                .find(|item| item.has_concept_value(IMAGE_LIBRARY_GROUP))
        })
    else {
        return Vec::new();
    };

    library_group
        .content_sequence
        .iter()
        .flat_map(|item| item.referenced_sop_sequence.iter())
        .filter_map(|reference| {
            Some(ReferencedImage {
                referenced_sop_class_uid: reference.referenced_sop_class_uid.clone()?,
                referenced_sop_instance_uid: reference.referenced_sop_instance_uid.clone(),
            })
        })
        .collect()
}
