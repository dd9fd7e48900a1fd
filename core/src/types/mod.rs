//! Core type definitions for SR measurement extraction
//!
//! This module provides the data model shared by the pipeline:
//! - [`ContentItem`]: a node of the SR content tree, sequences always lists
//! - [`SrDocument`]: one SR instance with its raw content tree
//! - [`Measurement`], [`Coordinate`], [`Label`]: the normalized extraction output
//! - [`ReferencedImage`]: Image Library entries
//! - [`Annotation`]: the renderable form handed to the annotation store
//! - [`ImageDisplaySet`]: image series measurements get bound to

mod annotation;
mod content;
mod document;
mod image_display_set;
mod measurement;

pub use annotation::{Annotation, AnnotationData, AnnotationMetadata, Handles, Point};
pub use content::{Code, ContentItem, GraphicType, MeasuredValue, ReferencedSop, ValueType};
pub use document::{sort_study_instances, SrDocument};
pub use image_display_set::ImageDisplaySet;
pub use measurement::{Coordinate, Label, Measurement, MeasurementType, ReferencedImage};
