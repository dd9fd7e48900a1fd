//! Binding of SR measurements to image display sets
//!
//! - [`DisplaySetService`]: the live set of image display sets and its
//!   "display sets added" notifications
//! - [`ImageIdSource`]: how image ids of a display set are found and parsed
//! - [`MeasurementBinder`]: matches measurements to images and emits annotations
//! - [`AnnotationBuilder`] / [`AnnotationStore`]: the renderable output

pub mod annotation;
pub mod binder;
pub mod display_sets;
pub mod image_ids;

pub use annotation::{
    build_annotation, AnnotationBuilder, AnnotationStore, InMemoryAnnotationStore,
    DICOM_SR_DISPLAY_TOOL, SR_SCOORD3D_POINT_TOOL,
};
pub use binder::{BindingSource, BoxError, MeasurementBinder, MeasurementCustomization};
pub use display_sets::{DisplaySetService, Subscription};
pub use image_ids::{image_key, parse_image_id, ImageIdSource, ImageUids, WadoImageIdResolver};

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// Poisoned locks are recovered, guarded data is never left half-written.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
