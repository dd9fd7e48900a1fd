pub mod api;
pub mod binding;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod rehydration;
pub mod types;

pub use api::{
    reset_hydration, SopClassHandlerId, SrDisplaySet, SrDisplaySetSummary, SrServices,
    SrSopClassHandler,
};
pub use binding::{
    build_annotation, AnnotationStore, DisplaySetService, ImageIdSource, InMemoryAnnotationStore,
    MeasurementBinder, MeasurementCustomization, Subscription, WadoImageIdResolver,
};
pub use cli::report::TextReport;
pub use config::SrConfig;
pub use error::{Result, SrcatError};
pub use extraction::{
    extract_measurements, extract_referenced_images, normalize_content_sequence,
    read_image_display_sets, read_sr_document, resolve_bulk_data, BulkDataRetriever,
    FileBulkDataRetriever,
};
pub use rehydration::{is_rehydratable, ToolAdapterRegistry, ToolMapping, ToolMappingRegistry};
pub use types::*;
