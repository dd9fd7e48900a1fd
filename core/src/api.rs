use crate::binding::{
    lock, AnnotationBuilder, AnnotationStore, BindingSource, DisplaySetService, ImageIdSource,
    InMemoryAnnotationStore, MeasurementBinder, MeasurementCustomization, Subscription,
    WadoImageIdResolver,
};
use crate::config::SrConfig;
use crate::error::{Result, SrcatError};
use crate::extraction::codes::{
    BASIC_TEXT_SR_STORAGE, COMPREHENSIVE_3D_SR_STORAGE, COMPREHENSIVE_SR_STORAGE,
    ENHANCED_SR_STORAGE,
};
use crate::extraction::{
    extract_measurements_with, extract_referenced_images, normalize_content_sequence,
    resolve_bulk_data, BulkDataRetriever, InstanceUids,
};
use crate::rehydration::{is_rehydratable, ToolAdapterRegistry, ToolMappingRegistry};
use crate::types::{
    sort_study_instances, ImageDisplaySet, Measurement, ReferencedImage, SrDocument,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

/// SOP classes read as 2D structured reports
pub const SR_SOP_CLASS_UIDS: [&str; 3] = [
    BASIC_TEXT_SR_STORAGE,
    ENHANCED_SR_STORAGE,
    COMPREHENSIVE_SR_STORAGE,
];

/// SOP classes read as 3D structured reports
pub const SR_3D_SOP_CLASS_UIDS: [&str; 1] = [COMPREHENSIVE_3D_SR_STORAGE];

/// Identity of the handler that produced a display set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SopClassHandlerId {
    #[serde(rename = "dicom-sr")]
    Sr,
    #[serde(rename = "dicom-sr-3d")]
    Sr3d,
}

impl SopClassHandlerId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SopClassHandlerId::Sr => "dicom-sr",
            SopClassHandlerId::Sr3d => "dicom-sr-3d",
        }
    }

    /// SOP classes served by this handler
    pub fn sop_class_uids(&self) -> &'static [&'static str] {
        match self {
            SopClassHandlerId::Sr => &SR_SOP_CLASS_UIDS,
            SopClassHandlerId::Sr3d => &SR_3D_SOP_CLASS_UIDS,
        }
    }

    /// Handler serving a SOP class, `None` for non-SR classes
    pub fn for_sop_class(sop_class_uid: &str) -> Option<Self> {
        [SopClassHandlerId::Sr, SopClassHandlerId::Sr3d]
            .into_iter()
            .find(|id| id.sop_class_uids().contains(&sop_class_uid))
    }
}

impl fmt::Display for SopClassHandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Collaborators shared by every SR display set
///
/// # Example
///
/// ```
/// use srcat_core::{FileBulkDataRetriever, SrConfig, SrServices};
/// use std::sync::Arc;
///
/// let services = SrServices::new(Arc::new(FileBulkDataRetriever::new("/data")))
///     .with_config(SrConfig::default().with_subscription(false));
///
/// assert!(!services.config.subscribe_to_new_display_sets);
/// ```
#[derive(Clone)]
pub struct SrServices {
    pub bulk_data: Arc<dyn BulkDataRetriever>,
    pub image_ids: Arc<dyn ImageIdSource>,
    pub display_sets: DisplaySetService,
    pub tool_mappings: Arc<ToolMappingRegistry>,
    pub tool_adapters: Arc<ToolAdapterRegistry>,
    pub annotations: Arc<dyn AnnotationStore>,
    pub customization: Option<Arc<dyn MeasurementCustomization>>,
    pub config: SrConfig,
}

impl SrServices {
    /// Services with WADO image ids, in-memory annotations and no tool mappings
    pub fn new(bulk_data: Arc<dyn BulkDataRetriever>) -> Self {
        Self {
            bulk_data,
            image_ids: Arc::new(WadoImageIdResolver),
            display_sets: DisplaySetService::new(),
            tool_mappings: Arc::new(ToolMappingRegistry::new()),
            tool_adapters: Arc::new(ToolAdapterRegistry::default()),
            annotations: Arc::new(InMemoryAnnotationStore::new()),
            customization: None,
            config: SrConfig::default(),
        }
    }

    pub fn with_image_ids(mut self, image_ids: Arc<dyn ImageIdSource>) -> Self {
        self.image_ids = image_ids;
        self
    }

    pub fn with_display_sets(mut self, display_sets: DisplaySetService) -> Self {
        self.display_sets = display_sets;
        self
    }

    pub fn with_tool_mappings(mut self, tool_mappings: Arc<ToolMappingRegistry>) -> Self {
        self.tool_mappings = tool_mappings;
        self
    }

    pub fn with_tool_adapters(mut self, tool_adapters: Arc<ToolAdapterRegistry>) -> Self {
        self.tool_adapters = tool_adapters;
        self
    }

    pub fn with_annotation_store(mut self, annotations: Arc<dyn AnnotationStore>) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_customization(mut self, customization: Arc<dyn MeasurementCustomization>) -> Self {
        self.customization = Some(customization);
        self
    }

    pub fn with_config(mut self, config: SrConfig) -> Self {
        self.config = config;
        self
    }

    fn binder(&self) -> MeasurementBinder {
        let binder = MeasurementBinder::new(
            Arc::clone(&self.image_ids),
            Arc::clone(&self.annotations),
            AnnotationBuilder::new(&self.config),
        );
        match &self.customization {
            Some(customization) => binder.with_customization(Arc::clone(customization)),
            None => binder,
        }
    }
}

impl fmt::Debug for SrServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrServices")
            .field("display_sets", &self.display_sets)
            .field("tool_adapters", &self.tool_adapters.tool_types())
            .field("customization", &self.customization.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// Display-set factory for structured reports
#[derive(Debug, Clone)]
pub struct SrSopClassHandler {
    id: SopClassHandlerId,
    services: Arc<SrServices>,
}

impl SrSopClassHandler {
    pub fn new(id: SopClassHandlerId, services: Arc<SrServices>) -> Self {
        Self { id, services }
    }

    pub fn id(&self) -> SopClassHandlerId {
        self.id
    }

    pub fn sop_class_uids(&self) -> &'static [&'static str] {
        self.id.sop_class_uids()
    }

    /// Display sets for one series worth of SR instances
    ///
    /// # Errors
    ///
    /// Same as [`SrSopClassHandler::create_display_set`]
    pub fn display_sets_from_series(&self, instances: Vec<SrDocument>) -> Result<Vec<SrDisplaySet>> {
        Ok(vec![self.create_display_set(instances)?])
    }

    /// Creates the display set of a series
    ///
    /// Instances are sorted by creation order and the last one becomes the
    /// active instance. Nothing is read from the content tree until
    /// [`SrDisplaySet::load`] runs.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `instances` is empty
    /// - An instance belongs to another study than the active one
    pub fn create_display_set(&self, mut instances: Vec<SrDocument>) -> Result<SrDisplaySet> {
        if instances.is_empty() {
            return Err(SrcatError::NoInstances);
        }
        sort_study_instances(&mut instances);

        let active = instances.len() - 1;
        let study_instance_uid = instances[active].study_instance_uid.clone();
        validate_same_study(&study_instance_uid, &instances)?;

        let active = &instances[active];
        let handler_id = handler_id_of(active);
        let label = label_of(active);

        let display_set = SrDisplaySet {
            display_set_instance_uid: uuid::Uuid::new_v4().to_string(),
            handler_id,
            modality: "SR".to_string(),
            study_instance_uid,
            series_instance_uid: active.series_instance_uid.clone(),
            sop_instance_uid: active.sop_instance_uid.clone(),
            sop_class_uid: active.sop_class_uid.clone(),
            series_description: active.series_description.clone(),
            series_number: active.series_number,
            series_date: active.series_date.clone(),
            series_time: active.series_time.clone(),
            label,
            is_derived_display_set: true,
            is_imaging_measurement_report: active.is_imaging_measurement_report(),
            instances,
            referenced_images: Vec::new(),
            measurements: Arc::new(SharedMeasurements::default()),
            is_loaded: false,
            is_hydrated: false,
            is_rehydratable: false,
            subscription: None,
            binder: Arc::new(self.services.binder()),
            services: Arc::clone(&self.services),
        };
        debug!(
            "Created {} display set {} for series {} ({} instances)",
            display_set.handler_id,
            display_set.display_set_instance_uid,
            display_set.series_instance_uid,
            display_set.instances.len()
        );
        Ok(display_set)
    }
}

fn handler_id_of(instance: &SrDocument) -> SopClassHandlerId {
    SopClassHandlerId::for_sop_class(&instance.sop_class_uid).unwrap_or(if instance.is_3d() {
        SopClassHandlerId::Sr3d
    } else {
        SopClassHandlerId::Sr
    })
}

fn label_of(instance: &SrDocument) -> String {
    instance.series_description.clone().unwrap_or_else(|| {
        format!(
            "Series {} - SR",
            instance.series_number.map(|n| n.to_string()).unwrap_or_default()
        )
    })
}

fn validate_same_study(study_instance_uid: &str, instances: &[SrDocument]) -> Result<()> {
    match instances
        .iter()
        .find(|instance| instance.study_instance_uid != study_instance_uid)
    {
        Some(instance) => {
            warn!(
                "Not all instances share study {}: {}",
                study_instance_uid, instance.sop_instance_uid
            );
            Err(SrcatError::StudyMismatch {
                sop_instance_uid: instance.sop_instance_uid.clone(),
                study_instance_uid: study_instance_uid.to_string(),
            })
        }
        None => Ok(()),
    }
}

/// Measurements shared between a display set and its listener
///
/// Binding runs on a copy with the list unlocked, so a customization hook may
/// read the measurements. Binds are serialized so a stale copy never
/// overwrites a newer one.
#[derive(Default)]
struct SharedMeasurements {
    items: Mutex<Vec<Measurement>>,
    binding: Mutex<()>,
}

impl SharedMeasurements {
    fn snapshot(&self) -> Vec<Measurement> {
        lock(&self.items).clone()
    }

    fn len(&self) -> usize {
        lock(&self.items).len()
    }

    fn replace(&self, measurements: Vec<Measurement>) {
        let _binding = lock(&self.binding);
        *lock(&self.items) = measurements;
    }

    fn bind(
        &self,
        binder: &MeasurementBinder,
        source: &BindingSource,
        display_sets: &[ImageDisplaySet],
    ) -> usize {
        let _binding = lock(&self.binding);
        let mut measurements = self.snapshot();
        let bound = binder.bind_to_display_sets(&mut measurements, source, display_sets);
        *lock(&self.items) = measurements;
        bound
    }
}

/// One SR series with the measurements of its active instance
///
/// The derived state (`measurements`, `referenced_images`, the loaded and
/// rehydration flags) is only meaningful after [`SrDisplaySet::load`].
pub struct SrDisplaySet {
    pub display_set_instance_uid: String,
    pub handler_id: SopClassHandlerId,
    pub modality: String,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    /// Active instance
    pub sop_instance_uid: String,
    pub sop_class_uid: String,
    pub series_description: Option<String>,
    pub series_number: Option<i64>,
    pub series_date: Option<String>,
    pub series_time: Option<String>,
    pub label: String,
    pub is_derived_display_set: bool,
    pub is_imaging_measurement_report: bool,
    instances: Vec<SrDocument>,
    referenced_images: Vec<ReferencedImage>,
    measurements: Arc<SharedMeasurements>,
    is_loaded: bool,
    is_hydrated: bool,
    is_rehydratable: bool,
    subscription: Option<Subscription>,
    binder: Arc<MeasurementBinder>,
    services: Arc<SrServices>,
}

impl SrDisplaySet {
    /// The most recently created instance
    pub fn instance(&self) -> &SrDocument {
        // Never empty: enforced by the handler and by add_instances
        &self.instances[self.instances.len() - 1]
    }

    pub fn instances(&self) -> &[SrDocument] {
        &self.instances
    }

    /// Snapshot of the measurements, including their current binding state
    pub fn measurements(&self) -> Vec<Measurement> {
        self.measurements.snapshot()
    }

    pub fn referenced_images(&self) -> &[ReferencedImage] {
        &self.referenced_images
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn is_hydrated(&self) -> bool {
        self.is_hydrated
    }

    pub fn set_hydrated(&mut self, hydrated: bool) {
        self.is_hydrated = hydrated;
    }

    pub fn is_rehydratable(&self) -> bool {
        self.is_rehydratable
    }

    pub fn is_3d(&self) -> bool {
        self.handler_id == SopClassHandlerId::Sr3d
    }

    /// Whether a standing subscription for new display sets is registered
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Appends newly discovered instances of the same series
    ///
    /// The active instance is re-selected, along with the handler id and label
    /// it implies, and the display set must be loaded again before its derived
    /// state is used.
    ///
    /// # Errors
    ///
    /// Returns [`SrcatError::StudyMismatch`] if a new instance belongs to
    /// another study; the display set is left unchanged in that case.
    pub fn add_instances(&mut self, instances: Vec<SrDocument>) -> Result<()> {
        validate_same_study(&self.study_instance_uid, &instances)?;
        if instances.is_empty() {
            return Ok(());
        }

        self.instances.extend(instances);
        sort_study_instances(&mut self.instances);

        let active = self.instance();
        let handler_id = handler_id_of(active);
        let label = label_of(active);
        let (sop_instance_uid, sop_class_uid, is_imaging_measurement_report) = (
            active.sop_instance_uid.clone(),
            active.sop_class_uid.clone(),
            active.is_imaging_measurement_report(),
        );
        let (series_description, series_number, series_date, series_time) = (
            active.series_description.clone(),
            active.series_number,
            active.series_date.clone(),
            active.series_time.clone(),
        );
        self.handler_id = handler_id;
        self.label = label;
        self.sop_instance_uid = sop_instance_uid;
        self.sop_class_uid = sop_class_uid;
        self.series_description = series_description;
        self.series_number = series_number;
        self.series_date = series_date;
        self.series_time = series_time;
        self.is_imaging_measurement_report = is_imaging_measurement_report;
        self.is_loaded = false;
        debug!(
            "Display set {} now has {} instances, active {}",
            self.display_set_instance_uid,
            self.instances.len(),
            self.sop_instance_uid
        );
        Ok(())
    }

    /// Loads the active instance and binds its measurements
    ///
    /// Bulk data is fetched only on the first successful load after creation
    /// or [`SrDisplaySet::add_instances`]. Measurements and referenced images
    /// are always re-derived from the resolved tree, then bound against every
    /// active image display set. Unless disabled in [`SrConfig`], a listener
    /// keeps binding against display sets added later until
    /// [`SrDisplaySet::unsubscribe`] is called or the display set is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SrcatError::BulkData`] when a bulk data reference cannot be
    /// retrieved. The display set then stays unloaded with no measurements
    /// and no referenced images.
    pub async fn load(&mut self) -> Result<()> {
        self.subscription = None;

        if !self.is_loaded {
            if let Err(e) = self.resolve_active_instance().await {
                self.referenced_images.clear();
                self.measurements.replace(Vec::new());
                self.is_rehydratable = false;
                return Err(e);
            }
        }

        let config = &self.services.config;
        let content = normalize_content_sequence(&self.instance().content_sequence);
        let (referenced_images, measurements) = if self.is_imaging_measurement_report {
            (
                extract_referenced_images(&content),
                extract_measurements_with(&content, config),
            )
        } else {
            (Vec::new(), Vec::new())
        };

        let mappings = self
            .services
            .tool_mappings
            .source_mappings(&config.tool_source_name, &config.tool_source_version);
        self.is_hydrated = false;
        self.is_rehydratable = is_rehydratable(&measurements, &mappings, &self.services.tool_adapters);
        self.referenced_images = referenced_images;
        self.measurements.replace(measurements);
        self.is_loaded = true;

        let source = self.binding_source();
        let active_display_sets = self.services.display_sets.active_display_sets();
        let bound = self
            .measurements
            .bind(&self.binder, &source, &active_display_sets);

        info!(
            "Loaded SR {}: {} measurements ({} bound), {} referenced images, rehydratable: {}",
            self.sop_instance_uid,
            self.measurements.len(),
            bound,
            self.referenced_images.len(),
            self.is_rehydratable
        );

        if config.subscribe_to_new_display_sets {
            let binder = Arc::clone(&self.binder);
            let measurements = Arc::clone(&self.measurements);
            self.subscription = Some(self.services.display_sets.subscribe_display_sets_added(
                move |added| {
                    measurements.bind(&binder, &source, added);
                },
            ));
        }

        Ok(())
    }

    /// Stops binding against display sets added from now on
    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    /// Serializable view of the display set
    pub fn summary(&self) -> SrDisplaySetSummary {
        SrDisplaySetSummary {
            display_set_instance_uid: self.display_set_instance_uid.clone(),
            sop_class_handler_id: self.handler_id,
            modality: self.modality.clone(),
            study_instance_uid: self.study_instance_uid.clone(),
            series_instance_uid: self.series_instance_uid.clone(),
            sop_instance_uid: self.sop_instance_uid.clone(),
            sop_class_uid: self.sop_class_uid.clone(),
            label: self.label.clone(),
            instance_count: self.instances.len(),
            is_derived_display_set: self.is_derived_display_set,
            is_imaging_measurement_report: self.is_imaging_measurement_report,
            is_loaded: self.is_loaded,
            is_hydrated: self.is_hydrated,
            is_rehydratable: self.is_rehydratable,
            referenced_images: self.referenced_images.clone(),
            measurements: self.measurements(),
        }
    }

    fn binding_source(&self) -> BindingSource {
        BindingSource {
            study_instance_uid: self.study_instance_uid.clone(),
            series_instance_uid: self.series_instance_uid.clone(),
            is_3d_report: self.instance().is_3d(),
        }
    }

    /// Replaces bulk data references of the active instance
    ///
    /// The tree is resolved on a copy, so a failure leaves the instance untouched.
    async fn resolve_active_instance(&mut self) -> Result<()> {
        let retriever = Arc::clone(&self.services.bulk_data);
        let index = self.instances.len() - 1;
        let instance = &mut self.instances[index];

        let uids = InstanceUids::of(instance);
        let mut tree = instance.content_sequence.clone();
        let resolved = resolve_bulk_data(&mut tree, retriever.as_ref(), &uids).await?;
        instance.content_sequence = tree;

        debug!(
            "Resolved {} bulk data references for {}",
            resolved, uids.sop_instance_uid
        );
        Ok(())
    }
}

impl fmt::Debug for SrDisplaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrDisplaySet")
            .field("display_set_instance_uid", &self.display_set_instance_uid)
            .field("handler_id", &self.handler_id)
            .field("series_instance_uid", &self.series_instance_uid)
            .field("sop_instance_uid", &self.sop_instance_uid)
            .field("instances", &self.instances.len())
            .field("is_loaded", &self.is_loaded)
            .field("is_hydrated", &self.is_hydrated)
            .field("is_rehydratable", &self.is_rehydratable)
            .field("subscribed", &self.subscription.is_some())
            .finish()
    }
}

/// Allows every SR display set to be hydrated again
pub fn reset_hydration(display_sets: &mut [SrDisplaySet]) {
    for display_set in display_sets {
        display_set.set_hydrated(false);
    }
}

/// Serializable snapshot of an [`SrDisplaySet`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SrDisplaySetSummary {
    #[serde(rename = "displaySetInstanceUID")]
    pub display_set_instance_uid: String,
    #[serde(rename = "SOPClassHandlerId")]
    pub sop_class_handler_id: SopClassHandlerId,
    #[serde(rename = "Modality")]
    pub modality: String,
    #[serde(rename = "StudyInstanceUID")]
    pub study_instance_uid: String,
    #[serde(rename = "SeriesInstanceUID")]
    pub series_instance_uid: String,
    #[serde(rename = "SOPInstanceUID")]
    pub sop_instance_uid: String,
    #[serde(rename = "SOPClassUID")]
    pub sop_class_uid: String,
    pub label: String,
    pub instance_count: usize,
    pub is_derived_display_set: bool,
    pub is_imaging_measurement_report: bool,
    pub is_loaded: bool,
    pub is_hydrated: bool,
    pub is_rehydratable: bool,
    pub referenced_images: Vec<ReferencedImage>,
    pub measurements: Vec<Measurement>,
}
