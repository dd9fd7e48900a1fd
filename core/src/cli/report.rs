use crate::api::SrDisplaySetSummary;
use std::fmt;

/// Text report formatter for a loaded SR display set
pub struct TextReport<'a> {
    summary: &'a SrDisplaySetSummary,
}

impl<'a> TextReport<'a> {
    /// Creates a new text report
    pub fn new(summary: &'a SrDisplaySetSummary) -> Self {
        Self { summary }
    }
}

impl<'a> fmt::Display for TextReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary;
        writeln!(f, "SR Display Set: {}", summary.label)?;
        writeln!(f, "==============")?;
        writeln!(f)?;
        writeln!(f, "Handler:        {}", summary.sop_class_handler_id)?;
        writeln!(f, "Series:         {}", summary.series_instance_uid)?;
        writeln!(f, "Active SOP:     {}", summary.sop_instance_uid)?;
        writeln!(f, "Instances:      {}", summary.instance_count)?;
        writeln!(f, "Measurement Report: {}", summary.is_imaging_measurement_report)?;
        writeln!(f, "Loaded:         {}", summary.is_loaded)?;
        writeln!(f, "Rehydratable:   {}", summary.is_rehydratable)?;
        writeln!(f)?;

        writeln!(f, "Referenced Images ({})", summary.referenced_images.len())?;
        writeln!(f, "-----------------")?;
        for image in &summary.referenced_images {
            writeln!(
                f,
                "  {} ({})",
                image.referenced_sop_instance_uid.as_deref().unwrap_or("unknown"),
                image.referenced_sop_class_uid
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Measurements ({})", summary.measurements.len())?;
        writeln!(f, "------------")?;
        for measurement in &summary.measurements {
            write!(f, "  {}", measurement.tracking_identifier)?;
            if let Some(graphic_type) = measurement.graphic_type {
                write!(f, " [{} x{}]", graphic_type, measurement.points_length)?;
            }
            writeln!(f)?;
            writeln!(f, "    UID:   {}", measurement.tracking_unique_identifier)?;
            match (&measurement.image_id, &measurement.display_set_instance_uid) {
                (Some(image_id), _) => writeln!(f, "    Bound: {}", image_id)?,
                (None, Some(display_set)) => writeln!(f, "    Bound: display set {}", display_set)?,
                (None, None) => writeln!(f, "    Bound: no")?,
            }
            for label in &measurement.labels {
                writeln!(f, "    {}", label)?;
            }
        }

        Ok(())
    }
}
