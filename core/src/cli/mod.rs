pub mod report;

use crate::rehydration::ToolAdapterRegistry;
use crate::types::SrDocument;
use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Command-line arguments for srcat
#[derive(Parser, Debug)]
#[command(name = "srcat")]
#[command(about = "DICOM SR measurement extraction tool")]
#[command(version)]
pub struct Cli {
    /// SR instances (.dcm/.dicom Part 10 or .json naturalized DICOM JSON)
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,

    /// Directory of image DICOM files announced as display sets after loading
    #[arg(long, value_name = "DIR")]
    pub images: Option<PathBuf>,

    /// Base directory for relative BulkDataURIs
    #[arg(long, value_name = "DIR")]
    pub bulk_data_root: Option<PathBuf>,

    /// Comma-separated annotation tools registered for the rehydration check
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub tools: Option<Vec<String>>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Registered tools, every known tool when `--tools` is not given
    pub fn tool_names(&self) -> Vec<String> {
        match &self.tools {
            Some(tools) => tools
                .iter()
                .map(|tool| tool.trim().to_string())
                .filter(|tool| !tool.is_empty())
                .collect(),
            None => ToolAdapterRegistry::default()
                .tool_types()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Bulk data root, defaulting to the directory of the first SR file
    pub fn bulk_data_root(&self) -> PathBuf {
        self.bulk_data_root.clone().unwrap_or_else(|| {
            self.files
                .first()
                .and_then(|file| file.parent())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}

/// Output format options
#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON format
    Json,
}

/// Groups SR instances by SeriesInstanceUID, keeping file order within a series
pub fn group_by_series(documents: Vec<SrDocument>) -> BTreeMap<String, Vec<SrDocument>> {
    let mut series: BTreeMap<String, Vec<SrDocument>> = BTreeMap::new();
    for document in documents {
        series
            .entry(document.series_instance_uid.clone())
            .or_default()
            .push(document);
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(series: &str, sop: &str) -> SrDocument {
        serde_json::from_value(json!({
            "StudyInstanceUID": "1.2",
            "SeriesInstanceUID": series,
            "SOPInstanceUID": sop,
            "SOPClassUID": "1.2.840.10008.5.1.4.1.1.88.33"
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::parse_from([
            "srcat",
            "a.dcm",
            "b.json",
            "--images",
            "/data/ct",
            "--tools",
            "Length, Probe",
            "--format",
            "json",
            "-v",
        ]);

        assert_eq!(cli.files.len(), 2);
        assert_eq!(cli.images, Some(PathBuf::from("/data/ct")));
        assert_eq!(cli.tool_names(), vec!["Length", "Probe"]);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert!(cli.verbose);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["srcat", "/reports/sr.json"]);

        assert!(cli.tool_names().contains(&"ArrowAnnotate".to_string()));
        assert_eq!(cli.bulk_data_root(), PathBuf::from("/reports"));
        assert!(matches!(cli.format, OutputFormat::Text));
    }

    #[test]
    fn test_files_are_required() {
        assert!(Cli::try_parse_from(["srcat"]).is_err());
    }

    #[test]
    fn test_group_by_series() {
        let groups = group_by_series(vec![
            document("1.2.2", "a"),
            document("1.2.1", "b"),
            document("1.2.2", "c"),
        ]);

        assert_eq!(groups.len(), 2);
        let sops: Vec<_> = groups["1.2.2"].iter().map(|d| d.sop_instance_uid.as_str()).collect();
        assert_eq!(sops, vec!["a", "c"]);
    }
}
