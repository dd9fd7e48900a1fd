use clap::Parser;
use log::{error, info, warn};
use srcat_core::cli::{group_by_series, Cli, OutputFormat};
use srcat_core::config::{DEFAULT_TOOL_SOURCE_NAME, DEFAULT_TOOL_SOURCE_VERSION};
use srcat_core::{
    read_image_display_sets, read_sr_document, FileBulkDataRetriever, Result, SopClassHandlerId,
    SrDisplaySet, SrDisplaySetSummary, SrServices, SrSopClassHandler, SrcatError, TextReport,
    ToolMappingRegistry,
};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut documents = Vec::new();
    for path in &cli.files {
        match read_sr_document(path) {
            Ok(document) => {
                info!("Read SR {} from {}", document.sop_instance_uid, path.display());
                documents.push(document);
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    if documents.is_empty() {
        return Err(SrcatError::from("No SR documents could be read"));
    }

    let tools = cli.tool_names();
    let tool_refs: Vec<&str> = tools.iter().map(String::as_str).collect();
    let mappings =
        ToolMappingRegistry::with_tools(DEFAULT_TOOL_SOURCE_NAME, DEFAULT_TOOL_SOURCE_VERSION, &tool_refs);
    let services = Arc::new(
        SrServices::new(Arc::new(FileBulkDataRetriever::new(cli.bulk_data_root())))
            .with_tool_mappings(Arc::new(mappings)),
    );

    let mut display_sets = create_display_sets(&services, documents);
    for display_set in &mut display_sets {
        if let Err(e) = display_set.load().await {
            warn!("Failed to load {}: {}", display_set.series_instance_uid, e);
        }
    }

    if let Some(directory) = &cli.images {
        let images = read_image_display_sets(directory)?;
        info!("Announcing {} image display sets", images.len());
        services.display_sets.add_display_sets(images);
    }

    let summaries: Vec<SrDisplaySetSummary> = display_sets.iter().map(SrDisplaySet::summary).collect();
    output_summaries(&summaries, cli.format)
}

fn create_display_sets(
    services: &Arc<SrServices>,
    documents: Vec<srcat_core::SrDocument>,
) -> Vec<SrDisplaySet> {
    let mut display_sets = Vec::new();
    for (series_instance_uid, instances) in group_by_series(documents) {
        let Some(handler_id) = instances
            .first()
            .and_then(|instance| SopClassHandlerId::for_sop_class(&instance.sop_class_uid))
        else {
            warn!("Skipping series {}: not a structured report", series_instance_uid);
            continue;
        };

        let handler = SrSopClassHandler::new(handler_id, Arc::clone(services));
        match handler.display_sets_from_series(instances) {
            Ok(created) => display_sets.extend(created),
            Err(e) => warn!("Skipping series {}: {}", series_instance_uid, e),
        }
    }
    display_sets
}

fn output_summaries(summaries: &[SrDisplaySetSummary], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for summary in summaries {
                println!("{}", TextReport::new(summary));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summaries)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use srcat_core::SrDocument;
    use std::fs;
    use tempfile::TempDir;

    fn document(series: &str, sop: &str, sop_class: &str) -> SrDocument {
        serde_json::from_value(json!({
            "StudyInstanceUID": "1.2",
            "SeriesInstanceUID": series,
            "SOPInstanceUID": sop,
            "SOPClassUID": sop_class
        }))
        .unwrap()
    }

    fn services() -> Arc<SrServices> {
        Arc::new(SrServices::new(Arc::new(FileBulkDataRetriever::new("."))))
    }

    #[test]
    fn test_create_display_sets_per_series() {
        let display_sets = create_display_sets(
            &services(),
            vec![
                document("1.2.1", "a", "1.2.840.10008.5.1.4.1.1.88.33"),
                document("1.2.1", "b", "1.2.840.10008.5.1.4.1.1.88.33"),
                document("1.2.2", "c", "1.2.840.10008.5.1.4.1.1.88.34"),
                document("1.2.3", "d", "1.2.840.10008.5.1.4.1.1.2"),
            ],
        );

        assert_eq!(display_sets.len(), 2);
        assert_eq!(display_sets[0].instances().len(), 2);
        assert_eq!(display_sets[1].handler_id, SopClassHandlerId::Sr3d);
    }

    #[tokio::test]
    async fn test_run_with_json_report_and_bulk_data() {
        let dir = TempDir::new().unwrap();
        let payload: Vec<u8> = [5.0f32, 6.0, 7.0, 8.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        fs::write(dir.path().join("graphic.bin"), payload).unwrap();

        let report = json!({
            "StudyInstanceUID": "1.2",
            "SeriesInstanceUID": "1.2.9",
            "SOPInstanceUID": "1.2.9.1",
            "SOPClassUID": "1.2.840.10008.5.1.4.1.1.88.33",
            "ConceptNameCodeSequence": {"CodeValue": "126000", "CodingSchemeDesignator": "DCM"},
            "ContentSequence": {
                "ValueType": "CONTAINER",
                "ConceptNameCodeSequence": {"CodeValue": "126010", "CodingSchemeDesignator": "DCM"},
                "ContentSequence": {
                    "ValueType": "CONTAINER",
                    "ConceptNameCodeSequence": {"CodeValue": "125007", "CodingSchemeDesignator": "DCM"},
                    "ContentSequence": [
                        {
                            "ValueType": "UIDREF",
                            "ConceptNameCodeSequence": {"CodeValue": "112040", "CodingSchemeDesignator": "DCM"},
                            "UID": "2.25.42"
                        },
                        {
                            "ValueType": "SCOORD",
                            "GraphicType": "POLYLINE",
                            "GraphicData": {"BulkDataURI": "graphic.bin"}
                        }
                    ]
                }
            }
        });
        let path = dir.path().join("sr.json");
        fs::write(&path, report.to_string()).unwrap();

        let cli = Cli::parse_from(["srcat", path.to_str().unwrap(), "--format", "json"]);
        run(cli).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_without_readable_files() {
        let cli = Cli::parse_from(["srcat", "/nonexistent/sr.json"]);
        assert!(run(cli).await.is_err());
    }
}
