use crate::binding::{read, write};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// A registered mapping from an annotation tool to the measurement store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMapping {
    pub annotation_type: String,
}

impl ToolMapping {
    pub fn new(annotation_type: &str) -> Self {
        Self {
            annotation_type: annotation_type.to_string(),
        }
    }
}

/// Tool mappings registered per measurement source `(name, version)`
#[derive(Debug, Default)]
pub struct ToolMappingRegistry {
    sources: RwLock<HashMap<(String, String), Vec<ToolMapping>>>,
}

impl ToolMappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with one source mapping the given annotation types
    pub fn with_tools(source_name: &str, source_version: &str, annotation_types: &[&str]) -> Self {
        let registry = Self::new();
        for annotation_type in annotation_types {
            registry.register(source_name, source_version, ToolMapping::new(annotation_type));
        }
        registry
    }

    /// Adds a mapping to a source, creating the source on first use
    pub fn register(&self, source_name: &str, source_version: &str, mapping: ToolMapping) {
        let mut sources = write(&self.sources);
        let mappings = sources
            .entry((source_name.to_string(), source_version.to_string()))
            .or_default();
        if !mappings.contains(&mapping) {
            mappings.push(mapping);
        }
    }

    /// Mappings of a source, empty for unknown sources
    pub fn source_mappings(&self, source_name: &str, source_version: &str) -> Vec<ToolMapping> {
        read(&self.sources)
            .get(&(source_name.to_string(), source_version.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = ToolMappingRegistry::new();
        registry.register("Cornerstone3DTools", "0.1", ToolMapping::new("Length"));
        registry.register("Cornerstone3DTools", "0.1", ToolMapping::new("Length"));
        registry.register("Cornerstone3DTools", "0.1", ToolMapping::new("Probe"));

        let mappings = registry.source_mappings("Cornerstone3DTools", "0.1");
        assert_eq!(mappings, vec![ToolMapping::new("Length"), ToolMapping::new("Probe")]);
        assert!(registry.source_mappings("Cornerstone3DTools", "0.2").is_empty());
    }

    #[test]
    fn test_with_tools() {
        let registry = ToolMappingRegistry::with_tools("Source", "1", &["Angle", "CobbAngle"]);
        assert_eq!(registry.source_mappings("Source", "1").len(), 2);
    }
}
