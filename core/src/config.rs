//! Runtime configuration for SR loading and binding

/// Source name under which annotation tool mappings are registered
pub const DEFAULT_TOOL_SOURCE_NAME: &str = "Cornerstone3DTools";

/// Source version under which annotation tool mappings are registered
pub const DEFAULT_TOOL_SOURCE_VERSION: &str = "0.1";

/// Tracking identifier used when a report names neither a tracking
/// identifier nor a concept for the measurement
pub const DEFAULT_TRACKING_IDENTIFIER: &str = "SR Measurement";

/// Configuration for SR display sets
///
/// # Example
///
/// ```
/// use srcat_core::SrConfig;
///
/// let config = SrConfig::default()
///     .with_tool_source("MyTools", "2.0")
///     .with_subscription(false);
///
/// assert_eq!(config.tool_source_name, "MyTools");
/// assert!(!config.subscribe_to_new_display_sets);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SrConfig {
    /// Tool-mapping registry key used by the rehydration check
    pub tool_source_name: String,
    pub tool_source_version: String,

    /// Offset of the synthesized second handle of a 3D point annotation
    pub point_handle_offset: [f64; 3],

    /// Whether `load()` keeps listening for display sets added later
    pub subscribe_to_new_display_sets: bool,

    pub default_tracking_identifier: String,
}

impl Default for SrConfig {
    fn default() -> Self {
        Self {
            tool_source_name: DEFAULT_TOOL_SOURCE_NAME.to_string(),
            tool_source_version: DEFAULT_TOOL_SOURCE_VERSION.to_string(),
            point_handle_offset: [10.0, 0.0, 10.0],
            subscribe_to_new_display_sets: true,
            default_tracking_identifier: DEFAULT_TRACKING_IDENTIFIER.to_string(),
        }
    }
}

impl SrConfig {
    pub fn with_tool_source(mut self, name: &str, version: &str) -> Self {
        self.tool_source_name = name.to_string();
        self.tool_source_version = version.to_string();
        self
    }

    pub fn with_point_handle_offset(mut self, offset: [f64; 3]) -> Self {
        self.point_handle_offset = offset;
        self
    }

    pub fn with_subscription(mut self, subscribe: bool) -> Self {
        self.subscribe_to_new_display_sets = subscribe;
        self
    }

    pub fn with_default_tracking_identifier(mut self, identifier: &str) -> Self {
        self.default_tracking_identifier = identifier.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SrConfig::default();
        assert_eq!(config.tool_source_name, "Cornerstone3DTools");
        assert_eq!(config.tool_source_version, "0.1");
        assert_eq!(config.point_handle_offset, [10.0, 0.0, 10.0]);
        assert!(config.subscribe_to_new_display_sets);
        assert_eq!(config.default_tracking_identifier, "SR Measurement");
    }

    #[test]
    fn test_builders() {
        let config = SrConfig::default()
            .with_point_handle_offset([1.0, 2.0, 3.0])
            .with_default_tracking_identifier("Finding");
        assert_eq!(config.point_handle_offset, [1.0, 2.0, 3.0]);
        assert_eq!(config.default_tracking_identifier, "Finding");
    }
}
