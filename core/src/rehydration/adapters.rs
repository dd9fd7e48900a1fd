use crate::types::GraphicType;

/// Source prefix of tracking identifiers written by the annotation tools
pub const CORNERSTONE_3D_TAG: &str = "Cornerstone3DTools@^0.1.0";

/// Graphic shape a tool adapter can read back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicPattern {
    /// `designator:value` of the graphic item's concept, any when `None`
    pub graphic_code: Option<String>,
    pub graphic_type: GraphicType,
    /// Any point count when `None`
    pub points_length: Option<usize>,
}

impl GraphicPattern {
    pub fn new(graphic_type: GraphicType, points_length: Option<usize>) -> Self {
        Self {
            graphic_code: None,
            graphic_type,
            points_length,
        }
    }

    pub fn with_graphic_code(mut self, graphic_code: &str) -> Self {
        self.graphic_code = Some(graphic_code.to_string());
        self
    }

    fn matches(&self, graphic_code: Option<&str>, graphic_type: GraphicType, points_length: usize) -> bool {
        let code_matches = match &self.graphic_code {
            Some(expected) => graphic_code == Some(expected.as_str()),
            None => true,
        };
        code_matches
            && self.graphic_type == graphic_type
            && self.points_length.map_or(true, |expected| expected == points_length)
    }
}

/// An annotation tool able to turn a stored measurement back into tool state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolAdapter {
    pub tool_type: String,
    pub patterns: Vec<GraphicPattern>,
}

impl ToolAdapter {
    pub fn new(tool_type: &str, patterns: Vec<GraphicPattern>) -> Self {
        Self {
            tool_type: tool_type.to_string(),
            patterns,
        }
    }

    /// The tracking identifier this tool writes, e.g. `Cornerstone3DTools@^0.1.0:Length`
    pub fn tracking_identifier(&self) -> String {
        format!("{}:{}", CORNERSTONE_3D_TAG, self.tool_type)
    }

    /// Whether a tracking identifier was written by this tool
    pub fn is_valid_tracking_identifier(&self, tracking_identifier: &str) -> bool {
        match tracking_identifier.split_once(':') {
            Some((source, tool_type)) => {
                source.starts_with("Cornerstone3DTools@") && tool_type == self.tool_type
            }
            None => false,
        }
    }
}

/// Lookup table of the known tool adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolAdapterRegistry {
    adapters: Vec<ToolAdapter>,
}

impl Default for ToolAdapterRegistry {
    /// The annotation tools of the viewer
    fn default() -> Self {
        use GraphicType::*;
        let pattern = GraphicPattern::new;

        Self::new(vec![
            ToolAdapter::new("Length", vec![pattern(Polyline, Some(2))]),
            // Matched through its tracking identifier only: its long axis looks like a Length
            ToolAdapter::new("Bidirectional", vec![]),
            ToolAdapter::new("EllipticalROI", vec![pattern(Ellipse, None)]),
            ToolAdapter::new("CircleROI", vec![pattern(Circle, None)]),
            ToolAdapter::new("RectangleROI", vec![pattern(Polyline, Some(5))]),
            ToolAdapter::new("ArrowAnnotate", vec![pattern(Point, Some(1))]),
            ToolAdapter::new("Probe", vec![pattern(Point, Some(1))]),
            ToolAdapter::new(
                "PlanarFreehandROI",
                vec![pattern(Polyline, None), pattern(Polygon, None)],
            ),
            ToolAdapter::new("Angle", vec![pattern(Polyline, Some(3))]),
            ToolAdapter::new("CobbAngle", vec![pattern(Polyline, Some(4))]),
            ToolAdapter::new("UltrasoundDirectional", vec![pattern(Polyline, Some(2))]),
        ])
    }
}

impl ToolAdapterRegistry {
    pub fn new(adapters: Vec<ToolAdapter>) -> Self {
        Self { adapters }
    }

    pub fn register(mut self, adapter: ToolAdapter) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn adapters(&self) -> &[ToolAdapter] {
        &self.adapters
    }

    /// Tool types of every known adapter, in table order
    pub fn tool_types(&self) -> Vec<&str> {
        self.adapters.iter().map(|adapter| adapter.tool_type.as_str()).collect()
    }

    /// The adapter that wrote a tracking identifier
    pub fn adapter_for_tracking_identifier(&self, tracking_identifier: &str) -> Option<&ToolAdapter> {
        self.adapters
            .iter()
            .find(|adapter| adapter.is_valid_tracking_identifier(tracking_identifier))
    }

    /// Every adapter able to read a graphic of the given shape
    ///
    /// # Arguments
    ///
    /// * `graphic_code` - `designator:value` of the graphic concept, if known
    /// * `graphic_type` - Graphic type of the measurement, nothing matches `None`
    /// * `points_length` - Number of points of the graphic
    pub fn adapters_for_types(
        &self,
        graphic_code: Option<&str>,
        graphic_type: Option<GraphicType>,
        points_length: usize,
    ) -> Vec<&ToolAdapter> {
        let Some(graphic_type) = graphic_type else {
            return Vec::new();
        };
        self.adapters
            .iter()
            .filter(|adapter| {
                adapter
                    .patterns
                    .iter()
                    .any(|pattern| pattern.matches(graphic_code, graphic_type, points_length))
            })
            .collect()
    }
}
