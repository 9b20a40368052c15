use crate::error::DatavisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chart types offered by the dashboard
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Area,
    Pie,
    Scatter,
    Radar,
    Funnel,
}

impl ChartType {
    pub const ALL: [ChartType; 7] = [
        ChartType::Bar,
        ChartType::Line,
        ChartType::Area,
        ChartType::Pie,
        ChartType::Scatter,
        ChartType::Radar,
        ChartType::Funnel,
    ];

    /// Wire name, as used in deep links and persisted history
    pub fn as_str(self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Area => "area",
            ChartType::Pie => "pie",
            ChartType::Scatter => "scatter",
            ChartType::Radar => "radar",
            ChartType::Funnel => "funnel",
        }
    }

    /// Capitalised name for display
    pub fn label(self) -> &'static str {
        match self {
            ChartType::Bar => "Bar",
            ChartType::Line => "Line",
            ChartType::Area => "Area",
            ChartType::Pie => "Pie",
            ChartType::Scatter => "Scatter",
            ChartType::Radar => "Radar",
            ChartType::Funnel => "Funnel",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartType {
    type Err = DatavisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChartType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DatavisError::InvalidChartType(s.to_string()))
    }
}

/// Rendering dimension; only bar charts have a 3D variant
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartDimension {
    #[default]
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
}

impl ChartDimension {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartDimension::TwoD => "2d",
            ChartDimension::ThreeD => "3d",
        }
    }
}

impl fmt::Display for ChartDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartDimension {
    type Err = DatavisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2d" => Ok(ChartDimension::TwoD),
            "3d" => Ok(ChartDimension::ThreeD),
            other => Err(DatavisError::InvalidDimension(other.to_string())),
        }
    }
}

/// The user's current chart selection
///
/// Axes are column names of the active dataset. Nothing enforces that; an
/// axis naming a missing column just renders an empty chart.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChartConfig {
    pub chart_type: ChartType,
    pub chart_dimension: ChartDimension,
    pub x_axis: Option<String>,
    pub y_axis: Option<String>,
}

impl ChartConfig {
    /// Empty axis names are stored as unset
    pub fn new(chart_type: ChartType, x_axis: &str, y_axis: &str) -> Self {
        Self {
            chart_type,
            chart_dimension: ChartDimension::TwoD,
            x_axis: axis(x_axis),
            y_axis: axis(y_axis),
        }
    }

    pub fn with_dimension(mut self, dimension: ChartDimension) -> Self {
        self.chart_dimension = dimension;
        self
    }

    /// True only for a 3D bar chart
    pub fn is_3d(&self) -> bool {
        self.chart_type == ChartType::Bar && self.chart_dimension == ChartDimension::ThreeD
    }

    pub fn has_axes(&self) -> bool {
        self.x_axis.is_some() && self.y_axis.is_some()
    }

    /// Point both axes at the first two columns (either may be missing)
    pub fn default_axes(&mut self, columns: &[String]) {
        self.x_axis = columns.first().cloned();
        self.y_axis = columns.get(1).cloned();
    }

    pub fn clear_axes(&mut self) {
        self.x_axis = None;
        self.y_axis = None;
    }
}

fn axis(name: &str) -> Option<String> {
    (!name.is_empty()).then(|| name.to_string())
}
