//! Deep links: a chart configuration flattened into URL query parameters.
//!
//! The parameter names are `fileName`, `chartType`, `chartDimension`,
//! `xAxis` and `yAxis`. Every parameter is optional; decoding ignores keys
//! it does not know and values it cannot parse.

use log::debug;

use crate::chart::{ChartConfig, ChartDimension, ChartType};

pub const FILE_NAME: &str = "fileName";
pub const CHART_TYPE: &str = "chartType";
pub const CHART_DIMENSION: &str = "chartDimension";
pub const X_AXIS: &str = "xAxis";
pub const Y_AXIS: &str = "yAxis";

/// Every parameter the codec reads or writes, in encoding order
pub const KEYS: [&str; 5] = [FILE_NAME, CHART_TYPE, CHART_DIMENSION, X_AXIS, Y_AXIS];

/// A decoded (possibly partial) deep link
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeepLink {
    pub file_name: Option<String>,
    pub chart_type: Option<ChartType>,
    pub chart_dimension: Option<ChartDimension>,
    pub x_axis: Option<String>,
    pub y_axis: Option<String>,
}

impl DeepLink {
    /// Snapshot a configuration and the file it applies to
    pub fn new(config: &ChartConfig, file_name: Option<&str>) -> Self {
        Self {
            file_name: file_name.map(str::to_string),
            chart_type: Some(config.chart_type),
            chart_dimension: Some(config.chart_dimension),
            x_axis: config.x_axis.clone(),
            y_axis: config.y_axis.clone(),
        }
    }

    /// Decode from key/value pairs
    ///
    /// When a key repeats, the first occurrence wins. Empty values count as
    /// absent.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut link = DeepLink::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                FILE_NAME if link.file_name.is_none() => link.file_name = Some(value.to_string()),
                CHART_TYPE if link.chart_type.is_none() => match value.parse() {
                    Ok(t) => link.chart_type = Some(t),
                    Err(e) => debug!("ignoring deep link parameter: {}", e),
                },
                CHART_DIMENSION if link.chart_dimension.is_none() => match value.parse() {
                    Ok(d) => link.chart_dimension = Some(d),
                    Err(e) => debug!("ignoring deep link parameter: {}", e),
                },
                X_AXIS if link.x_axis.is_none() => link.x_axis = Some(value.to_string()),
                Y_AXIS if link.y_axis.is_none() => link.y_axis = Some(value.to_string()),
                _ => {}
            }
        }
        link
    }

    /// Decode a URL query string, with or without the leading `?`
    ///
    /// # Examples
    /// ```
    /// use datavis::chart::ChartType;
    /// use datavis::deeplink::DeepLink;
    ///
    /// let link = DeepLink::from_query("?fileName=q1%20sales.xlsx&chartType=line");
    /// assert_eq!(link.file_name.as_deref(), Some("q1 sales.xlsx"));
    /// assert_eq!(link.chart_type, Some(ChartType::Line));
    /// ```
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = query.split('&').filter(|p| !p.is_empty()).filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Some((decode_component(key)?, decode_component(value)?))
        });
        Self::from_pairs(pairs)
    }

    /// Flatten into key/value pairs, omitting unset fields
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(KEYS.len());
        if let Some(name) = &self.file_name {
            pairs.push((FILE_NAME.to_string(), name.clone()));
        }
        if let Some(t) = self.chart_type {
            pairs.push((CHART_TYPE.to_string(), t.as_str().to_string()));
        }
        if let Some(d) = self.chart_dimension {
            pairs.push((CHART_DIMENSION.to_string(), d.as_str().to_string()));
        }
        if let Some(x) = &self.x_axis {
            pairs.push((X_AXIS.to_string(), x.clone()));
        }
        if let Some(y) = &self.y_axis {
            pairs.push((Y_AXIS.to_string(), y.clone()));
        }
        pairs
    }

    /// Percent-encoded query string without the leading `?`
    pub fn to_query(&self) -> String {
        self.to_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn is_empty(&self) -> bool {
        self.file_name.is_none() && !self.has_config()
    }

    /// True when any of the four chart fields is present
    pub fn has_config(&self) -> bool {
        self.chart_type.is_some()
            || self.chart_dimension.is_some()
            || self.x_axis.is_some()
            || self.y_axis.is_some()
    }

    /// Overwrite the fields present in the link, leaving the rest alone
    ///
    /// Returns whether any field was applied.
    pub fn apply_to(&self, config: &mut ChartConfig) -> bool {
        if let Some(t) = self.chart_type {
            config.chart_type = t;
        }
        if let Some(d) = self.chart_dimension {
            config.chart_dimension = d;
        }
        if let Some(x) = &self.x_axis {
            config.x_axis = Some(x.clone());
        }
        if let Some(y) = &self.y_axis {
            config.y_axis = Some(y.clone());
        }
        self.has_config()
    }
}

/// Encode a configuration and file name as deep-link parameters
pub fn encode(config: &ChartConfig, file_name: &str) -> Vec<(String, String)> {
    DeepLink::new(config, Some(file_name)).to_pairs()
}

/// Decode deep-link parameters
pub fn decode<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> DeepLink {
    DeepLink::from_pairs(pairs.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
}

fn decode_component(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|s| s.into_owned())
}
