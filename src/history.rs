use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chart::{ChartConfig, ChartDimension, ChartType};
use crate::deeplink::DeepLink;

/// A saved chart configuration
///
/// Entries are immutable once created. Entries written before the dimension
/// field existed deserialize as 2D.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Creation time as an RFC 3339 string, suffixed when two saves collide
    pub id: String,

    /// Creation time in epoch milliseconds
    pub timestamp: i64,

    pub file_name: String,
    pub chart_type: ChartType,

    #[serde(default)]
    pub chart_dimension: ChartDimension,

    pub x_axis: String,
    pub y_axis: String,
}

impl HistoryEntry {
    /// Heading shown in the history list, e.g. "3D Bar Chart"
    pub fn title(&self) -> String {
        if self.chart_type == ChartType::Bar && self.chart_dimension == ChartDimension::ThreeD {
            format!("3D {} Chart", self.chart_type.label())
        } else {
            format!("{} Chart", self.chart_type.label())
        }
    }

    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// Relative save time, e.g. "Saved 5 minutes ago"
    pub fn saved_ago(&self, now: DateTime<Utc>) -> String {
        let elapsed = (now.timestamp_millis() - self.timestamp).max(0) / 1000;
        format!("Saved {} ago", distance_in_words(elapsed))
    }

    /// Replay link for this entry
    pub fn to_deep_link(&self) -> DeepLink {
        DeepLink {
            file_name: Some(self.file_name.clone()),
            chart_type: Some(self.chart_type),
            chart_dimension: Some(self.chart_dimension),
            x_axis: Some(self.x_axis.clone()),
            y_axis: Some(self.y_axis.clone()),
        }
    }
}

/// Field missing when trying to save the current configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingField {
    FileName,
    XAxis,
    YAxis,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingField::FileName => f.write_str("file name"),
            MissingField::XAxis => f.write_str("x-axis"),
            MissingField::YAxis => f.write_str("y-axis"),
        }
    }
}

/// The saved analyses of one identity, newest first
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistoryManager {
    entries: Vec<HistoryEntry>,
}

impl HistoryManager {
    /// Wrap a persisted list, which is already newest first
    pub fn new(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Build a new entry from the current selection
    ///
    /// # Errors
    /// * Returns the first of file name, x-axis and y-axis that is unset
    pub fn snapshot(
        &self,
        file_name: Option<&str>,
        config: &ChartConfig,
        now: DateTime<Utc>,
    ) -> Result<HistoryEntry, MissingField> {
        let file_name = file_name
            .filter(|f| !f.is_empty())
            .ok_or(MissingField::FileName)?;
        let x_axis = config
            .x_axis
            .as_deref()
            .filter(|x| !x.is_empty())
            .ok_or(MissingField::XAxis)?;
        let y_axis = config
            .y_axis
            .as_deref()
            .filter(|y| !y.is_empty())
            .ok_or(MissingField::YAxis)?;

        Ok(HistoryEntry {
            id: self.fresh_id(now),
            timestamp: now.timestamp_millis(),
            file_name: file_name.to_string(),
            chart_type: config.chart_type,
            chart_dimension: config.chart_dimension,
            x_axis: x_axis.to_string(),
            y_axis: y_axis.to_string(),
        })
    }

    /// Put an entry at the front of the list
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
    }

    /// Drop the entry with `id`; returns whether one was removed
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    fn fresh_id(&self, now: DateTime<Utc>) -> String {
        let base = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        if self.get(&base).is_none() {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}-{}", base, n);
            if self.get(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}

fn distance_in_words(seconds: i64) -> String {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {}", unit)
        } else {
            format!("{} {}s", n, unit)
        }
    };

    if seconds < 30 {
        "less than a minute".to_string()
    } else if seconds < 45 * MINUTE {
        plural(((seconds + 30) / MINUTE).max(1), "minute")
    } else if seconds < 90 * MINUTE {
        "about 1 hour".to_string()
    } else if seconds < DAY {
        format!("about {}", plural((seconds + HOUR / 2) / HOUR, "hour"))
    } else if seconds < 42 * HOUR {
        "1 day".to_string()
    } else if seconds < MONTH {
        plural((seconds + DAY / 2) / DAY, "day")
    } else if seconds < 45 * DAY {
        "about 1 month".to_string()
    } else if seconds < YEAR {
        plural((seconds + MONTH / 2) / MONTH, "month")
    } else {
        format!("about {}", plural(seconds / YEAR, "year"))
    }
}
