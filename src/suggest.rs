//! AI chart suggestions.
//!
//! The model call itself lives behind [`SuggestionService`]. This module
//! builds the request from the current dataset and carries the generation
//! number that lets the workspace drop answers for a dataset that is gone.

use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::dataset::Row;
use crate::error::Result;

/// Rows included in the data summary
pub const SUMMARY_ROWS: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub data_summary: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub suggestions: Vec<String>,
}

/// Something that turns a data summary into chart suggestions
pub trait SuggestionService {
    fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> impl Future<Output = Result<SuggestionResponse>>;
}

/// An in-flight suggestion request
///
/// Obtained from the workspace and handed back with the answer. The
/// generation identifies the dataset the request was made for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuggestionTicket {
    pub generation: u64,
    pub request: SuggestionRequest,
}

/// Describe a dataset for the suggestion model
///
/// Returns `None` when there is nothing to describe.
pub fn data_summary(columns: &[String], rows: &[Row]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let first = &rows[..rows.len().min(SUMMARY_ROWS)];
    let json = serde_json::to_string(first).ok()?;
    Some(format!(
        "The data has the following columns: {}. Here are the first {} rows: {}",
        columns.join(", "),
        SUMMARY_ROWS,
        json
    ))
}

/// Instructions sent to a language model together with the summary
pub fn prompt(request: &SuggestionRequest) -> String {
    format!(
        "You are an expert data visualization consultant. A user has uploaded a dataset, \
         and you need to suggest suitable chart types and data relationships for their data.\n\n\
         Here's a summary of the data:\n\n{}\n\n\
         Based on this data, suggest at least three different chart types and the corresponding \
         data relationships that would be effective for visualizing the data. Explain why each \
         suggestion is appropriate.\n\n\
         Format your response as a JSON array of strings, where each string is a chart type and \
         data relationship suggestion.",
        request.data_summary
    )
}
