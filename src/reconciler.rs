//! The dashboard session: one identity's dataset, chart selection and
//! saved analyses, kept consistent with the persisted store and the URL.
//!
//! Two procedures drive it. [`Workspace::on_identity_change`] loads whatever
//! the identity has persisted; [`Workspace::on_url_change`] then lets a deep
//! link override parts of it. They must run in that order, since resolving a
//! deep link reads the identity's dataset store.

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::chart::{ChartConfig, ChartDimension, ChartType};
use crate::dataset::{Dataset, DatasetStore, Row, columns_of};
use crate::deeplink::DeepLink;
use crate::downloader::{ChartExporter, ChartView, ExportFormat, ExportedFile, export_chart};
use crate::error::{DatavisError, Result};
use crate::history::{HistoryEntry, HistoryManager};
use crate::loader::SheetParser;
use crate::login::Identity;
use crate::notify::Notification;
use crate::storage::{ACTIVE_FILENAME, DATASETS, HISTORY, KeyValueStore, Loaded, ScopedStore};
use crate::suggest::{
    SuggestionRequest, SuggestionResponse, SuggestionService, SuggestionTicket, data_summary,
};

/// Rows shown in the data table unless configured otherwise
pub const DEFAULT_PREVIEW_ROWS: usize = 100;

/// Where the workspace is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Nobody is signed in
    Unauthenticated,
    /// The identity has not been resolved yet
    Loading,
    Ready { dataset_loaded: bool },
}

/// What the caller should do with the URL after a deep link was handled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Navigation {
    /// Leave the URL as it is
    Stay,
    /// Replace the URL with one without deep-link parameters, no reload
    StripParams,
}

pub struct Workspace<S> {
    store: S,
    identity: Option<Identity>,
    resolved: bool,
    dataset: Dataset,
    columns: Vec<String>,
    file_name: Option<String>,
    config: ChartConfig,
    suggestions: Vec<String>,
    suggesting: bool,
    history: HistoryManager,
    generation: u64,
    notifications: Vec<Notification>,
    preview_rows: usize,
}

impl<S: KeyValueStore> Workspace<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            identity: None,
            resolved: false,
            dataset: Vec::new(),
            columns: Vec::new(),
            file_name: None,
            config: ChartConfig::default(),
            suggestions: Vec::new(),
            suggesting: false,
            history: HistoryManager::default(),
            generation: 0,
            notifications: Vec::new(),
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }

    pub fn with_preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }

    /// Resolve the identity, then apply the URL's deep link
    pub fn mount(&mut self, identity: Option<Identity>, link: &DeepLink) -> Result<Navigation> {
        self.on_identity_change(identity)?;
        self.on_url_change(link)
    }

    /// Load the persisted state of a newly known identity
    ///
    /// With no identity everything in memory is cleared. Otherwise the
    /// active file is loaded when the dataset store still holds it, and the
    /// history list is read. If any of the three records is corrupted it is
    /// removed and the workspace starts empty.
    ///
    /// # Errors
    /// * Returns an error only if the backing store fails
    pub fn on_identity_change(&mut self, identity: Option<Identity>) -> Result<()> {
        self.resolved = true;
        self.reset_dataset();
        self.config.clear_axes();

        let Some(identity) = identity else {
            if let Some(previous) = self.identity.take() {
                debug!("cleared workspace of {}", previous);
            }
            self.history = HistoryManager::default();
            return Ok(());
        };

        let mut scoped = ScopedStore::new(&mut self.store, identity.email());
        let active = scoped.load::<String>(ACTIVE_FILENAME)?;
        let datasets = scoped.load::<DatasetStore>(DATASETS)?;
        let history = scoped.load::<Vec<HistoryEntry>>(HISTORY)?;

        if active.is_corrupt() || datasets.is_corrupt() || history.is_corrupt() {
            // the pointer is meaningless without a readable dataset store
            if active.is_corrupt() || datasets.is_corrupt() {
                scoped.clear(ACTIVE_FILENAME)?;
                scoped.clear(DATASETS)?;
            }
            warn!("stored records of {} were corrupted, starting empty", identity);
            self.history = HistoryManager::default();
            self.identity = Some(identity);
            return Ok(());
        }

        if let Loaded::Present(name) = active {
            match datasets {
                Loaded::Present(mut map) => match map.swap_remove(&name) {
                    Some(rows) => {
                        debug!("restored {} ({} rows) for {}", name, rows.len(), identity);
                        self.load_dataset(name, rows);
                    }
                    None => dangling_pointer(&mut scoped, &name, &mut self.notifications)?,
                },
                _ => dangling_pointer(&mut scoped, &name, &mut self.notifications)?,
            }
        }

        self.history = HistoryManager::new(history.into_option().unwrap_or_default());
        self.identity = Some(identity);
        Ok(())
    }

    /// Apply a deep link from the URL
    ///
    /// Without a `fileName` parameter the only effect is defaulting unset
    /// axes to the first two columns. With one, the named dataset is loaded
    /// from the store if it is not already current, then every chart field
    /// present in the link overwrites the current one.
    ///
    /// # Errors
    /// * Returns an error only if the backing store fails
    pub fn on_url_change(&mut self, link: &DeepLink) -> Result<Navigation> {
        let strip = if link.is_empty() {
            Navigation::Stay
        } else {
            Navigation::StripParams
        };

        let Some(requested) = link.file_name.as_deref() else {
            if self.config.x_axis.is_none() && self.config.y_axis.is_none() && !self.columns.is_empty()
            {
                self.config.default_axes(&self.columns);
            }
            return Ok(strip);
        };

        if self.file_name.as_deref() != Some(requested) {
            let Some(identity) = self.identity.as_ref() else {
                debug!("deep link to {} before sign-in, ignoring", requested);
                return Ok(Navigation::StripParams);
            };

            let mut scoped = ScopedStore::new(&mut self.store, identity.email());
            let rows = match scoped.load::<DatasetStore>(DATASETS)? {
                Loaded::Present(mut map) => map.swap_remove(requested),
                Loaded::Absent => None,
                Loaded::Corrupt => {
                    scoped.clear(ACTIVE_FILENAME)?;
                    self.notifications.push(Notification::error(
                        "Error Loading Data",
                        "Could not load data from browser storage. It might be corrupted.",
                    ));
                    return Ok(Navigation::StripParams);
                }
            };

            let Some(rows) = rows else {
                warn!("deep link names {} which {} has not uploaded", requested, identity);
                self.notifications.push(Notification::error(
                    "File Mismatch",
                    format!("Please upload \"{}\" to load this analysis.", requested),
                ));
                return Ok(Navigation::StripParams);
            };

            scoped.save(ACTIVE_FILENAME, requested)?;
            debug!("deep link switched {} to {}", identity, requested);
            self.load_dataset(requested.to_string(), rows);
        }

        if link.apply_to(&mut self.config) {
            self.notifications.push(Notification::info(
                "Analysis Loaded",
                format!("Restored chart settings for \"{}\".", requested),
            ));
        }

        Ok(Navigation::StripParams)
    }

    /// Take the outcome of parsing an uploaded file
    ///
    /// On success the rows replace any dataset stored under the same name,
    /// become the active file, and the axes default to the first two
    /// columns. A parse failure only raises a notification.
    ///
    /// # Errors
    /// * `NotAuthenticated` without an identity
    /// * Store failures
    pub fn ingest(&mut self, file_name: &str, parsed: Result<Dataset>) -> Result<()> {
        let identity = self.identity.as_ref().ok_or(DatavisError::NotAuthenticated)?;

        let rows = match parsed {
            Ok(rows) => rows,
            Err(e) => {
                self.notifications
                    .push(Notification::error("File Read Error", e.to_string()));
                return Ok(());
            }
        };

        let mut scoped = ScopedStore::new(&mut self.store, identity.email());
        let mut datasets = scoped
            .load::<DatasetStore>(DATASETS)?
            .into_option()
            .unwrap_or_default();
        datasets.insert(file_name.to_string(), rows.clone());
        scoped.save(DATASETS, &datasets)?;
        scoped.save(ACTIVE_FILENAME, file_name)?;

        self.load_dataset(file_name.to_string(), rows);
        if self.columns.is_empty() {
            self.config.clear_axes();
        } else {
            self.config.default_axes(&self.columns);
        }
        self.notifications.push(Notification::info(
            "Success",
            format!("Successfully parsed \"{}\".", file_name),
        ));
        Ok(())
    }

    /// Parse an uploaded file and ingest the result
    pub fn upload<P: SheetParser + ?Sized>(
        &mut self,
        parser: &P,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<()> {
        self.ingest(file_name, parser.parse(bytes))
    }

    /// Forget the current dataset, both in memory and in the store
    pub fn clear_data(&mut self) -> Result<()> {
        let identity = self.identity.as_ref().ok_or(DatavisError::NotAuthenticated)?;
        let mut scoped = ScopedStore::new(&mut self.store, identity.email());

        if let Some(name) = &self.file_name {
            if let Loaded::Present(mut datasets) = scoped.load::<DatasetStore>(DATASETS)? {
                datasets.shift_remove(name);
                scoped.save(DATASETS, &datasets)?;
            }
        }
        scoped.clear(ACTIVE_FILENAME)?;

        self.reset_dataset();
        self.config.clear_axes();
        self.notifications.push(Notification::info(
            "Data Cleared",
            "Current data and chart settings have been cleared.",
        ));
        Ok(())
    }

    /// Save the current selection to history
    pub fn save_analysis(&mut self) -> Result<Option<HistoryEntry>> {
        self.save_analysis_at(Utc::now())
    }

    /// Save the current selection to history with an explicit clock
    ///
    /// Returns `None`, with a notification, when the file name or an axis
    /// is missing; nothing is persisted in that case.
    pub fn save_analysis_at(&mut self, now: DateTime<Utc>) -> Result<Option<HistoryEntry>> {
        let identity = self.identity.as_ref().ok_or(DatavisError::NotAuthenticated)?;

        let entry = match self
            .history
            .snapshot(self.file_name.as_deref(), &self.config, now)
        {
            Ok(entry) => entry,
            Err(missing) => {
                debug!("not saving analysis, {} is unset", missing);
                self.notifications.push(Notification::error(
                    "Cannot Save Analysis",
                    "Please make sure you have data loaded and chart axes selected.",
                ));
                return Ok(None);
            }
        };

        let mut next = self.history.clone();
        next.append(entry.clone());
        ScopedStore::new(&mut self.store, identity.email()).save(HISTORY, next.entries())?;
        self.history = next;

        self.notifications.push(Notification::info(
            "Analysis Saved",
            "Your chart configuration has been saved to history.",
        ));
        Ok(Some(entry))
    }

    /// Delete a saved analysis; returns whether it existed
    pub fn delete_analysis(&mut self, id: &str) -> Result<bool> {
        let identity = self.identity.as_ref().ok_or(DatavisError::NotAuthenticated)?;

        let mut next = self.history.clone();
        if !next.remove(id) {
            return Ok(false);
        }
        ScopedStore::new(&mut self.store, identity.email()).save(HISTORY, next.entries())?;
        self.history = next;

        self.notifications.push(Notification::info(
            "Analysis Deleted",
            "The saved analysis has been removed from your history.",
        ));
        Ok(true)
    }

    /// Deep link that replays a saved analysis
    pub fn history_link(&self, id: &str) -> Option<DeepLink> {
        self.history.get(id).map(HistoryEntry::to_deep_link)
    }

    /// Deep link for sharing the current selection
    pub fn share_link(&self) -> Option<DeepLink> {
        self.file_name
            .as_deref()
            .map(|name| DeepLink::new(&self.config, Some(name)))
    }

    /// Start a suggestion request for the current dataset
    ///
    /// Clears previous suggestions. Returns `None`, with a notification, when
    /// there is no data to describe.
    pub fn begin_suggestions(&mut self) -> Option<SuggestionTicket> {
        let Some(summary) = data_summary(&self.columns, &self.dataset) else {
            self.notifications.push(Notification::error(
                "No data available",
                "Please upload a file first to get suggestions.",
            ));
            return None;
        };

        self.generation += 1;
        self.suggestions.clear();
        self.suggesting = true;
        Some(SuggestionTicket {
            generation: self.generation,
            request: SuggestionRequest {
                data_summary: summary,
            },
        })
    }

    /// Apply the answer to a suggestion request
    ///
    /// Answers for a request that has been superseded, or whose dataset has
    /// changed since, are dropped. Returns whether suggestions were applied.
    pub fn complete_suggestions(
        &mut self,
        ticket: SuggestionTicket,
        result: Result<SuggestionResponse>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(
                "dropping stale suggestions (generation {} != {})",
                ticket.generation, self.generation
            );
            return false;
        }

        self.suggesting = false;
        match result {
            Ok(response) => {
                self.suggestions = response.suggestions;
                true
            }
            Err(e) => {
                warn!("suggestion request failed: {}", e);
                self.notifications.push(Notification::error(
                    "AI Suggestion Error",
                    "Could not fetch suggestions from the AI.",
                ));
                false
            }
        }
    }

    /// Request suggestions from `service` and apply the answer
    pub async fn fetch_suggestions<T: SuggestionService>(&mut self, service: &T) -> bool {
        let Some(ticket) = self.begin_suggestions() else {
            return false;
        };
        let result = service.suggest(&ticket.request).await;
        self.complete_suggestions(ticket, result)
    }

    /// Render the current chart for download
    pub fn export<E: ChartExporter + ?Sized>(
        &mut self,
        format: ExportFormat,
        exporter: &E,
    ) -> Option<ExportedFile> {
        if self.dataset.is_empty() {
            self.notifications.push(Notification::error(
                "Download Failed",
                "Load a dataset before downloading the chart.",
            ));
            return None;
        }

        let view = self.chart_view();
        match export_chart(exporter, &view, format) {
            Ok(file) => {
                self.notifications.push(Notification::info(
                    "Download Complete",
                    format!("Your {} has been downloaded.", format.label()),
                ));
                Some(file)
            }
            Err(e) => {
                warn!("chart export failed: {}", e);
                self.notifications.push(Notification::error(
                    "Download Failed",
                    "Could not generate the file. Try again.",
                ));
                None
            }
        }
    }

    pub fn chart_view(&self) -> ChartView<'_> {
        ChartView {
            file_name: self.file_name.as_deref().unwrap_or("chart"),
            rows: &self.dataset,
            config: &self.config,
        }
    }

    pub fn set_chart_type(&mut self, chart_type: ChartType) {
        self.config.chart_type = chart_type;
    }

    pub fn set_chart_dimension(&mut self, dimension: ChartDimension) {
        self.config.chart_dimension = dimension;
    }

    /// Select the x-axis column; an empty name unsets it
    pub fn set_x_axis(&mut self, column: Option<String>) {
        self.config.x_axis = column.filter(|c| !c.is_empty());
    }

    /// Select the y-axis column; an empty name unsets it
    pub fn set_y_axis(&mut self, column: Option<String>) {
        self.config.y_axis = column.filter(|c| !c.is_empty());
    }

    pub fn phase(&self) -> Phase {
        match (&self.identity, self.resolved) {
            (_, false) => Phase::Loading,
            (None, true) => Phase::Unauthenticated,
            (Some(_), true) => Phase::Ready {
                dataset_loaded: self.file_name.is_some(),
            },
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn dataset(&self) -> &[Row] {
        &self.dataset
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn is_suggesting(&self) -> bool {
        self.suggesting
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Leading rows of the dataset for the data table
    pub fn table_preview(&self) -> &[Row] {
        &self.dataset[..self.dataset.len().min(self.preview_rows)]
    }

    /// Notifications raised since the last drain, oldest first
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn load_dataset(&mut self, name: String, rows: Dataset) {
        self.columns = columns_of(&rows);
        self.dataset = rows;
        self.file_name = Some(name);
        self.suggestions.clear();
        self.suggesting = false;
        self.generation += 1;
    }

    fn reset_dataset(&mut self) {
        self.dataset.clear();
        self.columns.clear();
        self.file_name = None;
        self.suggestions.clear();
        self.suggesting = false;
        self.generation += 1;
    }
}

fn dangling_pointer<S: KeyValueStore + ?Sized>(
    scoped: &mut ScopedStore<'_, S>,
    name: &str,
    notifications: &mut Vec<Notification>,
) -> Result<()> {
    warn!("active file {} is missing from the dataset store", name);
    scoped.clear(ACTIVE_FILENAME)?;
    notifications.push(Notification::error(
        "Dataset Missing",
        format!("\"{}\" is no longer available. Please upload it again.", name),
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Scalar, row};
    use crate::storage::MemoryStore;

    fn identity() -> Identity {
        Identity::new("a@x.com").unwrap()
    }

    fn sales() -> Dataset {
        vec![
            row([("Region", Scalar::from("East")), ("Sales", Scalar::from(10))]),
            row([("Region", Scalar::from("West")), ("Sales", Scalar::from(20))]),
        ]
    }

    fn signed_in() -> Workspace<MemoryStore> {
        let mut ws = Workspace::new(MemoryStore::new());
        ws.on_identity_change(Some(identity())).unwrap();
        ws
    }

    #[test]
    fn phases_follow_identity() {
        let mut ws = Workspace::new(MemoryStore::new());
        assert_eq!(ws.phase(), Phase::Loading);
        ws.on_identity_change(None).unwrap();
        assert_eq!(ws.phase(), Phase::Unauthenticated);
        ws.on_identity_change(Some(identity())).unwrap();
        assert_eq!(ws.phase(), Phase::Ready { dataset_loaded: false });
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        assert_eq!(ws.phase(), Phase::Ready { dataset_loaded: true });
    }

    #[test]
    fn ingest_requires_identity() {
        let mut ws = Workspace::new(MemoryStore::new());
        assert!(matches!(
            ws.ingest("q1.xlsx", Ok(sales())),
            Err(DatavisError::NotAuthenticated)
        ));
        assert!(ws.store().is_empty());
    }

    #[test]
    fn parse_failure_changes_nothing() {
        let mut ws = signed_in();
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        ws.drain_notifications();

        ws.ingest("bad.xlsx", Err(DatavisError::Parse("Unsupported file".into())))
            .unwrap();
        assert_eq!(ws.file_name(), Some("q1.xlsx"));
        assert_eq!(ws.dataset().len(), 2);
        let notes = ws.drain_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "File Read Error");
        assert_eq!(notes[0].description, "Unsupported file");
    }

    #[test]
    fn empty_upload_clears_axes() {
        let mut ws = signed_in();
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        ws.ingest("empty.csv", Ok(Vec::new())).unwrap();
        assert_eq!(ws.file_name(), Some("empty.csv"));
        assert!(ws.columns().is_empty());
        assert_eq!(ws.config().x_axis, None);
        assert_eq!(ws.config().y_axis, None);
    }

    #[test]
    fn clear_data_removes_dataset_and_pointer() {
        let mut ws = signed_in();
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        ws.ingest("q2.xlsx", Ok(sales())).unwrap();
        ws.clear_data().unwrap();

        assert_eq!(ws.phase(), Phase::Ready { dataset_loaded: false });
        assert!(!ws.store().contains_key("datavis-canvas-active-filename-a@x.com"));
        let raw = ws
            .store()
            .get("datavis-canvas-datasets-a@x.com")
            .unwrap()
            .unwrap();
        let remaining: DatasetStore = serde_json::from_str(&raw).unwrap();
        assert_eq!(remaining.keys().collect::<Vec<_>>(), vec!["q1.xlsx"]);
        assert_eq!(ws.drain_notifications().last().unwrap().title, "Data Cleared");
    }

    #[test]
    fn dangling_pointer_is_cleared_with_a_notification() {
        let mut store = MemoryStore::new();
        store
            .set("datavis-canvas-active-filename-a@x.com", "\"gone.xlsx\"")
            .unwrap();
        store.set("datavis-canvas-datasets-a@x.com", "{}").unwrap();

        let mut ws = Workspace::new(store);
        ws.on_identity_change(Some(identity())).unwrap();
        assert_eq!(ws.file_name(), None);
        assert!(!ws.store().contains_key("datavis-canvas-active-filename-a@x.com"));
        assert_eq!(ws.drain_notifications()[0].title, "Dataset Missing");
    }

    #[test]
    fn corrupt_history_resets_everything_in_memory() {
        let mut ws = signed_in();
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        let mut store = std::mem::replace(&mut ws.store, MemoryStore::new());
        store.set("datavis-canvas-history-a@x.com", "[{]").unwrap();

        let mut ws = Workspace::new(store);
        ws.on_identity_change(Some(identity())).unwrap();
        ws.on_url_change(&DeepLink::default()).unwrap();
        assert!(ws.dataset().is_empty());
        assert!(ws.columns().is_empty());
        assert_eq!(ws.file_name(), None);
        assert_eq!(ws.config().x_axis, None);
        assert!(ws.history().is_empty());
        assert_eq!(ws.phase(), Phase::Ready { dataset_loaded: false });
        assert!(!ws.store().contains_key("datavis-canvas-history-a@x.com"));
        // only the unreadable record is removed
        assert!(ws.store().contains_key("datavis-canvas-datasets-a@x.com"));
    }

    #[test]
    fn corrupt_dataset_store_on_deep_link_drops_the_pointer() {
        let mut ws = signed_in();
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        ws.drain_notifications();
        ws.store
            .set("datavis-canvas-datasets-a@x.com", "{broken")
            .unwrap();

        let nav = ws
            .on_url_change(&DeepLink::from_query("fileName=q2.xlsx"))
            .unwrap();
        assert_eq!(nav, Navigation::StripParams);
        assert!(!ws.store().contains_key("datavis-canvas-datasets-a@x.com"));
        assert!(!ws.store().contains_key("datavis-canvas-active-filename-a@x.com"));
        assert_eq!(ws.drain_notifications()[0].title, "Error Loading Data");
    }

    #[test]
    fn empty_axis_names_are_unset() {
        let mut ws = signed_in();
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        ws.set_x_axis(Some(String::new()));
        ws.set_y_axis(Some("Sales".to_string()));
        assert_eq!(ws.config().x_axis, None);
        assert_eq!(ws.config().y_axis.as_deref(), Some("Sales"));

        let link = ws.share_link().unwrap();
        let mut restored = ChartConfig::default();
        DeepLink::from_query(&link.to_query()).apply_to(&mut restored);
        assert_eq!(&restored, ws.config());
    }

    #[test]
    fn logout_clears_everything_in_memory() {
        let mut ws = signed_in();
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        ws.save_analysis().unwrap();
        ws.on_identity_change(None).unwrap();

        assert_eq!(ws.phase(), Phase::Unauthenticated);
        assert!(ws.dataset().is_empty());
        assert!(ws.columns().is_empty());
        assert!(ws.history().is_empty());
        assert_eq!(ws.config().x_axis, None);
        // persisted records stay for the next sign-in
        assert!(ws.store().contains_key("datavis-canvas-history-a@x.com"));
    }

    #[test]
    fn deep_link_without_identity_is_ignored() {
        let mut ws = Workspace::new(MemoryStore::new());
        ws.on_identity_change(None).unwrap();
        let nav = ws
            .on_url_change(&DeepLink::from_query("fileName=q1.xlsx&chartType=line"))
            .unwrap();
        assert_eq!(nav, Navigation::StripParams);
        assert_eq!(ws.config().chart_type, ChartType::Bar);
        assert!(ws.drain_notifications().is_empty());
    }

    #[test]
    fn deep_link_for_current_file_only_applies_config() {
        let mut ws = signed_in();
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        ws.drain_notifications();

        let nav = ws
            .on_url_change(&DeepLink::from_query("fileName=q1.xlsx&yAxis=Region&chartDimension=3d"))
            .unwrap();
        assert_eq!(nav, Navigation::StripParams);
        assert_eq!(ws.config().x_axis.as_deref(), Some("Region"));
        assert_eq!(ws.config().y_axis.as_deref(), Some("Region"));
        assert!(ws.config().is_3d());
        assert_eq!(ws.drain_notifications()[0].title, "Analysis Loaded");
    }

    #[test]
    fn deep_link_with_only_file_name_is_silent() {
        let mut ws = signed_in();
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        ws.drain_notifications();
        ws.on_url_change(&DeepLink::from_query("fileName=q1.xlsx"))
            .unwrap();
        assert!(ws.drain_notifications().is_empty());
    }

    #[test]
    fn no_params_means_no_navigation() {
        let mut ws = signed_in();
        assert_eq!(ws.on_url_change(&DeepLink::default()).unwrap(), Navigation::Stay);
        // params without a file name are dropped, not applied
        assert_eq!(
            ws.on_url_change(&DeepLink::from_query("chartType=pie")).unwrap(),
            Navigation::StripParams
        );
        assert_eq!(ws.config().chart_type, ChartType::Bar);
    }

    #[test]
    fn failed_store_write_leaves_history_untouched() {
        struct ReadOnly(MemoryStore);
        impl KeyValueStore for ReadOnly {
            fn get(&self, key: &str) -> Result<Option<String>> {
                self.0.get(key)
            }
            fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
                Err(DatavisError::Storage("read-only".into()))
            }
            fn remove(&mut self, key: &str) -> Result<()> {
                self.0.remove(key)
            }
        }

        let mut ws = Workspace::new(ReadOnly(MemoryStore::new()));
        ws.on_identity_change(Some(identity())).unwrap();
        ws.file_name = Some("q1.xlsx".to_string());
        ws.config = ChartConfig::new(ChartType::Bar, "Region", "Sales");

        assert!(ws.save_analysis().is_err());
        assert!(ws.history().is_empty());
        assert!(ws.drain_notifications().is_empty());
    }

    #[test]
    fn stale_suggestions_are_dropped() {
        let mut ws = signed_in();
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();

        let ticket = ws.begin_suggestions().unwrap();
        assert!(ws.is_suggesting());
        ws.clear_data().unwrap();

        let applied = ws.complete_suggestions(
            ticket,
            Ok(SuggestionResponse {
                suggestions: vec!["Bar chart: Sales by Region".into()],
            }),
        );
        assert!(!applied);
        assert!(ws.suggestions().is_empty());
        assert!(!ws.is_suggesting());
    }

    #[test]
    fn superseded_request_loses_to_the_newer_one() {
        let mut ws = signed_in();
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();

        let first = ws.begin_suggestions().unwrap();
        let second = ws.begin_suggestions().unwrap();
        let answer = |s: &str| {
            Ok(SuggestionResponse {
                suggestions: vec![s.to_string()],
            })
        };
        assert!(ws.complete_suggestions(second, answer("new")));
        assert!(!ws.complete_suggestions(first, answer("old")));
        assert_eq!(ws.suggestions(), ["new".to_string()]);
    }

    #[test]
    fn suggestion_failure_notifies() {
        let mut ws = signed_in();
        assert!(ws.begin_suggestions().is_none());
        assert_eq!(ws.drain_notifications()[0].title, "No data available");

        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        let ticket = ws.begin_suggestions().unwrap();
        assert!(ticket.request.data_summary.contains("Region, Sales"));
        ws.drain_notifications();
        assert!(!ws.complete_suggestions(ticket, Err(DatavisError::Suggestion("timeout".into()))));
        assert!(!ws.is_suggesting());
        assert_eq!(ws.drain_notifications()[0].title, "AI Suggestion Error");
    }

    #[test]
    fn table_preview_is_capped() {
        let mut ws = signed_in().with_preview_rows(1);
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        assert_eq!(ws.table_preview().len(), 1);
        assert_eq!(ws.dataset().len(), 2);
    }

    #[test]
    fn share_link_reflects_current_selection() {
        let mut ws = signed_in();
        assert!(ws.share_link().is_none());
        ws.ingest("q1.xlsx", Ok(sales())).unwrap();
        ws.set_chart_type(ChartType::Line);
        assert_eq!(
            ws.share_link().unwrap().to_query(),
            "fileName=q1.xlsx&chartType=line&chartDimension=2d&xAxis=Region&yAxis=Sales"
        );
    }
}
