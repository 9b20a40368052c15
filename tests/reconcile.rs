use chrono::{TimeZone, Utc};
use datavis::chart::{ChartConfig, ChartDimension, ChartType};
use datavis::dataset::{Dataset, DatasetStore, Scalar, row};
use datavis::deeplink::{self, DeepLink};
use datavis::loader::CsvParser;
use datavis::login::{AuthSession, Identity};
use datavis::reconciler::{Navigation, Phase, Workspace};
use datavis::saving::FileStore;
use datavis::storage::{KeyValueStore, MemoryStore};
use datavis::suggest::{SuggestionRequest, SuggestionResponse, SuggestionService};
use rstest::rstest;

fn a() -> Identity {
    Identity::new("a@x.com").unwrap()
}

fn q1() -> Dataset {
    vec![
        row([("Region", Scalar::from("East")), ("Sales", Scalar::from(10))]),
        row([("Region", Scalar::from("West")), ("Sales", Scalar::from(20))]),
    ]
}

fn seeded_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store
        .set(
            "datavis-canvas-datasets-a@x.com",
            r#"{"q1.xlsx":[{"Region":"East","Sales":10},{"Region":"West","Sales":20}],
                "q2.xlsx":[{"Month":"Jan","Units":3}]}"#,
        )
        .unwrap();
    store
        .set("datavis-canvas-active-filename-a@x.com", r#""q1.xlsx""#)
        .unwrap();
    store
}

#[rstest]
#[case(ChartType::Bar, ChartDimension::ThreeD, "Region", "Sales", "q1.xlsx")]
#[case(ChartType::Radar, ChartDimension::TwoD, "Net & Gross", "50% share", "report 2024.csv")]
#[case(ChartType::Funnel, ChartDimension::TwoD, "a=b", "c+d", "über?.xlsx")]
fn deep_links_round_trip(
    #[case] chart_type: ChartType,
    #[case] dimension: ChartDimension,
    #[case] x: &str,
    #[case] y: &str,
    #[case] file_name: &str,
) {
    let config = ChartConfig::new(chart_type, x, y).with_dimension(dimension);
    let query = DeepLink::new(&config, Some(file_name)).to_query();

    let link = DeepLink::from_query(&query);
    assert_eq!(link.file_name.as_deref(), Some(file_name));
    let mut restored = ChartConfig::default();
    link.apply_to(&mut restored);
    assert_eq!(restored, config);

    let pairs = deeplink::encode(&config, file_name);
    assert_eq!(deeplink::decode(&pairs), link);
}

#[test]
fn mount_restores_persisted_dataset() {
    let mut ws = Workspace::new(seeded_store());
    let nav = ws.mount(Some(a()), &DeepLink::default()).unwrap();

    assert_eq!(nav, Navigation::Stay);
    assert_eq!(ws.phase(), Phase::Ready { dataset_loaded: true });
    assert_eq!(ws.file_name(), Some("q1.xlsx"));
    assert_eq!(ws.columns(), ["Region", "Sales"]);
    assert_eq!(ws.config().x_axis.as_deref(), Some("Region"));
    assert_eq!(ws.config().y_axis.as_deref(), Some("Sales"));
    assert_eq!(ws.dataset(), q1().as_slice());
}

#[test]
fn deep_link_takes_precedence_over_active_file() {
    let mut ws = Workspace::new(seeded_store());
    let nav = ws
        .mount(
            Some(a()),
            &DeepLink::from_query("?fileName=q2.xlsx&chartType=line&xAxis=Month&yAxis=Units"),
        )
        .unwrap();

    assert_eq!(nav, Navigation::StripParams);
    assert_eq!(ws.file_name(), Some("q2.xlsx"));
    assert_eq!(ws.config().chart_type, ChartType::Line);
    assert_eq!(ws.config().x_axis.as_deref(), Some("Month"));

    // the switch is persisted
    let pointer = ws
        .store()
        .get("datavis-canvas-active-filename-a@x.com")
        .unwrap();
    assert_eq!(pointer.as_deref(), Some(r#""q2.xlsx""#));

    let notes = ws.drain_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Analysis Loaded");
    assert_eq!(notes[0].description, "Restored chart settings for \"q2.xlsx\".");
}

#[rstest]
#[case::with_dataset(seeded_store(), Some("q1.xlsx"))]
#[case::without_dataset(MemoryStore::new(), None)]
fn deep_link_to_missing_file_changes_nothing(
    #[case] store: MemoryStore,
    #[case] expected: Option<&str>,
) {
    let mut ws = Workspace::new(store);
    ws.mount(Some(a()), &DeepLink::default()).unwrap();
    let before = ws.dataset().to_vec();

    let nav = ws
        .on_url_change(&DeepLink::from_query("fileName=q9.xlsx&chartType=pie"))
        .unwrap();

    assert_eq!(nav, Navigation::StripParams);
    assert_eq!(ws.file_name(), expected);
    assert_eq!(ws.dataset(), before.as_slice());
    assert_eq!(ws.config().chart_type, ChartType::Bar);

    let notes = ws.drain_notifications();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].is_error());
    assert_eq!(notes[0].title, "File Mismatch");
    assert_eq!(notes[0].description, "Please upload \"q9.xlsx\" to load this analysis.");
}

#[test]
fn history_is_newest_first() {
    let mut ws = Workspace::new(seeded_store());
    ws.mount(Some(a()), &DeepLink::default()).unwrap();

    let t1 = Utc.timestamp_millis_opt(1_760_000_000_000).unwrap();
    let t2 = Utc.timestamp_millis_opt(1_760_000_060_000).unwrap();
    let e1 = ws.save_analysis_at(t1).unwrap().unwrap();
    ws.set_chart_type(ChartType::Area);
    let e2 = ws.save_analysis_at(t2).unwrap().unwrap();

    let ids: Vec<_> = ws.history().entries().iter().map(|e| e.id.clone()).collect();
    assert_eq!(ids, [e2.id.clone(), e1.id.clone()]);

    assert!(ws.delete_analysis(&e2.id).unwrap());
    assert_eq!(ws.history().entries(), [e1.clone()]);
    assert!(!ws.delete_analysis(&e2.id).unwrap());

    // persisted list matches memory after a fresh load
    let store = ws.store().clone();
    let mut reloaded = Workspace::new(store);
    reloaded.mount(Some(a()), &DeepLink::default()).unwrap();
    assert_eq!(reloaded.history().entries(), [e1]);
}

#[test]
fn ingestion_defaults_axes() {
    let mut ws = Workspace::new(MemoryStore::new());
    ws.on_identity_change(Some(a())).unwrap();
    ws.upload(&CsvParser, "p.csv", b"Region,Sales,Profit\nEast,10,2\n")
        .unwrap();

    assert_eq!(ws.columns(), ["Region", "Sales", "Profit"]);
    assert_eq!(ws.config().x_axis.as_deref(), Some("Region"));
    assert_eq!(ws.config().y_axis.as_deref(), Some("Sales"));

    let notes = ws.drain_notifications();
    assert_eq!(notes[0].title, "Success");
    assert_eq!(notes[0].description, "Successfully parsed \"p.csv\".");
}

#[test]
fn reupload_overwrites_stored_dataset() {
    let mut ws = Workspace::new(seeded_store());
    ws.mount(Some(a()), &DeepLink::default()).unwrap();
    ws.upload(&CsvParser, "q1.xlsx", b"Region,Sales\nNorth,99\n")
        .unwrap();

    let raw = ws.store().get("datavis-canvas-datasets-a@x.com").unwrap().unwrap();
    let datasets: DatasetStore = serde_json::from_str(&raw).unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets["q1.xlsx"].len(), 1);
    assert_eq!(datasets["q1.xlsx"][0]["Sales"], Scalar::Number(99.0));
}

#[test]
fn corrupted_dataset_record_is_discarded() {
    let mut store = seeded_store();
    store
        .set("datavis-canvas-datasets-a@x.com", "{not json")
        .unwrap();

    let mut ws = Workspace::new(store);
    ws.mount(Some(a()), &DeepLink::default()).unwrap();

    assert!(ws.dataset().is_empty());
    assert_eq!(ws.file_name(), None);
    assert_eq!(ws.phase(), Phase::Ready { dataset_loaded: false });
    assert!(!ws.store().contains_key("datavis-canvas-datasets-a@x.com"));
    assert!(!ws.store().contains_key("datavis-canvas-active-filename-a@x.com"));
}

#[test]
fn saving_requires_axes() {
    let mut ws = Workspace::new(seeded_store());
    ws.mount(Some(a()), &DeepLink::default()).unwrap();
    let now = Utc.timestamp_millis_opt(1_760_000_000_123).unwrap();

    let entry = ws.save_analysis_at(now).unwrap().unwrap();
    assert_eq!(entry.id, "2025-10-09T08:53:20.123Z");
    assert_eq!(entry.timestamp, 1_760_000_000_123);
    assert_eq!(entry.file_name, "q1.xlsx");
    assert_eq!(entry.chart_type, ChartType::Bar);
    assert_eq!(entry.x_axis, "Region");
    assert_eq!(entry.y_axis, "Sales");
    assert_eq!(ws.history().len(), 1);
    ws.drain_notifications();

    ws.set_y_axis(None);
    assert_eq!(ws.save_analysis_at(now).unwrap(), None);
    assert_eq!(ws.history().len(), 1);
    assert_eq!(ws.drain_notifications()[0].title, "Cannot Save Analysis");
}

#[test]
fn identities_do_not_share_data() {
    let mut ws = Workspace::new(seeded_store());
    ws.mount(Some(Identity::new("b@x.com").unwrap()), &DeepLink::default())
        .unwrap();
    assert_eq!(ws.file_name(), None);

    // b cannot deep-link into a's file
    ws.on_url_change(&DeepLink::from_query("fileName=q1.xlsx")).unwrap();
    assert_eq!(ws.file_name(), None);
    assert_eq!(ws.drain_notifications()[0].title, "File Mismatch");
}

#[test]
fn history_entry_replays_as_deep_link() {
    let mut ws = Workspace::new(seeded_store());
    ws.mount(Some(a()), &DeepLink::default()).unwrap();
    ws.set_chart_dimension(ChartDimension::ThreeD);
    let saved = ws.save_analysis().unwrap().unwrap();

    ws.on_url_change(&DeepLink::from_query("fileName=q2.xlsx&xAxis=Month&yAxis=Units"))
        .unwrap();
    assert_eq!(ws.file_name(), Some("q2.xlsx"));

    let link = ws.history_link(&saved.id).unwrap();
    ws.on_url_change(&link).unwrap();
    assert_eq!(ws.file_name(), Some("q1.xlsx"));
    assert!(ws.config().is_3d());
    assert_eq!(ws.config().y_axis.as_deref(), Some("Sales"));
}

#[test]
fn state_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.bin.gz");

    {
        let mut ws = Workspace::new(FileStore::open(&path).unwrap());
        ws.mount(Some(a()), &DeepLink::default()).unwrap();
        ws.upload(&CsvParser, "q1.csv", b"Region,Sales\nEast,10\n")
            .unwrap();
        ws.save_analysis().unwrap().unwrap();
    }

    let mut ws = Workspace::new(FileStore::open(&path).unwrap());
    ws.mount(Some(a()), &DeepLink::default()).unwrap();
    assert_eq!(ws.file_name(), Some("q1.csv"));
    assert_eq!(ws.history().len(), 1);
}

#[test]
fn sign_in_record_drives_the_workspace() {
    let mut auth = AuthSession::restore(MemoryStore::new()).unwrap();
    assert!(auth.current().is_none());
    auth.signup("a@x.com").unwrap();

    let restored = AuthSession::restore(auth.into_store()).unwrap();
    let mut ws = Workspace::new(seeded_store());
    ws.mount(restored.current().cloned(), &DeepLink::default())
        .unwrap();
    assert_eq!(ws.file_name(), Some("q1.xlsx"));
}

struct Canned(Vec<&'static str>);

impl SuggestionService for Canned {
    async fn suggest(&self, request: &SuggestionRequest) -> datavis::Result<SuggestionResponse> {
        assert!(request.data_summary.contains("Region, Sales"));
        Ok(SuggestionResponse {
            suggestions: self.0.iter().map(|s| s.to_string()).collect(),
        })
    }
}

#[tokio::test]
async fn suggestions_apply_for_current_dataset() {
    let mut ws = Workspace::new(seeded_store());
    ws.mount(Some(a()), &DeepLink::default()).unwrap();

    let applied = ws
        .fetch_suggestions(&Canned(vec!["Bar chart of Sales by Region"]))
        .await;
    assert!(applied);
    assert_eq!(ws.suggestions(), ["Bar chart of Sales by Region".to_string()]);
    assert!(!ws.is_suggesting());
}

#[tokio::test]
async fn suggestions_for_a_replaced_dataset_are_dropped() {
    let mut ws = Workspace::new(seeded_store());
    ws.mount(Some(a()), &DeepLink::default()).unwrap();

    let ticket = ws.begin_suggestions().unwrap();
    let answer = Canned(vec!["stale"]).suggest(&ticket.request).await;

    // the user switches files while the request is in flight
    ws.on_url_change(&DeepLink::from_query("fileName=q2.xlsx"))
        .unwrap();
    assert!(!ws.complete_suggestions(ticket, answer));
    assert!(ws.suggestions().is_empty());
}
