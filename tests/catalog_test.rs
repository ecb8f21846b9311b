//! Option catalog loading and normalization.
//!
//! Run with: cargo test --test catalog_test

mod common;

use serde_json::json;
use std::sync::atomic::Ordering;

use biochar_explorer::backend::models::CatalogResponse;
use biochar_explorer::catalog::{Category, MonthDay, OptionCatalog, season_label_from_code};
use biochar_explorer::error::AppError;
use biochar_explorer::selection::{Context, SelectionState, SelectionStore};
use common::{ScriptedBackend, catalog_json, date};

fn from_json(value: serde_json::Value) -> Result<OptionCatalog, AppError> {
    let response: CatalogResponse = serde_json::from_value(value).unwrap();
    OptionCatalog::from_response(response)
}

#[test]
fn bare_values_are_normalized_with_labels() {
    let catalog = common::catalog();

    let years: Vec<&str> = catalog
        .options(Category::Years)
        .iter()
        .map(|o| o.value.as_str())
        .collect();
    assert_eq!(years, ["2023", "2024"]);

    assert_eq!(catalog.label(Category::Variables, "VWC"), "Soil Moisture");
    assert_eq!(catalog.label(Category::Depths, "2"), "12 in");
    assert_eq!(catalog.label(Category::LoggerLocations, "B"), "Bottom");
    // No mapping entry: the value is its own label
    assert_eq!(catalog.label(Category::Variables, "EC"), "Electrical Conductivity");
    assert_eq!(catalog.label(Category::Years, "2024"), "2024");
    assert_eq!(catalog.label(Category::Strips, "S9"), "S9");
}

#[test]
fn axis_labels_fall_back_to_variable_labels() {
    let catalog = common::catalog();
    assert_eq!(catalog.axis_label("VWC"), "Volumetric Water Content (%)");
    assert_eq!(catalog.axis_label("EC"), "Electrical Conductivity");
}

#[test]
fn defaults_resolve_against_catalog() {
    let catalog = common::catalog();
    let defaults = catalog.defaults();

    assert_eq!(defaults.year, 2023);
    assert_eq!(defaults.variable, "VWC");
    assert_eq!(defaults.depth, "1");
    assert_eq!(defaults.logger_location, "T");
    assert_eq!(defaults.start_date, date(2023, 1, 1));
    assert_eq!(defaults.end_date, date(2023, 12, 31));
}

#[test]
fn default_dates_are_taken_from_the_response() {
    let mut body = catalog_json();
    body["defaults"]["startDate"] = json!("2023-04-01");
    body["defaults"]["endDate"] = json!("2023-09-30");

    let catalog = from_json(body).unwrap();
    assert_eq!(catalog.defaults().start_date, date(2023, 4, 1));
    assert_eq!(catalog.defaults().end_date, date(2023, 9, 30));
}

#[test]
fn record_entries_are_accepted() {
    let mut body = catalog_json();
    body["strips"] = json!([
        {"value": "S1", "label": "Treated 1"},
        {"value": "S2"},
        "S3"
    ]);

    let catalog = from_json(body).unwrap();
    let strips = catalog.options(Category::Strips);
    assert_eq!(strips.len(), 3);
    assert_eq!(strips[0].label, "Treated 1");
    assert_eq!(strips[1].label, "Strip 2 (Control)");
    assert_eq!(strips[2].label, "Strip 3 (Biochar)");
}

#[test]
fn missing_defaults_is_fatal() {
    let mut body = catalog_json();
    body.as_object_mut().unwrap().remove("defaults");

    let err = from_json(body).unwrap_err();
    assert!(matches!(err, AppError::CatalogUnavailable(_)));
    assert!(err.is_fatal());
}

#[test]
fn default_outside_catalog_is_rejected() {
    let mut body = catalog_json();
    body["defaults"]["variable"] = json!("pH");

    let err = from_json(body).unwrap_err();
    assert!(matches!(err, AppError::CatalogUnavailable(msg) if msg.contains("pH")));
}

#[test]
fn malformed_season_is_rejected() {
    let mut body = catalog_json();
    body["gseasonPeriods"]["Q4_Broken"] = json!(["13-01", "12-31"]);

    assert!(matches!(
        from_json(body),
        Err(AppError::CatalogUnavailable(_))
    ));
}

#[test]
fn seasons_keep_catalog_order_and_derive_labels() {
    let catalog = common::catalog();
    let codes: Vec<&str> = catalog
        .season_periods()
        .iter()
        .map(|s| s.code.as_str())
        .collect();
    assert_eq!(codes, ["Q1_Winter", "Q2_Early_Growing", "Q3_Peak_Harvest"]);

    assert_eq!(catalog.season("Q2_Early_Growing").unwrap().label, "Early Growing");
    assert_eq!(catalog.season_position("Q3_Peak_Harvest"), Some(2));
    assert_eq!(season_label_from_code("Winter"), "Winter");
}

#[test]
fn season_records_carry_their_own_label() {
    let mut body = catalog_json();
    body["gseasonPeriods"] = json!({
        "Q1_Winter": {"label": "Dormant", "start": "11-01", "end": "02-28"}
    });

    let catalog = from_json(body).unwrap();
    assert_eq!(catalog.season("Q1_Winter").unwrap().label, "Dormant");
}

#[test]
fn winter_wraps_into_previous_year() {
    let catalog = common::catalog();
    let winter = catalog.season("Q1_Winter").unwrap();
    let peak = catalog.season("Q3_Peak_Harvest").unwrap();

    assert!(winter.wraps_year());
    assert!(!peak.wraps_year());
    assert_eq!(winter.bounds(2024), (date(2023, 11, 1), date(2024, 2, 28)));

    assert!(winter.contains(date(2023, 12, 24), 2024));
    assert!(winter.contains(date(2024, 1, 15), 2024));
    assert!(!winter.contains(date(2024, 3, 1), 2024));
    assert!(peak.contains(date(2024, 10, 31), 2024));
    assert!(!peak.contains(date(2024, 11, 1), 2024));
}

#[test]
fn month_day_parsing() {
    assert_eq!(MonthDay::parse("02-29").map(|m| m.to_string()).as_deref(), Some("02-29"));
    assert!(MonthDay::parse("02-30").is_none());
    assert!(MonthDay::parse("garbage").is_none());
    // Feb 29 clamps in non-leap years
    assert_eq!(MonthDay::parse("02-29").unwrap().in_year(2023), date(2023, 2, 28));
}

#[tokio::test]
async fn load_is_idempotent() {
    let backend = ScriptedBackend::new();

    let first = OptionCatalog::load(&backend).await.unwrap();
    let second = OptionCatalog::load(&backend).await.unwrap();

    assert_eq!(backend.catalog_calls.load(Ordering::SeqCst), 2);
    assert_eq!(first.defaults(), second.defaults());
    assert_eq!(
        SelectionState::from_defaults(&first),
        SelectionState::from_defaults(&second)
    );
}

#[tokio::test]
async fn unreachable_backend_is_catalog_unavailable() {
    let backend = ScriptedBackend::new();
    backend.fail_catalog();

    let err = OptionCatalog::load(&backend).await.unwrap_err();
    assert!(matches!(err, AppError::CatalogUnavailable(_)));
}

#[tokio::test]
async fn failed_reload_leaves_selections_intact() {
    let backend = ScriptedBackend::new();
    let catalog = std::sync::Arc::new(OptionCatalog::load(&backend).await.unwrap());
    let store = SelectionStore::new(catalog);
    let before = store.get(Context::Main);

    backend.fail_catalog();
    tokio_test::assert_err!(OptionCatalog::load(&backend).await);

    assert_eq!(store.get(Context::Main), before);
}
