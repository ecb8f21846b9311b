//! Summary decoding, pair-group splitting and table presentation.
//!
//! Run with: cargo test --test summary_test

mod common;

use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use biochar_explorer::coordinator::{SummaryRequest, SummaryResult, SummarySink};
use biochar_explorer::error::AppError;
use biochar_explorer::selection::{Context, SelectionStore};
use biochar_explorer::summary::presenter::format_stat;
use biochar_explorer::summary::{
    PairGroup, Placeholder, RenderedTables, StatPair, StatValues, StatsTarget, SummaryPanel,
    SummaryPresenter, SummaryResponse, SummaryStats, TraceKey, split_pairs,
};
use common::{bucket, flat_stats, stats};

fn presenter() -> SummaryPresenter {
    SummaryPresenter::new(Arc::new(common::catalog()), 2)
}

fn request(variable: &str, granularity: &str) -> SummaryRequest {
    let store = SelectionStore::new(Arc::new(common::catalog()));
    let mut request = SummaryRequest::new(Context::Summary, 1, &store.get(Context::Summary));
    request.variable = variable.to_string();
    request.granularity = granularity.to_string();
    request
}

fn decode(body: serde_json::Value) -> Result<SummaryStats, AppError> {
    serde_json::from_value::<SummaryResponse>(body)
        .unwrap()
        .into_stats()
}

#[test]
fn ratio_entries_split_by_pair_group() {
    let ratio = bucket(&["VWC_S1_S2_T", "VWC_S3_S4_B"]);

    let split = split_pairs(&ratio);

    assert_eq!(split.s1_s2.keys().collect::<Vec<_>>(), ["VWC_S1_S2_T"]);
    assert_eq!(split.s3_s4.keys().collect::<Vec<_>>(), ["VWC_S3_S4_B"]);
    assert!(split.unmatched.is_empty());
}

#[test]
fn every_ratio_entry_lands_in_exactly_one_place() {
    let ratio = bucket(&[
        "VWC_1_ratio_S1_S2_T",
        "VWC_2_ratio_S1_S2_M",
        "VWC_1_ratio_S3_S4_B",
        "VWC_1_ratio_S2_S3_T",
    ]);

    let split = split_pairs(&ratio);

    assert_eq!(split.s1_s2.len(), 2);
    assert_eq!(split.s3_s4.len(), 1);
    assert_eq!(split.unmatched.len(), 1);
    assert_eq!(
        split.s1_s2.len() + split.s3_s4.len() + split.unmatched.len(),
        ratio.len()
    );
    assert!(split.s1_s2.keys().all(|k| !split.s3_s4.contains_key(k)));
}

#[test]
fn pair_group_lookup_prefers_first_group() {
    assert_eq!(PairGroup::of("X_S1_S2_S3_S4_T"), Some(PairGroup::S1S2));
    assert_eq!(PairGroup::of("VWC_S3_S4_T"), Some(PairGroup::S3S4));
    assert_eq!(PairGroup::of("VWC_S1_T"), None);
    assert_eq!(serde_json::to_value(PairGroup::S3S4).unwrap(), json!("3/4"));
}

#[test]
fn flat_summary_renders_three_tables_in_order() {
    let tables = presenter().present(&flat_stats(), "VWC");

    let RenderedTables::Flat { tables } = tables else {
        panic!("expected flat tables");
    };
    let headings: Vec<&str> = tables.iter().map(|t| t.heading.as_str()).collect();
    assert_eq!(headings, ["Raw Data", "Ratio S1/S2", "Ratio S3/S4"]);

    // BTreeMap order: M before T
    let raw = tables[0].rows();
    assert_eq!(raw.len(), 2);
    assert_eq!(raw[0].label, "Soil Moisture (Middle)");
    assert_eq!(raw[1].label, "Soil Moisture (Top)");

    assert_eq!(tables[1].rows()[0].label, "Soil Moisture S1/S2 (Top)");
    assert_eq!(tables[1].rows()[0].key, "VWC_1_ratio_S1_S2_T");
    assert_eq!(tables[2].rows()[0].key, "VWC_1_ratio_S3_S4_T");
}

#[test]
fn each_group_shows_its_own_entries() {
    let stats = SummaryStats::Flat {
        raw: bucket(&["VWC_1_raw_S1_T"]),
        ratio: BTreeMap::from([
            ("VWC_1_ratio_S1_S2_T".to_string(), stats(0.8, 0.9, 1.0, 0.1)),
            ("VWC_1_ratio_S3_S4_T".to_string(), stats(1.1, 1.2, 1.3, 0.05)),
        ]),
    };

    let rendered = presenter().present(&stats, "VWC");
    let tables = rendered.tables();

    assert_eq!(tables[1].rows()[0].mean, "0.90");
    assert_eq!(tables[2].rows()[0].mean, "1.20");
}

#[test]
fn temperature_ratios_get_explanatory_placeholder() {
    let stats = SummaryStats::Flat {
        raw: bucket(&["T_1_raw_S1_T"]),
        ratio: BTreeMap::new(),
    };

    let rendered = presenter().present(&stats, "T");
    let tables = rendered.tables();

    assert!(tables[0].placeholder().is_none());
    assert_eq!(tables[1].placeholder(), Some(Placeholder::RatioNotMeaningful));
    assert_eq!(tables[2].placeholder(), Some(Placeholder::RatioNotMeaningful));
    assert_eq!(
        Placeholder::RatioNotMeaningful.message(),
        "Ratio not meaningful for temperature"
    );
}

#[test]
fn empty_buckets_get_no_data_placeholder() {
    let stats = SummaryStats::Flat {
        raw: BTreeMap::new(),
        ratio: bucket(&["VWC_1_ratio_S1_S2_T"]),
    };

    let rendered = presenter().present(&stats, "VWC");
    let tables = rendered.tables();

    assert_eq!(tables[0].placeholder(), Some(Placeholder::NoData));
    assert_eq!(tables[1].rows().len(), 1);
    assert_eq!(tables[2].placeholder(), Some(Placeholder::NoData));
}

#[test]
fn seasons_follow_catalog_order_and_only_first_is_expanded() {
    let pair = StatPair {
        raw: bucket(&["VWC_1_raw_S1_T"]),
        ratio: bucket(&["VWC_1_ratio_S1_S2_T"]),
    };
    let seasons: BTreeMap<String, StatPair> = [
        "Q3_Peak_Harvest",
        "Z_Unknown",
        "Q1_Winter",
        "Q2_Early_Growing",
    ]
    .into_iter()
    .map(|code| (code.to_string(), pair.clone()))
    .collect();

    let rendered = presenter().present(&SummaryStats::Seasonal { seasons }, "VWC");

    let RenderedTables::Seasonal { sections } = &rendered else {
        panic!("expected seasonal tables");
    };
    let labels: Vec<&str> = sections.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, ["Winter", "Early Growing", "Peak Harvest", "Unknown"]);
    let expanded: Vec<bool> = sections.iter().map(|s| s.expanded).collect();
    assert_eq!(expanded, [true, false, false, false]);
    assert!(sections.iter().all(|s| s.tables.len() == 3));

    let text = rendered.to_string();
    assert!(text.starts_with("[-] Winter\n"));
    assert!(text.contains("[+] Peak Harvest"));
    assert_eq!(text.matches("Raw Data").count(), 1);
}

#[test]
fn season_without_data_still_renders_placeholders() {
    let seasons = BTreeMap::from([("Q1_Winter".to_string(), StatPair::default())]);

    let rendered = presenter().present(&SummaryStats::Seasonal { seasons }, "T");

    let tables = rendered.tables();
    assert_eq!(tables.len(), 3);
    assert_eq!(tables[0].placeholder(), Some(Placeholder::NoData));
    assert_eq!(tables[1].placeholder(), Some(Placeholder::RatioNotMeaningful));
}

#[test]
fn numbers_use_fixed_precision_and_na() {
    assert_eq!(format_stat(Some(0.23456), 2), "0.23");
    assert_eq!(format_stat(Some(12.0), 3), "12.000");
    assert_eq!(format_stat(None, 2), "NA");
    assert_eq!(format_stat(Some(f64::NAN), 2), "NA");

    let stats = SummaryStats::Flat {
        raw: BTreeMap::from([(
            "VWC_1_raw_S1_T".to_string(),
            StatValues {
                min: Some(0.1),
                mean: None,
                max: Some(f64::NAN),
                std: Some(0.012),
            },
        )]),
        ratio: BTreeMap::new(),
    };
    let rendered = presenter().present(&stats, "VWC");
    let row = &rendered.tables()[0].rows()[0];
    assert_eq!(
        (row.min.as_str(), row.mean.as_str(), row.max.as_str(), row.std.as_str()),
        ("0.10", "NA", "NA", "0.01")
    );
}

#[test]
fn flat_response_decodes() {
    let stats = decode(json!({
        "title": "Daily Summary",
        "raw_statistics": {
            "VWC_1_raw_S1_T": {"min": 0.1, "mean": "0.2", "max": "NaN", "std": null}
        },
        "ratio_statistics": {}
    }))
    .unwrap();

    let SummaryStats::Flat { raw, ratio } = &stats else {
        panic!("expected flat stats");
    };
    let values = raw["VWC_1_raw_S1_T"];
    assert_eq!(values.min, Some(0.1));
    assert_eq!(values.mean, Some(0.2));
    assert!(values.max.unwrap().is_nan());
    assert_eq!(values.std, None);
    assert!(ratio.is_empty());
    assert!(stats.has_stats(StatsTarget::Raw));
    assert!(!stats.has_stats(StatsTarget::Ratio));
}

#[test]
fn seasonal_response_decodes_with_empty_seasons() {
    let stats = decode(json!({
        "gseason_stats": {
            "Q1_Winter": {},
            "Q2_Early_Growing": {
                "raw_statistics": {"VWC_1_raw_S1_T": {"min": 1, "mean": 2, "max": 3, "std": 0.5}},
                "ratio_statistics": {}
            }
        }
    }))
    .unwrap();

    assert!(stats.is_seasonal());
    assert_eq!(stats.kind(), "seasonal");
    assert!(stats.has_stats(StatsTarget::Raw));
    assert!(!stats.has_stats(StatsTarget::Ratio));
    let SummaryStats::Seasonal { seasons } = stats else {
        panic!("expected seasonal stats");
    };
    assert_eq!(seasons["Q1_Winter"], StatPair::default());
}

#[test]
fn error_and_empty_bodies_are_backend_errors() {
    let err = decode(json!({"error": "No data found for the selected filters."})).unwrap_err();
    assert!(matches!(err, AppError::Backend(msg) if msg.starts_with("No data found")));

    assert!(matches!(decode(json!({})), Err(AppError::Backend(_))));
}

#[test]
fn archive_payload_shapes() {
    let flat = flat_stats();
    let raw = flat.payload(StatsTarget::Raw);
    assert!(raw.get("VWC_1_raw_S1_T").is_some());
    assert!(raw.get("VWC_1_ratio_S1_S2_T").is_none());

    let seasonal = SummaryStats::Seasonal {
        seasons: BTreeMap::from([(
            "Q1_Winter".to_string(),
            StatPair {
                raw: bucket(&["VWC_1_raw_S1_T"]),
                ratio: BTreeMap::new(),
            },
        )]),
    };
    let payload = seasonal.payload(StatsTarget::Ratio);
    assert!(payload["Q1_Winter"]["raw_statistics"]["VWC_1_raw_S1_T"].is_object());
    assert_eq!(payload["Q1_Winter"]["ratio_statistics"], json!({}));
}

#[test]
fn trace_keys_decode() {
    let raw = TraceKey::parse("VWC_1_raw_S1_T");
    assert_eq!(raw.variable, "VWC");
    assert_eq!(raw.depth.as_deref(), Some("1"));
    assert_eq!(raw.kind, Some(StatsTarget::Raw));
    assert_eq!(raw.strips, ["S1"]);
    assert_eq!(raw.logger, "T");

    let ratio = TraceKey::parse("VWC_2_ratio_S3_S4_B");
    assert_eq!(ratio.kind, Some(StatsTarget::Ratio));
    assert_eq!(ratio.strips_label(), "S3_S4");
    assert_eq!(ratio.depth.as_deref(), Some("2"));

    let short = TraceKey::parse("VWC_S1_S2_T");
    assert_eq!(short.variable, "VWC");
    assert_eq!(short.depth, None);
    assert_eq!(short.kind, Some(StatsTarget::Ratio));

    let underscored = TraceKey::parse("temp_soil_5cm_S2_M");
    assert_eq!(underscored.variable, "temp_soil_5cm");
    assert_eq!(underscored.kind, Some(StatsTarget::Raw));

    let bare = TraceKey::parse("EC_T");
    assert_eq!(bare.strips_label(), "unknown");
    assert_eq!(bare.kind, None);
}

#[test]
fn titles_use_catalog_labels() {
    let presenter = presenter();

    assert_eq!(
        presenter.title(&request("VWC", "daily")),
        "Daily Summary for Volumetric Water Content (%), Strip 1 (Biochar), 6 in, 2023"
    );
    assert_eq!(
        presenter.title(&request("EC", "gseason")),
        "Seasonal Summary for Electrical Conductivity, Strip 1 (Biochar), 6 in, 2023"
    );

    let mut odd_depth = request("VWC", "monthly");
    odd_depth.depth = "24".to_string();
    assert!(presenter.title(&odd_depth).contains(", 24 in, "));
}

#[test]
fn panel_replaces_content_wholesale() {
    let panel = SummaryPanel::new(presenter());
    assert!(panel.current().is_none());
    assert!(panel.last_result().is_none());

    panel.show_summary(&SummaryResult {
        seq: 1,
        request: request("VWC", "daily"),
        stats: flat_stats(),
    });
    let seasons = BTreeMap::from([("Q1_Winter".to_string(), StatPair::default())]);
    panel.show_summary(&SummaryResult {
        seq: 2,
        request: request("T", "gseason"),
        stats: SummaryStats::Seasonal { seasons },
    });

    let shown = panel.current().unwrap();
    assert_eq!(shown.result.seq, 2);
    assert!(shown.title.starts_with("Seasonal Summary for Temperature"));
    assert!(matches!(shown.tables, RenderedTables::Seasonal { .. }));
    assert!(shown.tables.tables().iter().all(|t| t.rows().is_empty()));
    assert_eq!(panel.last_result().unwrap().request.variable, "T");
}
