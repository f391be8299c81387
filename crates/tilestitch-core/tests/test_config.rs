use tilestitch_core::aggregate::AggregationAction;
use tilestitch_core::pipeline::config::{
    CombineStrategy, FixedViews, PairwiseStitchingParameters, StitchingConfig,
};
use tilestitch_core::session::GroupingChoice;
use tilestitch_core::view::{AttributeValue, ViewId};

#[test]
fn test_default_config_round_trips() {
    let config = StitchingConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    let back: StitchingConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config, back);
}

#[test]
fn test_default_grouping_compares_tiles_across_channels() {
    let config = StitchingConfig::default();
    assert_eq!(config.grouping.channel, GroupingChoice::Group);
    assert_eq!(config.grouping.tile, GroupingChoice::Compare);
    assert_eq!(config.grouping.timepoint, GroupingChoice::TreatIndividually);
    assert_eq!(config.combine, CombineStrategy::Average);
    assert_eq!(config.fixed, FixedViews::First);
    assert_eq!(config.downsample, vec![1, 1, 1]);
}

#[test]
fn test_partial_config_fills_defaults() {
    let json = r#"{
        "pairwise": { "min_correlation": 0.6, "max_shift": [10.0, 10.0] },
        "grouping": { "tile": "compare", "channel": "treat-individually" },
        "aggregation": { "channel": { "pick-specific": { "id": 1 } } },
        "fixed": { "views": [ { "timepoint": 0, "setup": 3 } ] }
    }"#;
    let config: StitchingConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.pairwise.min_correlation, 0.6);
    assert_eq!(
        config.pairwise.peaks_to_check,
        PairwiseStitchingParameters::default().peaks_to_check
    );
    assert_eq!(config.grouping.channel, GroupingChoice::TreatIndividually);
    // Attributes missing from a given grouping table fall back to treat individually
    assert_eq!(config.grouping.angle, GroupingChoice::TreatIndividually);
    assert_eq!(
        config.aggregation.channel,
        Some(AggregationAction::PickSpecific(AttributeValue::new(1)))
    );
    assert_eq!(config.fixed, FixedViews::Views(vec![ViewId::new(0, 3)]));
    assert_eq!(config.global.max_iterations, 10_000);
}

#[test]
fn test_unknown_grouping_choice_is_rejected() {
    let json = r#"{ "grouping": { "tile": "merge" } }"#;
    assert!(serde_json::from_str::<StitchingConfig>(json).is_err());
}
