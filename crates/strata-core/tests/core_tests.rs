//! Integration tests for strata-core: representations, levels, tower growth

use strata_core::*;

fn chars(text: &str) -> Vec<char> {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn feed<S: Symbol>(level: &mut Level<S>, symbols: &[S]) -> Vec<Step> {
    symbols
        .windows(2)
        .map(|w| level.update(&w[0], &w[1], 1).unwrap())
        .collect()
}

fn prose() -> Vec<char> {
    "the quick brown fox jumps over the lazy dog while the cat watches from the \
     window and the rain keeps falling on the roof of the old barn near the river"
        .repeat(6)
        .chars()
        .collect()
}

/// Every structural invariant that must hold between updates, checked down
/// the whole tower.
fn assert_invariants<S: Symbol>(level: &Level<S>) {
    let pool = level.predictors();
    assert!(!pool.is_empty());
    assert!(level.active_shape() < pool.len());
    for (i, rep) in pool.iter().enumerate() {
        assert_eq!(rep.shape(), i, "shape ids must follow insertion order");
        for (_, _, info) in rep.entries() {
            assert!(info.frequency >= 1);
            assert!(info.total_sub_frequencies >= info.frequency);
            let product = info.average_duration * info.frequency as f64;
            assert!((product - info.total_sub_frequencies as f64).abs() < 1e-6);
        }
    }
    if let Some(parent) = level.parent() {
        assert_eq!(parent.level(), level.level() + 1);
        assert_invariants(parent);
    }
}

// ===========================================================================
// Representation
// ===========================================================================

#[test]
fn representation_monotone_frequency() {
    let mut rep = Representation::new(0);
    rep.record(&"a", &"b", 2).unwrap();
    let before_total = rep.total_sub_frequencies(&"a", &"b");
    let before_freq = rep.frequency(&"a", &"b");
    rep.record(&"a", &"b", 5).unwrap();
    assert_eq!(rep.total_sub_frequencies(&"a", &"b"), before_total + 5);
    assert_eq!(rep.frequency(&"a", &"b"), before_freq + 1);
}

#[test]
fn representation_unknown_effect_scores_zero_not_no_information() {
    let mut rep = Representation::new(0);
    rep.record(&1u32, &2u32, 1).unwrap();
    assert_eq!(rep.max_scaled_fit(&1, &9), 0.0);
    assert_eq!(rep.prop_scaled_fit(&1, &9), 0.0);
    assert_eq!(rep.strict_fit(&1, &9), 0.0);
    assert_eq!(rep.strict_fit(&9, &9), -1.0);
}

#[test]
fn representation_likelihood_over_itself_is_positive() {
    let mut rep = Representation::new(0);
    for w in chars("abcabc").windows(2) {
        rep.record(&w[0], &w[1], 1).unwrap();
    }
    assert_eq!(rep.max_scaled_likelihood(&rep, false), 1.0);
    assert_eq!(rep.prop_scaled_likelihood(&rep, false), 1.0);
}

// ===========================================================================
// Level — laws
// ===========================================================================

#[test]
fn prediction_is_idempotent() {
    let mut level = Level::new(LevelConfig::new(0.1));
    feed(&mut level, &prose());
    let first = level.predict(&'t', None);
    let second = level.predict(&'t', None);
    assert_eq!(first, second);
}

#[test]
fn absorbed_update_increases_active_counts() {
    let mut level = Level::new(LevelConfig::new(0.1));
    feed(&mut level, &chars("abab"));
    let shape = level.active_shape();
    let before = level.active().total_sub_frequencies(&'a', &'b');
    let freq = level.active().frequency(&'a', &'b');
    assert_eq!(level.update(&'a', &'b', 3).unwrap(), Step::Absorbed);
    assert_eq!(level.active_shape(), shape);
    assert_eq!(level.active().total_sub_frequencies(&'a', &'b'), before + 3);
    assert_eq!(level.active().frequency(&'a', &'b'), freq + 1);
}

#[test]
fn open_world_unknown_cause_does_not_break_down() {
    let mut level = Level::new(LevelConfig::new(0.5).open_world(true));
    feed(&mut level, &chars("abab"));
    assert_eq!(level.update(&'q', &'r', 1).unwrap(), Step::Absorbed);
}

#[test]
fn closed_world_first_observation_breaks_down() {
    let mut level = Level::new(LevelConfig::new(0.1).open_world(false));
    let step = level.update(&'x', &'y', 1).unwrap();
    assert!(step.is_breakdown());
}

#[test]
fn invariants_hold_after_every_update() {
    let mut level = Level::new(LevelConfig::new(0.2));
    let text = prose();
    for w in text.windows(2) {
        level.update(&w[0], &w[1], 1).unwrap();
        assert_invariants(&level);
    }
    assert!(level.shape()[0] >= 2);
}

#[test]
fn runs_are_deterministic() {
    let text = prose();
    let run = || {
        let mut level = Level::new(LevelConfig::new(0.05));
        text.windows(2)
            .map(|w| {
                level.update(&w[0], &w[1], 1).unwrap();
                (level.snapshot(), level.predict(&w[1], None))
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn leaf_durations_are_counted_in_parent() {
    let mut level = Level::new(LevelConfig::new(0.1));
    feed(&mut level, &prose());
    let parent = level.parent().expect("prose should break down at least once");
    let recorded: u64 = parent
        .predictors()
        .iter()
        .flat_map(|rep| rep.entries().map(|(_, _, info)| info.total_sub_frequencies))
        .sum();
    let switches: u64 = parent.predictors().iter().map(|rep| rep.size()).sum();
    assert!(recorded >= switches);
    assert!(switches >= 1);
}

// ===========================================================================
// Level — boundary behaviors
// ===========================================================================

#[test]
fn frozen_zero_threshold_is_single_first_order_model() {
    for open_world in [true, false] {
        let config = LevelConfig::new(0.0).frozen(true).open_world(open_world);
        let mut level = Level::new(config);
        let steps = feed(&mut level, &prose());
        assert!(steps.iter().all(|s| *s == Step::Absorbed));
        assert_eq!(level.shape(), vec![1]);
        assert_eq!(level.breakdowns(), 0);
        assert!(level.parent().is_none());
    }
}

#[test]
fn frozen_never_grows_pool() {
    let mut level = Level::build(&[3], LevelConfig::new(0.5).frozen(true)).unwrap();
    for w in prose().windows(2) {
        level.update(&w[0], &w[1], 1).unwrap();
        assert_eq!(level.predictors().len(), 3);
    }
}

#[test]
fn threshold_one_switches_on_non_argmax() {
    let mut level = Level::new(LevelConfig::new(1.0));
    feed(&mut level, &chars("aa"));
    let step = level.update(&'a', &'b', 1).unwrap();
    let breakdown = step.breakdown().copied().expect("non-argmax must break down");
    assert!(breakdown.switched());

    let mut level = Level::new(LevelConfig::new(1.0));
    feed(&mut level, &chars("aa"));
    assert_eq!(level.update(&'a', &'a', 1).unwrap(), Step::Absorbed);
}

// ===========================================================================
// End-to-end scenarios
// ===========================================================================

#[test]
fn alternating_stream_keeps_one_representation() {
    let mut level = Level::new(LevelConfig::new(0.1).open_world(true));
    let steps = feed(&mut level, &chars("a b a b a b a b"));
    assert!(steps.iter().all(|s| !s.is_breakdown()));
    assert_eq!(level.state(), vec![0]);
    assert_eq!(level.shape(), vec![1]);
    assert_eq!(level.predict(&'a', None), Some('b'));
    assert_eq!(level.predict(&'b', None), Some('a'));
}

#[test]
fn regime_change_creates_parent_with_duration() {
    let mut level = Level::new(LevelConfig::new(0.1));
    let steps = feed(&mut level, &chars("aaaaaaaabbbbbbbb"));
    let breakdowns: Vec<_> = steps.iter().filter_map(|s| s.breakdown()).collect();
    assert_eq!(breakdowns.len(), 1);
    assert_eq!(breakdowns[0].resolution, Resolution::Minted);

    assert_eq!(level.shape(), vec![2, 1]);
    assert_eq!(level.state(), vec![1, 0]);
    let parent = level.parent().unwrap();
    assert_eq!(parent.level(), 1);
    let info = parent.active().transition(&0, &1).copied().unwrap();
    assert_eq!(info.frequency, 1);
    assert_eq!(info.total_sub_frequencies, 8);
    assert_eq!(info.average_duration, 8.0);
}

#[test]
fn prebuilt_tower_layout() {
    let level: Level<char> = Level::build(&[5, 3], LevelConfig::new(0.1).frozen(true)).unwrap();
    assert_eq!(level.predictors().len(), 5);
    assert!(level.predictors().iter().all(|r| r.is_empty()));
    let parent = level.parent().unwrap();
    assert_eq!(parent.predictors().len(), 3);
    assert!(parent.parent().is_none());
    assert_eq!(level.state(), vec![0, 0]);
    assert_eq!(level.shape(), vec![5, 3]);
    assert_eq!(level.depth(), 2);
}

#[test]
fn reentrant_regimes_reuse_representations() {
    let mut level = Level::new(LevelConfig::new(0.1));
    let steps = feed(&mut level, &chars("a b a b c d c d a b a b c d c d"));

    let resolutions: Vec<_> = steps
        .iter()
        .filter_map(|s| s.breakdown())
        .map(|b| b.resolution)
        .collect();
    assert_eq!(
        resolutions,
        vec![Resolution::Minted, Resolution::Adopted, Resolution::Expected]
    );

    assert_eq!(level.shape(), vec![2, 1]);
    assert_eq!(level.state(), vec![1, 0]);
    let parent = level.parent().unwrap();
    assert_eq!(parent.predict(&0, None), Some(1));
    assert_eq!(parent.predict(&1, None), Some(0));
}

#[test]
fn joint_strategy_reuses_representations() {
    let config = LevelConfig::new(0.1).strategy(SwitchStrategy::Joint);
    let mut level = Level::new(config);
    let steps = feed(&mut level, &chars("a b a b c d c d a b a b c d c d"));

    let resolutions: Vec<_> = steps
        .iter()
        .filter_map(|s| s.breakdown())
        .map(|b| b.resolution)
        .collect();
    assert_eq!(
        resolutions,
        vec![Resolution::Minted, Resolution::Joint, Resolution::Joint]
    );
    assert_eq!(level.shape(), vec![2, 1]);
    assert_eq!(level.state(), vec![1, 0]);
}

#[test]
fn closed_world_single_observation() {
    let mut level = Level::new(LevelConfig::new(0.1).open_world(false));
    let step = level.update(&'x', &'y', 1).unwrap();
    assert_eq!(step.breakdown().unwrap().resolution, Resolution::Retained);
    assert_eq!(level.predictors().len(), 1);
    assert_eq!(level.state(), vec![0]);
    assert_eq!(level.predict(&'x', None), Some('y'));
}

// ===========================================================================
// Config files
// ===========================================================================

#[test]
fn level_config_loads_from_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("level.toml");
    std::fs::write(&path, "threshold = 0.3\nfrozen = true\nopen_world = false\n").unwrap();
    let config = LevelConfig::load(&path).unwrap();
    assert_eq!(config.threshold, 0.3);
    assert!(config.frozen);
    assert!(!config.open_world);
}

#[test]
fn level_config_load_reports_errors() {
    let tmp = tempfile::TempDir::new().unwrap();
    assert!(matches!(
        LevelConfig::load(&tmp.path().join("missing.toml")),
        Err(Error::IoError(_))
    ));
    let path = tmp.path().join("bad.toml");
    std::fs::write(&path, "threshold = 7.0\n").unwrap();
    assert!(matches!(
        LevelConfig::load(&path),
        Err(Error::InvalidThreshold { .. })
    ));
}

#[test]
fn snapshot_serializes() {
    let mut level = Level::new(LevelConfig::new(0.1));
    feed(&mut level, &chars("aaaabbbb"));
    let json = serde_json::to_string(&level.snapshot()).unwrap();
    assert_eq!(json, r#"{"state":[1,0],"shape":[2,1]}"#);
}
