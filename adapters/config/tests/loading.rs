use std::{fs, time::Duration};

use adaptive_arena_config::{AdaptationConfig, RuleOverrides, StrategyKind};
use adaptive_arena_core::{Archetype, WeightBounds};

#[test]
fn config_file_is_loaded_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("arena.toml");
    fs::write(
        &path,
        "sim_count_normal = 12\nbatch_timeout_ms = 1500\nstrategy = \"evolution\"\n",
    )
    .expect("write config");

    let config = AdaptationConfig::load_or_default(Some(&path));
    assert_eq!(config.sim_count_normal, 12);
    assert_eq!(config.batch_timeout(), Some(Duration::from_millis(1500)));
    assert_eq!(config.strategy, StrategyKind::Evolution);
}

#[test]
fn missing_or_invalid_files_fall_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    assert_eq!(
        AdaptationConfig::load_or_default(Some(&missing)),
        AdaptationConfig::default()
    );

    let invalid = dir.path().join("invalid.toml");
    fs::write(&invalid, "mutation_rate = 4.0").expect("write config");
    assert!(AdaptationConfig::load(&invalid).is_err());
    assert_eq!(
        AdaptationConfig::load_or_default(Some(&invalid)),
        AdaptationConfig::default()
    );
    assert_eq!(AdaptationConfig::load_or_default(None), AdaptationConfig::default());
}

#[test]
fn overrides_are_read_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("rules.json");
    fs::write(
        &path,
        r#"{"Boss": {"rules": [{"name": "AreaDeny", "weight": 1.5}]}}"#,
    )
    .expect("write overrides");

    let overrides = RuleOverrides::load(Some(&path), 16, WeightBounds::default());
    assert_eq!(overrides.rules_for(Archetype::Boss).len(), 1);
    assert!(RuleOverrides::load(Some(&dir.path().join("none.json")), 16, WeightBounds::default())
        .is_empty());
}
