use std::collections::HashMap;

use super::{ConfigPatch, LoadSourceKind, SchedulerConfig};
use crate::error::SchedulerError;
use crate::types::PriorityWeights;

fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn empty_toml_yields_defaults() {
    let cfg: SchedulerConfig = toml::from_str("").unwrap();
    assert_eq!(cfg, SchedulerConfig::default());
    cfg.validate().unwrap();
}

#[test]
fn defaults() {
    let cfg = SchedulerConfig::default();
    assert_eq!(cfg.max_concurrent_tasks, 3);
    assert_eq!(cfg.tick_interval_ms, 1_000);
    assert_eq!(cfg.task_timeout_ms, 30_000);
    assert_eq!(cfg.batch_size, 2);
    assert!(cfg.cache_enabled);
    assert!(cfg.dedup_enabled);
    assert_eq!(cfg.fingerprint_window, 10);
    assert_eq!(cfg.priority_weights, PriorityWeights::default());
    assert_eq!(cfg.load_source, LoadSourceKind::Synthetic);
}

#[test]
fn parse_full_toml() {
    let toml = r#"
max_concurrent_tasks = 8
tick_interval_ms = 250
task_timeout_ms = 5000
cpu_threshold = 70.0
memory_threshold = 90.0
batch_size = 4
adaptive_batching = true
fast_execution_ms = 50
slow_execution_ms = 2000
cache_enabled = false
cache_ttl_ms = 1000
dedup_enabled = false
fingerprint_window = 20
max_queue_size = 50
load_source = "system"

[priority_weights]
high = 10
medium = 5
low = 1
"#;
    let cfg: SchedulerConfig = toml::from_str(toml).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.max_concurrent_tasks, 8);
    assert_eq!(cfg.tick_interval().as_millis(), 250);
    assert!(cfg.adaptive_batching);
    assert!(!cfg.cache_enabled);
    assert_eq!(cfg.fingerprint_window, 20);
    assert_eq!(cfg.priority_weights.high, 10);
    assert_eq!(cfg.load_source, LoadSourceKind::System);
    // Unspecified fields keep defaults.
    assert_eq!(cfg.metrics_interval_ms, 5_000);
}

#[test]
fn partial_weights_fill_defaults() {
    let cfg: SchedulerConfig = toml::from_str("[priority_weights]\nhigh = 9\n").unwrap();
    assert_eq!(cfg.priority_weights.high, 9);
    assert_eq!(cfg.priority_weights.medium, 2);
    assert_eq!(cfg.priority_weights.low, 1);
}

#[test]
fn malformed_toml_is_parse_error() {
    let err = SchedulerConfig::from_toml("max_concurrent_tasks = \"many\"").unwrap_err();
    assert!(matches!(err, SchedulerError::ConfigParse(_)));
}

#[test]
fn missing_file_is_io_error() {
    let err = SchedulerConfig::from_file("/nonexistent/scheduler.toml").unwrap_err();
    assert!(matches!(err, SchedulerError::ConfigIo(_)));
}

#[test]
fn env_overrides_apply() {
    let mut cfg = SchedulerConfig::default();
    cfg.apply_overrides(overrides(&[
        ("SCHEDULER_MAX_CONCURRENT_TASKS", "6"),
        ("SCHEDULER_CACHE_ENABLED", "false"),
        ("SCHEDULER_PRIORITY_WEIGHT_HIGH", "7"),
        ("SCHEDULER_LOAD_SOURCE", "System"),
    ]));
    assert_eq!(cfg.max_concurrent_tasks, 6);
    assert!(!cfg.cache_enabled);
    assert_eq!(cfg.priority_weights.high, 7);
    assert_eq!(cfg.load_source, LoadSourceKind::System);
}

#[test]
fn unparsable_env_override_is_ignored() {
    let mut cfg = SchedulerConfig::default();
    cfg.apply_overrides(overrides(&[("SCHEDULER_BATCH_SIZE", "lots")]));
    assert_eq!(cfg.batch_size, 2);
}

#[test]
fn zero_concurrency_is_rejected() {
    let cfg = SchedulerConfig {
        max_concurrent_tasks: 0,
        ..Default::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("max_concurrent_tasks"));
}

#[test]
fn threshold_out_of_range_is_rejected() {
    let cfg = SchedulerConfig {
        cpu_threshold: 120.0,
        ..Default::default()
    };
    assert!(cfg.validate().is_err());

    let cfg = SchedulerConfig {
        memory_threshold: 0.0,
        ..Default::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn unordered_weights_are_rejected() {
    let cfg = SchedulerConfig {
        priority_weights: PriorityWeights { high: 2, medium: 2, low: 1 },
        ..Default::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn inverted_execution_bands_are_rejected() {
    let cfg = SchedulerConfig {
        fast_execution_ms: 10_000,
        slow_execution_ms: 100,
        ..Default::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn patch_merges_only_given_fields() {
    let base = SchedulerConfig::default();
    let patch = ConfigPatch {
        batch_size: Some(5),
        cache_ttl_ms: Some(10),
        ..Default::default()
    };
    let next = base.merged(&patch).unwrap();
    assert_eq!(next.batch_size, 5);
    assert_eq!(next.cache_ttl_ms, 10);
    assert_eq!(next.max_concurrent_tasks, base.max_concurrent_tasks);
}

#[test]
fn invalid_patch_leaves_base_untouched() {
    let base = SchedulerConfig::default();
    let patch = ConfigPatch {
        max_concurrent_tasks: Some(0),
        ..Default::default()
    };
    assert!(base.merged(&patch).is_err());
    assert_eq!(base, SchedulerConfig::default());
}

#[test]
fn patch_parses_from_toml() {
    let patch: ConfigPatch = toml::from_str("batch_size = 3\ndedup_enabled = false\n").unwrap();
    assert_eq!(patch.batch_size, Some(3));
    assert_eq!(patch.dedup_enabled, Some(false));
    assert_eq!(patch.max_concurrent_tasks, None);
}
