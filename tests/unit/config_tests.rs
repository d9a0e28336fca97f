//! Unit tests for benchmark configuration parsing and validation.

use std::time::Duration;

use coslowdown::config::BenchConfig;
use coslowdown::mode::LaunchMode;
use coslowdown::AppError;

fn sample_toml() -> String {
    r#"
min_runs = 5
variance_tolerance = 0.001
threads = "4"
launch_mode = "unikernel"
cpu_sets = ["0-3", "4-7"]
output_dir = "results"
iteration_timeout_seconds = 600

[cache]
enabled = true
resctrl_root = "/sys/fs/resctrl"
cache_id = 1
masks = [0x0f, 0xf0]

[[workload]]
name = "stream"
command = "./stream"

[[workload]]
name = "lu"
command = "./lu.A.x"
"#
    .to_owned()
}

fn minimal_toml() -> String {
    r#"
cpu_sets = ["0", "1"]

[[workload]]
name = "sleep"
command = "sleep 1"
"#
    .to_owned()
}

#[test]
fn parses_valid_config() {
    let config = BenchConfig::from_toml_str(&sample_toml()).expect("config parses");

    assert_eq!(config.min_runs, 5);
    assert!((config.variance_tolerance - 0.001).abs() < f64::EPSILON);
    assert_eq!(config.threads, "4");
    assert_eq!(config.launch_mode, LaunchMode::Unikernel);
    assert_eq!(config.cpu_sets, vec!["0-3", "4-7"]);
    assert_eq!(config.workloads.len(), 2);
    assert_eq!(config.cache.masks, vec![0x0f, 0xf0]);
    assert_eq!(config.cache.cache_id, 1);
    assert_eq!(config.iteration_timeout(), Some(Duration::from_secs(600)));
}

#[test]
fn applies_defaults() {
    let config = BenchConfig::from_toml_str(&minimal_toml()).expect("config parses");

    assert_eq!(config.min_runs, 10);
    assert!((config.variance_tolerance - 0.0001).abs() < f64::EPSILON);
    assert_eq!(config.threads, "1");
    assert_eq!(config.launch_mode, LaunchMode::Native);
    assert_eq!(config.output_dir, std::path::PathBuf::from("."));
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.cache_id, 0);
    assert_eq!(config.iteration_timeout(), None, "0 seconds means unbounded");
}

#[test]
fn rejects_zero_min_runs() {
    let toml = format!("min_runs = 0\n{}", minimal_toml());
    let err = BenchConfig::from_toml_str(&toml).expect_err("must reject");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("min_runs")));
}

#[test]
fn rejects_negative_tolerance() {
    let toml = format!("variance_tolerance = -1.0\n{}", minimal_toml());
    assert!(BenchConfig::from_toml_str(&toml).is_err());
}

#[test]
fn rejects_wrong_cpu_set_count() {
    let toml = r#"
cpu_sets = ["0"]

[[workload]]
name = "a"
command = "true"
"#;
    let err = BenchConfig::from_toml_str(toml).expect_err("must reject");
    assert!(err.to_string().contains("cpu_sets"));
}

#[test]
fn rejects_missing_workloads() {
    let err = BenchConfig::from_toml_str("cpu_sets = [\"0\", \"1\"]\n").expect_err("must reject");
    assert!(err.to_string().contains("workload"));
}

#[test]
fn rejects_duplicate_workload_names() {
    let toml = format!(
        "{}\n[[workload]]\nname = \"sleep\"\ncommand = \"sleep 2\"\n",
        minimal_toml()
    );
    let err = BenchConfig::from_toml_str(&toml).expect_err("must reject");
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn rejects_zero_mask_when_cache_enabled() {
    let toml = format!("{}\n[cache]\nenabled = true\nmasks = [0x0f, 0]\n", minimal_toml());
    let err = BenchConfig::from_toml_str(&toml).expect_err("must reject");
    assert!(err.to_string().contains("cache.masks"));
}

#[test]
fn rejects_invalid_toml() {
    let err = BenchConfig::from_toml_str("cpu_sets = [").expect_err("must reject");
    assert!(err.to_string().starts_with("config:"));
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("coslowdown.toml");
    std::fs::write(&path, minimal_toml()).expect("write config");

    let config = BenchConfig::load_from_path(&path).expect("config loads");
    assert_eq!(config.workloads[0].name, "sleep");
}

#[test]
fn load_from_missing_path_is_config_error() {
    let err = BenchConfig::load_from_path("/nonexistent/coslowdown.toml").expect_err("missing");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn solo_session_uses_first_cpu_set_and_first_mask() {
    let config = BenchConfig::from_toml_str(&sample_toml()).expect("config parses");
    let session = config.solo_session(1).expect("session");

    assert_eq!(session.workloads().len(), 1);
    let workload = &session.workloads()[0];
    assert_eq!(workload.command, "./lu.A.x");
    assert_eq!(workload.cpu_set, "0-3");
    assert_eq!(workload.cache_mask, 0x0f);
    assert_eq!(session.min_iterations(), 5);
    assert_eq!(session.iteration_timeout(), Some(Duration::from_secs(600)));
}

#[test]
fn pair_session_assigns_cpu_sets_in_order() {
    let config = BenchConfig::from_toml_str(&sample_toml()).expect("config parses");
    let session = config.pair_session(0, 1).expect("session");

    assert_eq!(session.label(), "stream-lu");
    assert_eq!(session.workloads()[0].cpu_set, "0-3");
    assert_eq!(session.workloads()[1].cpu_set, "4-7");
    assert_eq!(session.workloads()[1].cache_mask, 0xf0);
    assert!(session.wants_cache_partitioning());
}

#[test]
fn masks_are_ignored_when_cache_disabled() {
    let toml = sample_toml().replace("enabled = true", "enabled = false");
    let config = BenchConfig::from_toml_str(&toml).expect("config parses");
    let session = config.pair_session(0, 1).expect("session");
    assert!(session.workloads().iter().all(|w| w.cache_mask == 0));
    assert!(!session.wants_cache_partitioning());
}

#[test]
fn pairs_include_self_pairs() {
    let config = BenchConfig::from_toml_str(&sample_toml()).expect("config parses");
    assert_eq!(config.pairs(), vec![(0, 0), (0, 1), (1, 1)]);
}

#[test]
fn out_of_range_workload_is_rejected() {
    let config = BenchConfig::from_toml_str(&minimal_toml()).expect("config parses");
    assert!(config.solo_session(3).is_err());
    assert!(config.pair_session(0, 3).is_err());
}
