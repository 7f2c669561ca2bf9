//! Integration tests for the `run` command.
use pvbess::cli::{OutputOpts, handle_run_command};
use pvbess::settings::Settings;
use pvbess::simulation::Scenario;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("PVBESS_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = OutputOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
    };
    let scenario = Scenario::new(500.0, 2.0).unwrap();
    handle_run_command(&get_model_dir(), &scenario, &opts, Some(Settings::default())).unwrap();

    // Three days of hours for each of the two years simulated, plus the header
    let allocation = fs::read_to_string(output_dir.join("hourly_allocation.csv")).unwrap();
    assert_eq!(allocation.lines().count(), 1 + 2 * 72);
    assert!(allocation.starts_with("Year,HourOfYear,GasUsage"));

    let costs = fs::read_to_string(output_dir.join("cost_breakdown.csv")).unwrap();
    assert_eq!(costs.lines().count(), 3);
    assert!(output_dir.join("metadata.toml").is_file());

    // Running again into the same folder needs permission to overwrite
    assert!(
        handle_run_command(&get_model_dir(), &scenario, &opts, Some(Settings::default())).is_err()
    );
    let opts = OutputOpts {
        overwrite: true,
        ..opts
    };
    handle_run_command(&get_model_dir(), &scenario, &opts, Some(Settings::default())).unwrap();
}
