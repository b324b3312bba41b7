//! Configuration files and overrides as seen by a running registry.

mod common;

use common::{MAIN, MAIN_NATIVE, spawn_registry};
use par_global_menu::config::{ENV_PREFIX, MirrorConfig, TraceConfig};
use par_global_menu::{EventKind, RecordingOptions};
use std::fs;

#[test]
fn test_config_defaults() {
    let config = MirrorConfig::default();
    assert!(config.enabled);
    assert!(config.suppress_fake_segments);
    assert!(!config.disable_event_filtering);
    assert_eq!(config.fill_debounce_ms, 1500);
    assert_eq!(config.clear_delay_ms, 2000);
    assert_eq!(config.filter_idle_ms, 50);
    assert_eq!(config.filter_timeout_ms, 2000);
    assert_eq!(config.root_depth(), 2);
    assert_eq!(config.fill_depth(), 2);
    assert!(!config.trace.any());
}

#[test]
fn test_config_yaml_file_drives_registry() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        "disable_root_prefill: true\ndisable_event_filtering: true\ntrace:\n  sync_stats: true\n",
    )?;
    let config = MirrorConfig::load_from(&path)?;
    assert_eq!(config.root_depth(), 1);
    assert!(config.trace.sync_stats);

    let mut running = spawn_registry(config, RecordingOptions::default());
    running.bind_main();
    assert!(running.wait_for(|host, probe| {
        host.is_presented(MAIN) && probe.root_labels(MAIN_NATIVE) == ["File", "Edit", "View"]
    }));
    assert!(running.probe.labels_at(MAIN_NATIVE, &["File"]).is_empty());

    assert!(running.probe.emit_at(MAIN_NATIVE, &["File"], EventKind::AboutToShow));
    assert!(running.wait_for(|_, probe| {
        probe.labels_at(MAIN_NATIVE, &["File"]) == ["Open", "Recent", "-", "Quit"]
    }));
    Ok(())
}

#[test]
fn test_config_save_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("config.yaml");
    let config = MirrorConfig {
        skip_open_fill: true,
        host_wait_ms: 250,
        ..MirrorConfig::default()
    }
    .with_trace(TraceConfig::all());
    config.save_to(&path)?;
    assert_eq!(MirrorConfig::load_from(&path)?, config);
    Ok(())
}

#[test]
fn test_config_overrides_disable_feature() -> anyhow::Result<()> {
    let mut config = MirrorConfig::default();
    config.apply_overrides([(format!("{}ENABLED", ENV_PREFIX), "false")])?;
    assert!(!config.enabled);

    let mut running = spawn_registry(config, RecordingOptions::default());
    assert!(running.bind_main());
    running.settle(std::time::Duration::from_millis(100));
    assert!(running.probe.window(MAIN_NATIVE).is_none());
    Ok(())
}
