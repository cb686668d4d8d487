//! Integration tests for configuration files and command-line overrides

mod common;

use std::path::{Path, PathBuf};
use thermview::colormap::LutName;
use thermview::config::AppConfig;
use thermview::error::ConfigError;
use thermview::types::CameraModel;

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = AppConfig::default();
    config.camera.camera_type = CameraModel::Lepton3;
    config.colormap.default_lut = LutName::IsothermBlue;
    config.colormap.isotherm_band_start = 0.5;
    config.colormap.isotherm_band_end = 0.75;
    config.recording.fps = Some(8.5);
    config.recording.output_dir = PathBuf::from("/var/lib/thermview");
    config.logging.log_dir = Some(PathBuf::from("/var/log/thermview"));

    config.save(&path).unwrap();
    let loaded = AppConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_file_values_with_cli_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[camera]
camera_type = "LEPTON2"

[colormap]
default_lut = "BLACKHOT"
"#,
    )
    .unwrap();

    let mut config = AppConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.camera.camera_type, CameraModel::Lepton2);
    assert_eq!(config.colormap.default_lut, LutName::BlackHot);

    config
        .apply_overrides(Some("viridis"), Some("BOSON"), Some(Path::new("/tmp/rec")))
        .unwrap();
    assert_eq!(config.camera.camera_type, CameraModel::Boson);
    assert_eq!(config.colormap.default_lut, LutName::Viridis);
    assert_eq!(config.recording.output_dir, PathBuf::from("/tmp/rec"));
}

#[test]
fn test_bad_cli_values_are_config_errors() {
    let mut config = AppConfig::default();
    assert!(matches!(
        config.apply_overrides(Some("SEPIA"), None, None),
        Err(ConfigError::UnknownLut(name)) if name == "SEPIA"
    ));
    assert!(matches!(
        config.apply_overrides(None, Some("LEPTON4"), None),
        Err(ConfigError::UnknownCameraType(_))
    ));
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_out_of_range_values_rejected() {
    let cases = [
        "[colormap]\nisotherm_band_start = 0.9\nisotherm_band_end = 0.1\n",
        "[colormap]\nisotherm_band_end = 1.5\n",
        "[colormap]\nbit_depth = 0\n",
        "[recording]\nfps = 0.0\n",
        "[recording]\nqueue_frames = 0\n",
        "[camera]\nopen_retries = 0\n",
    ];
    for text in cases {
        assert!(
            matches!(AppConfig::from_toml(text), Err(ConfigError::Invalid(_))),
            "accepted: {}",
            text
        );
    }
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = AppConfig::load_or_default(Some(&dir.path().join("absent.toml")));
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}
