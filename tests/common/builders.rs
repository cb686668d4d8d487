//! Test data builders for configs and fake sysfs trees

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thermview::config::AppConfig;
use thermview::types::CameraModel;

/// Builder for an [`AppConfig`] tuned for fast tests
pub struct ConfigBuilder {
    config: AppConfig,
}

impl ConfigBuilder {
    pub fn new(camera_type: CameraModel) -> Self {
        let mut config = AppConfig::default();
        config.camera.camera_type = camera_type;
        config.camera.open_retry_delay_ms = 1;
        config.camera.poll_interval_ms = 20;
        Self { config }
    }

    pub fn malformed_frame_budget(mut self, budget: u32) -> Self {
        self.config.camera.malformed_frame_budget = budget;
        self
    }

    pub fn output_dir(mut self, dir: &Path) -> Self {
        self.config.recording.output_dir = dir.to_path_buf();
        self
    }

    pub fn queue_frames(mut self, frames: usize) -> Self {
        self.config.recording.queue_frames = frames;
        self
    }

    pub fn sysfs_root(mut self, root: &Path) -> Self {
        self.config.camera.sysfs_root = root.to_path_buf();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

/// A `/sys/class/video4linux` lookalike in a temp directory
pub struct FakeSysfs {
    dir: TempDir,
}

impl FakeSysfs {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Add `videoN` with the given USB ids, node index and product name
    pub fn add_node(&self, node: &str, vendor_id: u16, product_id: u16, index: u32, name: &str) -> PathBuf {
        let path = self.dir.path().join(node);
        fs::create_dir_all(path.join("device")).expect("create node");
        fs::write(path.join("index"), format!("{}\n", index)).expect("write index");
        fs::write(path.join("name"), format!("{}\n", name)).expect("write name");
        fs::write(
            path.join("device").join("uevent"),
            format!(
                "DEVTYPE=usb_interface\nDRIVER=uvcvideo\nPRODUCT={:x}/{:x}/100\nTYPE=239/2/1\n",
                vendor_id, product_id
            ),
        )
        .expect("write uevent");
        path
    }

    pub fn add_boson(&self, node: &str) -> PathBuf {
        self.add_node(node, 0x09cb, 0x4007, 0, "Boson: FLIR Video")
    }

    pub fn add_purethermal(&self, node: &str) -> PathBuf {
        self.add_node(node, 0x1e4e, 0x0100, 0, "PureThermal (fw:v1.3.0)")
    }

    pub fn remove_node(&self, node: &str) {
        fs::remove_dir_all(self.dir.path().join(node)).expect("remove node");
    }
}
