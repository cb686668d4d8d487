//! Hotplug detection over sysfs
//!
//! The Linux kernel exposes every video4linux node as a directory under
//! `/sys/class/video4linux/videoN`. The `device` entry links to the USB
//! interface, whose `uevent` carries a `PRODUCT=vid/pid/bcd` line (hex, no
//! padding). A node is reported when:
//!
//! - its USB ids match the requested [`CameraModel`], and
//! - it is the primary capture node (`index` is 0, or the file is absent).
//!
//! The monitor rescans the tree on an interval and emits the difference
//! between consecutive scans as [`DeviceEvent`]s. Attach is therefore seen up
//! to one poll interval (`camera.poll_interval_ms`, 500 ms by default) after
//! the kernel creates the node. Detach of the active camera is usually seen
//! sooner, as a `DeviceDetached` read error from the capture thread.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::CameraConfig;
use crate::error::MonitorError;
use crate::types::{CameraIdentity, CameraModel, DeviceEvent};

/// Directory device nodes live in
const DEV_ROOT: &str = "/dev";

/// Scan a video4linux sysfs tree for cameras of `model`
///
/// Results are sorted by device path. Entries that cannot be read are
/// skipped; only failure to list `root` itself is an error.
pub fn scan_devices(root: &Path, model: CameraModel) -> io::Result<Vec<CameraIdentity>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(root)? {
        let Ok(entry) = entry else { continue };
        let node = entry.path();
        let Some(name) = node.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
            continue;
        };
        if !name.starts_with("video") {
            continue;
        }
        if !is_primary_node(&node) {
            continue;
        }
        let Some((vendor_id, product_id)) = read_usb_ids(&node) else {
            continue;
        };
        if !model.matches_usb(vendor_id, product_id) {
            continue;
        }

        let mut identity =
            CameraIdentity::new(vendor_id, product_id, model, Path::new(DEV_ROOT).join(&name));
        identity.product_name = fs::read_to_string(node.join("name"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        found.push(identity);
    }
    found.sort_by(|a, b| a.device_path.cmp(&b.device_path));
    Ok(found)
}

fn is_primary_node(node: &Path) -> bool {
    match fs::read_to_string(node.join("index")) {
        Ok(index) => index.trim() == "0",
        Err(_) => true,
    }
}

fn read_usb_ids(node: &Path) -> Option<(u16, u16)> {
    let uevent = fs::read_to_string(node.join("device").join("uevent")).ok()?;
    uevent.lines().find_map(parse_product_line)
}

/// Parse `PRODUCT=9cb/4007/100` into (vendor, product)
fn parse_product_line(line: &str) -> Option<(u16, u16)> {
    let value = line.trim().strip_prefix("PRODUCT=")?;
    let mut parts = value.split('/');
    let vendor = u16::from_str_radix(parts.next()?, 16).ok()?;
    let product = u16::from_str_radix(parts.next()?, 16).ok()?;
    Some((vendor, product))
}

/// Events that turn scan `prev` into scan `next`
///
/// Detached events come first so a node that was replaced by a different
/// camera is released before the new one is announced. Within each kind,
/// events are in device-path order.
pub fn diff_scan(prev: &[CameraIdentity], next: &[CameraIdentity]) -> Vec<DeviceEvent> {
    let before: BTreeMap<&PathBuf, &CameraIdentity> =
        prev.iter().map(|id| (&id.device_path, id)).collect();
    let after: BTreeMap<&PathBuf, &CameraIdentity> =
        next.iter().map(|id| (&id.device_path, id)).collect();

    let mut events = Vec::new();
    for (path, old) in &before {
        match after.get(path) {
            Some(new) if new == old => {}
            _ => events.push(DeviceEvent::detached((*old).clone())),
        }
    }
    for (path, new) in &after {
        match before.get(path) {
            Some(old) if old == new => {}
            _ => events.push(DeviceEvent::attached((*new).clone())),
        }
    }
    events
}

/// Polling hotplug monitor
#[derive(Debug, Clone)]
pub struct SysfsMonitor {
    root: PathBuf,
    model: CameraModel,
    interval: Duration,
}

impl SysfsMonitor {
    pub fn new(root: impl Into<PathBuf>, model: CameraModel, interval: Duration) -> Self {
        Self {
            root: root.into(),
            model,
            interval,
        }
    }

    /// Build from the `[camera]` config section
    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(&config.sysfs_root, config.camera_type, config.poll_interval())
    }

    /// One scan of the tree
    pub fn scan(&self) -> io::Result<Vec<CameraIdentity>> {
        scan_devices(&self.root, self.model)
    }

    /// Start monitoring
    ///
    /// The first scan happens before this returns; if the tree cannot be read
    /// the monitor is unavailable and no thread is started. Cameras present at
    /// startup are reported as Attached events in device-path order, then the
    /// tree is rescanned every interval until the handle is stopped or the
    /// receiver goes away.
    pub fn spawn(self, events: Sender<DeviceEvent>) -> Result<MonitorHandle, MonitorError> {
        let initial = self.scan().map_err(|source| MonitorError::Unavailable {
            path: self.root.clone(),
            source,
        })?;
        tracing::info!(
            root = %self.root.display(),
            model = %self.model,
            cameras = initial.len(),
            "Device monitor started"
        );

        let root = self.root.clone();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = std::thread::Builder::new()
            .name("device-monitor".into())
            .spawn(move || {
                if !self.publish(&events, diff_scan(&[], &initial)) {
                    return;
                }
                let mut current = initial;

                loop {
                    match stop_rx.recv_timeout(self.interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    let next = match self.scan() {
                        Ok(next) => next,
                        Err(e) => {
                            tracing::warn!(root = %self.root.display(), "Rescan failed: {}", e);
                            continue;
                        }
                    };
                    if !self.publish(&events, diff_scan(&current, &next)) {
                        break;
                    }
                    current = next;
                }
                tracing::debug!("Device monitor stopped");
            })
            .map_err(|source| MonitorError::Unavailable { path: root, source })?;

        Ok(MonitorHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    fn publish(&self, events: &Sender<DeviceEvent>, batch: Vec<DeviceEvent>) -> bool {
        for event in batch {
            tracing::info!(
                kind = ?event.kind,
                device = %event.identity.device_path.display(),
                "Device event"
            );
            if events.send(event).is_err() {
                return false;
            }
        }
        true
    }
}

/// Handle to a running monitor; stops it on drop
#[derive(Debug)]
pub struct MonitorHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Stop the monitor and wait for its thread
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
