//! Thermal Viewer - Main Entry Point
//!
//! Opens the first attached thermal camera of the requested type and shows it
//! through a false-color LUT.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use thermview::{
    camera::{SyntheticBackend, SysfsMonitor},
    config::{AppConfig, LoggingConfig},
    error::{ResultExt, ThermviewError},
    frontend::ThermviewApp,
    pipeline::{FrameSlot, PipelineBuilder},
    types::DeviceEvent,
};

#[derive(Parser, Debug)]
#[command(name = "thermview", version, about = "Live false-color viewer for USB thermal cameras")]
struct Cli {
    /// Color LUT, e.g. REDHOT, WHITEHOT, VIRIDIS, ISOTHERM_RED [default: REDHOT]
    lut: Option<String>,

    /// Camera type: BOSON, LEPTON3 or LEPTON2 [default: BOSON]
    #[arg(long = "camera_type", value_name = "TYPE")]
    camera_type: Option<String>,

    /// Config file (default: <config dir>/thermview/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Use a generated test pattern instead of a real camera
    #[arg(long)]
    synthetic: bool,

    /// Directory recordings are written to
    #[arg(long, value_name = "DIR")]
    record_dir: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> thermview::Result<AppConfig> {
    let mut config = AppConfig::load_or_default(cli.config.as_deref()).context("Loading config")?;
    config
        .apply_overrides(
            cli.lut.as_deref(),
            cli.camera_type.as_deref(),
            cli.record_dir.as_deref(),
        )
        .context("Command line")?;
    config.validate()?;
    Ok(config)
}

/// Install the subscriber. The returned guard flushes the log file on drop.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "thermview.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter)))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let _log_guard = init_logging(&config.logging);

    tracing::info!(
        camera_type = %config.camera.camera_type,
        lut = %config.colormap.default_lut,
        synthetic = cli.synthetic,
        "Starting Thermal Viewer"
    );

    let slot = Arc::new(FrameSlot::new());
    let (device_tx, device_rx) = crossbeam_channel::unbounded();
    let mut builder = PipelineBuilder::new(config.clone()).sink(slot.clone());

    // Hotplug: sysfs for real cameras, one fixed device for the test pattern
    let _monitor = if cli.synthetic {
        let model = config.camera.camera_type;
        builder = builder.backend(Arc::new(SyntheticBackend::new(model.frame_interval())));
        device_tx
            .send(DeviceEvent::attached(SyntheticBackend::identity(0, model)))
            .map_err(|e| ThermviewError::Channel(e.to_string()))?;
        None
    } else if !cfg!(feature = "camera-v4l2") {
        anyhow::bail!(
            "This build has no camera support; rebuild with `--features camera-v4l2` \
             or run with --synthetic for the test pattern"
        );
    } else {
        let monitor = SysfsMonitor::from_config(&config.camera)
            .spawn(device_tx.clone())
            .context("Hotplug monitor")?;
        Some(monitor)
    };

    let (controller, handle) = builder.build(device_rx);
    let controller_thread = std::thread::Builder::new()
        .name("pipeline".into())
        .spawn(move || controller.run())?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 820.0])
            .with_min_inner_size([320.0, 260.0])
            .with_title("Thermal Viewer"),
        ..Default::default()
    };

    let lut = config.colormap.default_lut;
    let app_handle = handle.clone();
    let result = eframe::run_native(
        "Thermal Viewer",
        native_options,
        Box::new(move |cc| Ok(Box::new(ThermviewApp::new(cc, app_handle, slot, lut)))),
    );

    // Stop the pipeline (finalizes any recording) and wait for it
    tracing::info!("Shutting down...");
    handle.quit();
    if controller_thread.join().is_err() {
        tracing::error!("Pipeline thread panicked");
    }
    drop(device_tx);

    result.map_err(|e| anyhow::anyhow!("UI error: {}", e))
}
