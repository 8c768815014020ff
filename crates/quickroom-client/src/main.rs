use anyhow::Result;
use eframe::egui;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quickroom_client::diagnostics::{Diagnostics, DiagnosticsHandle, TelemetryClient};
use quickroom_client::media::{
    CaptureSourceProvider, DesktopCapturer, LocalMediaManager, MediaDevices, NativeMessagingHost,
    ScreenShareNegotiator, SourcePicker, SyntheticDevices,
};
use quickroom_client::network::{TokenClient, WsTransport};
use quickroom_client::room_details::{RoomDetails, parse_room_details};
use quickroom_client::state::{ClientConfig, LogFormat, ScreenShareBridge};
use quickroom_client::ui::{EguiSourcePicker, QuickroomApp};
use quickroom_client::SessionCoordinator;

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quickroom=debug,quickroom_client=debug".into());

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// `?roomId=demo&type=peer`, `roomId=demo` or a full URL carrying that query
fn room_details_from_args() -> RoomDetails {
    match std::env::args().nth(1) {
        Some(arg) if arg.contains("://") => RoomDetails::from_url(&arg),
        Some(arg) => parse_room_details(&arg),
        None => RoomDetails::default(),
    }
}

#[cfg(feature = "native-capture")]
fn native_devices() -> Option<Arc<quickroom_client::media::NativeDevices>> {
    Some(Arc::new(quickroom_client::media::NativeDevices::new()))
}

#[cfg(not(feature = "native-capture"))]
fn native_devices() -> Option<Arc<SyntheticDevices>> {
    tracing::warn!("Built without native capture; using synthetic devices");
    None
}

/// Camera, microphone and desktop sources come from the same device set
fn device_set(config: &ClientConfig) -> (Arc<dyn MediaDevices>, Arc<dyn DesktopCapturer>) {
    if !config.synthetic_devices {
        if let Some(devices) = native_devices() {
            let media: Arc<dyn MediaDevices> = devices.clone();
            return (media, devices);
        }
    }
    let devices = Arc::new(SyntheticDevices::new());
    let media: Arc<dyn MediaDevices> = devices.clone();
    (media, devices)
}

fn capture_source_provider(
    config: &ClientConfig,
    capturer: Arc<dyn DesktopCapturer>,
    picker: Arc<dyn SourcePicker>,
) -> CaptureSourceProvider {
    let screen_share = &config.screen_share;
    match (&screen_share.bridge, &screen_share.host_command) {
        (ScreenShareBridge::Extension, Some(command)) => CaptureSourceProvider::ExtensionBridge {
            extension_id: screen_share.extension_id.clone(),
            messenger: Arc::new(NativeMessagingHost::new(command.clone())),
        },
        (ScreenShareBridge::Extension, None) => {
            tracing::warn!("Extension bridge selected without a host command; using the desktop picker");
            CaptureSourceProvider::DesktopBridge { capturer, picker }
        }
        (ScreenShareBridge::Desktop, _) => CaptureSourceProvider::DesktopBridge { capturer, picker },
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // the log format comes from the config, so report where it came from afterwards
    let config_path = ClientConfig::config_path();
    let config = ClientConfig::load_from(config_path.as_deref())?;
    init_tracing(config.log_format);

    tracing::info!("Starting Quickroom client...");
    match &config_path {
        Some(path) if path.exists() => tracing::info!("Read config from {:?}", path),
        Some(path) => tracing::debug!("No config file at {:?}; using defaults", path),
        None => tracing::warn!("Could not determine config directory"),
    }

    let details = room_details_from_args();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let (picker, picker_dialog) = EguiSourcePicker::new();
    let (devices, capturer) = device_set(&config);
    let negotiator = Arc::new(ScreenShareNegotiator::new(
        capture_source_provider(&config, capturer, Arc::new(picker)),
        devices.clone(),
        config.screen_share.clone(),
    ));

    let (commands, command_rx) = mpsc::channel(32);
    let snapshots = {
        let _guard = runtime.enter();

        let diagnostics = match TelemetryClient::from_config(&config.telemetry)? {
            Some(client) => {
                let handle = Diagnostics::start(Arc::new(client));
                Diagnostics::install_panic_hook(handle.clone());
                handle
            }
            None => {
                tracing::info!("No telemetry DSN configured; error reports stay local");
                DiagnosticsHandle::disabled()
            }
        };

        let mut coordinator = SessionCoordinator::new(
            LocalMediaManager::new(devices),
            Arc::new(WsTransport::new(config.signal_url.clone())),
            Arc::new(TokenClient::new(config.create_room_url())),
            negotiator,
        )
        .with_diagnostics(diagnostics);
        let snapshots = coordinator.subscribe_snapshots();
        runtime.spawn(coordinator.run(details, command_rx));
        snapshots
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 640.0])
            .with_min_inner_size([640.0, 400.0])
            .with_title("Quickroom"),
        ..Default::default()
    };

    eframe::run_native(
        "Quickroom",
        options,
        Box::new(move |cc| {
            Ok(Box::new(QuickroomApp::new(
                cc,
                runtime,
                snapshots,
                commands,
                picker_dialog,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run eframe: {}", e))?;

    Ok(())
}
