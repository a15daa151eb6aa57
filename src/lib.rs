//! Screenwatch: background screen capture core.
//!
//! Wires together:
//! - Screen capture domain (capture/): capability, mirrored feed, decoding
//! - Image store (store.rs): timestamped PNG artifacts
//! - Recurring timer (scheduler.rs) driving the tick pipeline (pipeline.rs)
//! - Lifecycle manager (manager.rs) and the host command surface (commands.rs)

pub mod capture;
pub mod commands;
pub mod config;
pub mod manager;
pub mod pipeline;
pub mod presence;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use capture::{Capability, Revoker};
pub use config::CaptureConfig;
pub use manager::{CaptureManager, LifecycleError, ManagerState};

/// Entry point for the desktop binary: mirror the primary monitor until
/// Ctrl-C.
#[cfg(feature = "monitor")]
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::Arc;

    dotenvy::dotenv().ok();
    env_logger::init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let config = CaptureConfig::from_env();
        log::info!(
            "Screenwatch starting up (every {}s into {})",
            config.interval.as_secs(),
            config.output_dir.display()
        );

        let manager = CaptureManager::builder(Arc::new(capture::MonitorBackend::default()))
            .config(config)
            .build()?;

        // Desktop hosts have no consent dialog; the grant is issued locally.
        let capability = Capability::new(format!("local-{}", std::process::id()), Vec::new());
        let ack = commands::start_capture(&manager, capability)?;
        log::info!("{}", ack);

        tokio::signal::ctrl_c().await?;
        log::info!("Shutdown requested");

        manager.on_teardown();
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}
