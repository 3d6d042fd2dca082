//! Runtime orchestration.
//!
//! [`BeaconRuntime`] wires the host together at boot: it instantiates the
//! configured adaptor variant, creates the dispatcher and the plugin
//! manager, and installs the dispatcher as the adaptor's sole message
//! handler. One runtime, one adaptor, one dispatcher, one manager, all
//! constructed explicitly and passed down, never looked up globally.
//!
//! # Quick start
//!
//! ```rust,ignore
//! let runtime = BeaconRuntime::new().await?;
//! runtime.install_fn("demo.echo", |ctx| Ok(Arc::new(Echo::new(ctx)) as BoxedPlugin));
//! runtime.run().await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tracing::{info, warn};

use beacon_core::{BoxedAdaptor, NullAdaptor, PendingCalls};
use beacon_framework::{BoxedPlugin, EventDispatcher, PluginContext, PluginManager};
use beacon_transport::{WsClientAdaptor, WsServerAdaptor};

use crate::config::{BeaconConfig, ConfigLoader, ConnectionConfig};
use crate::error::RuntimeResult;
use crate::logging;

/// The assembled bot host.
pub struct BeaconRuntime {
    config: BeaconConfig,
    adaptor: BoxedAdaptor,
    dispatcher: Arc<EventDispatcher>,
    manager: Arc<PluginManager>,
    running: AtomicBool,
}

impl BeaconRuntime {
    /// Creates a runtime with automatic configuration loading.
    pub async fn new() -> RuntimeResult<Arc<Self>> {
        let config = ConfigLoader::new().load()?;
        Self::from_config(config).await
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Assembles the runtime from a loaded configuration.
    ///
    /// Instantiates the configured adaptor variant, builds the dispatcher
    /// and manager, and binds the dispatcher as the adaptor's message
    /// handler. Failure here is process-fatal by design.
    pub async fn from_config(config: BeaconConfig) -> RuntimeResult<Arc<Self>> {
        logging::init_from_config(&config.logging);

        let pending = PendingCalls::with_timeout(config.action_timeout());
        let adaptor: BoxedAdaptor = match &config.connection {
            ConnectionConfig::None => {
                warn!("No gateway configured; outbound actions will fail fast");
                Arc::new(NullAdaptor::new())
            }
            ConnectionConfig::WsClient { url, reconnect } => {
                WsClientAdaptor::connect_with(url, reconnect.to_policy(), pending).await?
            }
            ConnectionConfig::WsServer { host, port, path } => {
                WsServerAdaptor::listen_with(&format!("{host}:{port}"), path, pending).await?
            }
        };

        let dispatcher = Arc::new(EventDispatcher::new());
        let manager = PluginManager::new(
            &config.plugin_root,
            Arc::clone(&adaptor),
            Arc::clone(&dispatcher),
        );

        // The dispatcher is the adaptor's sole message handler; each frame
        // is dispatched on its own task so a slow handler chain never backs
        // up the transport read loop.
        let handler_dispatcher = Arc::clone(&dispatcher);
        adaptor.set_message_handler(Arc::new(move |frame| {
            let dispatcher = Arc::clone(&handler_dispatcher);
            tokio::spawn(async move {
                dispatcher.dispatch_value(frame).await;
            });
        }));

        info!(adaptor = adaptor.name(), "Runtime initialized");

        Ok(Arc::new(Self {
            config,
            adaptor,
            dispatcher,
            manager,
            running: AtomicBool::new(false),
        }))
    }

    /// The loaded configuration.
    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    /// The active adaptor.
    pub fn adaptor(&self) -> &BoxedAdaptor {
        &self.adaptor
    }

    /// The event dispatcher.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// The plugin manager.
    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    /// Registers a compiled-in plugin implementation under `namespace`.
    pub fn install_fn<F>(&self, namespace: impl Into<String>, factory: F)
    where
        F: Fn(PluginContext) -> Result<BoxedPlugin, beacon_framework::BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.manager.install_fn(namespace, factory);
    }

    /// Whether the runtime has been started.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Loads and starts every plugin.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return;
        }
        info!("Starting Beacon host");
        self.manager.load_all().await;
        self.manager.start_all().await;
        info!("Beacon host started");
    }

    /// Stops every plugin and clears the dispatcher.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Runtime is not running");
            return;
        }
        info!("Stopping Beacon host");
        self.manager.stop_all().await;
        info!("Beacon host stopped");
    }

    /// Runs until a shutdown signal is received.
    pub async fn run(&self) {
        self.start().await;
        info!("Beacon host is running. Press Ctrl+C to stop.");
        wait_for_shutdown().await;
        self.stop().await;
    }

    /// Runs until the given future completes.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.start().await;
        shutdown.await;
        self.stop().await;
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler");

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down");
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`BeaconRuntime`] with custom configuration.
pub struct RuntimeBuilder {
    loader: ConfigLoader,
    config: Option<BeaconConfig>,
}

impl RuntimeBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
            config: None,
        }
    }

    /// Loads configuration from a specific file.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    /// Uses a pre-built configuration instead of the loader.
    pub fn config(mut self, config: BeaconConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the runtime.
    pub async fn build(self) -> RuntimeResult<Arc<BeaconRuntime>> {
        let config = match self.config {
            Some(config) => config,
            None => self.loader.load()?,
        };
        BeaconRuntime::from_config(config).await
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beacon_core::EventName;
    use beacon_framework::{HandlerSet, Plugin};
    use serde_json::json;

    struct Quiet;

    #[async_trait]
    impl Plugin for Quiet {
        fn handlers(&self) -> HandlerSet {
            HandlerSet::new().on(EventName::Heartbeat, |_event| async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn boots_without_a_gateway() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("plugins");
        std::fs::create_dir_all(root.join("quiet")).unwrap();
        std::fs::write(
            root.join("quiet").join("plugin.toml"),
            format!(
                r#"
[plugin]
namespace = "demo.quiet"
name = "Quiet"
author = "test"
priority = 1
version = "1.0.0"
host_version = "{}"
"#,
                beacon_framework::HOST_VERSION
            ),
        )
        .unwrap();

        let config = BeaconConfig {
            plugin_root: root,
            ..Default::default()
        };
        let runtime = BeaconRuntime::builder().config(config).build().await.unwrap();
        runtime.install_fn("demo.quiet", |_ctx| Ok(Arc::new(Quiet) as BoxedPlugin));

        runtime.start().await;
        assert!(runtime.is_running());
        assert_eq!(runtime.manager().plugin_count().await, 1);
        assert_eq!(runtime.dispatcher().total_handlers(), 1);

        // Dispatching through the runtime's dispatcher must not panic.
        runtime
            .dispatcher()
            .dispatch_value(json!({
                "post_type": "meta_event",
                "meta_event_type": "heartbeat",
                "time": 1_700_000_000,
                "self_id": 1
            }))
            .await;

        runtime.stop().await;
        assert!(!runtime.is_running());
        assert_eq!(runtime.dispatcher().total_handlers(), 0);
    }
}
