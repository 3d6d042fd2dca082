//! Plugin lifecycle management.
//!
//! [`PluginManager`] owns the set of loaded plugins and their ordered
//! lifecycle:
//!
//! 1. **Discovery**: one candidate per subdirectory of the plugin root;
//!    entries starting with `_` are skipped, a missing root is created.
//! 2. **Validation**: the `plugin.toml` manifest must satisfy the
//!    [`PluginMeta`] schema. An invalid candidate is logged and excluded;
//!    loading continues.
//! 3. **Capability injection**: the factory installed under the manifest's
//!    namespace receives the scoped API facade, logger, storage handle, and
//!    plugin directory. Capabilities are moved into the instance and cannot
//!    be reassigned afterwards.
//! 4. **Ordering**: ascending priority governs start order, registration
//!    order, and therefore broadcast order in the dispatcher. Stop runs in
//!    reverse.
//!
//! Per plugin the state machine is `Injected → Running → Stopped`, with a
//! terminal `Rejected` reached from a failed start hook. Rejected plugins
//! are never registered and receive no events.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{debug, error, info, trace, warn};

use beacon_core::BoxedAdaptor;

use crate::api::Api;
use crate::dispatcher::EventDispatcher;
use crate::error::PluginError;
use crate::logger::PluginLogger;
use crate::plugin::{BoxedPlugin, PluginContext, PluginFactory, PluginMeta, load_manifest};
use crate::storage::Storage;

/// Host version plugins declare against in their manifest.
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tracks the lifecycle state of one loaded plugin.
///
/// ```text
/// load_all()  ──► Injected
///   start_all() ──► Running   (start hook succeeded, handlers registered)
///               ──► Rejected  (start hook failed; terminal)
///   stop_all()  ──► Stopped   (Running → Stopped after the stop hook)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Validated and capability-injected, not yet started.
    Injected,
    /// Started; handlers are registered with the dispatcher.
    Running,
    /// Stopped; handlers are deregistered.
    Stopped,
    /// Start hook failed. Never receives events.
    Rejected,
}

struct PluginEntry {
    meta: PluginMeta,
    plugin: BoxedPlugin,
    state: PluginState,
}

/// Owner of the loaded plugin set and its ordered lifecycle.
pub struct PluginManager {
    root: PathBuf,
    adaptor: BoxedAdaptor,
    dispatcher: Arc<EventDispatcher>,
    /// Compiled-in plugin implementations, keyed by namespace.
    installed: RwLock<HashMap<String, PluginFactory>>,
    /// Loaded plugins, sorted ascending by priority.
    plugins: AsyncRwLock<Vec<PluginEntry>>,
}

impl PluginManager {
    /// Creates a manager rooted at `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        adaptor: BoxedAdaptor,
        dispatcher: Arc<EventDispatcher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            root: root.into(),
            adaptor,
            dispatcher,
            installed: RwLock::new(HashMap::new()),
            plugins: AsyncRwLock::new(Vec::new()),
        })
    }

    /// The plugin root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registers a compiled-in implementation under `namespace`.
    pub fn install(&self, namespace: impl Into<String>, factory: PluginFactory) {
        self.installed.write().insert(namespace.into(), factory);
    }

    /// Convenience wrapper around [`install`](Self::install) for closures.
    pub fn install_fn<F>(&self, namespace: impl Into<String>, factory: F)
    where
        F: Fn(PluginContext) -> Result<BoxedPlugin, crate::error::BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.install(namespace, Arc::new(factory));
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Discovers, validates, and capability-injects every plugin candidate.
    ///
    /// Candidates that fail are logged and excluded; loading continues with
    /// the rest. The resulting set is sorted ascending by priority.
    pub async fn load_all(self: &Arc<Self>) {
        debug!(root = %self.root.display(), "Scanning plugin root");

        if !self.root.exists() {
            warn!(root = %self.root.display(), "Plugin root missing, creating it");
            if let Err(e) = std::fs::create_dir_all(&self.root) {
                error!(root = %self.root.display(), error = %e, "Cannot create plugin root");
                return;
            }
        }

        let mut candidates: Vec<PathBuf> = match std::fs::read_dir(&self.root) {
            Ok(read_dir) => read_dir
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect(),
            Err(e) => {
                error!(root = %self.root.display(), error = %e, "Cannot read plugin root");
                return;
            }
        };
        candidates.sort();

        let mut entries: Vec<PluginEntry> = Vec::new();
        for dir in candidates {
            let dir_name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if dir_name.starts_with('_') {
                trace!(dir = %dir_name, "Ignoring disabled plugin directory");
                continue;
            }

            match self.load_candidate(&dir, &entries) {
                Ok(entry) => {
                    trace!(
                        plugin = %entry.meta.name,
                        namespace = %entry.meta.namespace,
                        "Found plugin"
                    );
                    entries.push(entry);
                }
                Err(e) => {
                    error!(path = %dir.display(), error = %e, "Cannot load plugin, skipping");
                }
            }
        }

        debug!("Sorting plugins by priority");
        entries.sort_by_key(|entry| entry.meta.priority);

        *self.plugins.write().await = entries;
    }

    /// Validates and instantiates one candidate directory.
    fn load_candidate(
        self: &Arc<Self>,
        dir: &Path,
        loaded: &[PluginEntry],
    ) -> Result<PluginEntry, PluginError> {
        let meta = load_manifest(dir)?;

        if loaded
            .iter()
            .any(|entry| entry.meta.namespace == meta.namespace)
        {
            return Err(PluginError::DuplicateNamespace(meta.namespace));
        }
        if !same_major(&meta.host_version, HOST_VERSION) {
            warn!(
                namespace = %meta.namespace,
                declared = %meta.host_version,
                host = %HOST_VERSION,
                "Plugin targets a different host major version"
            );
        }

        let factory = self
            .installed
            .read()
            .get(&meta.namespace)
            .cloned()
            .ok_or_else(|| PluginError::NotInstalled(meta.namespace.clone()))?;

        let context = PluginContext {
            api: Api::new(
                &meta.namespace,
                Arc::clone(&self.adaptor),
                Arc::clone(&self.dispatcher),
                Arc::downgrade(self),
            ),
            logger: PluginLogger::new(&meta.namespace),
            storage: Storage::open(dir)?,
            dir: dir.to_path_buf(),
        };

        let plugin = factory(context).map_err(PluginError::Construct)?;
        Ok(PluginEntry {
            meta,
            plugin,
            state: PluginState::Injected,
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts every loaded plugin in priority order.
    ///
    /// Only after a successful start hook is the plugin registered with the
    /// dispatcher. A failing hook rejects that plugin and moves on.
    pub async fn start_all(&self) {
        let mut plugins = self.plugins.write().await;
        for entry in plugins.iter_mut() {
            if !matches!(entry.state, PluginState::Injected | PluginState::Stopped) {
                continue;
            }
            info!(
                plugin = %entry.meta.name,
                namespace = %entry.meta.namespace,
                "Starting plugin"
            );
            match entry.plugin.on_start().await {
                Ok(()) => {
                    self.dispatcher
                        .register(&entry.meta.namespace, entry.plugin.handlers());
                    entry.state = PluginState::Running;
                }
                Err(e) => {
                    error!(
                        namespace = %entry.meta.namespace,
                        error = %e,
                        "Plugin start hook failed, rejecting"
                    );
                    entry.state = PluginState::Rejected;
                }
            }
        }
    }

    /// Stops every running plugin in reverse priority order, then clears
    /// all dispatcher registrations.
    pub async fn stop_all(&self) {
        let mut plugins = self.plugins.write().await;
        for entry in plugins.iter_mut().rev() {
            if entry.state != PluginState::Running {
                continue;
            }
            info!(
                plugin = %entry.meta.name,
                namespace = %entry.meta.namespace,
                "Stopping plugin"
            );
            if let Err(e) = entry.plugin.on_stop().await {
                error!(
                    namespace = %entry.meta.namespace,
                    error = %e,
                    "Plugin stop hook failed"
                );
            }
            entry.state = PluginState::Stopped;
        }
        self.dispatcher.clear();
    }

    /// Stop, reload from disk, and start again, as one orchestrated
    /// operation. Exposed to plugins through the API facade.
    pub async fn restart(self: &Arc<Self>) {
        info!("Restarting plugins");
        self.stop_all().await;
        self.plugins.write().await.clear();
        self.load_all().await;
        self.start_all().await;
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Metadata of every loaded plugin, in priority order.
    pub async fn plugin_metas(&self) -> Vec<PluginMeta> {
        self.plugins
            .read()
            .await
            .iter()
            .map(|entry| entry.meta.clone())
            .collect()
    }

    /// Lifecycle state of the named plugin.
    pub async fn plugin_state(&self, namespace: &str) -> Option<PluginState> {
        self.plugins
            .read()
            .await
            .iter()
            .find(|entry| entry.meta.namespace == namespace)
            .map(|entry| entry.state)
    }

    /// Number of loaded plugins (in any state).
    pub async fn plugin_count(&self) -> usize {
        self.plugins.read().await.len()
    }
}

/// Whether two dotted versions share a major component.
fn same_major(a: &str, b: &str) -> bool {
    a.split('.').next() == b.split('.').next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::HandlerSet;
    use crate::plugin::Plugin;
    use async_trait::async_trait;
    use beacon_core::{Event, EventName, NullAdaptor};
    use parking_lot::Mutex;
    use serde_json::json;

    struct Probe {
        tag: String,
        log: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
    }

    #[async_trait]
    impl Plugin for Probe {
        async fn on_start(&self) -> Result<(), crate::error::BoxError> {
            self.log.lock().push(format!("start:{}", self.tag));
            if self.fail_start {
                return Err("refusing to start".into());
            }
            Ok(())
        }

        async fn on_stop(&self) -> Result<(), crate::error::BoxError> {
            self.log.lock().push(format!("stop:{}", self.tag));
            Ok(())
        }

        fn handlers(&self) -> HandlerSet {
            let tag = self.tag.clone();
            let log = Arc::clone(&self.log);
            HandlerSet::new().on(EventName::PrivateMessage, move |_event| {
                let tag = tag.clone();
                let log = Arc::clone(&log);
                async move {
                    log.lock().push(format!("event:{tag}"));
                    Ok(())
                }
            })
        }
    }

    fn write_manifest(root: &Path, dir: &str, namespace: &str, priority: u32) {
        let path = root.join(dir);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(
            path.join("plugin.toml"),
            format!(
                r#"
[plugin]
namespace = "{namespace}"
name = "{dir}"
author = "test"
priority = {priority}
version = "1.0.0"
host_version = "{HOST_VERSION}"
"#
            ),
        )
        .unwrap();
    }

    fn install_probe(
        manager: &PluginManager,
        namespace: &str,
        tag: &str,
        log: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
    ) {
        let tag = tag.to_string();
        manager.install_fn(namespace, move |_ctx| {
            Ok(Arc::new(Probe {
                tag: tag.clone(),
                log: Arc::clone(&log),
                fail_start,
            }) as BoxedPlugin)
        });
    }

    fn manager_with_root(root: &Path) -> (Arc<PluginManager>, Arc<EventDispatcher>) {
        let dispatcher = Arc::new(EventDispatcher::new());
        let manager = PluginManager::new(
            root,
            Arc::new(NullAdaptor::new()),
            Arc::clone(&dispatcher),
        );
        (manager, dispatcher)
    }

    fn private_message() -> serde_json::Value {
        json!({
            "post_type": "message",
            "message_type": "private",
            "time": 1_700_000_000,
            "self_id": 1,
            "message_id": 2,
            "user_id": 3,
            "message": [],
            "raw_message": "hi"
        })
    }

    #[tokio::test]
    async fn missing_root_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("plugins");
        let (manager, _) = manager_with_root(&root);

        manager.load_all().await;
        assert!(root.is_dir());
        assert_eq!(manager.plugin_count().await, 0);
    }

    #[tokio::test]
    async fn partial_failure_loads_the_valid_plugins_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        write_manifest(tmp.path(), "alpha", "demo.alpha", 10);
        write_manifest(tmp.path(), "beta", "demo.beta", 5);
        // Invalid: priority out of range.
        write_manifest(tmp.path(), "broken", "demo.broken", 200);
        // Ignored by the underscore marker despite a valid manifest.
        write_manifest(tmp.path(), "_disabled", "demo.disabled", 1);

        let (manager, _) = manager_with_root(tmp.path());
        install_probe(&manager, "demo.alpha", "alpha", Arc::clone(&log), false);
        install_probe(&manager, "demo.beta", "beta", Arc::clone(&log), false);
        install_probe(&manager, "demo.broken", "broken", Arc::clone(&log), false);
        install_probe(&manager, "demo.disabled", "disabled", Arc::clone(&log), false);

        manager.load_all().await;

        let metas = manager.plugin_metas().await;
        let namespaces: Vec<_> = metas.iter().map(|m| m.namespace.as_str()).collect();
        assert_eq!(namespaces, vec!["demo.beta", "demo.alpha"]);
    }

    #[tokio::test]
    async fn start_order_follows_priority_and_failures_are_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        write_manifest(tmp.path(), "one", "p.one", 1);
        write_manifest(tmp.path(), "two", "p.two", 5);
        write_manifest(tmp.path(), "three", "p.three", 10);

        let (manager, dispatcher) = manager_with_root(tmp.path());
        install_probe(&manager, "p.one", "one", Arc::clone(&log), false);
        install_probe(&manager, "p.two", "two", Arc::clone(&log), true);
        install_probe(&manager, "p.three", "three", Arc::clone(&log), false);

        manager.load_all().await;
        manager.start_all().await;

        assert_eq!(
            *log.lock(),
            vec!["start:one", "start:two", "start:three"]
        );
        assert_eq!(manager.plugin_state("p.two").await, Some(PluginState::Rejected));

        // The rejected plugin receives no events; the others do, in
        // priority order.
        log.lock().clear();
        dispatcher.dispatch_value(private_message()).await;
        assert_eq!(*log.lock(), vec!["event:one", "event:three"]);
    }

    #[tokio::test]
    async fn factory_failure_excludes_only_that_plugin() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        write_manifest(tmp.path(), "good", "p.good", 1);
        write_manifest(tmp.path(), "bad", "p.bad", 2);

        let (manager, _) = manager_with_root(tmp.path());
        install_probe(&manager, "p.good", "good", Arc::clone(&log), false);
        manager.install_fn("p.bad", |_ctx| Err("init exploded".into()));

        manager.load_all().await;
        let metas = manager.plugin_metas().await;
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].namespace, "p.good");
    }

    #[tokio::test]
    async fn stop_runs_in_reverse_and_restart_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        write_manifest(tmp.path(), "one", "p.one", 1);
        write_manifest(tmp.path(), "two", "p.two", 5);

        let (manager, dispatcher) = manager_with_root(tmp.path());
        install_probe(&manager, "p.one", "one", Arc::clone(&log), false);
        install_probe(&manager, "p.two", "two", Arc::clone(&log), false);

        manager.load_all().await;
        manager.start_all().await;
        let baseline = dispatcher.total_handlers();
        assert_eq!(baseline, 2);

        manager.stop_all().await;
        assert_eq!(dispatcher.total_handlers(), 0);
        // Reverse priority order on the way down.
        assert_eq!(
            *log.lock(),
            vec!["start:one", "start:two", "stop:two", "stop:one"]
        );

        // Stop-then-start twice leaves exactly one registration per handler.
        manager.start_all().await;
        manager.stop_all().await;
        manager.start_all().await;
        assert_eq!(dispatcher.total_handlers(), baseline);
    }

    #[tokio::test]
    async fn capabilities_reach_the_factory() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(tmp.path(), "cap", "p.cap", 1);

        let seen_dir: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
        let (manager, _) = manager_with_root(tmp.path());
        {
            let seen_dir = Arc::clone(&seen_dir);
            manager.install_fn("p.cap", move |ctx| {
                assert_eq!(ctx.api.namespace(), "p.cap");
                ctx.storage.set("installed", &true).unwrap();
                *seen_dir.lock() = Some(ctx.dir.clone());
                Ok(Arc::new(Probe {
                    tag: "cap".into(),
                    log: Arc::new(Mutex::new(Vec::new())),
                    fail_start: false,
                }) as BoxedPlugin)
            });
        }

        manager.load_all().await;
        assert_eq!(manager.plugin_count().await, 1);

        let dir = seen_dir.lock().clone().unwrap();
        assert!(dir.ends_with("cap"));
        assert!(dir.join("storage.json").is_file());
    }

    #[tokio::test]
    async fn call_routing_between_managed_plugins() {
        struct Callee;

        #[async_trait]
        impl Plugin for Callee {
            fn handlers(&self) -> HandlerSet {
                HandlerSet::new().on(EventName::Call, |event| async move {
                    if let Event::Call(call) = &*event {
                        call.resolve(json!({ "method": call.method.clone() }));
                    }
                    Ok(())
                })
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        write_manifest(tmp.path(), "callee", "p.callee", 1);

        let (manager, dispatcher) = manager_with_root(tmp.path());
        manager.install_fn("p.callee", |_ctx| Ok(Arc::new(Callee) as BoxedPlugin));
        manager.load_all().await;
        manager.start_all().await;

        let api = Api::new(
            "p.caller",
            Arc::new(NullAdaptor::new()),
            dispatcher,
            Arc::downgrade(&manager),
        );
        let result = api.call(Some("p.callee"), "status", json!({})).await.unwrap();
        assert_eq!(result["method"], "status");

        assert_eq!(api.plugin_metas().await.len(), 1);
    }
}
