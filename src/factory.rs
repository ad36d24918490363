//! Factory that validates a path and builds a [`WatcherHandle`]

use std::sync::Arc;

use crate::config::WatcherConfig;
use crate::handle::WatcherHandle;
use crate::production::NotifyWatchSource;
use crate::traits::{WatchEventHandler, WatchSource, WatcherError};

/// Builds the source each new handle subscribes through
pub type SourceBuilder = Arc<dyn Fn(&WatcherConfig) -> Arc<dyn WatchSource> + Send + Sync>;

#[derive(Clone)]
pub struct WatcherFactory {
    config: WatcherConfig,
    source_builder: SourceBuilder,
}

impl WatcherFactory {
    /// Factory producing handles backed by `notify`
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            source_builder: Arc::new(|config: &WatcherConfig| {
                Arc::new(NotifyWatchSource::new(config.clone())) as Arc<dyn WatchSource>
            }),
        }
    }

    /// Factory producing handles backed by sources from `builder`
    pub fn with_source_builder(config: WatcherConfig, builder: SourceBuilder) -> Self {
        Self {
            config,
            source_builder: builder,
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Validate `path` and build an idle handle, optionally with `handler` pre-bound
    pub fn create_instance(
        &self,
        path: &str,
        handler: Option<Arc<dyn WatchEventHandler>>,
    ) -> Result<WatcherHandle, WatcherError> {
        let source = (self.source_builder)(&self.config);
        WatcherHandle::with_source(path, handler, source, &self.config).map_err(|e| {
            tracing::debug!(error = %e, "Rejected watch target");
            e
        })
    }

    /// Same as [`create_instance`](Self::create_instance), run to completion on
    /// the blocking pool since classification touches the file system
    pub async fn create_instance_async(
        &self,
        path: &str,
        handler: Option<Arc<dyn WatchEventHandler>>,
    ) -> Result<WatcherHandle, WatcherError> {
        let factory = self.clone();
        let path = path.to_string();
        tokio::task::spawn_blocking(move || factory.create_instance(&path, handler))
            .await
            .map_err(|e| WatcherError::Watch(format!("Handle construction task failed: {e}")))?
    }
}

impl Default for WatcherFactory {
    fn default() -> Self {
        Self::new(WatcherConfig::default())
    }
}
