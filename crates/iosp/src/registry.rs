//! Priority-ordered provider registry.

use std::path::Path;
use std::sync::Arc;

use cdm_common::CdmResult;
use tracing::debug;

use crate::config::IospConfig;
use crate::provider::IoServiceProvider;
use crate::session::FileSession;
use crate::source::{ByteSource, FileSource};

type Factory = Box<dyn Fn(&IospConfig) -> Box<dyn IoServiceProvider> + Send + Sync>;

struct Entry {
    id: &'static str,
    priority: i32,
    factory: Factory,
}

/// Registered providers, tried in descending priority order.
///
/// Providers with equal priority keep their registration order.
pub struct IospRegistry {
    entries: Vec<Entry>,
    config: IospConfig,
}

impl IospRegistry {
    pub fn new(config: IospConfig) -> Self {
        Self {
            entries: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &IospConfig {
        &self.config
    }

    /// Register a provider factory.
    pub fn register<F>(&mut self, priority: i32, factory: F)
    where
        F: Fn(&IospConfig) -> Box<dyn IoServiceProvider> + Send + Sync + 'static,
    {
        let id = factory(&self.config).file_type_id();
        let at = self
            .entries
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(self.entries.len());
        debug!(iosp = id, priority = priority, "Registered IOSP");
        self.entries.insert(
            at,
            Entry {
                id,
                priority,
                factory: Box::new(factory),
            },
        );
    }

    /// Ids of enabled providers in probe order.
    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|e| !self.config.is_disabled(e.id))
            .map(|e| e.id)
            .collect()
    }

    /// Fresh provider instances in probe order, skipping disabled ids.
    pub(crate) fn candidates(&self) -> impl Iterator<Item = Box<dyn IoServiceProvider>> + '_ {
        self.entries
            .iter()
            .filter(|e| !self.config.is_disabled(e.id))
            .map(|e| (e.factory)(&self.config))
    }

    /// First enabled provider whose probe accepts `header`.
    pub fn find_provider(&self, header: &[u8]) -> Option<Box<dyn IoServiceProvider>> {
        self.candidates().find(|p| {
            let matched = p.probe(header);
            debug!(iosp = p.file_type_id(), matched = matched, "Probed header");
            matched
        })
    }

    /// Probe a source and open it with the first matching provider.
    pub fn open(&self, source: Arc<dyn ByteSource>) -> CdmResult<FileSession> {
        let mut session = FileSession::new(source, self.config.clone());
        session.open(self)?;
        Ok(session)
    }

    /// Open a file on disk.
    pub fn open_path(&self, path: impl AsRef<Path>) -> CdmResult<FileSession> {
        self.open(Arc::new(FileSource::open(path)?))
    }
}

impl std::fmt::Debug for IospRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IospRegistry")
            .field(
                "providers",
                &self
                    .entries
                    .iter()
                    .map(|e| (e.id, e.priority))
                    .collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish()
    }
}
