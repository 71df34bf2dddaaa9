//! Open file sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cdm_common::{Array, CdmError, CdmModel, CdmResult, Section, Variable};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::IospConfig;
use crate::provider::IoServiceProvider;
use crate::registry::IospRegistry;
use crate::source::ByteSource;

/// Lifecycle of a file session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Probing,
    Opened,
    Closed,
}

/// One opened file: its source, provider and frozen model.
pub struct FileSession {
    source: Arc<dyn ByteSource>,
    config: IospConfig,
    state: SessionState,
    provider: Option<Box<dyn IoServiceProvider>>,
    model: Option<CdmModel>,
    cancel: CancelToken,
    failed: AtomicBool,
}

impl FileSession {
    pub fn new(source: Arc<dyn ByteSource>, config: IospConfig) -> Self {
        Self {
            source,
            config,
            state: SessionState::Unopened,
            provider: None,
            model: None,
            cancel: CancelToken::new(),
            failed: AtomicBool::new(false),
        }
    }

    /// Probe registered providers and open the source with the first match.
    ///
    /// No match leaves the session unopened. A provider that matches but
    /// fails to open closes the session.
    pub fn open(&mut self, registry: &IospRegistry) -> CdmResult<()> {
        if self.state != SessionState::Unopened {
            return Err(CdmError::Unsupported(format!(
                "cannot open session in state {:?}",
                self.state
            )));
        }
        self.state = SessionState::Probing;

        let header = match self.source.read_prefix(self.config.header_probe_bytes) {
            Ok(header) => header,
            Err(e) => {
                self.state = SessionState::Closed;
                return Err(e);
            }
        };

        let Some(mut provider) = registry.find_provider(&header) else {
            self.state = SessionState::Unopened;
            return Err(CdmError::Unsupported(format!(
                "no IOSP recognizes {}",
                self.source.location()
            )));
        };

        match provider.open(Arc::clone(&self.source), &self.cancel) {
            Ok(model) => {
                info!(
                    location = %self.source.location(),
                    iosp = provider.file_type_id(),
                    variables = model.variables().count(),
                    "Opened file"
                );
                self.provider = Some(provider);
                self.model = Some(model);
                self.state = SessionState::Opened;
                Ok(())
            }
            Err(e) => {
                warn!(
                    location = %self.source.location(),
                    iosp = provider.file_type_id(),
                    error = %e,
                    "Failed to open file"
                );
                if let Err(close_err) = provider.close() {
                    warn!(
                        location = %self.source.location(),
                        iosp = provider.file_type_id(),
                        error = %close_err,
                        "Error closing provider after failed open"
                    );
                }
                self.state = SessionState::Closed;
                Err(e)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn location(&self) -> &str {
        self.source.location()
    }

    pub fn file_type_id(&self) -> Option<&'static str> {
        self.provider.as_ref().map(|p| p.file_type_id())
    }

    /// Token that cancels long reads on this session.
    ///
    /// Once cancelled, every read fails with `Cancelled` until the token is
    /// reset.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn opened(&self) -> CdmResult<(&dyn IoServiceProvider, &CdmModel)> {
        if self.failed.load(Ordering::Acquire) {
            return Err(CdmError::Closed(format!(
                "{} is unusable after an I/O failure",
                self.source.location()
            )));
        }
        match (self.state, self.provider.as_deref(), self.model.as_ref()) {
            (SessionState::Opened, Some(provider), Some(model)) => Ok((provider, model)),
            (state, _, _) => Err(CdmError::Closed(format!(
                "{} is not open (state {:?})",
                self.source.location(),
                state
            ))),
        }
    }

    pub fn model(&self) -> CdmResult<&CdmModel> {
        Ok(self.opened()?.1)
    }

    pub fn find_variable(&self, full_name: &str) -> CdmResult<&Variable> {
        self.model()?
            .find_variable(full_name)
            .ok_or_else(|| CdmError::schema(format!("no variable named '{}'", full_name)))
    }

    /// Read a section of a variable of this session's model.
    ///
    /// Cached variables are served from memory.
    pub fn read_variable(&self, var: &Variable, section: &Section) -> CdmResult<Array> {
        let (provider, _) = self.opened()?;
        section.validate(&var.shape())?;

        if let Some(cached) = var.cached_data() {
            return cached.section(section);
        }

        let result = provider.read_data(var, section, &self.cancel);
        if let Err(e) = &result {
            if e.is_fatal_for_session() {
                warn!(
                    location = %self.source.location(),
                    variable = var.name(),
                    error = %e,
                    "I/O failure, session is no longer usable"
                );
                self.failed.store(true, Ordering::Release);
            }
        }
        result
    }

    /// Read a section of the named variable.
    pub fn read(&self, full_name: &str, section: &Section) -> CdmResult<Array> {
        let var = self.find_variable(full_name)?;
        self.read_variable(var, section)
    }

    /// Read the named variable using the textual section form, e.g. `"0:1,:"`.
    pub fn read_section_str(&self, full_name: &str, section: &str) -> CdmResult<Array> {
        let var = self.find_variable(full_name)?;
        let section = Section::parse(section, &var.shape())?;
        self.read_variable(var, &section)
    }

    /// Read a whole variable.
    pub fn read_all(&self, full_name: &str) -> CdmResult<Array> {
        let var = self.find_variable(full_name)?;
        self.read_variable(var, &Section::full(&var.shape()))
    }

    /// Run independent reads, concurrently when `parallel_reads` is set.
    ///
    /// Results are returned in request order.
    pub fn read_many(&self, requests: &[(&str, Section)]) -> Vec<CdmResult<Array>> {
        if self.config.parallel_reads {
            requests
                .par_iter()
                .map(|(name, section)| self.read(name, section))
                .collect()
        } else {
            requests
                .iter()
                .map(|(name, section)| self.read(name, section))
                .collect()
        }
    }

    /// Ask the provider to pick up appended records.
    pub fn sync(&self) -> CdmResult<bool> {
        let (provider, model) = self.opened()?;
        let changed = provider.sync(model)?;
        debug!(location = %self.source.location(), changed = changed, "Synced file");
        Ok(changed)
    }

    /// Close the session. Closing twice is harmless.
    pub fn close(&mut self) -> CdmResult<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        self.model = None;
        if let Some(mut provider) = self.provider.take() {
            provider.close()?;
            debug!(location = %self.source.location(), "Closed file");
        }
        Ok(())
    }
}

impl Drop for FileSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Error closing file session");
        }
    }
}

impl std::fmt::Debug for FileSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSession")
            .field("location", &self.source.location())
            .field("state", &self.state)
            .field("iosp", &self.file_type_id())
            .finish()
    }
}
