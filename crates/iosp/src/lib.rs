//! Pluggable I/O service providers.
//!
//! A provider ([`IoServiceProvider`]) decodes one binary format into the
//! common data model. The [`IospRegistry`] probes providers in priority
//! order and hands back a [`FileSession`] for the first one that matches.

pub mod cancel;
pub mod config;
pub mod locator;
pub mod provider;
pub mod registry;
pub mod session;
pub mod source;

pub use cancel::CancelToken;
pub use config::{ConfigError, IospConfig};
pub use locator::LocatorTable;
pub use provider::IoServiceProvider;
pub use registry::IospRegistry;
pub use session::{FileSession, SessionState};
pub use source::{ByteSource, FileSource, MemorySource};
