//! The registry of every provider shipped with the workspace.

use cinrad_parser::CinradIosp;
use iosp::{IoServiceProvider, IospConfig, IospRegistry};
use netcdf3_parser::Netcdf3Iosp;

use crate::hint::FileType;

type Factory = fn(&IospConfig) -> Box<dyn IoServiceProvider>;

fn netcdf3(config: &IospConfig) -> Box<dyn IoServiceProvider> {
    Box::new(Netcdf3Iosp::new(config))
}

fn cinrad(config: &IospConfig) -> Box<dyn IoServiceProvider> {
    Box::new(CinradIosp::new(config))
}

/// Built-in providers by id with their default priority. Exact magic
/// numbers are probed before the CINRAD heuristics.
const PROVIDERS: [(&str, i32, Factory); 2] = [
    (netcdf3_parser::FILE_TYPE_ID, 100, netcdf3),
    (cinrad_parser::FILE_TYPE_ID, 50, cinrad),
];

/// Priority given to the provider a file name hints at.
const HINTED_PRIORITY: i32 = 1000;

/// Registry with every built-in provider at its default priority.
pub fn default_registry(config: IospConfig) -> IospRegistry {
    registry_for(config, FileType::Unknown)
}

/// Registry that probes the hinted provider first.
pub fn registry_for(config: IospConfig, hint: FileType) -> IospRegistry {
    let mut registry = IospRegistry::new(config);
    let hinted = hint.provider_id();
    for (id, priority, factory) in PROVIDERS {
        let priority = if hinted == Some(id) { HINTED_PRIORITY } else { priority };
        registry.register(priority, factory);
    }
    registry
}
