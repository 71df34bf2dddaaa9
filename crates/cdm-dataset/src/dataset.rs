//! The `Dataset` facade: open by path or bytes, read raw or enhanced.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use cdm_common::{Array, CdmError, CdmModel, Enhancer, Section};
use iosp::{CancelToken, FileSession, IospConfig, MemorySource};
use tracing::{debug, info};

use crate::error::Result;
use crate::hint::{detect_file_type, FileType};
use crate::registry::registry_for;

/// Options for opening a dataset.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Override file type detection from the file name
    pub file_type: Option<FileType>,
    /// Provider and read configuration
    pub config: IospConfig,
}

impl OpenOptions {
    pub fn with_config(config: IospConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}

/// Physical values of an enhanced read, row-major. Missing data is NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedArray {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl EnhancedArray {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }
}

/// An opened file with its model.
#[derive(Debug)]
pub struct Dataset {
    session: FileSession,
}

impl Dataset {
    /// Open a file, probing the provider its name suggests first.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, OpenOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let hint = options.file_type.unwrap_or_else(|| detect_file_type(path));
        debug!(
            path = %path.display(),
            hint = hint.provider_id().unwrap_or("none"),
            "Opening dataset"
        );
        let session = registry_for(options.config, hint).open_path(path)?;
        Ok(Self::opened(session))
    }

    /// Open a file with configuration loaded from a YAML file.
    pub fn open_with_config_file(path: impl AsRef<Path>, config: impl AsRef<Path>) -> Result<Self> {
        let config = IospConfig::from_file(config)?;
        Self::open_with(path, OpenOptions::with_config(config))
    }

    /// Open an in-memory file. `name` feeds the file type hint and log fields.
    pub fn from_bytes(name: &str, data: impl Into<Bytes>, options: OpenOptions) -> Result<Self> {
        let hint = options.file_type.unwrap_or_else(|| detect_file_type(name));
        let source = Arc::new(MemorySource::new(name, data));
        let session = registry_for(options.config, hint).open(source)?;
        Ok(Self::opened(session))
    }

    fn opened(session: FileSession) -> Self {
        info!(
            location = %session.location(),
            iosp = session.file_type_id().unwrap_or("none"),
            "Dataset ready"
        );
        Self { session }
    }

    pub fn location(&self) -> &str {
        self.session.location()
    }

    pub fn file_type_id(&self) -> Option<&'static str> {
        self.session.file_type_id()
    }

    pub fn model(&self) -> Result<&CdmModel> {
        Ok(self.session.model()?)
    }

    /// Full names of every variable.
    pub fn variable_names(&self) -> Result<Vec<String>> {
        let model = self.model()?;
        Ok(model.variables().map(|v| model.full_name(v)).collect())
    }

    /// Text of a global attribute.
    pub fn global_text(&self, name: &str) -> Option<String> {
        let model = self.session.model().ok()?;
        model
            .find_global_attribute(name)?
            .as_text()
            .map(str::to_string)
    }

    pub fn read(&self, name: &str, section: &Section) -> Result<Array> {
        Ok(self.session.read(name, section)?)
    }

    /// Read using the textual section form, e.g. `"0,:,0:9:2"`.
    pub fn read_str(&self, name: &str, section: &str) -> Result<Array> {
        Ok(self.session.read_section_str(name, section)?)
    }

    pub fn read_all(&self, name: &str) -> Result<Array> {
        Ok(self.session.read_all(name)?)
    }

    /// Scale, offset and missing-value conversion of a variable.
    pub fn enhancer(&self, name: &str) -> Result<Enhancer> {
        let var = self.session.find_variable(name)?;
        if !var.data_type().is_numeric() {
            return Err(CdmError::Unsupported(format!(
                "{} has non-numeric type {}",
                name,
                var.data_type()
            ))
            .into());
        }
        Ok(Enhancer::from_attributes(var.attributes()))
    }

    /// Read a section and convert it to physical values.
    pub fn read_enhanced(&self, name: &str, section: &Section) -> Result<EnhancedArray> {
        let enhancer = self.enhancer(name)?;
        let array = self.read(name, section)?;
        Ok(enhance(&enhancer, &array))
    }

    pub fn read_enhanced_str(&self, name: &str, section: &str) -> Result<EnhancedArray> {
        let enhancer = self.enhancer(name)?;
        let array = self.read_str(name, section)?;
        Ok(enhance(&enhancer, &array))
    }

    /// Enhanced reads of several sections, run through the session's
    /// parallel read path. Results keep request order.
    pub fn read_many_enhanced(&self, requests: &[(&str, Section)]) -> Vec<Result<EnhancedArray>> {
        self.session
            .read_many(requests)
            .into_iter()
            .zip(requests)
            .map(|(result, (name, _))| -> Result<EnhancedArray> {
                let enhancer = self.enhancer(name)?;
                Ok(enhance(&enhancer, &result?))
            })
            .collect()
    }

    /// Pick up records appended since open.
    pub fn sync(&self) -> Result<bool> {
        Ok(self.session.sync()?)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.session.cancel_token()
    }

    pub fn close(mut self) -> Result<()> {
        Ok(self.session.close()?)
    }
}

fn enhance(enhancer: &Enhancer, array: &Array) -> EnhancedArray {
    EnhancedArray {
        shape: array.shape().to_vec(),
        values: enhancer.apply(array),
    }
}
