//! TISS wire codec
//!
//! Renders a [`ClaimBatch`](crate::batch::ClaimBatch) into the regulator's
//! batch XML and checks the structure of generated or externally supplied
//! documents.
//!
//! # Document layout
//!
//! ```text
//! tissLoteGuias
//! ├── cabecalho      identificacaoTransacao, origem, destino, versaoPadrao
//! ├── guias          one element per guide, named by its GuideType
//! └── rodape         quantidadeGuias, valorTotal
//! ```
//!
//! Generation fails with a [`TissError`](crate::error::TissError). Structural
//! problems found by validation are returned as an [`XmlValidationResult`]
//! and the caller decides whether to proceed.

mod generator;
mod tree;
mod validator;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use core_kernel::Timezone;

pub use generator::TissXmlDocument;

/// Version of the TISS standard rendered by default
pub const DEFAULT_STANDARD_VERSION: &str = "4.02.00";

/// Namespace of the TISS schemas
pub const TISS_NAMESPACE: &str = "http://www.ans.gov.br/padroes/tiss/schemas";

pub(crate) const ROOT_ELEMENT: &str = "tissLoteGuias";
pub(crate) const HEADER_SECTIONS: [&str; 3] = ["cabecalho", "guias", "rodape"];
pub(crate) const HEADER_ELEMENTS: [&str; 4] =
    ["identificacaoTransacao", "origem", "destino", "versaoPadrao"];

/// Codec settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    pub standard_version: String,
    /// Directory holding the reference XSD files
    pub schema_dir: Option<PathBuf>,
    /// Timezone used for the transaction date and time
    pub timezone: Timezone,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            standard_version: DEFAULT_STANDARD_VERSION.to_string(),
            schema_dir: None,
            timezone: Timezone::default(),
        }
    }
}

impl CodecConfig {
    /// Expected reference schema, e.g. `tissV4_02_00.xsd`
    pub fn schema_path(&self) -> Option<PathBuf> {
        self.schema_dir.as_ref().map(|dir| {
            dir.join(format!("tissV{}.xsd", self.standard_version.replace('.', "_")))
        })
    }
}

/// Outcome of a structural check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl XmlValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        let mut result = Self::ok();
        result.add_error(error);
        result
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.is_valid = false;
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

impl Default for XmlValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

/// Stateless encoder/validator; safe to share across threads
#[derive(Debug, Clone, Default)]
pub struct TissCodec {
    config: CodecConfig,
}

impl TissCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}
