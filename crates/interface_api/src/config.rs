//! API configuration
//!
//! Loaded from an optional `config/tiss.{toml,yaml,json}` file and then from
//! `API_*` environment variables. Nested keys use a double underscore, e.g.
//! `API_TISS__STANDARD_VERSION=4.02.00`.

use std::path::PathBuf;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use core_kernel::Timezone;
use domain_tiss::analytics::GlosaAlertThresholds;
use domain_tiss::{ClinicInfo, CodecConfig, OperatorInfo, TissError};

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Log level
    pub log_level: String,
    pub tiss: TissSettings,
    /// Clinic master data served by the in-memory lookup
    pub clinics: Vec<ClinicInfo>,
    /// Operator master data served by the in-memory lookup
    pub operators: Vec<OperatorInfo>,
}

/// TISS protocol and analytics settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TissSettings {
    pub standard_version: String,
    /// Directory holding `tissV*.xsd`; unset means schema checks are skipped with a warning
    pub schema_dir: Option<PathBuf>,
    pub timezone: Timezone,
    /// Where generated batch XML files are written
    pub xml_output_dir: PathBuf,
    pub alert_medium_threshold: Decimal,
    pub alert_high_threshold: Decimal,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            tiss: TissSettings::default(),
            clinics: Vec::new(),
            operators: Vec::new(),
        }
    }
}

impl Default for TissSettings {
    fn default() -> Self {
        Self {
            standard_version: domain_tiss::codec::DEFAULT_STANDARD_VERSION.to_string(),
            schema_dir: None,
            timezone: Timezone::sao_paulo(),
            xml_output_dir: PathBuf::from("./tiss-xml"),
            alert_medium_threshold: dec!(10),
            alert_high_threshold: dec!(25),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from the optional file and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("config/tiss").required(false))
            .add_source(
                config::Environment::with_prefix("API")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn codec_config(&self) -> CodecConfig {
        CodecConfig {
            standard_version: self.tiss.standard_version.clone(),
            schema_dir: self.tiss.schema_dir.clone(),
            timezone: self.tiss.timezone,
        }
    }

    pub fn alert_thresholds(&self) -> Result<GlosaAlertThresholds, TissError> {
        GlosaAlertThresholds::new(self.tiss.alert_medium_threshold, self.tiss.alert_high_threshold)
    }
}
