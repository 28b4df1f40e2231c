//! Service configuration loaded from the environment (and `.env`).

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::bill::converter::{DEFAULT_DISPLAY_BASE, DEFAULT_DISPLAY_SPAN};
use crate::bill::validation::{RequestLimits, DEFAULT_MAX_FIELD_LEN, DEFAULT_MAX_IMAGE_BYTES};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("unknown converter '{0}', expected 'native' or 'headless-office'")]
    UnknownConverter(String),
}

/// Which PDF conversion strategy the pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterKind {
    Native,
    HeadlessOffice,
}

impl FromStr for ConverterKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "native" | "soffice" => Ok(Self::Native),
            "headless-office" | "headless_office" | "xvfb" => Ok(Self::HeadlessOffice),
            other => Err(ConfigError::UnknownConverter(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    pub template_path: PathBuf,
    pub workspace_dir: Option<PathBuf>,
    pub converter: ConverterKind,
    pub soffice_bin: String,
    pub xvfb_bin: String,
    pub unoconv_bin: String,
    pub xvfb_display_base: u32,
    pub xvfb_display_span: u32,
    pub xvfb_startup_ms: u64,
    pub conversion_timeout_secs: u64,
    pub limits: RequestLimits,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            template_path: PathBuf::from("template.docx"),
            workspace_dir: None,
            converter: ConverterKind::Native,
            soffice_bin: "soffice".to_string(),
            xvfb_bin: "Xvfb".to_string(),
            unoconv_bin: "unoconv".to_string(),
            xvfb_display_base: DEFAULT_DISPLAY_BASE,
            xvfb_display_span: DEFAULT_DISPLAY_SPAN,
            xvfb_startup_ms: 500,
            conversion_timeout_secs: 120,
            limits: RequestLimits::default(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; unset or blank keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            bind_address: get("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: parse(&get, "PORT", defaults.port)?,
            template_path: get("TEMPLATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.template_path),
            workspace_dir: get("WORKSPACE_DIR").map(PathBuf::from),
            converter: match get("CONVERTER") {
                Some(value) => value.parse()?,
                None => defaults.converter,
            },
            soffice_bin: get("SOFFICE_BIN").unwrap_or(defaults.soffice_bin),
            xvfb_bin: get("XVFB_BIN").unwrap_or(defaults.xvfb_bin),
            unoconv_bin: get("UNOCONV_BIN").unwrap_or(defaults.unoconv_bin),
            xvfb_display_base: parse(&get, "XVFB_DISPLAY_BASE", defaults.xvfb_display_base)?,
            xvfb_display_span: parse(&get, "XVFB_DISPLAY_SPAN", defaults.xvfb_display_span)?,
            xvfb_startup_ms: parse(&get, "XVFB_STARTUP_MS", defaults.xvfb_startup_ms)?,
            conversion_timeout_secs: parse(
                &get,
                "CONVERSION_TIMEOUT_SECS",
                defaults.conversion_timeout_secs,
            )?,
            limits: RequestLimits {
                max_field_len: parse(&get, "MAX_FIELD_LEN", DEFAULT_MAX_FIELD_LEN)?,
                max_image_bytes: parse(&get, "MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES)?,
            },
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
