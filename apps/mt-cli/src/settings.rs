use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

const DEFAULT_PORT: &str = "COM1";
const DEFAULT_BAUD: i64 = 2400;
const DEFAULT_QUANTITY_BAUD: i64 = 9600;

/// Channel settings as stored in `settings.json`. Unknown keys are ignored so
/// the file can be shared with the rest of the dairy application.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port: String,
    pub baud_rate: i64,
    pub port_quantity: Option<String>,
    pub baud_rate_quantity: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD,
            port_quantity: None,
            baud_rate_quantity: DEFAULT_QUANTITY_BAUD,
        }
    }
}

/// Values given on the command line; each one wins over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<String>,
    pub baud_rate: Option<i64>,
    pub port_quantity: Option<String>,
    pub baud_rate_quantity: Option<i64>,
}

impl Settings {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading settings: {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings: {}", path.display()))?;
        Ok(settings.normalized())
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(baud) = overrides.baud_rate {
            self.baud_rate = baud;
        }
        if let Some(port) = overrides.port_quantity {
            self.port_quantity = Some(port);
        }
        if let Some(baud) = overrides.baud_rate_quantity {
            self.baud_rate_quantity = baud;
        }
        self
    }

    // Stored values that cannot be used fall back to the defaults
    fn normalized(mut self) -> Self {
        if self.port.trim().is_empty() {
            self.port = DEFAULT_PORT.to_string();
        }
        if self.baud_rate <= 0 {
            self.baud_rate = DEFAULT_BAUD;
        }
        if self.baud_rate_quantity <= 0 {
            self.baud_rate_quantity = DEFAULT_QUANTITY_BAUD;
        }
        self.port_quantity = self.port_quantity.filter(|p| !p.trim().is_empty());
        self
    }
}
