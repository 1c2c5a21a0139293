use crate::error::ConfigError;
use crate::persona::{builtin_personas, PersonaConfig, YULETIDE_CORE};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub live: LiveConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default = "builtin_personas")]
    pub personas: Vec<PersonaConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            audio: AudioConfig::default(),
            live: LiveConfig::default(),
            session: SessionConfig::default(),
            personas: builtin_personas(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_device_name")]
    pub input_device: String,

    #[serde(default = "default_device_name")]
    pub output_device: String,

    /// Frames per captured block handed to the outbound path.
    #[serde(default = "default_capture_block_size")]
    pub capture_block_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: default_device_name(),
            output_device: default_device_name(),
            capture_block_size: default_capture_block_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LiveConfig {
    #[serde(default = "default_connector")]
    pub connector: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Chunks the echo connector answers before it signals a turn boundary.
    #[serde(default = "default_echo_turn_chunks")]
    pub echo_turn_chunks: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            connector: default_connector(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: String::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
            echo_turn_chunks: default_echo_turn_chunks(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_persona")]
    pub default_persona: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_persona: default_persona(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_device_name() -> String {
    "default".to_string()
}

fn default_capture_block_size() -> usize {
    4096
}

fn default_connector() -> String {
    "gemini".to_string()
}

fn default_endpoint() -> String {
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash-native-audio-preview-09-2025".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_echo_turn_chunks() -> usize {
    8
}

fn default_persona() -> String {
    YULETIDE_CORE.to_string()
}

/// Interpolate `${VAR}` patterns with environment variable values.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut result = input.to_string();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let value = std::env::var(var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    Ok(result)
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            personas = config.personas.len(),
            "config loaded"
        );
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.capture_block_size == 0 {
            return Err(ConfigError::Invalid(
                "audio.capture_block_size must be greater than zero".to_string(),
            ));
        }
        if self.live.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "live.connect_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.live.echo_turn_chunks == 0 {
            return Err(ConfigError::Invalid(
                "live.echo_turn_chunks must be greater than zero".to_string(),
            ));
        }
        if self.personas.is_empty() {
            return Err(ConfigError::Invalid("at least one persona is required".to_string()));
        }

        let mut seen = HashSet::new();
        for persona in &self.personas {
            if !seen.insert(persona.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate persona id '{}'",
                    persona.id
                )));
            }
        }

        if self.persona(&self.session.default_persona).is_none() {
            return Err(ConfigError::Invalid(format!(
                "default persona '{}' is not defined",
                self.session.default_persona
            )));
        }
        Ok(())
    }

    pub fn persona(&self, id: &str) -> Option<&PersonaConfig> {
        self.personas.iter().find(|p| p.id == id)
    }
}
