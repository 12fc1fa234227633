use crate::IntakeError;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file locations searched when no explicit path is given.
pub const CONFIG_SEARCH_PATHS: [&str; 2] = ["configs/default.toml", "config/config.toml"];

/// Platform variables and the keys they set.
const PLATFORM_STRING_VARS: [(&str, &str); 2] = [
    ("FUNCTION_TARGET", "function.target"),
    ("GCP_PROJECT", "gcp.project_id"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub function: FunctionConfig,
    pub gcp: GcpConfig,
    pub storage: StorageConfig,
    pub speech: SpeechConfig,
    pub validation: ValidationConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_request_body_size_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FunctionConfig {
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GcpConfig {
    pub project_id: Option<String>,
    pub region: String,
    /// Static bearer token; when unset tokens come from the metadata server.
    pub access_token: Option<String>,
    /// Skip authentication entirely (storage emulators).
    pub anonymous: bool,
    pub metadata_endpoint: String,
    pub storage_endpoint: String,
    pub speech_endpoint: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Gcs,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub output_bucket: String,
    /// Parent directory for per-event scratch directories; system temp dir when unset.
    pub scratch_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SpeechConfig {
    pub recognizer: String,
    pub language_codes: Vec<String>,
    pub model: String,
    pub enable_automatic_punctuation: bool,
    pub audio_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    pub ffprobe_path: String,
    pub probe_timeout_secs: u64,
    pub reject_unsupported: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    pub bucket: String,
    pub object: String,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 8080,
                max_request_body_size_mb: 10,
            },
            function: FunctionConfig {
                target: "analyze_discovery_material_ce".to_string(),
            },
            gcp: GcpConfig {
                project_id: None,
                region: "us-west1".to_string(),
                access_token: None,
                anonymous: false,
                metadata_endpoint: "http://metadata.google.internal".to_string(),
                storage_endpoint: "https://storage.googleapis.com".to_string(),
                speech_endpoint: None,
                request_timeout_secs: 300,
            },
            storage: StorageConfig {
                backend: StorageBackend::Gcs,
                output_bucket: "discovery-processed".to_string(),
                scratch_dir: None,
            },
            speech: SpeechConfig {
                recognizer: "my-recognizer".to_string(),
                language_codes: vec!["en-US".to_string()],
                model: "long".to_string(),
                enable_automatic_punctuation: true,
                audio_extensions: [".mp3", ".wav", ".flac", ".m4a", ".ogg"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            validation: ValidationConfig {
                ffprobe_path: "ffprobe".to_string(),
                probe_timeout_secs: 30,
                reject_unsupported: true,
            },
            audit: AuditConfig {
                bucket: "discovery-processed".to_string(),
                object: "logs/logs.txt".to_string(),
                max_retries: 5,
                backoff_ms: 500,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Json,
            },
        }
    }
}

impl Config {
    /// Layered configuration: defaults, then the TOML file, then `INTAKE_*`
    /// variables, then the platform variables `PORT`, `FUNCTION_TARGET` and
    /// `GCP_PROJECT`.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match path {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Some(found) = CONFIG_SEARCH_PATHS
                    .iter()
                    .map(PathBuf::from)
                    .find(|p| p.exists())
                {
                    figment = figment.merge(Toml::file(found));
                }
            }
        }

        figment = figment
            .merge(Env::prefixed("INTAKE_").ignore(&["CONFIG"]).split("__"))
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()));

        // merged as strings; env parsing would turn `123` into an integer
        for (var, key) in PLATFORM_STRING_VARS {
            if let Some(value) = std::env::var(var).ok().filter(|v| !v.is_empty()) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }
        figment
    }

    pub fn load(path: Option<&Path>) -> Result<Self, IntakeError> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(IntakeError::ConfigError {
                    reason: format!("config file not found: {}", path.display()),
                });
            }
        }
        Self::figment(path)
            .extract()
            .map_err(|e| IntakeError::ConfigError {
                reason: e.to_string(),
            })
    }

    /// Checks the settings the server cannot run without.
    pub fn validate(&self) -> Result<(), IntakeError> {
        if self.function.target.trim().is_empty() {
            return Err(IntakeError::ConfigError {
                reason: "function.target must not be empty".to_string(),
            });
        }
        if self.audit.max_retries == 0 {
            return Err(IntakeError::ConfigError {
                reason: "audit.max_retries must be at least 1".to_string(),
            });
        }
        if self.storage.backend == StorageBackend::Gcs && self.storage.output_bucket.is_empty() {
            return Err(IntakeError::ConfigError {
                reason: "storage.output_bucket must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl GcpConfig {
    pub fn speech_endpoint(&self) -> String {
        self.speech_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}-speech.googleapis.com", self.region))
    }
}

impl SpeechConfig {
    /// Fully qualified recognizer resource name.
    pub fn recognizer_path(&self, project_id: &str, region: &str) -> String {
        format!(
            "projects/{}/locations/{}/recognizers/{}",
            project_id, region, self.recognizer
        )
    }

    pub fn is_audio_extension(&self, ext: &str) -> bool {
        self.audio_extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_deployment_contract() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.function.target, "analyze_discovery_material_ce");
        assert_eq!(config.audit.object, "logs/logs.txt");
        assert!(config.speech.is_audio_extension(".MP3"));
        assert!(!config.speech.is_audio_extension(".mp4"));
        assert_eq!(
            config.gcp.speech_endpoint(),
            "https://us-west1-speech.googleapis.com"
        );
    }

    #[test]
    fn platform_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "intake.toml",
                r#"
                [server]
                port = 9000

                [audit]
                max_retries = 3
                "#,
            )?;
            jail.set_env("PORT", "9191");
            jail.set_env("FUNCTION_TARGET", "other_fn");
            jail.set_env("GCP_PROJECT", "discovery-prod");

            let config = Config::load(Some(Path::new("intake.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 9191);
            assert_eq!(config.function.target, "other_fn");
            assert_eq!(config.gcp.project_id.as_deref(), Some("discovery-prod"));
            assert_eq!(config.audit.max_retries, 3);
            assert_eq!(config.audit.backoff_ms, 500);
            Ok(())
        });
    }

    #[test]
    fn numeric_platform_values_stay_strings() {
        Jail::expect_with(|jail| {
            jail.set_env("FUNCTION_TARGET", "123");
            jail.set_env("GCP_PROJECT", "4815162342");

            let config = Config::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.function.target, "123");
            assert_eq!(config.gcp.project_id.as_deref(), Some("4815162342"));
            Ok(())
        });
    }

    #[test]
    fn prefixed_env_reaches_nested_sections() {
        Jail::expect_with(|jail| {
            jail.set_env("INTAKE_STORAGE__BACKEND", "memory");
            jail.set_env("INTAKE_LOGGING__FORMAT", "pretty");
            jail.set_env("INTAKE_CONFIG", "ignored.toml");

            let config = Config::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.storage.backend, StorageBackend::Memory);
            assert_eq!(config.logging.format, LogFormat::Pretty);
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        Jail::expect_with(|_jail| {
            let err = Config::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(err, IntakeError::ConfigError { .. }));
            Ok(())
        });
    }

    #[test]
    fn validate_rejects_empty_target() {
        let mut config = Config::default();
        config.function.target = "  ".to_string();
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }
}
