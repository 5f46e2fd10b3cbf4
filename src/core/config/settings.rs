//! Runtime settings resolved from the environment, the config file and the
//! built-in defaults, in that order of precedence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::completion::ClientConfig;
use crate::core::config::data::{
    BackendSection, Config, DEFAULT_BIOGRAPHY_PATH, DEFAULT_EVALUATOR_BASE_URL,
    DEFAULT_EVALUATOR_MODEL, DEFAULT_PERSONA_NAME, DEFAULT_PROFILE_PATH,
    DEFAULT_RESPONDER_BASE_URL, DEFAULT_RESPONDER_MODEL, DEFAULT_TIMEOUT_SECS,
};
use crate::core::config::io::{ConfigError, CONFIG_PATH_VAR};
use crate::core::orchestrator::RegenerationPolicy;

pub const RESPONDER_KEY_VAR: &str = "OPENAI_API_KEY";
pub const EVALUATOR_KEY_VAR: &str = "GOOGLE_API_KEY";
pub const LOG_FILE_VAR: &str = "STANDIN_LOG_FILE";
pub const LOG_FILTER_VAR: &str = "STANDIN_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Environment variable names for one backend's overrides.
struct BackendVars {
    key: &'static str,
    base_url: &'static str,
    model: &'static str,
}

const RESPONDER_VARS: BackendVars = BackendVars {
    key: RESPONDER_KEY_VAR,
    base_url: "STANDIN_RESPONDER_BASE_URL",
    model: "STANDIN_RESPONDER_MODEL",
};

const EVALUATOR_VARS: BackendVars = BackendVars {
    key: EVALUATOR_KEY_VAR,
    base_url: "STANDIN_EVALUATOR_BASE_URL",
    model: "STANDIN_EVALUATOR_MODEL",
};

#[derive(Debug, Clone)]
pub struct Settings {
    pub persona_name: String,
    pub biography_path: PathBuf,
    pub profile_path: PathBuf,
    pub responder: ClientConfig,
    pub evaluator: ClientConfig,
    pub regeneration: RegenerationPolicy,
    pub log_file: Option<PathBuf>,
    pub log_filter: String,
}

impl Settings {
    /// Combines `config` with `env`. Credentials are only ever taken from `env`;
    /// an empty value counts as unset.
    pub fn resolve(config: &Config, env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let lookup = |name: &str| {
            env.get(name)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let responder = backend_config(
            "responder",
            &RESPONDER_VARS,
            &config.responder,
            DEFAULT_RESPONDER_BASE_URL,
            DEFAULT_RESPONDER_MODEL,
            &lookup,
        )?;
        let evaluator = backend_config(
            "evaluator",
            &EVALUATOR_VARS,
            &config.evaluator,
            DEFAULT_EVALUATOR_BASE_URL,
            DEFAULT_EVALUATOR_MODEL,
            &lookup,
        )?;

        let persona_name = lookup("STANDIN_PERSONA_NAME")
            .or_else(|| config.persona.name.clone())
            .unwrap_or_else(|| DEFAULT_PERSONA_NAME.to_string());
        let biography_path = lookup("STANDIN_BIOGRAPHY")
            .map(PathBuf::from)
            .or_else(|| config.persona.biography.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BIOGRAPHY_PATH));
        let profile_path = lookup("STANDIN_PROFILE")
            .map(PathBuf::from)
            .or_else(|| config.persona.profile.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROFILE_PATH));

        Ok(Self {
            persona_name,
            biography_path,
            profile_path,
            responder,
            evaluator,
            regeneration: RegenerationPolicy {
                keep_trigger_instruction: config
                    .regeneration
                    .keep_trigger_instruction
                    .unwrap_or(false),
            },
            log_file: lookup(LOG_FILE_VAR)
                .map(PathBuf::from)
                .or_else(|| config.log_file.clone()),
            log_filter: lookup(LOG_FILTER_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }

    /// Loads the config file and resolves it against the process environment.
    pub fn from_process_env() -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let explicit = env
            .get(CONFIG_PATH_VAR)
            .filter(|value| !value.trim().is_empty())
            .map(Path::new);
        let config = Config::load(explicit)?;
        Self::resolve(&config, &env)
    }
}

fn backend_config(
    label: &'static str,
    vars: &BackendVars,
    section: &BackendSection,
    default_base_url: &str,
    default_model: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    let api_key = lookup(vars.key).ok_or(ConfigError::MissingCredential {
        var: vars.key,
        role: label,
    })?;
    Ok(ClientConfig {
        label: label.to_string(),
        base_url: lookup(vars.base_url)
            .or_else(|| section.base_url.clone())
            .unwrap_or_else(|| default_base_url.to_string()),
        api_key,
        model: lookup(vars.model)
            .or_else(|| section.model.clone())
            .unwrap_or_else(|| default_model.to_string()),
        timeout: Duration::from_secs(section.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1)),
    })
}
