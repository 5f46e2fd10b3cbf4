use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PERSONA_NAME: &str = "Chris Casey";
pub const DEFAULT_BIOGRAPHY_PATH: &str = "me/coverletter.txt";
pub const DEFAULT_PROFILE_PATH: &str = "me/Profile.pdf";

pub const DEFAULT_RESPONDER_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_RESPONDER_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EVALUATOR_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_EVALUATOR_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// On-disk configuration. Every field is optional; anything left unset falls
/// back to the environment or the built-in default.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub persona: PersonaSection,
    pub responder: BackendSection,
    pub evaluator: BackendSection,
    pub regeneration: RegenerationSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biography: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenerationSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_trigger_instruction: Option<bool>,
}

/// Shortens paths under `$HOME` to `~/...` for messages shown to the user.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
