use std::fs;
use std::path::Path;

use tracing::info;

use crate::core::config::io::ConfigError;
use crate::core::document::extract_pdf_text;

/// Who the responder plays, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaContext {
    pub name: String,
    pub summary: String,
    pub profile_text: String,
}

impl PersonaContext {
    /// Reads the biography as UTF-8 text and extracts the profile PDF.
    pub fn load(
        name: &str,
        biography_path: &Path,
        profile_path: &Path,
    ) -> Result<Self, ConfigError> {
        let profile_text = extract_pdf_text(profile_path).map_err(|source| ConfigError::Profile {
            path: profile_path.to_path_buf(),
            source,
        })?;
        let summary =
            fs::read_to_string(biography_path).map_err(|source| ConfigError::Biography {
                path: biography_path.to_path_buf(),
                source,
            })?;

        info!(
            persona = name,
            summary_chars = summary.len(),
            profile_chars = profile_text.len(),
            "persona loaded"
        );

        Ok(Self {
            name: name.to_string(),
            summary,
            profile_text,
        })
    }
}
