//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration is available before starting
//! operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{CompanionError, Result};
use crate::openai::is_api_key_configured;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Processing embeds chunks and, unless skipped, classifies them.
    Process,
    /// Affect profiling calls the classifier.
    Profile,
    /// Search embeds the query.
    Search,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    check_api_key()?;

    if matches!(operation, Operation::Process | Operation::Profile)
        && settings.affect.labels.is_empty()
    {
        return Err(CompanionError::Config(
            "affect.labels is empty; configure at least one emotion label".to_string(),
        ));
    }

    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    if is_api_key_configured() {
        return Ok(());
    }
    Err(CompanionError::Config(
        "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_requires_labels() {
        let mut settings = Settings::default();
        settings.affect.labels.clear();
        assert!(matches!(
            check(Operation::Profile, &settings),
            Err(CompanionError::Config(_))
        ));
    }
}
