#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// What to do when a fragment can only be rebased onto its spread site by
    /// matching stale parameters by type rather than by identity.
    pub type_match_fallback: TypeMatchFallback,
    /// Maximum nesting depth of a selection, root fields being at depth 1.
    /// Unlimited by default.
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TypeMatchFallback {
    /// Rewrite and emit a warning.
    #[default]
    Warn,
    /// Rewrite silently.
    Allow,
    /// Fail the compilation.
    Deny,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid compiler configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CompilerConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CompilerConfig::from_toml("").unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.type_match_fallback, TypeMatchFallback::Warn);
        assert_eq!(config.max_depth, None);
    }

    #[test]
    fn all_settings() {
        let config = CompilerConfig::from_toml(
            r#"
            type_match_fallback = "deny"
            max_depth = 12
            "#,
        )
        .unwrap();

        assert_eq!(
            config,
            CompilerConfig {
                type_match_fallback: TypeMatchFallback::Deny,
                max_depth: Some(12),
            }
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = CompilerConfig::from_toml("materialize = false").unwrap_err();
        assert!(error.to_string().contains("unknown field"), "{error}");
    }
}
