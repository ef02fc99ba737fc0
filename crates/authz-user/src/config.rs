//! Authorization configuration.
//!
//! Two layers live here:
//!
//! - [`ScopeConfig`], the per-location/per-directory record holding the
//!   `AuthzUserAuthoritative` flag, with nearest-scope-wins merging.
//! - [`AuthzConfig`], the root configuration loaded from TOML, holding logging
//!   and pipeline settings plus named scopes.
//!
//! # Example (TOML)
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [pipeline]
//! default_decision = "deny"
//!
//! [scopes."/"]
//! authoritative = true
//!
//! [scopes."/shared"]
//! authoritative = false
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineConfig;

/// Directive that sets [`ScopeConfig::authoritative`].
pub const AUTHORITATIVE_DIRECTIVE: &str = "AuthzUserAuthoritative";

// =============================================================================
// Errors
// =============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// The configuration text could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A directive this module does not handle.
    #[error("Unknown directive: {0}")]
    UnknownDirective(String),

    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(String),
}

impl ConfigError {
    #[must_use]
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    #[must_use]
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }
}

// =============================================================================
// Scope Configuration
// =============================================================================

/// Per-scope settings.
///
/// `None` means the scope did not set the flag and inherits it from the
/// enclosing scope. An unset flag at the outermost scope is `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Whether an unmet `user`/`except` rule denies (`true`) or passes the
    /// decision to the next provider (`false`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authoritative: Option<bool>,
}

impl ScopeConfig {
    /// Effective `authoritative` value.
    #[must_use]
    pub fn authoritative(&self) -> bool {
        self.authoritative.unwrap_or(true)
    }

    /// Merge an enclosing scope with a nested one. Settings made by the nested
    /// scope win.
    #[must_use]
    pub fn merge(parent: &ScopeConfig, child: &ScopeConfig) -> ScopeConfig {
        ScopeConfig {
            authoritative: child.authoritative.or(parent.authoritative),
        }
    }

    /// Apply one configuration directive to this scope.
    ///
    /// Directive names are matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownDirective`] for directives other than
    /// `AuthzUserAuthoritative`, and [`ConfigError::InvalidValue`] when the
    /// value is not `On` or `Off`.
    pub fn apply_directive(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        if !name.eq_ignore_ascii_case(AUTHORITATIVE_DIRECTIVE) {
            return Err(ConfigError::UnknownDirective(name.to_string()));
        }
        self.authoritative = Some(parse_flag(AUTHORITATIVE_DIRECTIVE, value)?);
        Ok(())
    }
}

/// Parse an `On`/`Off` flag argument (case-insensitive).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] for anything else.
pub fn parse_flag(directive: &str, value: &str) -> Result<bool, ConfigError> {
    if value.eq_ignore_ascii_case("on") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("off") {
        Ok(false)
    } else {
        Err(ConfigError::invalid_value(format!(
            "{directive} must be On or Off, got '{value}'"
        )))
    }
}

// =============================================================================
// Root Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive for the tracing subscriber (e.g. `info`,
    /// `authz_user=debug`). `RUST_LOG` takes precedence when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Provider chain configuration.
    pub pipeline: PipelineConfig,

    /// Scope settings keyed by path prefix.
    pub scopes: BTreeMap<String, ScopeConfig>,
}

impl AuthzConfig {
    /// Parse configuration from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and any error from
    /// [`AuthzConfig::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AuthzConfig =
            toml::from_str(text).map_err(|e| ConfigError::parse(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`AuthzConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), scopes = config.scopes.len(), "Loaded authz configuration");
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The logging level is empty
    /// - A scope key does not start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value("logging.level cannot be empty"));
        }

        for path in self.scopes.keys() {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid_value(format!(
                    "scope '{path}' must start with '/'"
                )));
            }
        }

        Ok(())
    }

    /// Effective scope settings for a request path.
    ///
    /// Every configured scope whose path is a prefix of `uri` on a segment
    /// boundary applies, merged from the outermost to the innermost.
    #[must_use]
    pub fn scope_for(&self, uri: &str) -> ScopeConfig {
        let mut matching: Vec<&String> = self
            .scopes
            .keys()
            .filter(|prefix| scope_contains(prefix, uri))
            .collect();
        matching.sort_by_key(|prefix| prefix.len());

        matching
            .into_iter()
            .filter_map(|prefix| self.scopes.get(prefix))
            .fold(ScopeConfig::default(), |acc, scope| ScopeConfig::merge(&acc, scope))
    }
}

fn scope_contains(prefix: &str, uri: &str) -> bool {
    if prefix == "/" {
        return uri.starts_with('/');
    }
    if prefix.ends_with('/') {
        return uri.starts_with(prefix);
    }
    match uri.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::DefaultDecision;

    #[test]
    fn test_scope_default_is_authoritative() {
        assert!(ScopeConfig::default().authoritative());
    }

    #[test]
    fn test_merge_child_wins() {
        let parent = ScopeConfig {
            authoritative: Some(false),
        };
        let child = ScopeConfig {
            authoritative: Some(true),
        };
        assert!(ScopeConfig::merge(&parent, &child).authoritative());
        assert!(!ScopeConfig::merge(&child, &parent).authoritative());
    }

    #[test]
    fn test_merge_unset_child_inherits() {
        let parent = ScopeConfig {
            authoritative: Some(false),
        };
        let merged = ScopeConfig::merge(&parent, &ScopeConfig::default());
        assert_eq!(merged.authoritative, Some(false));
        assert!(!merged.authoritative());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("X", "On").unwrap());
        assert!(parse_flag("X", "ON").unwrap());
        assert!(!parse_flag("X", "off").unwrap());
        let err = parse_flag("X", "yes").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
        assert!(err.to_string().contains("On or Off"));
    }

    #[test]
    fn test_apply_directive() {
        let mut scope = ScopeConfig::default();
        scope.apply_directive("AuthzUserAuthoritative", "Off").unwrap();
        assert_eq!(scope.authoritative, Some(false));
        scope.apply_directive("authzuserauthoritative", "on").unwrap();
        assert_eq!(scope.authoritative, Some(true));
    }

    #[test]
    fn test_apply_unknown_directive() {
        let mut scope = ScopeConfig::default();
        let err = scope.apply_directive("AuthType", "Basic").unwrap_err();
        assert_eq!(err, ConfigError::UnknownDirective("AuthType".to_string()));
        assert_eq!(scope, ScopeConfig::default());
    }

    #[test]
    fn test_from_toml() {
        let config = AuthzConfig::from_toml_str(
            r#"
            [logging]
            level = "debug"

            [pipeline]
            default_decision = "allow"

            [scopes."/"]
            authoritative = true

            [scopes."/shared"]
            authoritative = false

            [scopes."/shared/strict"]
            authoritative = true

            [scopes."/shared/inherit"]
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.pipeline.default_decision, DefaultDecision::Allow);
        assert!(config.scope_for("/index.html").authoritative());
        assert!(!config.scope_for("/shared").authoritative());
        assert!(!config.scope_for("/shared/doc.txt").authoritative());
        assert!(config.scope_for("/shared/strict/x").authoritative());
        assert!(!config.scope_for("/shared/inherit/x").authoritative());
        // Prefix must end on a segment boundary.
        assert!(config.scope_for("/sharedfoo").authoritative());
    }

    #[test]
    fn test_trailing_slash_scope_needs_the_slash() {
        let config = AuthzConfig::from_toml_str(
            r#"
            [scopes."/shared/"]
            authoritative = false
            "#,
        )
        .unwrap();

        assert!(config.scope_for("/shared").authoritative());
        assert!(!config.scope_for("/shared/").authoritative());
        assert!(!config.scope_for("/shared/doc.txt").authoritative());
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = AuthzConfig::from_toml_str("").unwrap();
        assert_eq!(config, AuthzConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.scope_for("/anything").authoritative());
    }

    #[test]
    fn test_invalid_toml() {
        let err = AuthzConfig::from_toml_str("[logging").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_rejects_relative_scope() {
        let err = AuthzConfig::from_toml_str("[scopes.private]\nauthoritative = false\n").unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));
    }

    #[test]
    fn test_validate_rejects_empty_level() {
        let mut config = AuthzConfig::default();
        config.logging.level = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authz.toml");
        std::fs::write(&path, "[scopes.\"/a\"]\nauthoritative = false\n").unwrap();
        let config = AuthzConfig::from_file(&path).unwrap();
        assert!(!config.scope_for("/a/b").authoritative());

        let err = AuthzConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue("test error".to_string());
        assert_eq!(err.to_string(), "Invalid configuration value: test error");

        let err = ConfigError::UnknownDirective("Foo".to_string());
        assert_eq!(err.to_string(), "Unknown directive: Foo");
    }

    #[test]
    fn test_config_error_constructors() {
        assert_eq!(ConfigError::parse("bad"), ConfigError::Parse("bad".to_string()));
        assert_eq!(
            ConfigError::invalid_value("x"),
            ConfigError::InvalidValue("x".to_string())
        );
    }
}
