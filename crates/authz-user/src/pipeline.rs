//! Ordered chain of authorization providers.
//!
//! Providers are registered explicitly at startup and asked in order. The
//! first provider that allows or denies ends the chain; a provider that
//! declines hands the request to the next one. When every provider declines,
//! [`PipelineConfig::default_decision`] applies.
//!
//! ```ignore
//! use authz_user::engine::UserRequirementEvaluator;
//! use authz_user::pipeline::{AuthzPipeline, PipelineConfig};
//!
//! let pipeline = AuthzPipeline::builder()
//!     .config(PipelineConfig::default())
//!     .register(UserRequirementEvaluator::new())
//!     .build();
//!
//! match pipeline.authorize(&requirements, &ctx) {
//!     AuthzOutcome::Granted { .. } => serve(),
//!     AuthzOutcome::Denied { status, note, .. } => challenge(status, note.challenge()),
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::context::EvaluationContext;
use crate::engine::{Decision, DenyReason};
use crate::requirement::RequirementSet;

/// HTTP status sent when a provider denies access.
pub const HTTP_UNAUTHORIZED: u16 = 401;

// =============================================================================
// Provider
// =============================================================================

/// One link in the authorization chain.
///
/// Implementations must be stateless with respect to individual requests so
/// the same provider can serve many requests concurrently.
pub trait AuthzProvider: Send + Sync {
    /// Name used in logs and audit trails.
    fn name(&self) -> &str;

    /// Decide on `requirements` for the request described by `ctx`.
    fn evaluate(&self, requirements: &RequirementSet, ctx: &EvaluationContext) -> Decision;
}

// =============================================================================
// Configuration
// =============================================================================

/// Decision when every provider declines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultDecision {
    /// Allow access if no provider decides.
    Allow,
    /// Deny access unless a provider explicitly allows it.
    #[default]
    Deny,
}

/// Configuration for [`AuthzPipeline`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Decision when every provider declines.
    pub default_decision: DefaultDecision,
}

// =============================================================================
// Outcome
// =============================================================================

/// Data the caller needs to issue an authentication challenge after a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFailureNote {
    /// Authentication scheme in effect for the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,

    /// Realm to challenge for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
}

impl AuthFailureNote {
    fn from_context(ctx: &EvaluationContext) -> Self {
        Self {
            auth_type: ctx.auth_type.clone(),
            realm: ctx.realm.clone(),
        }
    }

    /// Value for a `WWW-Authenticate` header, if the scheme is known.
    ///
    /// Quotes and backslashes in the realm are escaped.
    #[must_use]
    pub fn challenge(&self) -> Option<String> {
        let scheme = self.auth_type.as_deref()?;
        let realm = self.realm.as_deref().unwrap_or_default();
        let mut escaped = String::with_capacity(realm.len());
        for c in realm.chars() {
            if c == '"' || c == '\\' {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        Some(format!("{scheme} realm=\"{escaped}\""))
    }
}

/// Final result of running the provider chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum AuthzOutcome {
    /// Serve the request.
    Granted {
        /// Provider that allowed, or `None` if the default decision allowed.
        #[serde(skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },
    /// Refuse the request and challenge the client.
    Denied {
        /// Provider that denied, or `None` if the default decision denied.
        #[serde(skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
        /// Why access was refused.
        reason: DenyReason,
        /// HTTP status for the response.
        status: u16,
        /// Challenge data for the response.
        note: AuthFailureNote,
    },
}

impl AuthzOutcome {
    /// Returns `true` if the request may be served.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    /// Returns `true` if the request was refused.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }

    /// Name of the deciding provider, if any.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Granted { provider } | Self::Denied { provider, .. } => provider.as_deref(),
        }
    }
}

/// Information about a provider that was asked.
#[derive(Debug, Clone)]
pub struct EvaluatedProvider {
    /// Provider name.
    pub name: String,

    /// What the provider returned.
    pub decision: Decision,
}

/// Complete result of running the chain with audit information.
#[derive(Debug, Clone)]
pub struct AuthorizationAudit {
    /// The final outcome.
    pub outcome: AuthzOutcome,

    /// Providers that were asked, in order.
    pub evaluated_providers: Vec<EvaluatedProvider>,

    /// Time taken to run the chain (milliseconds).
    pub evaluation_time_ms: f64,
}

// =============================================================================
// Pipeline
// =============================================================================

/// Ordered authorization provider chain.
#[derive(Clone, Default)]
pub struct AuthzPipeline {
    providers: Vec<Arc<dyn AuthzProvider>>,
    config: PipelineConfig,
}

impl fmt::Debug for AuthzPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthzPipeline")
            .field("providers", &self.provider_names())
            .field("config", &self.config)
            .finish()
    }
}

impl AuthzPipeline {
    #[must_use]
    pub fn builder() -> AuthzPipelineBuilder {
        AuthzPipelineBuilder::default()
    }

    /// Names of the registered providers, in evaluation order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the chain for one request.
    pub fn authorize(&self, requirements: &RequirementSet, ctx: &EvaluationContext) -> AuthzOutcome {
        self.run(requirements, ctx, |_, _| {})
    }

    /// Run the chain and record what every provider returned.
    pub fn authorize_with_audit(
        &self,
        requirements: &RequirementSet,
        ctx: &EvaluationContext,
    ) -> AuthorizationAudit {
        let start = Instant::now();
        let mut evaluated_providers = Vec::new();
        let outcome = self.run(requirements, ctx, |name, decision| {
            evaluated_providers.push(EvaluatedProvider {
                name: name.to_string(),
                decision: decision.clone(),
            });
        });

        AuthorizationAudit {
            outcome,
            evaluated_providers,
            evaluation_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }

    fn run(
        &self,
        requirements: &RequirementSet,
        ctx: &EvaluationContext,
        mut record: impl FnMut(&str, &Decision),
    ) -> AuthzOutcome {
        for provider in &self.providers {
            let name = provider.name();
            let decision = provider.evaluate(requirements, ctx);
            record(name, &decision);

            match decision {
                Decision::Allow => {
                    tracing::debug!(
                        provider = name,
                        user = %ctx.user,
                        uri = %ctx.uri,
                        method = %ctx.method,
                        "Provider allowed access"
                    );
                    return AuthzOutcome::Granted {
                        provider: Some(name.to_string()),
                    };
                }
                Decision::Deny(reason) => {
                    return deny(ctx, Some(name), reason.with_provider(name));
                }
                Decision::Decline => {
                    tracing::trace!(provider = name, uri = %ctx.uri, "Provider declined");
                }
            }
        }

        match self.config.default_decision {
            DefaultDecision::Allow => {
                tracing::debug!(uri = %ctx.uri, "No provider decided, default allow");
                AuthzOutcome::Granted { provider: None }
            }
            DefaultDecision::Deny => {
                deny(ctx, None, DenyReason::no_provider_matched(&ctx.uri, &ctx.user))
            }
        }
    }
}

fn deny(ctx: &EvaluationContext, provider: Option<&str>, reason: DenyReason) -> AuthzOutcome {
    tracing::error!(
        provider = provider.unwrap_or("default"),
        user = %ctx.user,
        uri = %ctx.uri,
        code = %reason.code,
        "{}",
        reason.message
    );

    AuthzOutcome::Denied {
        provider: provider.map(str::to_string),
        reason,
        status: HTTP_UNAUTHORIZED,
        note: AuthFailureNote::from_context(ctx),
    }
}

/// Builder for [`AuthzPipeline`].
#[derive(Default)]
pub struct AuthzPipelineBuilder {
    providers: Vec<Arc<dyn AuthzProvider>>,
    config: PipelineConfig,
}

impl AuthzPipelineBuilder {
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a provider to the end of the chain.
    #[must_use]
    pub fn register(mut self, provider: impl AuthzProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Append an already shared provider to the end of the chain.
    #[must_use]
    pub fn register_shared(mut self, provider: Arc<dyn AuthzProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    #[must_use]
    pub fn build(self) -> AuthzPipeline {
        tracing::debug!(providers = self.providers.len(), "Authorization pipeline built");
        AuthzPipeline {
            providers: self.providers,
            config: self.config,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
