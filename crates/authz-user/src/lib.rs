//! # authz-user
//!
//! User-based authorization for HTTP requests that have already been
//! authenticated.
//!
//! This crate provides:
//! - Evaluation of `require valid-user`, `require user ...` and
//!   `require except ...` rules
//! - Per-method applicability masks for requirement lines
//! - An ordered provider chain that other authorization providers can join
//! - Per-scope `authoritative` configuration with nearest-scope-wins merging
//!
//! ## Modules
//!
//! - [`method`] - Request methods and method masks
//! - [`requirement`] - Requirement lines and word splitting
//! - [`context`] - Per-request evaluation context
//! - [`engine`] - The user requirement evaluator
//! - [`pipeline`] - Ordered provider chain and outcomes
//! - [`config`] - Scope and root configuration
//! - [`observability`] - Tracing subscriber setup

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod method;
pub mod observability;
pub mod pipeline;
pub mod requirement;

pub use config::{AuthzConfig, ConfigError, LoggingConfig, ScopeConfig, parse_flag};
pub use context::{EvaluationContext, EvaluationContextBuilder};
pub use engine::{Decision, DenyReason, UserRequirementEvaluator};
pub use error::AuthzError;
pub use method::{Method, MethodMask};
pub use pipeline::{
    AuthFailureNote, AuthorizationAudit, AuthzOutcome, AuthzPipeline, AuthzPipelineBuilder,
    AuthzProvider, DefaultDecision, EvaluatedProvider, HTTP_UNAUTHORIZED, PipelineConfig,
};
pub use requirement::{Directive, RequirementLine, RequirementSet};

/// Type alias for authorization results.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Builds the standard pipeline for a root configuration: the user
/// requirement evaluator with the configured default decision.
#[must_use]
pub fn default_pipeline(config: &AuthzConfig) -> AuthzPipeline {
    AuthzPipeline::builder()
        .config(config.pipeline.clone())
        .register(UserRequirementEvaluator::new())
        .build()
}

/// Prelude module for convenient imports.
///
/// ```ignore
/// use authz_user::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthzResult;
    pub use crate::config::{AuthzConfig, ConfigError, ScopeConfig};
    pub use crate::context::EvaluationContext;
    pub use crate::engine::{Decision, DenyReason, UserRequirementEvaluator};
    pub use crate::error::AuthzError;
    pub use crate::method::{Method, MethodMask};
    pub use crate::pipeline::{AuthzOutcome, AuthzPipeline, AuthzProvider, PipelineConfig};
    pub use crate::requirement::{RequirementLine, RequirementSet};
}
