//! Per-request evaluation context.
//!
//! The context carries everything a provider needs besides the requirement
//! lines themselves: who the user is, how the resource was requested, and the
//! scope's `authoritative` setting.
//!
//! ```ignore
//! use authz_user::context::EvaluationContext;
//! use authz_user::method::Method;
//!
//! let ctx = EvaluationContext::builder()
//!     .user("alice")
//!     .method(Method::Get)
//!     .uri("/private/report.html")
//!     .authoritative(true)
//!     .build()?;
//! ```

use serde::Serialize;

use crate::AuthzResult;
use crate::config::ScopeConfig;
use crate::error::AuthzError;
use crate::method::Method;

/// Request-local inputs to rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    /// Authenticated user identity. Never empty.
    pub user: String,

    /// Request method.
    pub method: Method,

    /// Path of the requested resource.
    pub uri: String,

    /// Whether an unmatched rule is a final denial.
    pub authoritative: bool,

    /// Authentication scheme that established `user` (e.g. `Basic`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,

    /// Authentication realm of the matched scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
}

impl EvaluationContext {
    /// Starts building a context.
    #[must_use]
    pub fn builder() -> EvaluationContextBuilder {
        EvaluationContextBuilder::default()
    }
}

/// Builder for [`EvaluationContext`].
#[derive(Debug, Clone)]
pub struct EvaluationContextBuilder {
    user: Option<String>,
    method: Method,
    uri: String,
    authoritative: bool,
    auth_type: Option<String>,
    realm: Option<String>,
}

impl Default for EvaluationContextBuilder {
    fn default() -> Self {
        Self {
            user: None,
            method: Method::Get,
            uri: "/".to_string(),
            authoritative: true,
            auth_type: None,
            realm: None,
        }
    }
}

impl EvaluationContextBuilder {
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    #[must_use]
    pub fn authoritative(mut self, authoritative: bool) -> Self {
        self.authoritative = authoritative;
        self
    }

    /// Takes the `authoritative` flag from a resolved scope configuration.
    #[must_use]
    pub fn scope(self, scope: &ScopeConfig) -> Self {
        self.authoritative(scope.authoritative())
    }

    #[must_use]
    pub fn auth_type(mut self, auth_type: impl Into<String>) -> Self {
        self.auth_type = Some(auth_type.into());
        self
    }

    #[must_use]
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Finishes the context.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::MissingUser`] if no user was set or the user is
    /// empty. Evaluation only runs after authentication has succeeded.
    pub fn build(self) -> AuthzResult<EvaluationContext> {
        let user = match self.user {
            Some(user) if !user.is_empty() => user,
            Some(_) => return Err(AuthzError::missing_user("user identity is empty")),
            None => return Err(AuthzError::missing_user("no authenticated user")),
        };

        Ok(EvaluationContext {
            user,
            method: self.method,
            uri: self.uri,
            authoritative: self.authoritative,
            auth_type: self.auth_type,
            realm: self.realm,
        })
    }
}
