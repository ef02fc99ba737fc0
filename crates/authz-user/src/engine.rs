//! User requirement evaluation.
//!
//! [`UserRequirementEvaluator`] owns the `valid-user`, `user` and `except`
//! keywords. It walks the requirement lines that apply to the request method
//! in configured order and stops at the first line that admits the user.
//!
//! # Example
//!
//! ```ignore
//! use authz_user::engine::{Decision, UserRequirementEvaluator};
//! use authz_user::requirement::RequirementSet;
//!
//! let requirements: RequirementSet = ["user bob", "valid-user"].into_iter().collect();
//! let decision = UserRequirementEvaluator::new().evaluate(&requirements, &ctx);
//! assert!(decision.is_allowed());
//! ```

use serde::Serialize;

use crate::context::EvaluationContext;
use crate::pipeline::AuthzProvider;
use crate::requirement::{Directive, RequirementSet};

// =============================================================================
// Decision
// =============================================================================

/// Result of evaluating requirements for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum Decision {
    /// Access is granted.
    Allow,
    /// Access is denied with a reason.
    Deny(DenyReason),
    /// Not this provider's call; ask the next one.
    Decline,
}

impl Decision {
    /// Returns `true` if access was granted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `true` if access was denied.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    /// Returns `true` if the provider declined to decide.
    #[must_use]
    pub fn is_declined(&self) -> bool {
        matches!(self, Self::Decline)
    }

    /// Returns `true` for `Allow` and `Deny`, which end a provider chain.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_declined()
    }

    /// Get the deny reason if access was denied.
    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Deny(reason) => Some(reason),
            _ => None,
        }
    }
}

// =============================================================================
// Deny Reason
// =============================================================================

/// Reason for access denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyReason {
    /// Error code for programmatic handling.
    pub code: String,

    /// Human-readable message, suitable for the error log.
    pub message: String,

    /// Resource the request was for.
    pub uri: String,

    /// Identity that failed to match.
    pub user: String,

    /// Provider that denied access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl DenyReason {
    /// The user matched none of the applicable `user`/`except` rules.
    #[must_use]
    pub fn unmet_requirements(uri: &str, user: &str) -> Self {
        Self {
            code: "unmet-requirements".to_string(),
            message: format!(
                "access to {uri} failed, reason: user '{user}' does not meet 'require'ments \
                 for user/valid-user to be allowed access"
            ),
            uri: uri.to_string(),
            user: user.to_string(),
            provider: None,
        }
    }

    /// Every provider in the chain declined.
    #[must_use]
    pub fn no_provider_matched(uri: &str, user: &str) -> Self {
        Self {
            code: "no-provider-matched".to_string(),
            message: format!(
                "access to {uri} failed, reason: no authorization provider could decide \
                 for user '{user}'"
            ),
            uri: uri.to_string(),
            user: user.to_string(),
            provider: None,
        }
    }

    /// Attach the name of the provider that produced this reason.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

// =============================================================================
// User Requirement Evaluator
// =============================================================================

/// Provider for `require valid-user`, `require user ...` and
/// `require except ...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserRequirementEvaluator;

impl UserRequirementEvaluator {
    /// Provider name used in logs and audit trails.
    pub const NAME: &'static str = "user";

    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `requirements` for the user in `ctx`.
    ///
    /// # Evaluation Order
    ///
    /// 1. No lines at all: decline
    /// 2. Walk lines applicable to the request method in order; the first
    ///    line that admits the user allows
    /// 3. No `user`/`except` line applied: decline
    /// 4. Otherwise deny, or decline when the scope is not authoritative
    #[must_use]
    pub fn evaluate(&self, requirements: &RequirementSet, ctx: &EvaluationContext) -> Decision {
        if requirements.is_empty() {
            return Decision::Decline;
        }

        let mut saw_applicable_rule = false;

        for line in requirements.applicable(ctx.method) {
            match line.directive() {
                Directive::ValidUser => {
                    tracing::debug!(user = %ctx.user, uri = %ctx.uri, "valid-user requirement met");
                    return Decision::Allow;
                }
                Directive::User(mut names) => {
                    saw_applicable_rule = true;
                    if names.any(|name| name == ctx.user) {
                        tracing::debug!(
                            user = %ctx.user,
                            uri = %ctx.uri,
                            requirement = %line.requirement,
                            "user requirement met"
                        );
                        return Decision::Allow;
                    }
                }
                Directive::Except(names) => {
                    saw_applicable_rule = true;
                    let mut names = names.peekable();
                    if names.peek().is_some() && names.all(|name| name != ctx.user) {
                        tracing::debug!(
                            user = %ctx.user,
                            uri = %ctx.uri,
                            requirement = %line.requirement,
                            "user not excluded"
                        );
                        return Decision::Allow;
                    }
                }
                Directive::Other(keyword) => {
                    tracing::trace!(keyword, "requirement owned by another provider");
                }
            }
        }

        if !saw_applicable_rule {
            return Decision::Decline;
        }

        if !ctx.authoritative {
            tracing::trace!(user = %ctx.user, uri = %ctx.uri, "not authoritative, passing on");
            return Decision::Decline;
        }

        Decision::Deny(DenyReason::unmet_requirements(&ctx.uri, &ctx.user))
    }
}

impl AuthzProvider for UserRequirementEvaluator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&self, requirements: &RequirementSet, ctx: &EvaluationContext) -> Decision {
        UserRequirementEvaluator::evaluate(self, requirements, ctx)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{Method, MethodMask};
    use crate::requirement::RequirementLine;

    fn ctx(user: &str) -> EvaluationContext {
        EvaluationContext::builder()
            .user(user)
            .uri("/private")
            .build()
            .unwrap()
    }

    fn eval(lines: &[&str], ctx: &EvaluationContext) -> Decision {
        let set: RequirementSet = lines.iter().copied().collect();
        UserRequirementEvaluator::new().evaluate(&set, ctx)
    }

    #[test]
    fn test_empty_set_declines() {
        assert_eq!(eval(&[], &ctx("alice")), Decision::Decline);
    }

    #[test]
    fn test_valid_user_allows_anyone() {
        assert!(eval(&["valid-user"], &ctx("alice")).is_allowed());
        assert!(eval(&["Valid-User"], &ctx("x")).is_allowed());
    }

    #[test]
    fn test_user_list_match() {
        assert!(eval(&["user alice bob"], &ctx("bob")).is_allowed());
        assert!(eval(&["user alice bob"], &ctx("alice")).is_allowed());
        assert!(eval(&["user alice bob"], &ctx("carol")).is_denied());
    }

    #[test]
    fn test_unmatched_user_denies_with_reason() {
        let decision = eval(&["user bob"], &ctx("alice"));
        let reason = decision.deny_reason().expect("deny");
        assert_eq!(reason.code, "unmet-requirements");
        assert_eq!(reason.user, "alice");
        assert_eq!(reason.uri, "/private");
        assert_eq!(
            reason.message,
            "access to /private failed, reason: user 'alice' does not meet 'require'ments \
             for user/valid-user to be allowed access"
        );
    }

    #[test]
    fn test_later_line_can_allow() {
        assert!(eval(&["user bob", "valid-user"], &ctx("alice")).is_allowed());
    }

    #[test]
    fn test_first_allow_wins() {
        // "except bob" admits alice even though "user bob" did not.
        assert!(eval(&["user bob", "except bob"], &ctx("alice")).is_allowed());
        // The first line admits bob; the later except never runs.
        assert!(eval(&["user bob", "except bob"], &ctx("bob")).is_allowed());
    }

    #[test]
    fn test_except_semantics() {
        assert!(eval(&["except eve"], &ctx("alice")).is_allowed());
        assert!(eval(&["except eve mallory"], &ctx("eve")).is_denied());
        assert!(eval(&["except eve mallory"], &ctx("mallory")).is_denied());
    }

    #[test]
    fn test_empty_lists_never_match() {
        assert!(eval(&["user"], &ctx("alice")).is_denied());
        assert!(eval(&["except"], &ctx("alice")).is_denied());
    }

    #[test]
    fn test_unknown_keyword_declines() {
        assert_eq!(eval(&["group admins"], &ctx("alice")), Decision::Decline);
        assert_eq!(
            eval(&["group admins", "file-owner"], &ctx("alice")),
            Decision::Decline
        );
    }

    #[test]
    fn test_unknown_keyword_does_not_hide_user_rules() {
        assert!(eval(&["group admins", "user alice"], &ctx("alice")).is_allowed());
        assert!(eval(&["group admins", "user bob"], &ctx("alice")).is_denied());
    }

    #[test]
    fn test_method_mask_filters_lines() {
        let set = RequirementSet::from(vec![RequirementLine::with_methods(
            MethodMask::only(Method::Post),
            "user alice",
        )]);
        let get = ctx("alice");
        assert_eq!(UserRequirementEvaluator::new().evaluate(&set, &get), Decision::Decline);

        let post = EvaluationContext {
            method: Method::Post,
            ..ctx("alice")
        };
        assert!(UserRequirementEvaluator::new().evaluate(&set, &post).is_allowed());
    }

    #[test]
    fn test_non_authoritative_declines() {
        let ctx = EvaluationContext {
            authoritative: false,
            ..ctx("alice")
        };
        assert_eq!(eval(&["user bob"], &ctx), Decision::Decline);
        // Still allows when a rule matches.
        assert!(eval(&["user alice"], &ctx).is_allowed());
    }

    #[test]
    fn test_keyword_case_insensitive_names_case_sensitive() {
        assert!(eval(&["USER alice"], &ctx("alice")).is_allowed());
        assert!(eval(&["user Alice"], &ctx("alice")).is_denied());
        assert!(eval(&["ExCePt Alice"], &ctx("alice")).is_allowed());
    }

    #[test]
    fn test_quoted_names() {
        assert!(eval(&[r#"user "bob smith" alice"#], &ctx("bob smith")).is_allowed());
        assert!(eval(&[r#"user "bob smith""#], &ctx("bob")).is_denied());
        assert!(eval(&[r#"except "bob smith""#], &ctx("bob")).is_allowed());
    }

    #[test]
    fn test_idempotent() {
        let set: RequirementSet = ["user bob", "except eve"].into_iter().collect();
        let ctx = ctx("alice");
        let evaluator = UserRequirementEvaluator::new();
        let first = evaluator.evaluate(&set, &ctx);
        let second = evaluator.evaluate(&set, &ctx);
        assert_eq!(first, second);
    }

    #[test]
    fn test_deny_reason_serializes() {
        let reason = DenyReason::unmet_requirements("/x", "alice").with_provider("user");
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["code"], "unmet-requirements");
        assert_eq!(json["user"], "alice");
        assert_eq!(json["provider"], "user");

        let json = serde_json::to_value(DenyReason::no_provider_matched("/x", "bob")).unwrap();
        assert!(json.get("provider").is_none());
    }

    #[test]
    fn test_decision_methods() {
        let allow = Decision::Allow;
        assert!(allow.is_allowed());
        assert!(allow.is_terminal());
        assert!(allow.deny_reason().is_none());

        let deny = Decision::Deny(DenyReason::unmet_requirements("/", "a"));
        assert!(deny.is_denied());
        assert!(deny.is_terminal());
        assert!(deny.deny_reason().is_some());

        let decline = Decision::Decline;
        assert!(decline.is_declined());
        assert!(!decline.is_terminal());
    }
}
