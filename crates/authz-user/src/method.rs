//! HTTP methods and method applicability masks.
//!
//! Every requirement line carries a [`MethodMask`] naming the request methods
//! it applies to. Methods are numbered the way the host server numbers them,
//! so bit `n` of the mask corresponds to the method with number `n`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthzError;

// =============================================================================
// Method
// =============================================================================

/// A request method known to the host server.
///
/// `HEAD` is not a separate method: it is served as `GET` and parses to
/// [`Method::Get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
    Propfind,
    Proppatch,
    Mkcol,
    Copy,
    Move,
    Lock,
    Unlock,
    VersionControl,
    Checkout,
    Uncheckout,
    Checkin,
    Update,
    Label,
    Report,
    Mkworkspace,
    Mkactivity,
    BaselineControl,
    Merge,
}

impl Method {
    /// All methods, in host numbering order.
    pub const ALL: [Method; 26] = [
        Method::Get,
        Method::Put,
        Method::Post,
        Method::Delete,
        Method::Connect,
        Method::Options,
        Method::Trace,
        Method::Patch,
        Method::Propfind,
        Method::Proppatch,
        Method::Mkcol,
        Method::Copy,
        Method::Move,
        Method::Lock,
        Method::Unlock,
        Method::VersionControl,
        Method::Checkout,
        Method::Uncheckout,
        Method::Checkin,
        Method::Update,
        Method::Label,
        Method::Report,
        Method::Mkworkspace,
        Method::Mkactivity,
        Method::BaselineControl,
        Method::Merge,
    ];

    /// The host's method number, also the bit index in a [`MethodMask`].
    #[must_use]
    pub fn number(self) -> u32 {
        self as u32
    }

    /// The canonical method token.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
            Method::Propfind => "PROPFIND",
            Method::Proppatch => "PROPPATCH",
            Method::Mkcol => "MKCOL",
            Method::Copy => "COPY",
            Method::Move => "MOVE",
            Method::Lock => "LOCK",
            Method::Unlock => "UNLOCK",
            Method::VersionControl => "VERSION-CONTROL",
            Method::Checkout => "CHECKOUT",
            Method::Uncheckout => "UNCHECKOUT",
            Method::Checkin => "CHECKIN",
            Method::Update => "UPDATE",
            Method::Label => "LABEL",
            Method::Report => "REPORT",
            Method::Mkworkspace => "MKWORKSPACE",
            Method::Mkactivity => "MKACTIVITY",
            Method::BaselineControl => "BASELINE-CONTROL",
            Method::Merge => "MERGE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = AuthzError;

    /// Parses a method token. Method tokens are case-sensitive on the wire.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "HEAD" {
            return Ok(Method::Get);
        }
        Method::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| AuthzError::invalid_method(s))
    }
}

impl TryFrom<String> for Method {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.as_str().to_string()
    }
}

// =============================================================================
// Method Mask
// =============================================================================

/// Set of methods a requirement line applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Method>", into = "Vec<Method>")]
pub struct MethodMask(u64);

impl MethodMask {
    /// A mask that applies to every known method.
    pub const ALL: MethodMask = MethodMask((1u64 << Method::ALL.len()) - 1);

    /// A mask that applies to no method.
    pub const NONE: MethodMask = MethodMask(0);

    /// Builds a mask from raw host bits.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw host bits.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Mask containing only `method`.
    #[must_use]
    pub fn only(method: Method) -> Self {
        Self(1u64 << method.number())
    }

    /// Returns a copy of this mask with `method` added.
    #[must_use]
    pub fn with(self, method: Method) -> Self {
        Self(self.0 | (1u64 << method.number()))
    }

    /// Returns a copy of this mask with `method` removed.
    #[must_use]
    pub fn without(self, method: Method) -> Self {
        Self(self.0 & !(1u64 << method.number()))
    }

    /// Whether a line with this mask applies to `method`.
    #[must_use]
    pub fn contains(self, method: Method) -> bool {
        self.0 & (1u64 << method.number()) != 0
    }

    /// Whether the mask applies to no method at all.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Known methods contained in this mask, in host numbering order.
    pub fn methods(self) -> impl Iterator<Item = Method> {
        Method::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl FromIterator<Method> for MethodMask {
    fn from_iter<I: IntoIterator<Item = Method>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, MethodMask::with)
    }
}

impl From<Vec<Method>> for MethodMask {
    fn from(methods: Vec<Method>) -> Self {
        methods.into_iter().collect()
    }
}

impl From<MethodMask> for Vec<Method> {
    fn from(mask: MethodMask) -> Self {
        mask.methods().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_numbers_follow_host_order() {
        assert_eq!(Method::Get.number(), 0);
        assert_eq!(Method::Post.number(), 2);
        assert_eq!(Method::Patch.number(), 7);
        assert_eq!(Method::Merge.number(), 25);
        for (i, m) in Method::ALL.iter().enumerate() {
            assert_eq!(m.number() as usize, i);
        }
    }

    #[test]
    fn test_parse_method() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("VERSION-CONTROL".parse::<Method>().unwrap(), Method::VersionControl);
        assert_eq!("HEAD".parse::<Method>().unwrap(), Method::Get);
    }

    #[test]
    fn test_parse_unknown_method() {
        let err = "BREW".parse::<Method>().unwrap_err();
        assert_eq!(err, AuthzError::invalid_method("BREW"));
        assert!("get".parse::<Method>().is_err());
    }

    #[test]
    fn test_mask_contains() {
        let mask = MethodMask::only(Method::Post);
        assert!(mask.contains(Method::Post));
        assert!(!mask.contains(Method::Get));

        let mask = mask.with(Method::Put);
        assert!(mask.contains(Method::Put));
        assert!(!mask.without(Method::Put).contains(Method::Put));
    }

    #[test]
    fn test_mask_all_and_none() {
        for m in Method::ALL {
            assert!(MethodMask::ALL.contains(m));
            assert!(!MethodMask::NONE.contains(m));
        }
        assert!(MethodMask::NONE.is_empty());
        assert!(MethodMask::default().is_empty());
    }

    #[test]
    fn test_mask_from_methods() {
        let mask: MethodMask = [Method::Get, Method::Post].into_iter().collect();
        assert_eq!(mask.bits(), 0b101);
        assert_eq!(
            mask.methods().collect::<Vec<_>>(),
            vec![Method::Get, Method::Post]
        );
    }

    #[test]
    fn test_mask_serde() {
        let mask: MethodMask = serde_json::from_str(r#"["GET", "DELETE"]"#).unwrap();
        assert!(mask.contains(Method::Get));
        assert!(mask.contains(Method::Delete));
        assert!(!mask.contains(Method::Post));
        assert_eq!(serde_json::to_string(&mask).unwrap(), r#"["GET","DELETE"]"#);

        assert!(serde_json::from_str::<MethodMask>(r#"["BREW"]"#).is_err());
    }

    #[test]
    fn test_all_mask_survives_serde() {
        assert_eq!(MethodMask::ALL.methods().count(), Method::ALL.len());
        let json = serde_json::to_string(&MethodMask::ALL).unwrap();
        let back: MethodMask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MethodMask::ALL);
    }
}
