//! Allow/deny decisions for a request path against configured glob patterns.
//! Pure and deterministic: same patterns and path always yield the same
//! verdict, with no I/O.

use globset::{Glob, GlobSet, GlobSetBuilder};

#[derive(Debug)]
pub enum RouteGateError {
    BadPattern { pattern: String, reason: String },
}

impl std::fmt::Display for RouteGateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteGateError::BadPattern { pattern, reason } => {
                write!(f, "invalid route pattern {:?}: {}", pattern, reason)
            }
        }
    }
}

impl std::error::Error for RouteGateError {}

/// A compiled allow/deny list. `allowedRoutes` in the injected config is
/// split here into positive patterns and `!`-prefixed negative patterns.
pub struct RouteGate {
    positives: Option<GlobSet>,
    negatives: GlobSet,
}

impl RouteGate {
    /// `patterns` is the raw `allowedRoutes` list: entries starting with `!`
    /// are negative patterns, everything else is positive. An empty (or
    /// all-negative) positive set means "allow all" subject to negatives.
    pub fn new(patterns: &[String]) -> Result<Self, RouteGateError> {
        let mut pos_builder = GlobSetBuilder::new();
        let mut neg_builder = GlobSetBuilder::new();
        let mut has_positive = false;

        for raw in patterns {
            let (builder, pattern) = if let Some(stripped) = raw.strip_prefix('!') {
                (&mut neg_builder, stripped)
            } else {
                has_positive = true;
                (&mut pos_builder, raw.as_str())
            };
            let glob = Glob::new(pattern).map_err(|e| RouteGateError::BadPattern {
                pattern: pattern.to_owned(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
        }

        let positives = if has_positive {
            Some(pos_builder.build().map_err(|e| RouteGateError::BadPattern {
                pattern: "<positive set>".into(),
                reason: e.to_string(),
            })?)
        } else {
            None
        };
        let negatives = neg_builder
            .build()
            .map_err(|e| RouteGateError::BadPattern { pattern: "<negative set>".into(), reason: e.to_string() })?;

        Ok(RouteGate { positives, negatives })
    }

    /// An always-allow gate, for configs that set no `allowedRoutes`.
    pub fn allow_all() -> Self {
        RouteGate { positives: None, negatives: GlobSetBuilder::new().build().expect("empty globset always builds") }
    }

    /// `path` must begin with `/`. If positive patterns are configured, at
    /// least one must match; no negative pattern may match.
    pub fn is_allowed(&self, path: &str) -> bool {
        if !path.starts_with('/') {
            return false;
        }
        if let Some(positives) = &self.positives {
            if !positives.is_match(path) {
                return false;
            }
        }
        !self.negatives.is_match(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patterns_allow_everything_under_root() {
        let gate = RouteGate::new(&[]).unwrap();
        assert!(gate.is_allowed("/anything/at/all"));
        assert!(!gate.is_allowed("no-leading-slash"));
    }

    #[test]
    fn positive_pattern_requires_a_match() {
        let gate = RouteGate::new(&["/v1/**".to_owned()]).unwrap();
        assert!(gate.is_allowed("/v1/x"));
        assert!(gate.is_allowed("/v1/x/y"));
        assert!(!gate.is_allowed("/v2/y"));
    }

    #[test]
    fn negative_pattern_overrides_positive_match() {
        let gate = RouteGate::new(&["/v1/**".to_owned(), "!/v1/admin/**".to_owned()]).unwrap();
        assert!(gate.is_allowed("/v1/public"));
        assert!(!gate.is_allowed("/v1/admin/secrets"));
    }

    #[test]
    fn double_star_matches_dotfiles() {
        let gate = RouteGate::new(&["/static/**".to_owned()]).unwrap();
        assert!(gate.is_allowed("/static/.well-known/token"));
    }
}
