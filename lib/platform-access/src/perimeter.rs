//! Perimeter gate deciding whether a page request may proceed.
//!
//! The gate covers page navigation only. API routes, framework asset
//! prefixes, and the favicon are never gated; the login page is always
//! reachable so that a session can be established.

use crate::session::{SessionKind, SessionPolicy};

/// Path prefixes that bypass the gate entirely.
const EXCLUDED_PREFIXES: &[&str] = &["/api", "/_next/static", "/_next/image", "/pkg"];

/// Exact paths that bypass the gate entirely.
const EXCLUDED_PATHS: &[&str] = &["/favicon.ico"];

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Forward the request unchanged.
    Allow,
    /// Redirect the browser to the given login path.
    Redirect(String),
}

/// Request-level authorization for page navigation.
#[derive(Debug, Clone)]
pub struct PerimeterGate {
    login_path: String,
}

impl PerimeterGate {
    /// Creates a gate redirecting to `login_path`.
    ///
    /// A trailing `/` on the configured path is ignored.
    #[must_use]
    pub fn new(login_path: impl Into<String>) -> Self {
        let login_path = login_path.into();
        let trimmed = login_path.trim_end_matches('/');
        let login_path = if trimmed.is_empty() {
            "/login".to_string()
        } else {
            trimmed.to_string()
        };
        Self { login_path }
    }

    /// Returns the login path.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Returns true if `path` is outside the gate's matching scope.
    #[must_use]
    pub fn is_excluded(path: &str) -> bool {
        EXCLUDED_PATHS.contains(&path)
            || EXCLUDED_PREFIXES.iter().any(|prefix| {
                path.strip_prefix(prefix)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
    }

    /// Returns true if `path` is the public login page.
    #[must_use]
    pub fn is_login_path(&self, path: &str) -> bool {
        path == self.login_path
            || path
                .strip_prefix(self.login_path.as_str())
                .is_some_and(|rest| rest == "/")
    }

    /// Decides whether a request for `path` carrying `cookie` may proceed.
    #[must_use]
    pub fn decide(&self, path: &str, cookie: Option<&str>, policy: &SessionPolicy) -> GateDecision {
        if Self::is_excluded(path) || self.is_login_path(path) {
            return GateDecision::Allow;
        }

        match policy.validate(SessionKind::Perimeter, cookie) {
            Ok(()) => GateDecision::Allow,
            Err(reason) => {
                tracing::debug!(path, %reason, "perimeter gate redirecting to login");
                GateDecision::Redirect(self.login_path.clone())
            }
        }
    }
}

impl Default for PerimeterGate {
    fn default() -> Self {
        Self::new("/login")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AdminSecret, SessionMode};
    use chrono::Duration;

    fn policy(secret: &str) -> SessionPolicy {
        SessionPolicy::new(
            AdminSecret::new(secret),
            SessionMode::SharedSecret,
            Duration::hours(24),
        )
    }

    fn redirect() -> GateDecision {
        GateDecision::Redirect("/login".to_string())
    }

    #[test]
    fn missing_cookie_redirects() {
        let gate = PerimeterGate::default();
        assert_eq!(gate.decide("/", None, &policy("s3cret")), redirect());
    }

    #[test]
    fn matching_cookie_passes() {
        let gate = PerimeterGate::default();
        assert_eq!(
            gate.decide("/", Some("s3cret"), &policy("s3cret")),
            GateDecision::Allow
        );
        assert_eq!(
            gate.decide("/admin/diary", Some("s3cret"), &policy("s3cret")),
            GateDecision::Allow
        );
    }

    #[test]
    fn wrong_cookie_redirects() {
        let gate = PerimeterGate::default();
        assert_eq!(
            gate.decide("/", Some("wrong"), &policy("s3cret")),
            redirect()
        );
    }

    #[test]
    fn empty_secret_fails_closed() {
        let gate = PerimeterGate::default();
        assert_eq!(gate.decide("/", Some(""), &policy("")), redirect());
        assert_eq!(gate.decide("/", None, &policy("")), redirect());
    }

    #[test]
    fn login_path_always_allowed() {
        let gate = PerimeterGate::default();
        for cookie in [None, Some("wrong"), Some("s3cret")] {
            assert_eq!(
                gate.decide("/login", cookie, &policy("s3cret")),
                GateDecision::Allow
            );
            assert_eq!(
                gate.decide("/login/", cookie, &policy("s3cret")),
                GateDecision::Allow
            );
            assert_eq!(gate.decide("/login", cookie, &policy("")), GateDecision::Allow);
        }
    }

    #[test]
    fn login_prefix_is_not_an_allow_list() {
        let gate = PerimeterGate::default();
        assert_eq!(gate.decide("/login-help", None, &policy("s3cret")), redirect());
        assert_eq!(gate.decide("/login/extra", None, &policy("s3cret")), redirect());
    }

    #[test]
    fn excluded_paths_bypass_gate() {
        assert!(PerimeterGate::is_excluded("/api"));
        assert!(PerimeterGate::is_excluded("/api/tts"));
        assert!(PerimeterGate::is_excluded("/_next/static/chunk.js"));
        assert!(PerimeterGate::is_excluded("/_next/image"));
        assert!(PerimeterGate::is_excluded("/favicon.ico"));
        assert!(PerimeterGate::is_excluded("/pkg/site.wasm"));

        assert!(!PerimeterGate::is_excluded("/apiary"));
        assert!(!PerimeterGate::is_excluded("/"));
        assert!(!PerimeterGate::is_excluded("/favicon.ico.bak"));
    }

    #[test]
    fn configured_login_path_drops_trailing_slash() {
        let gate = PerimeterGate::new("/admin/login/");
        assert_eq!(gate.login_path(), "/admin/login");
        assert!(gate.is_login_path("/admin/login/"));
    }
}
