//! Auth/session gate hook surface (spec §4.12). Policy lives outside this
//! crate; `AuthHook` is the seam the server connection plane (C7) calls
//! through. `AuthManager` is a concrete, in-memory default implementation —
//! not a mandate on how a deployment authenticates clients.

use async_trait::async_trait;

#[async_trait]
pub trait AuthHook: Send + Sync {
    /// Returns a session token on success, `""` on failure — matching the
    /// original implementation's empty-string-means-failure convention
    /// rather than an `Option`, so callers can log the attempt uniformly.
    async fn authenticate(&self, user: &str, password: &str, ip: &str) -> String;

    async fn validate_token(&self, token: &str) -> bool;

    async fn user_for_token(&self, token: &str) -> String;

    async fn has_permission(&self, user: &str, permission: &str) -> bool;

    async fn is_rate_limited(&self, ip: &str) -> bool;

    async fn record_login_attempt(&self, ip: &str, successful: bool);
}
