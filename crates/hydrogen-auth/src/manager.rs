//! In-memory `AuthManager`, grounded on the original implementation's
//! `AuthManager` (users/sessions/login-attempt tables behind separate
//! locks, configurable thresholds).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::error::AuthError;
use crate::hook::AuthHook;
use crate::password::{generate_token, hash_password, verify_password};

#[derive(Debug, Clone)]
pub struct AuthManagerConfig {
    pub max_failed_attempts: u32,
    pub rate_limit_duration: Duration,
    pub session_timeout: Duration,
}

impl Default for AuthManagerConfig {
    fn default() -> Self {
        AuthManagerConfig {
            max_failed_attempts: 5,
            rate_limit_duration: Duration::from_secs(15 * 60),
            session_timeout: Duration::from_secs(60 * 60),
        }
    }
}

struct UserRecord {
    password_hash: String,
    permissions: HashSet<String>,
    enabled: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub expires_at: Instant,
    pub ip_address: String,
}

#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub ip_address: String,
    pub at: Instant,
    pub successful: bool,
}

pub struct AuthManager {
    config: RwLock<AuthManagerConfig>,
    users: RwLock<HashMap<String, UserRecord>>,
    sessions: RwLock<HashMap<String, Session>>,
    login_attempts: Mutex<VecDeque<LoginAttempt>>,
}

impl AuthManager {
    pub fn new(config: AuthManagerConfig) -> Arc<Self> {
        Arc::new(AuthManager {
            config: RwLock::new(config),
            users: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            login_attempts: Mutex::new(VecDeque::new()),
        })
    }

    pub async fn set_max_failed_attempts(&self, max: u32) {
        self.config.write().await.max_failed_attempts = max;
    }

    pub async fn set_rate_limit_duration(&self, duration: Duration) {
        self.config.write().await.rate_limit_duration = duration;
    }

    pub async fn set_session_timeout(&self, duration: Duration) {
        self.config.write().await.session_timeout = duration;
    }

    pub async fn add_user(
        &self,
        username: impl Into<String>,
        password: &str,
        permissions: impl IntoIterator<Item = String>,
    ) -> Result<(), AuthError> {
        let username = username.into();
        let mut users = self.users.write().await;
        if users.contains_key(&username) {
            return Err(AuthError::UserExists);
        }
        users.insert(
            username,
            UserRecord {
                password_hash: hash_password(password),
                permissions: permissions.into_iter().collect(),
                enabled: true,
            },
        );
        Ok(())
    }

    pub async fn remove_user(&self, username: &str) -> Result<(), AuthError> {
        self.users
            .write()
            .await
            .remove(username)
            .map(|_| ())
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        let record = users.get_mut(username).ok_or(AuthError::UserNotFound)?;
        if !verify_password(old_password, &record.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        record.password_hash = hash_password(new_password);
        Ok(())
    }

    pub async fn add_permission(&self, username: &str, permission: impl Into<String>) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        let record = users.get_mut(username).ok_or(AuthError::UserNotFound)?;
        record.permissions.insert(permission.into());
        Ok(())
    }

    pub async fn remove_permission(&self, username: &str, permission: &str) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        let record = users.get_mut(username).ok_or(AuthError::UserNotFound)?;
        record.permissions.remove(permission);
        Ok(())
    }

    pub async fn revoke_token(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn active_sessions(&self) -> Vec<Session> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn login_attempts(&self, ip: &str, window: Duration) -> Vec<LoginAttempt> {
        let cutoff = Instant::now().checked_sub(window).unwrap_or_else(Instant::now);
        self.login_attempts
            .lock()
            .await
            .iter()
            .filter(|a| a.ip_address == ip && a.at >= cutoff)
            .cloned()
            .collect()
    }

    /// Drops expired sessions and login attempts outside the rate-limit
    /// window. Not run on a timer by this crate — the server connection
    /// plane (C7) calls this from its own cleanup sweep.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        self.sessions.write().await.retain(|_, s| s.expires_at > now);

        let rate_limit_duration = self.config.read().await.rate_limit_duration;
        let cutoff = now.checked_sub(rate_limit_duration).unwrap_or(now);
        self.login_attempts.lock().await.retain(|a| a.at >= cutoff);
    }
}

#[async_trait]
impl AuthHook for AuthManager {
    async fn authenticate(&self, user: &str, password: &str, ip: &str) -> String {
        if self.is_rate_limited(ip).await {
            self.record_login_attempt(ip, false).await;
            return String::new();
        }

        let authenticated = {
            let users = self.users.read().await;
            users
                .get(user)
                .is_some_and(|record| record.enabled && verify_password(password, &record.password_hash))
        };

        self.record_login_attempt(ip, authenticated).await;
        if !authenticated {
            return String::new();
        }

        let timeout = self.config.read().await.session_timeout;
        let token = generate_token();
        self.sessions.write().await.insert(
            token.clone(),
            Session {
                token: token.clone(),
                username: user.to_string(),
                expires_at: Instant::now() + timeout,
                ip_address: ip.to_string(),
            },
        );
        token
    }

    async fn validate_token(&self, token: &str) -> bool {
        self.sessions
            .read()
            .await
            .get(token)
            .is_some_and(|s| s.expires_at > Instant::now())
    }

    async fn user_for_token(&self, token: &str) -> String {
        self.sessions
            .read()
            .await
            .get(token)
            .filter(|s| s.expires_at > Instant::now())
            .map(|s| s.username.clone())
            .unwrap_or_default()
    }

    async fn has_permission(&self, user: &str, permission: &str) -> bool {
        self.users
            .read()
            .await
            .get(user)
            .is_some_and(|record| record.enabled && record.permissions.contains(permission))
    }

    async fn is_rate_limited(&self, ip: &str) -> bool {
        let config = self.config.read().await;
        let cutoff = Instant::now().checked_sub(config.rate_limit_duration).unwrap_or_else(Instant::now);
        let failures = self
            .login_attempts
            .lock()
            .await
            .iter()
            .filter(|a| a.ip_address == ip && a.at >= cutoff && !a.successful)
            .count();
        failures as u32 >= config.max_failed_attempts
    }

    async fn record_login_attempt(&self, ip: &str, successful: bool) {
        self.login_attempts.lock().await.push_back(LoginAttempt {
            ip_address: ip.to_string(),
            at: Instant::now(),
            successful,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn authenticate_returns_token_for_valid_credentials() {
        let manager = AuthManager::new(AuthManagerConfig::default());
        manager.add_user("alice", "hunter2", ["devices:read".to_string()]).await.unwrap();

        let token = manager.authenticate("alice", "hunter2", "127.0.0.1").await;
        assert!(!token.is_empty());
        assert!(manager.validate_token(&token).await);
        assert_eq!(manager.user_for_token(&token).await, "alice");
    }

    #[tokio::test]
    async fn authenticate_returns_empty_string_on_wrong_password() {
        let manager = AuthManager::new(AuthManagerConfig::default());
        manager.add_user("alice", "hunter2", []).await.unwrap();

        let token = manager.authenticate("alice", "wrong", "127.0.0.1").await;
        assert!(token.is_empty());
    }

    #[tokio::test]
    async fn rate_limiting_kicks_in_after_max_failed_attempts() {
        let mut config = AuthManagerConfig::default();
        config.max_failed_attempts = 3;
        let manager = AuthManager::new(config);
        manager.add_user("alice", "hunter2", []).await.unwrap();

        for _ in 0..3 {
            manager.authenticate("alice", "wrong", "10.0.0.1").await;
        }
        assert!(manager.is_rate_limited("10.0.0.1").await);

        let token = manager.authenticate("alice", "hunter2", "10.0.0.1").await;
        assert!(token.is_empty(), "correct credentials must still be rejected while rate-limited");
    }

    #[tokio::test]
    async fn has_permission_reflects_granted_permissions() {
        let manager = AuthManager::new(AuthManagerConfig::default());
        manager.add_user("alice", "hunter2", ["devices:write".to_string()]).await.unwrap();

        assert!(manager.has_permission("alice", "devices:write").await);
        assert!(!manager.has_permission("alice", "devices:admin").await);
    }
}
