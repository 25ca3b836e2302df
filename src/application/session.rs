use std::time::Duration;

use crate::application::{AppError, AppResult, Authenticator, Notifier, SessionTokenStore, notify_best_effort};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// How long to wait for the post-login marker with a restored token.
    pub restore_timeout: Duration,
    /// Upper bound for the human-assisted login.
    pub login_timeout: Duration,
    /// How often the token store is re-checked while waiting on the operator.
    pub recheck_every: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            restore_timeout: Duration::from_secs(5),
            login_timeout: Duration::from_secs(300),
            recheck_every: Duration::from_secs(5),
        }
    }
}

/// Restores the persisted session, falling back to an assisted login.
pub struct SessionManager<'a> {
    pub auth: &'a dyn Authenticator,
    pub tokens: &'a dyn SessionTokenStore,
    /// Where "please log in" requests go (chat + alarm).
    pub operator: &'a dyn Notifier,
    pub config: SessionConfig,
}

impl<'a> SessionManager<'a> {
    pub async fn ensure_authenticated(&self) -> AppResult<()> {
        let stale = match self.tokens.load().await {
            Ok(Some(token)) => {
                if self.verify(&token, self.config.restore_timeout).await {
                    tracing::info!("session restored from persisted token");
                    return Ok(());
                }
                tracing::info!("persisted session expired");
                Some(token)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "could not read session token");
                None
            }
        };

        tracing::info!("falling back to credential login");
        match self.auth.login_with_credentials(self.config.restore_timeout * 4).await {
            Ok(Some(token)) => {
                tracing::info!("credential login succeeded");
                self.persist(&token).await;
                return Ok(());
            }
            Ok(None) => tracing::info!("credential login needs a human (captcha)"),
            Err(e) => tracing::warn!(error = %e, "credential login failed"),
        }

        self.wait_for_operator(stale).await
    }

    async fn wait_for_operator(&self, stale: Option<String>) -> AppResult<()> {
        let minutes = self.config.login_timeout.as_secs() / 60;
        notify_best_effort(
            self.operator,
            &format!(
                "🔐 Login required. Complete the login in your browser and store the session token within {minutes} min."
            ),
        )
        .await;

        let deadline = tokio::time::Instant::now() + self.config.login_timeout;
        let mut last_tried = stale;

        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(self.config.recheck_every).await;

            let token = match self.tokens.load().await {
                Ok(Some(t)) => t,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "could not read session token");
                    continue;
                }
            };
            if last_tried.as_deref() == Some(token.as_str()) {
                continue;
            }

            if self.verify(&token, self.config.restore_timeout).await {
                tracing::info!("login detected");
                return Ok(());
            }
            last_tried = Some(token);
        }

        tracing::error!("timed out waiting for login");
        Err(AppError::Auth("timed out waiting for login".into()))
    }

    async fn verify(&self, token: &str, timeout: Duration) -> bool {
        match self.auth.try_session(token, timeout).await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!(error = %e, "session check failed");
                false
            }
        }
    }

    async fn persist(&self, token: &str) {
        if let Err(e) = self.tokens.save(token).await {
            tracing::warn!(error = %e, "could not persist session token");
        }
    }
}
