//! Explicit session context handed by reference to whoever needs the current
//! owner, instead of a process-wide singleton.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Failure reported by the identity backend. `code` is the HTTP status when
/// the backend answered, `None` for transport failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("identity backend error ({code:?}): {message}")]
pub struct IdentityError {
    pub code: Option<u16>,
    pub message: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>, IdentityError>;
    async fn account(&self) -> Result<Account, IdentityError>;
    async fn create_account(
        &self,
        user_id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Account, IdentityError>;
    async fn create_email_password_session(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError>;
    async fn delete_current_session(&self) -> Result<(), IdentityError>;
    async fn create_recovery(&self, email: &str, redirect_url: &str) -> Result<(), IdentityError>;

    /// Keeps the current login so a later process can pick it up from
    /// `current_session`.
    async fn persist_session(&self) -> Result<(), IdentityError> {
        Ok(())
    }

    async fn forget_session(&self) -> Result<(), IdentityError> {
        Ok(())
    }
}

/// User-facing authentication failures. The message is shown verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Email ou senha incorretos.")]
    WrongCredentials,

    #[error("Email ou senha inválidos. Verifique os dados.")]
    InvalidCredentials,

    #[error("Este email já está registrado.")]
    EmailTaken,

    #[error("Erro ao fazer login. Tente novamente.")]
    SigninFailed,

    #[error("Erro ao registrar. Tente novamente.")]
    RegisterFailed,

    #[error("Erro ao enviar email de recuperação. Tente novamente.")]
    RecoveryFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Checking,
    Authenticated { session: Session, account: Account },
    Anonymous,
}

pub struct SessionContext<P: IdentityProvider> {
    provider: P,
    recovery_url: String,
    state: SessionState,
}

impl<P: IdentityProvider> SessionContext<P> {
    pub fn new(provider: P, recovery_url: impl Into<String>) -> Self {
        Self {
            provider,
            recovery_url: recovery_url.into(),
            state: SessionState::Uninitialized,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, SessionState::Uninitialized | SessionState::Checking)
    }

    /// Owner identifier for submissions, present only when authenticated.
    pub fn owner_id(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { account, .. } => Some(account.id.as_str()),
            _ => None,
        }
    }

    pub async fn check_auth(&mut self) -> &SessionState {
        self.state = SessionState::Checking;
        self.state = match self.load_current().await {
            Ok(Some((session, account))) => {
                log::info!("Restored session for user {}", account.id);
                SessionState::Authenticated { session, account }
            }
            Ok(None) => SessionState::Anonymous,
            Err(e) => {
                log::info!("CheckAuth error: {}", e.message);
                SessionState::Anonymous
            }
        };
        &self.state
    }

    async fn load_current(&self) -> Result<Option<(Session, Account)>, IdentityError> {
        let Some(session) = self.provider.current_session().await? else {
            return Ok(None);
        };
        let account = self.provider.account().await?;
        Ok(Some((session, account)))
    }

    pub async fn signin(&mut self, email: &str, password: &str) -> Result<&Account, AuthError> {
        let previous = std::mem::replace(&mut self.state, SessionState::Checking);
        match self.open_session(email, password).await {
            Ok(state) => {
                self.state = state;
                self.persist().await;
                self.authenticated_account()
            }
            Err(e) => {
                log::info!("Signin error: {}", e.message);
                self.state = previous;
                Err(match e.code {
                    Some(401) => AuthError::WrongCredentials,
                    Some(400) => AuthError::InvalidCredentials,
                    _ => AuthError::SigninFailed,
                })
            }
        }
    }

    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<&Account, AuthError> {
        let previous = std::mem::replace(&mut self.state, SessionState::Checking);
        let user_id = uuid::Uuid::new_v4().simple().to_string();
        let result = match self
            .provider
            .create_account(&user_id, email, password, name)
            .await
        {
            Ok(_) => self.open_session(email, password).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(state) => {
                self.state = state;
                self.persist().await;
                self.authenticated_account()
            }
            Err(e) => {
                log::info!("Register error: {}", e.message);
                self.state = previous;
                Err(match e.code {
                    Some(409) => AuthError::EmailTaken,
                    Some(400) => AuthError::InvalidCredentials,
                    _ => AuthError::RegisterFailed,
                })
            }
        }
    }

    /// Failures are logged and leave the current state in place.
    pub async fn signout(&mut self) {
        match self.provider.delete_current_session().await {
            Ok(()) => {
                self.state = SessionState::Anonymous;
                if let Err(e) = self.provider.forget_session().await {
                    log::warn!("Could not clear saved session: {}", e.message);
                }
            }
            Err(e) => log::info!("Signout error: {}", e.message),
        }
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        self.provider
            .create_recovery(email, &self.recovery_url)
            .await
            .map_err(|e| {
                log::info!("Reset password error: {}", e.message);
                AuthError::RecoveryFailed
            })
    }

    async fn open_session(&self, email: &str, password: &str) -> Result<SessionState, IdentityError> {
        let session = self
            .provider
            .create_email_password_session(email, password)
            .await?;
        let account = self.provider.account().await?;
        Ok(SessionState::Authenticated { session, account })
    }

    /// The login itself succeeded, so a failure here only costs the next launch.
    async fn persist(&self) {
        if let Err(e) = self.provider.persist_session().await {
            log::warn!("Could not save session: {}", e.message);
        }
    }

    fn authenticated_account(&self) -> Result<&Account, AuthError> {
        match &self.state {
            SessionState::Authenticated { account, .. } => Ok(account),
            _ => Err(AuthError::SigninFailed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeIdentity {
        session: Mutex<Option<Session>>,
        /// Survives the fake itself, like the device's storage.
        saved: Arc<Mutex<Option<Session>>>,
        fail_with: Option<u16>,
        signout_fails: bool,
        recovery_requests: Mutex<Vec<(String, String)>>,
    }

    impl FakeIdentity {
        fn on_device(saved: Arc<Mutex<Option<Session>>>) -> Self {
            let session = saved.lock().unwrap().clone();
            Self {
                session: Mutex::new(session),
                saved,
                ..FakeIdentity::default()
            }
        }
    }

    fn backend_error(code: u16) -> IdentityError {
        IdentityError {
            code: Some(code),
            message: "backend said no".into(),
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        async fn current_session(&self) -> Result<Option<Session>, IdentityError> {
            if let Some(code) = self.fail_with {
                return Err(backend_error(code));
            }
            Ok(self.session.lock().unwrap().clone())
        }

        async fn account(&self) -> Result<Account, IdentityError> {
            let session = self.session.lock().unwrap().clone().ok_or_else(|| backend_error(401))?;
            Ok(Account {
                id: session.user_id,
                name: "Ana".into(),
                email: "ana@example.com".into(),
            })
        }

        async fn create_account(
            &self,
            user_id: &str,
            email: &str,
            _password: &str,
            name: &str,
        ) -> Result<Account, IdentityError> {
            if let Some(code) = self.fail_with {
                return Err(backend_error(code));
            }
            Ok(Account {
                id: user_id.into(),
                name: name.into(),
                email: email.into(),
            })
        }

        async fn create_email_password_session(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<Session, IdentityError> {
            if let Some(code) = self.fail_with {
                return Err(backend_error(code));
            }
            let session = Session {
                id: "s1".into(),
                user_id: "user-1".into(),
            };
            *self.session.lock().unwrap() = Some(session.clone());
            Ok(session)
        }

        async fn delete_current_session(&self) -> Result<(), IdentityError> {
            if self.signout_fails {
                return Err(IdentityError {
                    code: None,
                    message: "offline".into(),
                });
            }
            *self.session.lock().unwrap() = None;
            Ok(())
        }

        async fn create_recovery(&self, email: &str, redirect_url: &str) -> Result<(), IdentityError> {
            if let Some(code) = self.fail_with {
                return Err(backend_error(code));
            }
            self.recovery_requests
                .lock()
                .unwrap()
                .push((email.into(), redirect_url.into()));
            Ok(())
        }

        async fn persist_session(&self) -> Result<(), IdentityError> {
            *self.saved.lock().unwrap() = self.session.lock().unwrap().clone();
            Ok(())
        }

        async fn forget_session(&self) -> Result<(), IdentityError> {
            *self.saved.lock().unwrap() = None;
            Ok(())
        }
    }

    fn context(provider: FakeIdentity) -> SessionContext<FakeIdentity> {
        SessionContext::new(provider, "https://example.com/reset-password")
    }

    #[tokio::test]
    async fn starts_uninitialized_and_settles_anonymous() {
        let mut ctx = context(FakeIdentity::default());
        assert!(ctx.is_loading());
        assert_eq!(ctx.check_auth().await, &SessionState::Anonymous);
        assert!(!ctx.is_loading());
        assert_eq!(ctx.owner_id(), None);
    }

    #[tokio::test]
    async fn check_auth_errors_become_anonymous() {
        let mut ctx = context(FakeIdentity {
            fail_with: Some(500),
            ..FakeIdentity::default()
        });
        assert_eq!(ctx.check_auth().await, &SessionState::Anonymous);
    }

    #[tokio::test]
    async fn restores_existing_session() {
        let provider = FakeIdentity::default();
        *provider.session.lock().unwrap() = Some(Session {
            id: "s0".into(),
            user_id: "user-9".into(),
        });
        let mut ctx = context(provider);
        ctx.check_auth().await;
        assert_eq!(ctx.owner_id(), Some("user-9"));
    }

    #[tokio::test]
    async fn relaunch_restores_saved_login_until_signout() {
        let device = Arc::new(Mutex::new(None));

        let mut first = context(FakeIdentity::on_device(device.clone()));
        first.signin("ana@example.com", "secret").await.unwrap();
        drop(first);

        let mut relaunched = context(FakeIdentity::on_device(device.clone()));
        assert!(matches!(
            relaunched.check_auth().await,
            SessionState::Authenticated { .. }
        ));
        assert_eq!(relaunched.owner_id(), Some("user-1"));

        relaunched.signout().await;
        assert_eq!(*device.lock().unwrap(), None);

        let mut after_signout = context(FakeIdentity::on_device(device));
        assert_eq!(after_signout.check_auth().await, &SessionState::Anonymous);
    }

    #[tokio::test]
    async fn register_saves_login() {
        let device = Arc::new(Mutex::new(None));
        let mut ctx = context(FakeIdentity::on_device(device.clone()));
        ctx.register("Ana", "ana@example.com", "secret").await.unwrap();
        assert_eq!(device.lock().unwrap().as_ref().map(|s| s.user_id.as_str()), Some("user-1"));
    }

    #[tokio::test]
    async fn signin_then_signout() {
        let mut ctx = context(FakeIdentity::default());
        let account = ctx.signin("ana@example.com", "secret").await.unwrap();
        assert_eq!(account.id, "user-1");
        assert_eq!(ctx.owner_id(), Some("user-1"));

        ctx.signout().await;
        assert_eq!(ctx.state(), &SessionState::Anonymous);
        assert_eq!(ctx.owner_id(), None);
    }

    #[tokio::test]
    async fn failed_signout_keeps_session() {
        let mut ctx = context(FakeIdentity {
            signout_fails: true,
            ..FakeIdentity::default()
        });
        ctx.signin("ana@example.com", "secret").await.unwrap();
        ctx.signout().await;
        assert_eq!(ctx.owner_id(), Some("user-1"));
    }

    #[tokio::test]
    async fn signin_maps_backend_codes() {
        for (code, expected) in [
            (401, AuthError::WrongCredentials),
            (400, AuthError::InvalidCredentials),
            (503, AuthError::SigninFailed),
        ] {
            let mut ctx = context(FakeIdentity {
                fail_with: Some(code),
                ..FakeIdentity::default()
            });
            assert_eq!(ctx.signin("a@b.c", "x").await.unwrap_err(), expected);
            assert_eq!(ctx.state(), &SessionState::Uninitialized);
        }
    }

    #[tokio::test]
    async fn register_maps_backend_codes() {
        for (code, expected) in [
            (409, AuthError::EmailTaken),
            (400, AuthError::InvalidCredentials),
            (500, AuthError::RegisterFailed),
        ] {
            let mut ctx = context(FakeIdentity {
                fail_with: Some(code),
                ..FakeIdentity::default()
            });
            assert_eq!(ctx.register("Ana", "a@b.c", "x").await.unwrap_err(), expected);
        }
    }

    #[tokio::test]
    async fn register_signs_in() {
        let mut ctx = context(FakeIdentity::default());
        ctx.register("Ana", "ana@example.com", "secret").await.unwrap();
        assert_eq!(ctx.owner_id(), Some("user-1"));
    }

    #[tokio::test]
    async fn reset_password_uses_configured_redirect() {
        let ctx = context(FakeIdentity::default());
        ctx.reset_password("ana@example.com").await.unwrap();
        let requests = ctx.provider.recovery_requests.lock().unwrap();
        assert_eq!(
            requests.as_slice(),
            &[(
                "ana@example.com".to_string(),
                "https://example.com/reset-password".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn reset_password_failure_message() {
        let ctx = context(FakeIdentity {
            fail_with: Some(500),
            ..FakeIdentity::default()
        });
        let err = ctx.reset_password("ana@example.com").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Erro ao enviar email de recuperação. Tente novamente."
        );
    }
}
