//! Authentication use case implementation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, ServerError};
use crate::ports::inbound::Authenticate;
use crate::ports::outbound::{
    Encrypter, LoadUserByEmailRepository, TokenGenerator,
    UpdateAccessTokenRepository,
};
use crate::token::AccessToken;

const AUTH_ATTEMPTS: &str = "auth_attempts_total";

/// Collaborators required to authenticate.
struct Collaborators {
    load_user_by_email_repository: Arc<dyn LoadUserByEmailRepository>,
    encrypter: Arc<dyn Encrypter>,
    token_generator: Arc<dyn TokenGenerator>,
    update_access_token_repository: Arc<dyn UpdateAccessTokenRepository>,
}

/// Authentication use case service.
///
/// Wiring is checked once, when built. A missing collaborator makes every
/// call fail before any I/O.
pub struct AuthUseCase {
    collaborators: std::result::Result<Collaborators, &'static str>,
}

impl AuthUseCase {
    /// Start building an [`AuthUseCase`].
    pub fn builder() -> AuthUseCaseBuilder {
        AuthUseCaseBuilder::default()
    }
}

/// Builder for [`AuthUseCase`].
#[derive(Default)]
pub struct AuthUseCaseBuilder {
    load_user_by_email_repository: Option<Arc<dyn LoadUserByEmailRepository>>,
    encrypter: Option<Arc<dyn Encrypter>>,
    token_generator: Option<Arc<dyn TokenGenerator>>,
    update_access_token_repository: Option<Arc<dyn UpdateAccessTokenRepository>>,
}

impl AuthUseCaseBuilder {
    pub fn load_user_by_email_repository(
        mut self,
        repository: Arc<dyn LoadUserByEmailRepository>,
    ) -> Self {
        self.load_user_by_email_repository = Some(repository);
        self
    }

    pub fn encrypter(mut self, encrypter: Arc<dyn Encrypter>) -> Self {
        self.encrypter = Some(encrypter);
        self
    }

    pub fn token_generator(mut self, generator: Arc<dyn TokenGenerator>) -> Self {
        self.token_generator = Some(generator);
        self
    }

    pub fn update_access_token_repository(
        mut self,
        repository: Arc<dyn UpdateAccessTokenRepository>,
    ) -> Self {
        self.update_access_token_repository = Some(repository);
        self
    }

    /// Build the use case.
    ///
    /// Never fails: an incomplete bundle is reported by every later call
    /// to [`Authenticate::auth`].
    pub fn build(self) -> AuthUseCase {
        let collaborators = self.collaborators();

        if let Err(collaborator) = &collaborators {
            tracing::warn!(
                collaborator,
                "authentication use case is missing a collaborator"
            );
        }

        AuthUseCase { collaborators }
    }

    /// Check the bundle, in dependency order.
    fn collaborators(self) -> std::result::Result<Collaborators, &'static str> {
        Ok(Collaborators {
            load_user_by_email_repository: self
                .load_user_by_email_repository
                .ok_or("load_user_by_email_repository")?,
            encrypter: self.encrypter.ok_or("encrypter")?,
            token_generator: self.token_generator.ok_or("token_generator")?,
            update_access_token_repository: self
                .update_access_token_repository
                .ok_or("update_access_token_repository")?,
        })
    }
}

#[async_trait]
impl Authenticate for AuthUseCase {
    async fn auth(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AccessToken>> {
        if email.is_empty() {
            return Err(ServerError::MissingParam("email"));
        }
        if password.is_empty() {
            return Err(ServerError::MissingParam("password"));
        }
        let deps = self
            .collaborators
            .as_ref()
            .map_err(|name| ServerError::MissingParam(*name))?;

        let Some(user) = deps.load_user_by_email_repository.load(email).await? else {
            metrics::counter!(AUTH_ATTEMPTS, "outcome" => "unknown_user").increment(1);
            tracing::debug!(reason = "unknown_user", "authentication failed");
            return Ok(None);
        };

        if !deps.encrypter.compare(password, &user.password_hash).await? {
            metrics::counter!(AUTH_ATTEMPTS, "outcome" => "wrong_password").increment(1);
            tracing::debug!(reason = "wrong_password", "authentication failed");
            return Ok(None);
        }

        let token = deps.token_generator.generate(&user.id).await?;
        deps.update_access_token_repository
            .update(&user.id, &token)
            .await?;

        metrics::counter!(AUTH_ATTEMPTS, "outcome" => "success").increment(1);
        tracing::info!(user_id = %user.id, "authentication successful");

        Ok(Some(token))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::user::User;

    const EMAIL: &str = "valid_email@mail.com";
    const PASSWORD: &str = "valid_password";
    const USER_ID: &str = "any_id";

    #[derive(Default)]
    struct LoadUserByEmailRepositorySpy {
        email: Mutex<Option<String>>,
        user: Option<User>,
        fail: bool,
    }

    #[async_trait]
    impl LoadUserByEmailRepository for LoadUserByEmailRepositorySpy {
        async fn load(&self, email: &str) -> Result<Option<User>> {
            *self.email.lock().unwrap() = Some(email.to_owned());
            if self.fail {
                return Err(ServerError::Internal {
                    details: "connection lost".into(),
                    source: None,
                });
            }
            Ok(self.user.clone())
        }
    }

    #[derive(Default)]
    struct EncrypterSpy {
        calls: Mutex<Vec<(String, String)>>,
        is_valid: bool,
        fail: bool,
    }

    #[async_trait]
    impl Encrypter for EncrypterSpy {
        async fn compare(&self, plain: &str, hash: &str) -> Result<bool> {
            self.calls
                .lock()
                .unwrap()
                .push((plain.to_owned(), hash.to_owned()));
            if self.fail {
                return Err(ServerError::Internal {
                    details: "argon2 error: invalid Base64 encoding".into(),
                    source: None,
                });
            }
            Ok(self.is_valid)
        }
    }

    #[derive(Default)]
    struct TokenGeneratorSpy {
        user_ids: Mutex<Vec<String>>,
        counter: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TokenGenerator for TokenGeneratorSpy {
        async fn generate(&self, user_id: &str) -> Result<AccessToken> {
            self.user_ids.lock().unwrap().push(user_id.to_owned());
            if self.fail {
                return Err(ServerError::MissingParam("secret"));
            }
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken::new(format!("tok{n}")))
        }
    }

    #[derive(Default)]
    struct UpdateAccessTokenRepositorySpy {
        calls: Mutex<Vec<(String, AccessToken)>>,
        fail: bool,
    }

    #[async_trait]
    impl UpdateAccessTokenRepository for UpdateAccessTokenRepositorySpy {
        async fn update(&self, user_id: &str, token: &AccessToken) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((user_id.to_owned(), token.clone()));
            if self.fail {
                return Err(ServerError::Internal {
                    details: "write timeout".into(),
                    source: None,
                });
            }
            Ok(())
        }
    }

    struct Sut {
        sut: AuthUseCase,
        load: Arc<LoadUserByEmailRepositorySpy>,
        encrypter: Arc<EncrypterSpy>,
        generator: Arc<TokenGeneratorSpy>,
        update: Arc<UpdateAccessTokenRepositorySpy>,
    }

    fn user() -> User {
        User {
            id: USER_ID.into(),
            password_hash: "hashed_password".into(),
        }
    }

    fn make_sut_with(
        load: LoadUserByEmailRepositorySpy,
        encrypter: EncrypterSpy,
        generator: TokenGeneratorSpy,
        update: UpdateAccessTokenRepositorySpy,
    ) -> Sut {
        let load = Arc::new(load);
        let encrypter = Arc::new(encrypter);
        let generator = Arc::new(generator);
        let update = Arc::new(update);

        let sut = AuthUseCase::builder()
            .load_user_by_email_repository(load.clone())
            .encrypter(encrypter.clone())
            .token_generator(generator.clone())
            .update_access_token_repository(update.clone())
            .build();

        Sut {
            sut,
            load,
            encrypter,
            generator,
            update,
        }
    }

    fn make_sut() -> Sut {
        make_sut_with(
            LoadUserByEmailRepositorySpy {
                user: Some(user()),
                ..Default::default()
            },
            EncrypterSpy {
                is_valid: true,
                ..Default::default()
            },
            TokenGeneratorSpy::default(),
            UpdateAccessTokenRepositorySpy::default(),
        )
    }

    #[tokio::test]
    async fn test_missing_email() {
        let Sut { sut, load, .. } = make_sut();

        assert!(matches!(
            sut.auth("", PASSWORD).await,
            Err(ServerError::MissingParam("email"))
        ));
        assert!(load.email.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_password() {
        let Sut { sut, load, .. } = make_sut();

        assert!(matches!(
            sut.auth(EMAIL, "").await,
            Err(ServerError::MissingParam("password"))
        ));
        assert!(load.email.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_params_are_checked_before_wiring() {
        let sut = AuthUseCase::builder().build();

        assert!(matches!(
            sut.auth("", PASSWORD).await,
            Err(ServerError::MissingParam("email"))
        ));
        assert!(matches!(
            sut.auth(EMAIL, "").await,
            Err(ServerError::MissingParam("password"))
        ));
    }

    #[tokio::test]
    async fn test_missing_collaborators() {
        let load: Arc<dyn LoadUserByEmailRepository> =
            Arc::new(LoadUserByEmailRepositorySpy::default());
        let encrypter: Arc<dyn Encrypter> = Arc::new(EncrypterSpy::default());
        let generator: Arc<dyn TokenGenerator> =
            Arc::new(TokenGeneratorSpy::default());

        let cases = [
            (AuthUseCase::builder().build(), "load_user_by_email_repository"),
            (
                AuthUseCase::builder()
                    .load_user_by_email_repository(load.clone())
                    .build(),
                "encrypter",
            ),
            (
                AuthUseCase::builder()
                    .load_user_by_email_repository(load.clone())
                    .encrypter(encrypter.clone())
                    .build(),
                "token_generator",
            ),
            (
                AuthUseCase::builder()
                    .load_user_by_email_repository(load.clone())
                    .encrypter(encrypter.clone())
                    .token_generator(generator.clone())
                    .build(),
                "update_access_token_repository",
            ),
        ];

        for (sut, expected) in cases {
            match sut.auth(EMAIL, PASSWORD).await {
                Err(ServerError::MissingParam(name)) => assert_eq!(name, expected),
                other => panic!("expected missing {expected}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_email() {
        let Sut {
            sut,
            load,
            encrypter,
            generator,
            update,
        } = make_sut_with(
            LoadUserByEmailRepositorySpy::default(),
            EncrypterSpy {
                is_valid: true,
                ..Default::default()
            },
            TokenGeneratorSpy::default(),
            UpdateAccessTokenRepositorySpy::default(),
        );

        assert_eq!(sut.auth("invalid_email@mail.com", PASSWORD).await.unwrap(), None);
        assert_eq!(
            load.email.lock().unwrap().as_deref(),
            Some("invalid_email@mail.com")
        );
        assert!(encrypter.calls.lock().unwrap().is_empty());
        assert!(generator.user_ids.lock().unwrap().is_empty());
        assert!(update.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let Sut {
            sut,
            encrypter,
            generator,
            update,
            ..
        } = make_sut_with(
            LoadUserByEmailRepositorySpy {
                user: Some(user()),
                ..Default::default()
            },
            EncrypterSpy::default(),
            TokenGeneratorSpy::default(),
            UpdateAccessTokenRepositorySpy::default(),
        );

        assert_eq!(sut.auth(EMAIL, "invalid_password").await.unwrap(), None);
        assert_eq!(
            *encrypter.calls.lock().unwrap(),
            vec![("invalid_password".to_owned(), "hashed_password".to_owned())]
        );
        assert!(generator.user_ids.lock().unwrap().is_empty());
        assert!(update.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_valid_credentials() {
        let Sut {
            sut,
            generator,
            update,
            ..
        } = make_sut();

        let token = sut.auth(EMAIL, PASSWORD).await.unwrap().unwrap();

        assert_eq!(token, AccessToken::new("tok1"));
        assert_eq!(*generator.user_ids.lock().unwrap(), vec![USER_ID.to_owned()]);
        assert_eq!(
            *update.calls.lock().unwrap(),
            vec![(USER_ID.to_owned(), token)]
        );
    }

    #[tokio::test]
    async fn test_successive_logins_issue_new_tokens() {
        let Sut { sut, update, .. } = make_sut();

        let first = sut.auth(EMAIL, PASSWORD).await.unwrap().unwrap();
        let second = sut.auth(EMAIL, PASSWORD).await.unwrap().unwrap();

        assert_ne!(first, second);
        assert_eq!(
            *update.calls.lock().unwrap(),
            vec![(USER_ID.to_owned(), first), (USER_ID.to_owned(), second)]
        );
    }

    #[tokio::test]
    async fn test_repository_failure_propagates() {
        let Sut { sut, encrypter, .. } = make_sut_with(
            LoadUserByEmailRepositorySpy {
                fail: true,
                ..Default::default()
            },
            EncrypterSpy::default(),
            TokenGeneratorSpy::default(),
            UpdateAccessTokenRepositorySpy::default(),
        );

        assert!(matches!(
            sut.auth(EMAIL, PASSWORD).await,
            Err(ServerError::Internal { .. })
        ));
        assert!(encrypter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_propagates() {
        let Sut { sut, update, .. } = make_sut_with(
            LoadUserByEmailRepositorySpy {
                user: Some(user()),
                ..Default::default()
            },
            EncrypterSpy {
                is_valid: true,
                ..Default::default()
            },
            TokenGeneratorSpy::default(),
            UpdateAccessTokenRepositorySpy {
                fail: true,
                ..Default::default()
            },
        );

        assert!(matches!(
            sut.auth(EMAIL, PASSWORD).await,
            Err(ServerError::Internal { .. })
        ));
        // Attempted exactly once, no retry.
        assert_eq!(update.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_encrypter_failure_propagates() {
        let Sut {
            sut,
            generator,
            update,
            ..
        } = make_sut_with(
            LoadUserByEmailRepositorySpy {
                user: Some(user()),
                ..Default::default()
            },
            EncrypterSpy {
                fail: true,
                ..Default::default()
            },
            TokenGeneratorSpy::default(),
            UpdateAccessTokenRepositorySpy::default(),
        );

        assert!(matches!(
            sut.auth(EMAIL, PASSWORD).await,
            Err(ServerError::Internal { .. })
        ));
        assert!(generator.user_ids.lock().unwrap().is_empty());
        assert!(update.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_generator_failure_propagates() {
        let Sut {
            sut,
            generator,
            update,
            ..
        } = make_sut_with(
            LoadUserByEmailRepositorySpy {
                user: Some(user()),
                ..Default::default()
            },
            EncrypterSpy {
                is_valid: true,
                ..Default::default()
            },
            TokenGeneratorSpy {
                fail: true,
                ..Default::default()
            },
            UpdateAccessTokenRepositorySpy::default(),
        );

        assert!(matches!(
            sut.auth(EMAIL, PASSWORD).await,
            Err(ServerError::MissingParam("secret"))
        ));
        assert_eq!(*generator.user_ids.lock().unwrap(), vec![USER_ID.to_owned()]);
        // Nothing persisted without a token.
        assert!(update.calls.lock().unwrap().is_empty());
    }
}
