use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::AuthError;
use crate::users::password::{hash_password, verify_password};
use crate::users::repo::UserStore;
use crate::users::repo_types::User;

/// Credential service: signup and signin over an injected user store.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Create a user with a salted scrypt hash. Any existing row with the
    /// same email is a conflict.
    pub async fn signup(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let existing = self.users.find(email).await?;
        if !existing.is_empty() {
            warn!(email = %email, "signup with email already in use");
            return Err(AuthError::DuplicateEmail);
        }

        let encoded = hash_password(password)?;
        let user = self.users.create(email, &encoded).await?;

        info!(user_id = user.id, email = %user.email, "user signed up");
        Ok(user)
    }

    /// Verify credentials against the first stored row for this email.
    /// Read-only.
    pub async fn signin(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let mut users = self.users.find(email).await?;
        if users.is_empty() {
            warn!(email = %email, "signin with unknown email");
            return Err(AuthError::UserNotFound);
        }
        let user = users.remove(0);

        if !verify_password(password, &user.password)? {
            warn!(user_id = user.id, email = %user.email, "signin with invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = user.id, email = %user.email, "user signed in");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::MemoryUserStore;
    use time::OffsetDateTime;

    fn make_service() -> (Arc<MemoryUserStore>, AuthService) {
        let store = Arc::new(MemoryUserStore::new());
        let service = AuthService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn signup_salts_and_hashes_the_password() {
        let (_, service) = make_service();
        let user = service.signup("asdad@mail.com", "asdaqwe").await.unwrap();

        assert_ne!(user.password, "asdaqwe");
        let (salt, hash) = user.password.split_once('.').expect("salt.hash format");
        assert!(!salt.is_empty());
        assert!(!hash.is_empty());
    }

    #[tokio::test]
    async fn signup_rejects_email_already_in_use() {
        let (_, service) = make_service();
        service.signup("asdf@asdf.com", "asdf").await.unwrap();

        let err = service.signup("asdf@asdf.com", "other").await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn signin_rejects_unknown_email() {
        let (_, service) = make_service();
        let err = service
            .signin("asaaqqwedf@asdf.com", "asdf")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn signin_rejects_wrong_password() {
        let (_, service) = make_service();
        service.signup("valid@mail.com", "validPassword").await.unwrap();

        let err = service
            .signin("valid@mail.com", "wrongPassword")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn signin_returns_the_user_for_correct_credentials() {
        let (_, service) = make_service();
        let created = service.signup("valid@mail.com", "validPassword").await.unwrap();

        let user = service
            .signin("valid@mail.com", "validPassword")
            .await
            .unwrap();
        assert_eq!(user.id, created.id);
        assert_eq!(user.email, "valid@mail.com");
    }

    #[tokio::test]
    async fn signin_fails_closed_on_malformed_stored_password() {
        // a row written outside signup, with no salt separator
        let (store, service) = make_service();
        store.seed(User {
            id: 1,
            email: "a".into(),
            password: "a".into(),
            created_at: OffsetDateTime::now_utc(),
        });

        let err = service.signin("a", "asdasd").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
}
