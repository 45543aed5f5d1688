use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::errors::AuthError;
use crate::users::repo_types::{User, UserPatch};

/// Storage port for user records. Email is not unique at the storage layer,
/// so `find` returns every matching row and callers decide what multiple
/// matches mean.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, email: &str) -> Result<Vec<User>, AuthError>;
    async fn create(&self, email: &str, password: &str) -> Result<User, AuthError>;
    async fn find_one(&self, id: i64) -> Result<Option<User>, AuthError>;
    async fn update(&self, id: i64, patch: UserPatch) -> Result<User, AuthError>;
    async fn remove(&self, id: i64) -> Result<User, AuthError>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find(&self, email: &str) -> Result<Vec<User>, AuthError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, created_at
            FROM users
            WHERE email = $1
            ORDER BY id
            "#,
        )
        .bind(email)
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn create(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password)
            VALUES ($1, $2)
            RETURNING id, email, password, created_at
            "#,
        )
        .bind(email)
        .bind(password)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_one(&self, id: i64) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, id: i64, patch: UserPatch) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                password = COALESCE($3, password)
            WHERE id = $1
            RETURNING id, email, password, created_at
            "#,
        )
        .bind(id)
        .bind(patch.email)
        .bind(patch.password)
        .fetch_optional(&self.db)
        .await?;
        user.ok_or(AuthError::UserNotFound)
    }

    async fn remove(&self, id: i64) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            DELETE FROM users
            WHERE id = $1
            RETURNING id, email, password, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        user.ok_or(AuthError::UserNotFound)
    }
}

/// In-process store implementing the same port. Backs `AppState::fake()` and
/// the service tests.
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
    next_id: AtomicI64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Insert a record as-is, bypassing signup. Useful for seeding tests
    /// with pre-existing (possibly malformed) rows.
    pub fn seed(&self, user: User) {
        let mut users = self.users.lock().expect("user store lock");
        if user.id >= self.next_id.load(Ordering::SeqCst) {
            self.next_id.store(user.id + 1, Ordering::SeqCst);
        }
        users.push(user);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find(&self, email: &str) -> Result<Vec<User>, AuthError> {
        let users = self.users.lock().expect("user store lock");
        Ok(users.iter().filter(|u| u.email == email).cloned().collect())
    }

    async fn create(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let mut users = self.users.lock().expect("user store lock");
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            email: email.to_string(),
            password: password.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_one(&self, id: i64) -> Result<Option<User>, AuthError> {
        let users = self.users.lock().expect("user store lock");
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn update(&self, id: i64, patch: UserPatch) -> Result<User, AuthError> {
        let mut users = self.users.lock().expect("user store lock");
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(AuthError::UserNotFound)?;
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(password) = patch.password {
            user.password = password;
        }
        Ok(user.clone())
    }

    async fn remove(&self, id: i64) -> Result<User, AuthError> {
        let mut users = self.users.lock().expect("user store lock");
        let pos = users
            .iter()
            .position(|u| u.id == id)
            .ok_or(AuthError::UserNotFound)?;
        Ok(users.remove(pos))
    }
}
