//! User directory. Users are registered from identity-provider claims; the
//! services never require an actor to exist here.

use uuid::Uuid;

use super::validate;
use crate::db::{Database, users};
use crate::error::{BacklogError, Result};
use crate::model::user::{IdentityClaims, User};

pub trait UserService: Send + Sync {
    /// Create the user or refresh the one with the same `google_id`.
    fn register(&self, claims: &IdentityClaims) -> Result<User>;
    fn list(&self) -> Result<Vec<User>>;
    fn get(&self, id: Uuid) -> Result<User>;
    fn get_by_email(&self, email: &str) -> Result<User>;
    /// Look a user up by id, falling back to email.
    fn resolve(&self, id_or_email: &str) -> Result<User>;
}

#[derive(Debug, Clone)]
pub struct SqliteUserService {
    db: Database,
}

impl SqliteUserService {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }
}

impl UserService for SqliteUserService {
    fn register(&self, claims: &IdentityClaims) -> Result<User> {
        let claims = IdentityClaims {
            google_id: validate::required("google_id", &claims.google_id, 255)?,
            email: validate::required("email", &claims.email, 255)?,
            name: validate::required("name", &claims.name, 255)?,
            avatar_url: validate::optional("avatar_url", claims.avatar_url.as_deref(), 2_048)?,
        };
        self.db.write(|tx| {
            let user = users::upsert(tx, &claims)?;
            tracing::debug!(user_id = %user.id, "user registered");
            Ok(user)
        })
    }

    fn list(&self) -> Result<Vec<User>> {
        self.db.read(users::list)
    }

    fn get(&self, id: Uuid) -> Result<User> {
        self.db
            .read(|conn| users::get(conn, id)?.ok_or_else(|| BacklogError::UserNotFound(id.to_string())))
    }

    fn get_by_email(&self, email: &str) -> Result<User> {
        self.db.read(|conn| {
            users::get_by_email(conn, email)?
                .ok_or_else(|| BacklogError::UserNotFound(email.trim().to_string()))
        })
    }

    fn resolve(&self, id_or_email: &str) -> Result<User> {
        match Uuid::parse_str(id_or_email.trim()) {
            Ok(id) => self.get(id),
            Err(_) => self.get_by_email(id_or_email),
        }
    }
}
