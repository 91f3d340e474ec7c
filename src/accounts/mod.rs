use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::SqliteStore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    User,
    Admin,
}

impl Permission {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::User => 0,
            Self::Admin => 1,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value == 1 {
            Self::Admin
        } else {
            Self::User
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.permission == Permission::Admin
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub permission: Permission,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("name, email and password are required")]
    MissingFields,
    #[error("a user with this email already exists")]
    EmailTaken,
    #[error("user not found")]
    UnknownUser,
    #[error("incorrect password")]
    WrongPassword,
    #[error("missing or invalid bearer token")]
    Unauthenticated,
    #[error("operation not permitted")]
    NotPermitted,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type AccountResult<T> = Result<T, AccountError>;

pub fn hash_password(password: &str) -> AccountResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::Hash(err.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> AccountResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|err| AccountError::Hash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Inserts a new user after checking required fields and email uniqueness.
pub fn create_user(
    store: &SqliteStore,
    name: &str,
    email: &str,
    password: &str,
    permission: Permission,
) -> AccountResult<User> {
    let name = name.trim();
    let email = email.trim();
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AccountError::MissingFields);
    }
    if store.find_user_by_email(email)?.is_some() {
        return Err(AccountError::EmailTaken);
    }
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        password_hash: hash_password(password)?,
        permission,
        created_at: Utc::now(),
    };
    store.insert_user(&user).map_err(email_conflict)?;
    info!(user_id = %user.id, "user created");
    Ok(user)
}

/// A concurrent writer can claim the email between the lookup and the
/// write; the unique index then rejects ours.
fn email_conflict(error: anyhow::Error) -> AccountError {
    let violated = error
        .downcast_ref::<rusqlite::Error>()
        .and_then(rusqlite::Error::sqlite_error_code)
        == Some(rusqlite::ErrorCode::ConstraintViolation);
    if violated {
        AccountError::EmailTaken
    } else {
        AccountError::Storage(error)
    }
}

/// Creates a regular user and opens a session for them.
pub fn register(
    store: &SqliteStore,
    name: &str,
    email: &str,
    password: &str,
) -> AccountResult<(User, Session)> {
    let user = create_user(store, name, email, password, Permission::User)?;
    let session = open_session(store, &user)?;
    Ok((user, session))
}

pub fn login(store: &SqliteStore, name: &str, password: &str) -> AccountResult<Session> {
    let user = store
        .find_user_by_name(name.trim())?
        .ok_or(AccountError::UnknownUser)?;
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login rejected");
        return Err(AccountError::WrongPassword);
    }
    open_session(store, &user)
}

fn open_session(store: &SqliteStore, user: &User) -> AccountResult<Session> {
    let token = store.create_session(&user.id)?;
    Ok(Session {
        token,
        user_id: user.id.clone(),
        permission: user.permission,
    })
}

pub fn authenticate(store: &SqliteStore, token: &str) -> AccountResult<User> {
    store
        .resolve_session(token)?
        .ok_or(AccountError::Unauthenticated)
}

pub fn change_password(
    store: &SqliteStore,
    user: &User,
    old_password: &str,
    new_password: &str,
) -> AccountResult<()> {
    if new_password.is_empty() {
        return Err(AccountError::MissingFields);
    }
    if !verify_password(old_password, &user.password_hash)? {
        return Err(AccountError::WrongPassword);
    }
    store.update_password_hash(&user.id, &hash_password(new_password)?)?;
    Ok(())
}

pub fn change_email(
    store: &SqliteStore,
    user: &User,
    password: &str,
    new_email: &str,
) -> AccountResult<()> {
    let new_email = new_email.trim();
    if new_email.is_empty() {
        return Err(AccountError::MissingFields);
    }
    if !verify_password(password, &user.password_hash)? {
        return Err(AccountError::WrongPassword);
    }
    if let Some(existing) = store.find_user_by_email(new_email)? {
        if existing.id != user.id {
            return Err(AccountError::EmailTaken);
        }
    }
    store
        .update_email(&user.id, new_email)
        .map_err(email_conflict)?;
    Ok(())
}

/// Deletes the account registered under `email`, and its projects.
/// Users may delete themselves; admins may delete anyone.
pub fn delete_user(store: &SqliteStore, actor: &User, email: &str) -> AccountResult<()> {
    let target = store
        .find_user_by_email(email.trim())?
        .ok_or(AccountError::UnknownUser)?;
    if target.id != actor.id && !actor.is_admin() {
        warn!(actor = %actor.id, target = %target.id, "delete user rejected");
        return Err(AccountError::NotPermitted);
    }
    store.delete_user(&target.id)?;
    info!(user_id = %target.id, "user deleted");
    Ok(())
}

pub fn list_users(store: &SqliteStore, actor: &User) -> AccountResult<Vec<User>> {
    require_admin(actor)?;
    Ok(store.list_users()?)
}

pub fn get_user(store: &SqliteStore, actor: &User, user_id: &str) -> AccountResult<User> {
    require_admin(actor)?;
    store.find_user(user_id)?.ok_or(AccountError::UnknownUser)
}

pub fn require_admin(actor: &User) -> AccountResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AccountError::NotPermitted)
    }
}
