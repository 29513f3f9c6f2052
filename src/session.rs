//! Cookie session backing store.
//!
//! Tokens are random UUIDs handed to the browser in a signed cookie. Each
//! token maps to a sessions row; an in-process DashMap caches the rows so
//! the common path does not touch the database. Cache misses fall back to
//! the table, which keeps sessions valid across restarts.

use crate::db::get_db_pool;
use crate::orm::sessions;
use crate::user::Profile;
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version};
use chrono::{NaiveDateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use sea_orm::{entity::*, ColumnTrait, DbErr, EntityTrait, QueryFilter};
use uuid::Uuid;

/// A live session held in cache.
#[derive(Clone, Copy, Debug)]
pub struct Session {
    pub user_id: i32,
    pub expires_at: NaiveDateTime,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now().naive_utc()
    }
}

pub type SessionMap = DashMap<Uuid, Session>;

static SESSIONS: OnceCell<SessionMap> = OnceCell::new();
static ARGON2: OnceCell<Argon2<'static>> = OnceCell::new();

/// Initialize session statics. Idempotent; tests call this through a Once.
///
/// SALT is the argon2 secret. It must stay stable for the life of the
/// deployment or every stored password hash becomes unverifiable.
pub fn init() {
    if ARGON2.get().is_some() {
        return;
    }

    let salt = std::env::var("SALT").expect("SALT must be set.");
    let secret: &'static [u8] = Box::leak(salt.into_bytes().into_boxed_slice());

    let argon2 = Argon2::new_with_secret(
        secret,
        Algorithm::Argon2id,
        Version::V0x13,
        Params::default(),
    )
    .expect("Failed to build argon2 context from SALT");

    ARGON2.set(argon2).ok();
    SESSIONS.set(DashMap::new()).ok();
}

pub fn get_argon2() -> &'static Argon2<'static> {
    ARGON2.get().expect("Argon2 is not initialized")
}

pub fn get_sess() -> &'static SessionMap {
    SESSIONS.get().expect("Session cache is not initialized")
}

/// Hash a password with the process-wide argon2 context.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let hash = get_argon2()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string();
    Ok(hash)
}

fn session_lifetime() -> chrono::Duration {
    chrono::Duration::minutes(crate::app_config::security().session_timeout_minutes as i64)
}

/// Create a session for a user: one row, one cache entry, one token.
pub async fn new_session(map: &SessionMap, user_id: i32) -> Result<Uuid, DbErr> {
    let db = get_db_pool();
    let uuid = Uuid::new_v4();
    let expires_at = Utc::now().naive_utc() + session_lifetime();

    sessions::ActiveModel {
        id: Set(uuid.to_string()),
        user_id: Set(user_id),
        expires_at: Set(expires_at),
    }
    .insert(db)
    .await?;

    map.insert(
        uuid,
        Session {
            user_id,
            expires_at,
        },
    );

    Ok(uuid)
}

/// Look up a session by token, falling back to the database on cache miss.
/// Expired sessions are treated as absent and dropped from the cache.
pub async fn authenticate_by_uuid(map: &SessionMap, uuid: Uuid) -> Option<Session> {
    if let Some(session) = map.get(&uuid) {
        if session.is_expired() {
            drop(session);
            map.remove(&uuid);
            return None;
        }
        return Some(*session);
    }

    let db = get_db_pool();
    let row = sessions::Entity::find_by_id(uuid.to_string())
        .one(db)
        .await
        .map_err(|e| log::error!("authenticate_by_uuid: {}", e))
        .ok()??;

    let session = Session {
        user_id: row.user_id,
        expires_at: row.expires_at,
    };

    if session.is_expired() {
        return None;
    }

    map.insert(uuid, session);
    Some(session)
}

/// Resolve the "token" cookie into a live session.
pub async fn authenticate_by_cookie(cookies: &actix_session::Session) -> Option<(Uuid, Session)> {
    let token = match cookies.get::<String>("token") {
        Ok(Some(token)) => token,
        _ => return None,
    };

    let uuid = match Uuid::parse_str(&token) {
        Ok(uuid) => uuid,
        Err(e) => {
            log::debug!("authenticate_by_cookie: bad token: {}", e);
            return None;
        }
    };

    authenticate_by_uuid(get_sess(), uuid)
        .await
        .map(|session| (uuid, session))
}

/// Resolve the cookie session all the way to a user profile.
/// Any failure along the way is a guest, never an error.
pub async fn authenticate_client_by_session(cookies: &actix_session::Session) -> Option<Profile> {
    let (_, session) = authenticate_by_cookie(cookies).await?;
    Profile::get_by_id(get_db_pool(), session.user_id)
        .await
        .map_err(|e| log::error!("authenticate_client_by_session: {}", e))
        .ok()?
}

/// Remove one session (logout).
pub async fn remove_session(map: &SessionMap, uuid: Uuid) -> Result<(), DbErr> {
    let db = get_db_pool();

    sessions::Entity::delete_by_id(uuid.to_string())
        .exec(db)
        .await?;
    map.remove(&uuid);

    Ok(())
}

/// Remove every session belonging to a user. Used when the account is
/// removed or its credentials change.
pub async fn invalidate_user_sessions(map: &SessionMap, user_id: i32) -> Result<(), DbErr> {
    let db = get_db_pool();

    sessions::Entity::delete_many()
        .filter(sessions::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    map.retain(|_, session| session.user_id != user_id);

    Ok(())
}

/// Drop expired sessions from the table and the cache.
/// Runs from the background maintenance task.
pub async fn expire_sessions(map: &SessionMap) -> Result<u64, DbErr> {
    let db = get_db_pool();
    let now = Utc::now().naive_utc();

    let result = sessions::Entity::delete_many()
        .filter(sessions::Column::ExpiresAt.lt(now))
        .exec(db)
        .await?;
    map.retain(|_, session| !session.is_expired());

    Ok(result.rows_affected)
}
