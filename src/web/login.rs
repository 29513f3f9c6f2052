//! Credential checks and the login screen.
//!
//! `login` is deliberately free of session and cookie concerns so the
//! lockout tests can call it directly. The handler wires its outcome to
//! cookies and redirects.

use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::users;
use crate::session;
use crate::session::{authenticate_by_cookie, get_argon2, get_sess};
use actix_web::{error, get, post, web, Error, HttpResponse};
use argon2::password_hash::{PasswordHash, PasswordVerifier};
use askama::Template;
use askama_actix::TemplateToResponse;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr, QueryFilter};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_login).service(view_login);
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub client: ClientCtx,
}

#[derive(Deserialize)]
pub struct FormData {
    username: String,
    password: String,
}

#[derive(Debug)]
pub enum LoginResultStatus {
    Success,
    BadName,
    BadPassword,
    AccountLocked,
}

pub struct LoginResult {
    pub result: LoginResultStatus,
    pub user_id: Option<i32>,
}

impl LoginResult {
    fn success(user_id: i32) -> Self {
        Self {
            result: LoginResultStatus::Success,
            user_id: Some(user_id),
        }
    }
    fn fail(result: LoginResultStatus) -> Self {
        Self {
            result,
            user_id: None,
        }
    }
}

/// Zero the failure counter and drop any lock. Returns the updated row.
async fn clear_login_failures(
    db: &DatabaseConnection,
    user: users::Model,
) -> Result<users::Model, DbErr> {
    let mut row: users::ActiveModel = user.into();
    row.failed_login_attempts = Set(0);
    row.locked_until = Set(None);
    row.update(db).await
}

/// Count a missed password. Crossing the configured threshold locks the
/// account for the configured duration.
async fn record_login_failure(db: &DatabaseConnection, user: users::Model) -> Result<(), DbErr> {
    let security = crate::app_config::security();
    let attempts = user.failed_login_attempts + 1;

    let mut row: users::ActiveModel = user.clone().into();
    row.failed_login_attempts = Set(attempts);

    if attempts >= security.max_failed_logins as i32 {
        let until = Utc::now().naive_utc()
            + chrono::Duration::minutes(security.lockout_duration_minutes as i64);
        row.locked_until = Set(Some(until));
        log::warn!(
            "Account locked due to {} failed login attempts: user_id={}",
            attempts,
            user.id
        );
    }

    row.update(db).await?;
    Ok(())
}

/// Check a username and password, maintaining the lockout state.
pub async fn login(name: &str, pass: &str) -> Result<LoginResult, DbErr> {
    let db = get_db_pool();

    let mut user = match users::Entity::find()
        .filter(users::Column::Name.eq(name))
        .one(db)
        .await?
    {
        Some(user) => user,
        None => return Ok(LoginResult::fail(LoginResultStatus::BadName)),
    };

    if let Some(locked_until) = user.locked_until {
        if locked_until > Utc::now().naive_utc() {
            return Ok(LoginResult::fail(LoginResultStatus::AccountLocked));
        }
        // Lapsed lock. Clear it before the password check so a stale
        // counter cannot relock the account on its first miss.
        user = clear_login_failures(db, user).await?;
    }

    let parsed_hash = match PasswordHash::new(&user.password) {
        Ok(parsed) => parsed,
        Err(err) => {
            // A hash we cannot parse means the row predates the current
            // cipher or was corrupted. Treat it as a failed login rather
            // than a server error so nothing leaks to the client.
            log::error!("Unparsable password hash for user_id={}: {}", user.id, err);
            return Ok(LoginResult::fail(LoginResultStatus::BadPassword));
        }
    };

    if get_argon2()
        .verify_password(pass.as_bytes(), &parsed_hash)
        .is_err()
    {
        record_login_failure(db, user).await?;
        return Ok(LoginResult::fail(LoginResultStatus::BadPassword));
    }

    let user_id = user.id;
    if user.failed_login_attempts > 0 || user.locked_until.is_some() {
        clear_login_failures(db, user).await?;
    }

    Ok(LoginResult::success(user_id))
}

#[post("/login")]
pub async fn post_login(
    cookies: actix_session::Session,
    form: web::Form<FormData>,
) -> Result<HttpResponse, Error> {
    let result = login(form.username.trim(), &form.password)
        .await
        .map_err(|e| {
            log::error!("error {:?}", e);
            error::ErrorInternalServerError("DB error")
        })?;

    let user_id = match result.result {
        LoginResultStatus::Success => match result.user_id {
            Some(id) => id,
            None => return Err(error::ErrorInternalServerError("DB error")),
        },
        LoginResultStatus::AccountLocked => {
            log::warn!("Login attempt on locked account: {}", form.username);
            return Err(error::ErrorForbidden(format!(
                "Account locked due to too many failed login attempts. Please try again in {} minutes.",
                crate::app_config::security().lockout_duration_minutes
            )));
        }
        LoginResultStatus::BadName | LoginResultStatus::BadPassword => {
            log::debug!("login failure: {:?} for {}", result.result, form.username);
            // Use generic message to avoid username enumeration
            return Err(error::ErrorUnauthorized("Invalid username or password."));
        }
    };

    let uuid = session::new_session(get_sess(), user_id)
        .await
        .map_err(|e| {
            log::error!("error {:?}", e);
            error::ErrorInternalServerError("DB error")
        })?
        .to_string();

    cookies
        .insert("logged_in", true)
        .map_err(|_| error::ErrorInternalServerError("middleware error"))?;

    cookies
        .insert("token", uuid)
        .map_err(|_| error::ErrorInternalServerError("middleware error"))?;

    // The index route sorts the user onto whichever screen their role allows.
    Ok(HttpResponse::SeeOther()
        .append_header(("Location", "/"))
        .finish())
}

#[get("/login")]
pub async fn view_login(
    client: ClientCtx,
    cookies: actix_session::Session,
) -> Result<HttpResponse, Error> {
    if authenticate_by_cookie(&cookies).await.is_some() {
        return Ok(HttpResponse::SeeOther()
            .append_header(("Location", "/"))
            .finish());
    }

    Ok(LoginTemplate { client }.to_response())
}
