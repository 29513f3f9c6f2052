use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::{access_requests, users};
use crate::session;
use crate::session::get_sess;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr, QueryFilter, TransactionTrait};
use serde::Deserialize;
use validator::Validate;

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub client: ClientCtx,
}

#[derive(Deserialize, Validate)]
pub struct FormData {
    #[validate(length(min = 1, max = 255))]
    username: String,
    #[validate(length(min = 8, max = 1000))]
    password: String,
    #[validate(email)]
    email: String,
    /// Shown to the admin reviewing the access request.
    reason: Option<String>,
}

/// Creates the user row and its pending access request in one transaction.
///
/// New accounts always start without a role. They can log in and watch their
/// request, and nothing else, until an administrator approves them.
pub async fn insert_new_user(
    db: &DatabaseConnection,
    name: &str,
    pass: &str,
    email: &str,
    reason: Option<String>,
) -> Result<users::Model, DbErr> {
    let txn = db.begin().await?;
    let now = Utc::now().naive_utc();

    let user = users::ActiveModel {
        name: Set(name.to_owned()),
        email: Set(email.to_owned()),
        password: Set(pass.to_owned()),
        password_cipher: Set(users::Cipher::Argon2id),
        created_at: Set(now),
        failed_login_attempts: Set(0),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    access_requests::ActiveModel {
        user_id: Set(user.id),
        email: Set(user.email.clone()),
        name: Set(user.name.clone()),
        reason: Set(reason),
        status: Set(access_requests::AccessStatus::Pending),
        requested_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    Ok(user)
}

#[get("/register")]
pub async fn view_register(client: ClientCtx) -> impl Responder {
    if client.is_user() {
        return HttpResponse::SeeOther()
            .append_header(("Location", "/"))
            .finish();
    }

    RegisterTemplate { client }.to_response()
}

#[post("/register")]
pub async fn post_register(
    cookies: actix_session::Session,
    form: web::Form<FormData>,
) -> Result<HttpResponse, Error> {
    form.validate().map_err(|e| {
        log::debug!("User registration validation failed: {}", e);
        error::ErrorBadRequest("Invalid registration data")
    })?;

    let username = form.username.trim();
    let email = form.email.trim().to_lowercase();
    let reason = form
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_owned);

    let db = get_db_pool();

    // Friendly duplicate check. The unique constraints on users.name and
    // users.email are the real guard; a race here just surfaces as a 500.
    let taken = users::Entity::find()
        .filter(
            Condition::any()
                .add(users::Column::Name.eq(username))
                .add(users::Column::Email.eq(email.as_str())),
        )
        .one(db)
        .await
        .map_err(|e| {
            log::error!("Failed to check for existing user: {}", e);
            error::ErrorInternalServerError("Failed to create user")
        })?;

    if taken.is_some() {
        return Err(error::ErrorBadRequest(
            "That username or email is already registered.",
        ));
    }

    let password_hash = session::hash_password(&form.password).map_err(|e| {
        log::error!("Failed to hash password: {}", e);
        error::ErrorInternalServerError("Failed to create user")
    })?;

    let user = insert_new_user(db, username, &password_hash, &email, reason)
        .await
        .map_err(|e| {
            log::error!("Failed to create user: {}", e);
            error::ErrorInternalServerError("Failed to create user")
        })?;

    log::info!("New user registered: {} (user_id: {})", user.name, user.id);

    // Log the new account in so the pending screen can greet it by name.
    let uuid = session::new_session(get_sess(), user.id)
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

    Ok(HttpResponse::SeeOther()
        .append_header(("Location", "/access/pending"))
        .finish())
}
