use crate::access::{self, AccessError};
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::access_requests::{self, AccessStatus};
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_pending)
        .service(post_request_access)
        .service(view_access_queue)
        .service(approve_access_request)
        .service(deny_access_request);
}

#[derive(Template)]
#[template(path = "access_pending.html")]
pub struct AccessPendingTemplate {
    pub client: ClientCtx,
    pub request: Option<access_requests::Model>,
}

#[derive(Template)]
#[template(path = "admin/access_requests.html")]
pub struct AccessQueueTemplate {
    pub client: ClientCtx,
    pub requests: Vec<access_requests::Model>,
    pub filter: String,
    pub notice: Option<String>,
}

#[derive(Deserialize)]
pub struct RequestAccessFormData {
    csrf_token: String,
    reason: Option<String>,
}

#[derive(Deserialize)]
pub struct ProcessFormData {
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct QueueQuery {
    status: Option<String>,
    notice: Option<String>,
}

/// Waiting room for accounts that exist but have no role yet.
///
/// Approved users land here only by typing the URL; the page just points
/// them back at the dashboard.
#[get("/access/pending")]
pub async fn view_pending(client: ClientCtx) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;

    let request = access::latest_for_user(get_db_pool(), user_id)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(AccessPendingTemplate { client, request }.to_response())
}

/// Files a fresh access request after a denial.
#[post("/access/request")]
pub async fn post_request_access(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<RequestAccessFormData>,
) -> Result<impl Responder, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;

    let user_id = client.require_login()?;

    let reason = form
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_owned);

    let email = client.get_user().map(|u| u.email.clone()).unwrap_or_default();

    access::file_request(get_db_pool(), user_id, &client.get_name(), &email, reason)
        .await
        .map_err(|e| match e {
            AccessError::AlreadyApproved => {
                error::ErrorBadRequest("Your account already has access.")
            }
            AccessError::AlreadyPending => {
                error::ErrorConflict("You already have a request awaiting review.")
            }
            AccessError::NotPending => error::ErrorBadRequest("Request is not pending."),
            AccessError::Db(e) => {
                log::error!("Failed to file access request for user {}: {}", user_id, e);
                error::ErrorInternalServerError("Failed to file access request")
            }
        })?;

    Ok(HttpResponse::SeeOther()
        .append_header(("Location", "/access/pending"))
        .finish())
}

#[get("/admin/access-requests")]
pub async fn view_access_queue(
    client: ClientCtx,
    query: web::Query<QueueQuery>,
) -> Result<impl Responder, Error> {
    client.require_admin()?;

    let filter = query
        .status
        .as_deref()
        .unwrap_or("pending")
        .to_owned();
    let status = match filter.as_str() {
        "all" => None,
        "approved" => Some(AccessStatus::Approved),
        "denied" => Some(AccessStatus::Denied),
        _ => Some(AccessStatus::Pending),
    };

    let requests = access::list(get_db_pool(), status)
        .await
        .map_err(error::ErrorInternalServerError)?;

    let notice = match query.notice.as_deref() {
        Some("approved") => Some("Access request approved.".to_owned()),
        Some("denied") => Some("Access request denied.".to_owned()),
        _ => None,
    };

    Ok(AccessQueueTemplate {
        client,
        requests,
        filter,
        notice,
    }
    .to_response())
}

#[post("/admin/access-requests/{id}/approve")]
pub async fn approve_access_request(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<ProcessFormData>,
) -> Result<impl Responder, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;

    let admin = client.require_admin()?;
    let request_id = path.into_inner();

    access::approve(get_db_pool(), &admin, request_id)
        .await
        .map_err(|e| process_error(e, request_id))?;

    Ok(HttpResponse::SeeOther()
        .append_header(("Location", "/admin/access-requests?notice=approved"))
        .finish())
}

#[post("/admin/access-requests/{id}/deny")]
pub async fn deny_access_request(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<ProcessFormData>,
) -> Result<impl Responder, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;

    let admin = client.require_admin()?;
    let request_id = path.into_inner();

    access::deny(get_db_pool(), &admin, request_id)
        .await
        .map_err(|e| process_error(e, request_id))?;

    Ok(HttpResponse::SeeOther()
        .append_header(("Location", "/admin/access-requests?notice=denied"))
        .finish())
}

fn process_error(e: AccessError, request_id: i32) -> Error {
    match e {
        AccessError::NotPending => error::ErrorBadRequest("Request is not pending."),
        AccessError::AlreadyApproved | AccessError::AlreadyPending => {
            error::ErrorBadRequest("Request cannot be processed.")
        }
        AccessError::Db(e) => {
            log::error!("Failed to process access request #{}: {}", request_id, e);
            error::ErrorInternalServerError("Failed to process request")
        }
    }
}
