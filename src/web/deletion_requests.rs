use crate::db::get_db_pool;
use crate::deletions::{self, DeletionError};
use crate::middleware::ClientCtx;
use crate::orm::deletion_requests::{self, RequestStatus};
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_deletion_requests)
        .service(approve_deletion_request)
        .service(deny_deletion_request);
}

#[derive(Template)]
#[template(path = "deletion_requests.html")]
pub struct DeletionRequestsTemplate {
    pub client: ClientCtx,
    pub requests: Vec<deletion_requests::Model>,
    pub filter: String,
    pub notice: Option<String>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    status: Option<String>,
    notice: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
pub struct ProcessFormData {
    csrf_token: String,
}

/// Members see their own requests here; admins see everyone's, with
/// approve and deny controls on the pending ones.
#[get("/deletion-requests")]
pub async fn view_deletion_requests(
    client: ClientCtx,
    query: web::Query<ListQuery>,
) -> Result<impl Responder, Error> {
    let viewer = client.require_member()?;
    let db = get_db_pool();

    let filter = query
        .status
        .as_deref()
        .unwrap_or("pending")
        .to_owned();

    let status = match filter.as_str() {
        "all" => None,
        "approved" => Some(RequestStatus::Approved),
        "denied" => Some(RequestStatus::Denied),
        _ => Some(RequestStatus::Pending),
    };

    let requests = deletions::list_requests(db, &viewer, status)
        .await
        .map_err(error::ErrorInternalServerError)?;

    let notice = match query.notice.as_deref() {
        Some("approved") => Some("Request approved and record deleted.".to_owned()),
        Some("denied") => Some("Request denied. The record stays.".to_owned()),
        _ => None,
    };
    let error = match query.error.as_deref() {
        Some("not_pending") => Some("That request was already processed.".to_owned()),
        Some("gone") => {
            Some("The infraction no longer exists. The request is still pending; deny it to clear the queue.".to_owned())
        }
        _ => None,
    };

    Ok(DeletionRequestsTemplate {
        client,
        requests,
        filter,
        notice,
        error,
    }
    .to_response())
}

#[post("/deletion-requests/{id}/approve")]
pub async fn approve_deletion_request(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<ProcessFormData>,
) -> Result<HttpResponse, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;

    let admin = client.require_admin()?;
    let request_id = path.into_inner();
    let db = get_db_pool();

    match deletions::approve_request(db, &admin, request_id).await {
        Ok(_) => Ok(redirect_to("/deletion-requests?notice=approved")),
        Err(DeletionError::RequestNotPending) => {
            Ok(redirect_to("/deletion-requests?error=not_pending"))
        }
        Err(DeletionError::InfractionGone) => Ok(redirect_to("/deletion-requests?error=gone")),
        Err(DeletionError::Unauthorized | DeletionError::QuotaExceeded { .. }) => Err(
            error::ErrorForbidden("You do not have permission to process requests."),
        ),
        Err(DeletionError::Db(e)) => {
            log::error!(
                "Approval of deletion request #{} by {} failed: {}",
                request_id,
                admin.name,
                e
            );
            Err(error::ErrorInternalServerError("Approval failed"))
        }
    }
}

#[post("/deletion-requests/{id}/deny")]
pub async fn deny_deletion_request(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<ProcessFormData>,
) -> Result<HttpResponse, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;

    let admin = client.require_admin()?;
    let request_id = path.into_inner();
    let db = get_db_pool();

    match deletions::deny_request(db, &admin, request_id).await {
        Ok(()) => Ok(redirect_to("/deletion-requests?notice=denied")),
        Err(DeletionError::RequestNotPending) => {
            Ok(redirect_to("/deletion-requests?error=not_pending"))
        }
        Err(e) => {
            log::error!(
                "Denial of deletion request #{} by {} failed: {}",
                request_id,
                admin.name,
                e
            );
            Err(error::ErrorInternalServerError("Denial failed"))
        }
    }
}

fn redirect_to(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header(("Location", location.to_owned()))
        .finish()
}
