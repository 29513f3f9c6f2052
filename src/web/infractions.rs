use crate::config::Config;
use crate::db::get_db_pool;
use crate::deletions::{self, DeletionError, DeletionOutcome};
use crate::infractions::{self, InfractionFilter, InfractionStatistics, NewInfraction};
use crate::middleware::ClientCtx;
use crate::orm::garrisons;
use crate::orm::infractions::Severity;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_infractions)
        .service(view_create_infraction)
        .service(post_create_infraction)
        .service(post_delete_infraction);
}

/// One dashboard row, garrison already resolved for display.
pub struct InfractionRow {
    pub infraction: crate::orm::infractions::Model,
    pub garrison_name: String,
}

#[derive(Template)]
#[template(path = "infractions.html")]
pub struct InfractionsTemplate {
    pub client: ClientCtx,
    pub stats: InfractionStatistics,
    pub garrisons: Vec<garrisons::Model>,
    pub rows: Vec<InfractionRow>,
    pub filter_search: String,
    /// Zero when no garrison filter is active. Ids start at 1.
    pub filter_garrison: i32,
    pub filter_severity: String,
    pub notice: Option<String>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "infraction_create.html")]
pub struct CreateInfractionTemplate {
    pub client: ClientCtx,
    pub garrisons: Vec<garrisons::Model>,
    pub punishment_types: &'static [&'static str],
}

#[derive(Deserialize)]
pub struct DashboardQuery {
    search: Option<String>,
    garrison: Option<i32>,
    severity: Option<String>,
    notice: Option<String>,
    error: Option<String>,
    limit: Option<i64>,
}

#[derive(Deserialize, Validate)]
pub struct CreateFormData {
    csrf_token: String,
    garrison: String,
    #[validate(length(min = 1, max = 64))]
    officer_id: String,
    #[validate(length(min = 1, max = 255))]
    officer_name: String,
    #[validate(length(min = 1, max = 255))]
    punishment_type: String,
    #[validate(length(min = 1))]
    evidence: String,
    severity: String,
}

#[derive(Deserialize)]
pub struct DeleteFormData {
    csrf_token: String,
    reason: Option<String>,
}

/// Builds the flash banner texts from the redirect codes.
fn dashboard_messages(query: &DashboardQuery) -> (Option<String>, Option<String>) {
    let notice = match query.notice.as_deref() {
        Some("created") => Some("Infraction registered.".to_owned()),
        Some("deleted") => Some("Infraction deleted.".to_owned()),
        Some("requested") => {
            Some("Deletion request submitted for administrator approval.".to_owned())
        }
        _ => None,
    };

    let error = match query.error.as_deref() {
        Some("quota") => Some(format!(
            "Daily deletion limit of {} reached. Further deletions must wait until tomorrow.",
            query.limit.unwrap_or(crate::constants::DEFAULT_DAILY_DELETION_LIMIT)
        )),
        Some("gone") => Some("That infraction record no longer exists.".to_owned()),
        Some("reason") => Some("A deletion reason is required.".to_owned()),
        _ => None,
    };

    (notice, error)
}

#[get("/infractions")]
pub async fn view_infractions(
    client: ClientCtx,
    query: web::Query<DashboardQuery>,
) -> Result<impl Responder, Error> {
    client.require_member()?;
    let db = get_db_pool();

    let filter_search = query
        .search
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_owned();
    let filter_severity = query.severity.clone().unwrap_or_default();

    let filter = InfractionFilter {
        search: Some(filter_search.clone()).filter(|s| !s.is_empty()),
        garrison_id: query.garrison,
        severity: Severity::from_form(&filter_severity),
    };

    let stats = infractions::statistics(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let garrisons = crate::garrisons::list(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let rows = infractions::list(db, &filter)
        .await
        .map_err(error::ErrorInternalServerError)?
        .into_iter()
        .map(|(infraction, garrison)| InfractionRow {
            infraction,
            garrison_name: garrison
                .map(|g| g.name)
                .unwrap_or_else(|| "Unknown".to_owned()),
        })
        .collect();

    let (notice, error) = dashboard_messages(&query);

    Ok(InfractionsTemplate {
        client,
        stats,
        garrisons,
        rows,
        filter_search,
        filter_garrison: query.garrison.unwrap_or(0),
        filter_severity,
        notice,
        error,
    }
    .to_response())
}

#[get("/infractions/create")]
pub async fn view_create_infraction(client: ClientCtx) -> Result<impl Responder, Error> {
    client.require_member()?;
    let db = get_db_pool();

    let garrisons = crate::garrisons::list(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(CreateInfractionTemplate {
        client,
        garrisons,
        punishment_types: &crate::constants::PUNISHMENT_TYPES,
    }
    .to_response())
}

#[post("/infractions/create")]
pub async fn post_create_infraction(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<CreateFormData>,
) -> Result<impl Responder, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;

    let actor = client.require_member()?;

    form.validate().map_err(|e| {
        log::debug!("Infraction form validation failed: {}", e);
        error::ErrorBadRequest("All fields are required.")
    })?;

    let db = get_db_pool();
    let form = form.into_inner();

    let data = NewInfraction {
        garrison: form.garrison,
        officer_id: form.officer_id.trim().to_owned(),
        officer_name: form.officer_name.trim().to_owned(),
        punishment_type: form.punishment_type,
        evidence: form.evidence.trim().to_owned(),
        severity: form.severity,
    };

    infractions::create(db, &actor, data).await.map_err(|e| {
        use crate::infractions::InfractionError;
        match e {
            InfractionError::GarrisonNotFound => {
                error::ErrorBadRequest("Unknown garrison unit.")
            }
            InfractionError::Db(e) => {
                log::error!("Failed to register infraction: {}", e);
                error::ErrorInternalServerError("Failed to register infraction")
            }
        }
    })?;

    Ok(HttpResponse::SeeOther()
        .append_header(("Location", "/infractions?notice=created"))
        .finish())
}

/// Delete or request deletion of an infraction, depending on the caller's
/// role. Outcomes that a member can fix themselves come back as dashboard
/// banners instead of error pages.
#[post("/infractions/{id}/delete")]
pub async fn post_delete_infraction(
    client: ClientCtx,
    cookies: actix_session::Session,
    config: web::Data<Arc<Config>>,
    path: web::Path<i32>,
    form: web::Form<DeleteFormData>,
) -> Result<HttpResponse, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;

    let actor = client.require_member()?;
    let infraction_id = path.into_inner();

    let reason = match form
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
    {
        Some(reason) => reason.to_owned(),
        None => return Ok(redirect_to("/infractions?error=reason")),
    };

    let db = get_db_pool();

    match deletions::request_deletion(db, &config, &actor, infraction_id, &reason).await {
        Ok(DeletionOutcome::Deleted) => Ok(redirect_to("/infractions?notice=deleted")),
        Ok(DeletionOutcome::Requested(_)) => Ok(redirect_to("/infractions?notice=requested")),
        Err(DeletionError::QuotaExceeded { limit }) => Ok(redirect_to(&format!(
            "/infractions?error=quota&limit={}",
            limit
        ))),
        Err(DeletionError::InfractionGone) => Ok(redirect_to("/infractions?error=gone")),
        Err(DeletionError::Unauthorized) => Err(error::ErrorForbidden(
            "You do not have permission to delete records.",
        )),
        Err(DeletionError::RequestNotPending) => {
            Err(error::ErrorBadRequest("Request is not pending."))
        }
        Err(DeletionError::Db(e)) => {
            log::error!(
                "Deletion of infraction #{} by {} failed: {}",
                infraction_id,
                actor.name,
                e
            );
            Err(error::ErrorInternalServerError("Deletion failed"))
        }
    }
}

fn redirect_to(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header(("Location", location.to_owned()))
        .finish()
}
