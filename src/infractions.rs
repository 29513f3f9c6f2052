//! Infraction registry.
//!
//! Creation and listing of disciplinary records. Removal never happens here;
//! that is the deletion workflow's job (crate::deletions).

use crate::audit;
use crate::orm::audit_logs::AuditAction;
use crate::orm::garrisons;
use crate::orm::infractions::{self, Severity};
use crate::user::Actor;
use chrono::Utc;
use sea_orm::{
    entity::*, query::*, DatabaseConnection, DbBackend, DbErr, FromQueryResult, Statement,
};

#[derive(Debug)]
pub enum InfractionError {
    GarrisonNotFound,
    Db(DbErr),
}

impl std::fmt::Display for InfractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfractionError::GarrisonNotFound => write!(f, "Unknown garrison unit"),
            InfractionError::Db(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for InfractionError {}

impl From<DbErr> for InfractionError {
    fn from(e: DbErr) -> Self {
        InfractionError::Db(e)
    }
}

/// Form payload for a new infraction. Garrison and severity arrive as raw
/// strings and are resolved here.
#[derive(Clone, Debug)]
pub struct NewInfraction {
    pub garrison: String,
    pub officer_id: String,
    pub officer_name: String,
    pub punishment_type: String,
    pub evidence: String,
    pub severity: String,
}

/// Register a new infraction.
///
/// The garrison is resolved by name; an unknown unit is rejected. An
/// unrecognized severity value is coerced to Leve with a warning rather than
/// rejected, so a stale client cannot lose a report over a label mismatch.
pub async fn create(
    db: &DatabaseConnection,
    actor: &Actor,
    data: NewInfraction,
) -> Result<infractions::Model, InfractionError> {
    let garrison = crate::garrisons::find_by_name(db, &data.garrison)
        .await?
        .ok_or(InfractionError::GarrisonNotFound)?;

    let severity = Severity::from_form(&data.severity).unwrap_or_else(|| {
        log::warn!(
            "Unrecognized severity {:?} from {}, coercing to Leve",
            data.severity,
            actor.name
        );
        Severity::Leve
    });

    let model = infractions::ActiveModel {
        garrison_id: Set(garrison.id),
        officer_id: Set(data.officer_id),
        officer_name: Set(data.officer_name),
        punishment_type: Set(data.punishment_type),
        evidence: Set(data.evidence),
        severity: Set(severity),
        registered_by: Set(actor.name.clone()),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!(
        "Infraction #{} registered against {} by {}",
        model.id,
        model.officer_name,
        actor.name
    );

    audit::record(
        db,
        AuditAction::Create,
        "infractions",
        model.id,
        &actor.name,
        Some(serde_json::json!({
            "officer_name": model.officer_name,
            "severity": model.severity.as_str(),
            "garrison": garrison.name,
        })),
    )
    .await;

    Ok(model)
}

/// Listing filters. All optional; empty strings are treated as absent by the
/// handlers before they get here.
#[derive(Clone, Debug, Default)]
pub struct InfractionFilter {
    /// Free text matched against officer name and id.
    pub search: Option<String>,
    pub garrison_id: Option<i32>,
    pub severity: Option<Severity>,
}

/// Infractions newest-first with their garrison, capped at the configured
/// listing limit.
pub async fn list(
    db: &DatabaseConnection,
    filter: &InfractionFilter,
) -> Result<Vec<(infractions::Model, Option<garrisons::Model>)>, DbErr> {
    let mut select = infractions::Entity::find().find_also_related(garrisons::Entity);

    if let Some(search) = &filter.search {
        select = select.filter(
            Condition::any()
                .add(infractions::Column::OfficerName.contains(search))
                .add(infractions::Column::OfficerId.contains(search)),
        );
    }

    if let Some(garrison_id) = filter.garrison_id {
        select = select.filter(infractions::Column::GarrisonId.eq(garrison_id));
    }

    if let Some(severity) = filter.severity {
        select = select.filter(infractions::Column::Severity.eq(severity));
    }

    select
        .order_by_desc(infractions::Column::CreatedAt)
        .order_by_desc(infractions::Column::Id)
        .limit(crate::app_config::limits().max_list_rows)
        .all(db)
        .await
}

/// Dashboard statistics, recomputed on every call.
#[derive(Clone, Debug, FromQueryResult)]
pub struct InfractionStatistics {
    pub total: i64,
    pub grave_count: i64,
    pub distinct_registrars: i64,
}

pub async fn statistics(db: &DatabaseConnection) -> Result<InfractionStatistics, DbErr> {
    let sql = r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE severity = 'Grave') AS grave_count,
            COUNT(DISTINCT registered_by) AS distinct_registrars
        FROM infractions
    "#;

    let row = InfractionStatistics::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        vec![],
    ))
    .one(db)
    .await?;

    // A COUNT(*) aggregate always yields one row.
    row.ok_or_else(|| DbErr::Custom("statistics query returned no row".to_string()))
}

pub async fn find_by_id(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<infractions::Model>, DbErr> {
    infractions::Entity::find_by_id(id).one(db).await
}
