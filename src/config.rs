//! Runtime settings backed by the settings table.
//!
//! Admins tune the workflow numbers (quota, retention, request TTL)
//! without a restart, so the values live in the database and every edit
//! leaves a row in setting_history. A DashMap in front keeps reads off
//! the hot paths; writes go through [`Config::set_value`], which updates
//! the table, the history, and the cache together.

use crate::orm::{setting_history, settings};
use chrono::Utc;
use dashmap::DashMap;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr, Set};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A setting value with its declared type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SettingValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl SettingValue {
    /// Parse a stored string according to the row's value_type.
    /// Unknown types and malformed values both come back as None.
    pub fn parse(value: &str, value_type: &str) -> Option<Self> {
        match value_type {
            "string" => Some(SettingValue::String(value.to_string())),
            "int" => value.parse().ok().map(SettingValue::Int),
            "bool" => value.parse().ok().map(SettingValue::Bool),
            _ => None,
        }
    }

    /// The value_type tag stored alongside the value.
    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::String(_) => "string",
            SettingValue::Int(_) => "int",
            SettingValue::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::String(s) => f.write_str(s),
            SettingValue::Int(i) => write!(f, "{}", i),
            SettingValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Cached view over the settings table.
pub struct Config {
    settings: DashMap<String, SettingValue>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            settings: DashMap::new(),
        }
    }

    /// Fill the cache from the settings table. Rows whose value does not
    /// parse under their declared type are skipped with a warning.
    pub async fn load_from_database(&self, db: &DatabaseConnection) -> Result<(), DbErr> {
        for row in settings::Entity::find().all(db).await? {
            match SettingValue::parse(&row.value, &row.value_type) {
                Some(value) => {
                    self.settings.insert(row.key, value);
                }
                None => log::warn!(
                    "Setting {} has unusable value {:?} for type {}",
                    row.key,
                    row.value,
                    row.value_type
                ),
            }
        }

        log::info!("Loaded {} settings from database", self.settings.len());

        Ok(())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.settings.get(key).as_deref() {
            Some(SettingValue::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.settings.get(key).as_deref() {
            Some(SettingValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.settings.get(key).as_deref() {
            Some(SettingValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Write a setting, recording the previous value in setting_history.
    /// First write of a new key creates the row without a history entry.
    pub async fn set_value(
        &self,
        db: &DatabaseConnection,
        key: &str,
        value: SettingValue,
        user_id: Option<i32>,
    ) -> Result<(), DbErr> {
        let stored = value.to_string();
        let now = Utc::now().naive_utc();

        match settings::Entity::find_by_id(key.to_string()).one(db).await? {
            Some(old) => {
                settings::Entity::update_many()
                    .col_expr(settings::Column::Value, Expr::value(stored.clone()))
                    .col_expr(settings::Column::UpdatedAt, Expr::value(now))
                    .col_expr(settings::Column::UpdatedBy, Expr::value(user_id))
                    .filter(settings::Column::Key.eq(key))
                    .exec(db)
                    .await?;

                setting_history::ActiveModel {
                    setting_key: Set(key.to_string()),
                    old_value: Set(Some(old.value)),
                    new_value: Set(stored),
                    changed_by: Set(user_id),
                    changed_at: Set(now),
                    ..Default::default()
                }
                .insert(db)
                .await?;
            }
            None => {
                settings::ActiveModel {
                    key: Set(key.to_string()),
                    value: Set(stored),
                    value_type: Set(value.type_name().to_string()),
                    description: Set(None),
                    updated_at: Set(now),
                    updated_by: Set(user_id),
                }
                .insert(db)
                .await?;
            }
        }

        self.settings.insert(key.to_string(), value);

        Ok(())
    }

    /// Every setting row, ordered by key for the admin screen.
    pub async fn get_all(&self, db: &DatabaseConnection) -> Result<Vec<settings::Model>, DbErr> {
        settings::Entity::find()
            .order_by_asc(settings::Column::Key)
            .all(db)
            .await
    }

    /// Change history for one key, newest first.
    pub async fn get_setting_history(
        &self,
        db: &DatabaseConnection,
        key: &str,
        limit: u64,
    ) -> Result<Vec<setting_history::Model>, DbErr> {
        setting_history::Entity::find()
            .filter(setting_history::Column::SettingKey.eq(key))
            .order_by_desc(setting_history::Column::ChangedAt)
            .order_by_desc(setting_history::Column::Id)
            .limit(limit)
            .all(db)
            .await
    }

    // Named accessors for the keys the workflow reads.

    pub fn site_name(&self) -> String {
        self.get_string_or("site_name", "Corregedoria")
    }

    /// Completed deletions a member is allowed per calendar day.
    pub fn daily_deletion_limit(&self) -> i64 {
        self.get_int_or(
            "daily_deletion_limit",
            crate::constants::DEFAULT_DAILY_DELETION_LIMIT,
        )
    }

    /// Hours deletion history is kept before the retention sweep removes it.
    pub fn deletion_retention_hours(&self) -> i64 {
        self.get_int_or(
            "deletion_retention_hours",
            crate::constants::DEFAULT_RETENTION_HOURS,
        )
    }

    /// Hours a pending deletion request lives before it expires.
    pub fn deletion_request_ttl_hours(&self) -> i64 {
        self.get_int_or(
            "deletion_request_ttl_hours",
            crate::constants::DEFAULT_REQUEST_TTL_HOURS,
        )
    }

    /// Seconds between background maintenance sweeps.
    pub fn cleanup_interval_secs(&self) -> i64 {
        self.get_int_or(
            "cleanup_interval_secs",
            crate::constants::DEFAULT_CLEANUP_INTERVAL_SECS,
        )
    }
}

/// The shared handle main() clones into the app data and the background task.
pub fn create_config() -> Arc<Config> {
    Arc::new(Config::new())
}
