//! Garrison units infractions are filed under.
//!
//! This is fixed reference data. The table is seeded once at startup and
//! never mutated through the web interface.

use crate::orm::garrisons;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};

/// Unit roster seeded into an empty garrisons table.
pub const DEFAULT_GARRISONS: [(&str, &str); 8] = [
    ("CORE", "Coordenadoria de Recursos Especiais"),
    ("BOPE", "Batalhão de Operações Policiais Especiais"),
    ("COE", "Comandos e Operações Especiais"),
    ("GATE", "Grupo de Ações Táticas Especiais"),
    ("PRF", "Polícia Rodoviária Federal"),
    ("CIVIL", "Polícia Civil"),
    ("ROTAM", "Rondas Ostensivas Táticas Metropolitanas"),
    ("CHOQUE", "Batalhão de Choque"),
];

/// Seed the default units if the table is empty. Safe to call on every boot.
pub async fn seed_defaults(db: &DatabaseConnection) -> Result<(), DbErr> {
    let existing = garrisons::Entity::find().count(db).await?;
    if existing > 0 {
        return Ok(());
    }

    for (name, description) in DEFAULT_GARRISONS {
        garrisons::ActiveModel {
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    log::info!("Seeded {} garrison units", DEFAULT_GARRISONS.len());

    Ok(())
}

/// All units, alphabetical. Drives form dropdowns and filters.
pub async fn list(db: &DatabaseConnection) -> Result<Vec<garrisons::Model>, DbErr> {
    garrisons::Entity::find()
        .order_by_asc(garrisons::Column::Name)
        .all(db)
        .await
}

pub async fn find_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<garrisons::Model>, DbErr> {
    garrisons::Entity::find()
        .filter(garrisons::Column::Name.eq(name))
        .one(db)
        .await
}
