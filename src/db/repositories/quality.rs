use crate::config::QualityProfileConfig;
use crate::entities::{prelude::*, quality_definitions, quality_profile_items, quality_profiles};
use crate::quality::{
    ProfileItem, QualityDefinition, QualityLadder, QualityProfile, default_definitions,
};
use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;

/// Repository for quality definitions and profiles
pub struct QualityRepository {
    conn: DatabaseConnection,
}

impl QualityRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Upserts the built-in ladder by name. Weights edited in the database are
    /// overwritten; the ladder is not user-configurable.
    pub async fn seed_definitions(&self) -> Result<()> {
        for def in default_definitions() {
            let active_model = quality_definitions::ActiveModel {
                name: Set(def.name.clone()),
                weight: Set(def.weight),
                resolution: Set(i32::from(def.resolution)),
                ..Default::default()
            };

            QualityDefinitions::insert(active_model)
                .on_conflict(
                    OnConflict::column(quality_definitions::Column::Name)
                        .update_columns([
                            quality_definitions::Column::Weight,
                            quality_definitions::Column::Resolution,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&self.conn)
                .await?;
        }
        Ok(())
    }

    pub async fn ladder(&self) -> Result<QualityLadder> {
        let rows = QualityDefinitions::find()
            .order_by_asc(quality_definitions::Column::Weight)
            .all(&self.conn)
            .await?;

        if rows.is_empty() {
            return Ok(QualityLadder::default());
        }

        Ok(QualityLadder::new(
            rows.into_iter()
                .map(|r| QualityDefinition {
                    name: r.name,
                    weight: r.weight,
                    resolution: u16::try_from(r.resolution).unwrap_or(0),
                })
                .collect(),
        ))
    }

    /// Replaces each configured profile's allow-list, creating the profile
    /// when needed.
    pub async fn sync_profiles(&self, profiles: &[QualityProfileConfig]) -> Result<()> {
        for profile in profiles {
            let txn = self.conn.begin().await?;

            QualityProfiles::insert(quality_profiles::ActiveModel {
                name: Set(profile.name.clone()),
                cutoff: Set(profile.cutoff.clone()),
                upgrade_allowed: Set(profile.upgrade_allowed),
                ..Default::default()
            })
            .on_conflict(
                OnConflict::column(quality_profiles::Column::Name)
                    .update_columns([
                        quality_profiles::Column::Cutoff,
                        quality_profiles::Column::UpgradeAllowed,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

            let profile_id = QualityProfiles::find()
                .filter(quality_profiles::Column::Name.eq(&profile.name))
                .one(&txn)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Failed to save profile {}", profile.name))?
                .id;

            QualityProfileItems::delete_many()
                .filter(quality_profile_items::Column::ProfileId.eq(profile_id))
                .exec(&txn)
                .await?;

            let items: Vec<quality_profile_items::ActiveModel> = profile
                .allowed_qualities
                .iter()
                .zip(0..)
                .map(|(quality, sort_order)| quality_profile_items::ActiveModel {
                    profile_id: Set(profile_id),
                    quality: Set(quality.clone()),
                    allowed: Set(true),
                    sort_order: Set(sort_order),
                    ..Default::default()
                })
                .collect();

            if !items.is_empty() {
                QualityProfileItems::insert_many(items)
                    .exec_without_returning(&txn)
                    .await?;
            }

            txn.commit().await?;
        }

        if !profiles.is_empty() {
            info!(count = profiles.len(), "Quality profiles synced");
        }
        Ok(())
    }

    async fn load_profile(&self, row: quality_profiles::Model) -> Result<QualityProfile> {
        let items = QualityProfileItems::find()
            .filter(quality_profile_items::Column::ProfileId.eq(row.id))
            .order_by_asc(quality_profile_items::Column::SortOrder)
            .all(&self.conn)
            .await?;

        Ok(QualityProfile {
            id: row.id,
            name: row.name,
            cutoff: row.cutoff,
            upgrade_allowed: row.upgrade_allowed,
            items: items
                .into_iter()
                .map(|i| ProfileItem {
                    quality: i.quality,
                    allowed: i.allowed,
                })
                .collect(),
        })
    }

    pub async fn get_profile(&self, id: i32) -> Result<Option<QualityProfile>> {
        match QualityProfiles::find_by_id(id).one(&self.conn).await? {
            Some(row) => Ok(Some(self.load_profile(row).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_profile_by_name(&self, name: &str) -> Result<Option<QualityProfile>> {
        let row = QualityProfiles::find()
            .filter(quality_profiles::Column::Name.eq(name))
            .one(&self.conn)
            .await?;
        match row {
            Some(row) => Ok(Some(self.load_profile(row).await?)),
            None => Ok(None),
        }
    }

    /// The profile with the lowest id, or the built-in default when none are
    /// stored.
    pub async fn default_profile(&self) -> Result<QualityProfile> {
        let row = QualityProfiles::find()
            .order_by_asc(quality_profiles::Column::Id)
            .one(&self.conn)
            .await?;
        match row {
            Some(row) => self.load_profile(row).await,
            None => Ok(QualityProfile::default_profile()),
        }
    }
}
