use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "downloads")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub media_type: MediaType,
    pub movie_id: Option<i32>,
    pub series_id: Option<i32>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub title: String,
    pub download_url: String,
    pub size: Option<i64>,
    pub seeders: Option<i32>,
    pub indexer: Option<String>,
    pub quality: Option<String>,
    pub status: DownloadStatus,
    pub progress: f64,
    pub remote_id: Option<String>,
    pub client_id: Option<i32>,
    pub save_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[sea_orm(string_value = "movie")]
    Movie,
    #[sea_orm(string_value = "tv")]
    Tv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "downloading")]
    Downloading,
    #[sea_orm(string_value = "importing")]
    Importing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
