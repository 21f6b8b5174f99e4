use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "download_clients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub kind: ClientKind,
    pub host: String,
    pub port: i32,
    pub use_tls: bool,
    pub url_base: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub default_category: Option<String>,
    pub movie_category: Option<String>,
    pub tv_category: Option<String>,
    pub movie_directory: Option<String>,
    pub tv_directory: Option<String>,
    pub priority: i32,
    pub enabled: bool,
    pub remove_completed: bool,
    pub remove_failed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    #[sea_orm(string_value = "torrent")]
    Torrent,
    #[sea_orm(string_value = "usenet")]
    Usenet,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
