use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "episode_files")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub series_id: i32,
    pub season_number: i32,
    pub episode_number: i32,
    pub path: String,
    pub size: i64,
    pub quality: String,
    pub proper: bool,
    pub release_group: Option<String>,
    pub media_info: Option<String>,
    pub date_added: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
