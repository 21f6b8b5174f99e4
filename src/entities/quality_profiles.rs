use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "quality_profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub cutoff: String,
    pub upgrade_allowed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::quality_profile_items::Entity")]
    QualityProfileItems,
}

impl Related<super::quality_profile_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QualityProfileItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
