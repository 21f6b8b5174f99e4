use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(QualityDefinitions)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(QualityProfiles)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(QualityProfileItems)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(NamingConfig)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(DownloadClients)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Movies)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(MovieFiles)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Series)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Seasons)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Episodes)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(EpisodeFiles)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Downloads)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Blacklist)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_downloads_status")
                    .table(Downloads)
                    .col(crate::entities::downloads::Column::Status)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_episodes_series_season")
                    .table(Episodes)
                    .col(crate::entities::episodes::Column::SeriesId)
                    .col(crate::entities::episodes::Column::SeasonNumber)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Blacklist).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Downloads).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EpisodeFiles).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Episodes).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Seasons).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Series).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MovieFiles).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Movies).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DownloadClients).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NamingConfig).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QualityProfileItems).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QualityProfiles).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QualityDefinitions).to_owned())
            .await?;

        Ok(())
    }
}
