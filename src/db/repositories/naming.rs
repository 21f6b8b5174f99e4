use crate::entities::{naming_config, prelude::NamingConfig as NamingConfigEntity};
use crate::naming::NamingConfig;
use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use tracing::warn;

/// The naming configuration is a single row.
const SINGLETON_ID: i32 = 1;

pub struct NamingRepository {
    conn: DatabaseConnection,
}

impl NamingRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn to_active_model(config: &NamingConfig) -> naming_config::ActiveModel {
        naming_config::ActiveModel {
            id: Set(SINGLETON_ID),
            rename_movies: Set(config.rename_movies),
            rename_episodes: Set(config.rename_episodes),
            replace_illegal_characters: Set(config.replace_illegal_characters),
            colon_replacement: Set(config.colon_replacement.clone()),
            movie_file_format: Set(config.movie_file_format.clone()),
            movie_folder_format: Set(config.movie_folder_format.clone()),
            standard_episode_format: Set(config.standard_episode_format.clone()),
            daily_episode_format: Set(config.daily_episode_format.clone()),
            anime_episode_format: Set(config.anime_episode_format.clone()),
            series_folder_format: Set(config.series_folder_format.clone()),
            season_folder_format: Set(config.season_folder_format.clone()),
            specials_folder_format: Set(config.specials_folder_format.clone()),
            multi_episode_style: Set(config.multi_episode_style.as_str().to_string()),
        }
    }

    fn map_model(m: naming_config::Model) -> NamingConfig {
        let multi_episode_style = m.multi_episode_style.parse().unwrap_or_else(|e| {
            warn!(error = %e, "Stored multi-episode style is invalid, using default");
            Default::default()
        });

        NamingConfig {
            rename_movies: m.rename_movies,
            rename_episodes: m.rename_episodes,
            replace_illegal_characters: m.replace_illegal_characters,
            colon_replacement: m.colon_replacement,
            movie_file_format: m.movie_file_format,
            movie_folder_format: m.movie_folder_format,
            standard_episode_format: m.standard_episode_format,
            daily_episode_format: m.daily_episode_format,
            anime_episode_format: m.anime_episode_format,
            series_folder_format: m.series_folder_format,
            season_folder_format: m.season_folder_format,
            specials_folder_format: m.specials_folder_format,
            multi_episode_style,
        }
    }

    /// Inserts `defaults` when no row exists yet. An existing row is kept.
    pub async fn ensure(&self, defaults: &NamingConfig) -> Result<()> {
        NamingConfigEntity::insert(Self::to_active_model(defaults))
            .on_conflict(
                OnConflict::column(naming_config::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self) -> Result<NamingConfig> {
        let row = NamingConfigEntity::find_by_id(SINGLETON_ID)
            .one(&self.conn)
            .await?;
        Ok(row.map(Self::map_model).unwrap_or_default())
    }

    /// Writes every column of the singleton row.
    pub async fn save(&self, config: &NamingConfig) -> Result<()> {
        NamingConfigEntity::insert(Self::to_active_model(config))
            .on_conflict(
                OnConflict::column(naming_config::Column::Id)
                    .update_columns([
                        naming_config::Column::RenameMovies,
                        naming_config::Column::RenameEpisodes,
                        naming_config::Column::ReplaceIllegalCharacters,
                        naming_config::Column::ColonReplacement,
                        naming_config::Column::MovieFileFormat,
                        naming_config::Column::MovieFolderFormat,
                        naming_config::Column::StandardEpisodeFormat,
                        naming_config::Column::DailyEpisodeFormat,
                        naming_config::Column::AnimeEpisodeFormat,
                        naming_config::Column::SeriesFolderFormat,
                        naming_config::Column::SeasonFolderFormat,
                        naming_config::Column::SpecialsFolderFormat,
                        naming_config::Column::MultiEpisodeStyle,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;
        Ok(())
    }
}
