use crate::entities::{
    episode_files, episodes, movie_files, movies, prelude::*, seasons, series,
};
use anyhow::Result;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

pub use crate::entities::episode_files::Model as EpisodeFile;
pub use crate::entities::episodes::Model as Episode;
pub use crate::entities::movie_files::Model as MovieFile;
pub use crate::entities::movies::Model as Movie;
pub use crate::entities::seasons::Model as Season;
pub use crate::entities::series::Model as SeriesRow;

#[derive(Debug, Clone, Default)]
pub struct NewMovie {
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub tmdb_id: Option<i32>,
    pub imdb_id: Option<String>,
    pub path: Option<String>,
    pub quality_profile_id: Option<i32>,
    pub monitored: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewSeries {
    pub title: String,
    pub year: Option<i32>,
    pub tvdb_id: Option<i32>,
    pub tmdb_id: Option<i32>,
    pub imdb_id: Option<String>,
    pub path: Option<String>,
    pub series_type: String,
    pub quality_profile_id: Option<i32>,
    pub monitored: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewEpisode {
    pub series_id: i32,
    pub season_number: i32,
    pub episode_number: i32,
    pub absolute_number: Option<i32>,
    pub title: Option<String>,
    pub air_date: Option<String>,
    pub monitored: bool,
}

/// Facts recorded for one file placed in the library.
#[derive(Debug, Clone, Default)]
pub struct NewMediaFile {
    pub path: String,
    pub size: i64,
    pub quality: String,
    pub proper: bool,
    pub release_group: Option<String>,
    /// JSON-encoded probe result.
    pub media_info: Option<String>,
}

/// Movies, series, seasons, episodes and the files recorded for them.
pub struct MediaRepository {
    conn: DatabaseConnection,
}

impl MediaRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    // Movies

    pub async fn insert_movie(&self, movie: NewMovie) -> Result<i32> {
        let result = Movies::insert(movies::ActiveModel {
            title: Set(movie.title),
            original_title: Set(movie.original_title),
            year: Set(movie.year),
            tmdb_id: Set(movie.tmdb_id),
            imdb_id: Set(movie.imdb_id),
            path: Set(movie.path),
            quality_profile_id: Set(movie.quality_profile_id),
            monitored: Set(movie.monitored),
            has_file: Set(false),
            ..Default::default()
        })
        .exec(&self.conn)
        .await?;
        Ok(result.last_insert_id)
    }

    pub async fn get_movie(&self, id: i32) -> Result<Option<Movie>> {
        Ok(Movies::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn set_movie_path(&self, id: i32, path: &str) -> Result<()> {
        Movies::update_many()
            .col_expr(movies::Column::Path, Expr::value(path))
            .filter(movies::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn set_movie_monitored(&self, id: i32, monitored: bool) -> Result<bool> {
        let result = Movies::update_many()
            .col_expr(movies::Column::Monitored, Expr::value(monitored))
            .filter(movies::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn movie_files(&self, movie_id: i32) -> Result<Vec<MovieFile>> {
        Ok(MovieFiles::find()
            .filter(movie_files::Column::MovieId.eq(movie_id))
            .order_by_asc(movie_files::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn delete_movie_file(&self, id: i32) -> Result<()> {
        MovieFiles::delete_by_id(id).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn add_movie_file(&self, movie_id: i32, file: NewMediaFile) -> Result<i32> {
        let result = MovieFiles::insert(movie_files::ActiveModel {
            movie_id: Set(movie_id),
            path: Set(file.path),
            size: Set(file.size),
            quality: Set(file.quality),
            proper: Set(file.proper),
            release_group: Set(file.release_group),
            media_info: Set(file.media_info),
            date_added: Set(Self::now()),
            ..Default::default()
        })
        .exec(&self.conn)
        .await?;

        Movies::update_many()
            .col_expr(movies::Column::HasFile, Expr::value(true))
            .filter(movies::Column::Id.eq(movie_id))
            .exec(&self.conn)
            .await?;

        Ok(result.last_insert_id)
    }

    // Series

    pub async fn insert_series(&self, new: NewSeries) -> Result<i32> {
        let result = Series::insert(series::ActiveModel {
            title: Set(new.title),
            year: Set(new.year),
            tvdb_id: Set(new.tvdb_id),
            tmdb_id: Set(new.tmdb_id),
            imdb_id: Set(new.imdb_id),
            path: Set(new.path),
            series_type: Set(if new.series_type.is_empty() {
                "standard".to_string()
            } else {
                new.series_type
            }),
            quality_profile_id: Set(new.quality_profile_id),
            monitored: Set(new.monitored),
            ..Default::default()
        })
        .exec(&self.conn)
        .await?;
        Ok(result.last_insert_id)
    }

    pub async fn get_series(&self, id: i32) -> Result<Option<SeriesRow>> {
        Ok(Series::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn set_series_path(&self, id: i32, path: &str) -> Result<()> {
        Series::update_many()
            .col_expr(series::Column::Path, Expr::value(path))
            .filter(series::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn set_series_monitored(&self, id: i32, monitored: bool) -> Result<bool> {
        let result = Series::update_many()
            .col_expr(series::Column::Monitored, Expr::value(monitored))
            .filter(series::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn seasons(&self, series_id: i32) -> Result<Vec<Season>> {
        Ok(Seasons::find()
            .filter(seasons::Column::SeriesId.eq(series_id))
            .order_by_asc(seasons::Column::SeasonNumber)
            .all(&self.conn)
            .await?)
    }

    pub async fn get_season(&self, series_id: i32, season_number: i32) -> Result<Option<Season>> {
        Ok(Seasons::find()
            .filter(seasons::Column::SeriesId.eq(series_id))
            .filter(seasons::Column::SeasonNumber.eq(season_number))
            .one(&self.conn)
            .await?)
    }

    /// Creates the season row on first use.
    pub async fn set_season_monitored(
        &self,
        series_id: i32,
        season_number: i32,
        monitored: bool,
    ) -> Result<()> {
        let result = Seasons::update_many()
            .col_expr(seasons::Column::Monitored, Expr::value(monitored))
            .filter(seasons::Column::SeriesId.eq(series_id))
            .filter(seasons::Column::SeasonNumber.eq(season_number))
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 {
            Seasons::insert(seasons::ActiveModel {
                series_id: Set(series_id),
                season_number: Set(season_number),
                monitored: Set(monitored),
                ..Default::default()
            })
            .exec_without_returning(&self.conn)
            .await?;
        }
        Ok(())
    }

    // Episodes

    pub async fn insert_episode(&self, new: NewEpisode) -> Result<i32> {
        if self
            .get_season(new.series_id, new.season_number)
            .await?
            .is_none()
        {
            self.set_season_monitored(new.series_id, new.season_number, new.monitored)
                .await?;
        }

        let result = Episodes::insert(episodes::ActiveModel {
            series_id: Set(new.series_id),
            season_number: Set(new.season_number),
            episode_number: Set(new.episode_number),
            absolute_number: Set(new.absolute_number),
            title: Set(new.title),
            air_date: Set(new.air_date),
            monitored: Set(new.monitored),
            has_file: Set(false),
            ..Default::default()
        })
        .exec(&self.conn)
        .await?;
        Ok(result.last_insert_id)
    }

    pub async fn get_episode(
        &self,
        series_id: i32,
        season_number: i32,
        episode_number: i32,
    ) -> Result<Option<Episode>> {
        Ok(Episodes::find()
            .filter(episodes::Column::SeriesId.eq(series_id))
            .filter(episodes::Column::SeasonNumber.eq(season_number))
            .filter(episodes::Column::EpisodeNumber.eq(episode_number))
            .one(&self.conn)
            .await?)
    }

    pub async fn episodes_in_season(
        &self,
        series_id: i32,
        season_number: i32,
    ) -> Result<Vec<Episode>> {
        Ok(Episodes::find()
            .filter(episodes::Column::SeriesId.eq(series_id))
            .filter(episodes::Column::SeasonNumber.eq(season_number))
            .order_by_asc(episodes::Column::EpisodeNumber)
            .all(&self.conn)
            .await?)
    }

    pub async fn count_monitored_in_season(&self, series_id: i32, season_number: i32) -> Result<u64> {
        Ok(Episodes::find()
            .filter(episodes::Column::SeriesId.eq(series_id))
            .filter(episodes::Column::SeasonNumber.eq(season_number))
            .filter(episodes::Column::Monitored.eq(true))
            .count(&self.conn)
            .await?)
    }

    pub async fn set_episode_monitored(
        &self,
        series_id: i32,
        season_number: i32,
        episode_number: i32,
        monitored: bool,
    ) -> Result<bool> {
        let result = Episodes::update_many()
            .col_expr(episodes::Column::Monitored, Expr::value(monitored))
            .filter(episodes::Column::SeriesId.eq(series_id))
            .filter(episodes::Column::SeasonNumber.eq(season_number))
            .filter(episodes::Column::EpisodeNumber.eq(episode_number))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Sets every episode of a season, or of the whole series when `season_number`
    /// is `None`.
    pub async fn set_episodes_monitored(
        &self,
        series_id: i32,
        season_number: Option<i32>,
        monitored: bool,
    ) -> Result<u64> {
        let mut update = Episodes::update_many()
            .col_expr(episodes::Column::Monitored, Expr::value(monitored))
            .filter(episodes::Column::SeriesId.eq(series_id));
        if let Some(season) = season_number {
            update = update.filter(episodes::Column::SeasonNumber.eq(season));
        }
        Ok(update.exec(&self.conn).await?.rows_affected)
    }

    pub async fn episode_files(
        &self,
        series_id: i32,
        season_number: i32,
        episode_number: i32,
    ) -> Result<Vec<EpisodeFile>> {
        Ok(EpisodeFiles::find()
            .filter(episode_files::Column::SeriesId.eq(series_id))
            .filter(episode_files::Column::SeasonNumber.eq(season_number))
            .filter(episode_files::Column::EpisodeNumber.eq(episode_number))
            .order_by_asc(episode_files::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn delete_episode_file(&self, id: i32) -> Result<()> {
        EpisodeFiles::delete_by_id(id).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn add_episode_file(
        &self,
        series_id: i32,
        season_number: i32,
        episode_number: i32,
        file: NewMediaFile,
    ) -> Result<i32> {
        let result = EpisodeFiles::insert(episode_files::ActiveModel {
            series_id: Set(series_id),
            season_number: Set(season_number),
            episode_number: Set(episode_number),
            path: Set(file.path),
            size: Set(file.size),
            quality: Set(file.quality),
            proper: Set(file.proper),
            release_group: Set(file.release_group),
            media_info: Set(file.media_info),
            date_added: Set(Self::now()),
            ..Default::default()
        })
        .exec(&self.conn)
        .await?;

        Episodes::update_many()
            .col_expr(episodes::Column::HasFile, Expr::value(true))
            .filter(episodes::Column::SeriesId.eq(series_id))
            .filter(episodes::Column::SeasonNumber.eq(season_number))
            .filter(episodes::Column::EpisodeNumber.eq(episode_number))
            .exec(&self.conn)
            .await?;

        Ok(result.last_insert_id)
    }
}
