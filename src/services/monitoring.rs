//! Monitored-state changes over the series → seasons → episodes tree.

use anyhow::Result;
use tracing::info;

use crate::db::Store;

/// What an episode unmonitor changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnmonitorOutcome {
    pub episode: bool,
    /// The season had no monitored episodes left and was unmonitored too.
    pub season: bool,
}

#[derive(Clone)]
pub struct MonitorTree {
    store: Store,
}

impl MonitorTree {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Sets the series flag and walks it down to every season and episode.
    pub async fn set_series_monitored(&self, series_id: i32, monitored: bool) -> Result<bool> {
        if !self.store.set_series_monitored(series_id, monitored).await? {
            return Ok(false);
        }

        for season in self.store.seasons(series_id).await? {
            self.store
                .set_season_monitored(series_id, season.season_number, monitored)
                .await?;
        }
        let episodes = self
            .store
            .set_episodes_monitored(series_id, None, monitored)
            .await?;

        info!(series_id, monitored, episodes, "Series monitoring updated");
        Ok(true)
    }

    /// Sets a season and all of its episodes.
    pub async fn set_season_monitored(
        &self,
        series_id: i32,
        season_number: i32,
        monitored: bool,
    ) -> Result<u64> {
        self.store
            .set_season_monitored(series_id, season_number, monitored)
            .await?;
        self.store
            .set_episodes_monitored(series_id, Some(season_number), monitored)
            .await
    }

    pub async fn unmonitor_movie(&self, movie_id: i32) -> Result<bool> {
        self.store.set_movie_monitored(movie_id, false).await
    }

    /// Unmonitors one episode and rolls the change up to its season once no
    /// monitored episode remains there.
    pub async fn unmonitor_episode(
        &self,
        series_id: i32,
        season_number: i32,
        episode_number: i32,
    ) -> Result<UnmonitorOutcome> {
        let episode = self
            .store
            .set_episode_monitored(series_id, season_number, episode_number, false)
            .await?;
        if !episode {
            return Ok(UnmonitorOutcome::default());
        }

        let remaining = self
            .store
            .count_monitored_in_season(series_id, season_number)
            .await?;
        let season = remaining == 0;
        if season {
            self.store
                .set_season_monitored(series_id, season_number, false)
                .await?;
            info!(series_id, season_number, "All episodes unmonitored, season unmonitored");
        }

        Ok(UnmonitorOutcome { episode, season })
    }
}
