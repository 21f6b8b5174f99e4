pub use super::blacklist::Entity as Blacklist;
pub use super::download_clients::Entity as DownloadClients;
pub use super::downloads::Entity as Downloads;
pub use super::episode_files::Entity as EpisodeFiles;
pub use super::episodes::Entity as Episodes;
pub use super::movie_files::Entity as MovieFiles;
pub use super::movies::Entity as Movies;
pub use super::naming_config::Entity as NamingConfig;
pub use super::quality_definitions::Entity as QualityDefinitions;
pub use super::quality_profile_items::Entity as QualityProfileItems;
pub use super::quality_profiles::Entity as QualityProfiles;
pub use super::seasons::Entity as Seasons;
pub use super::series::Entity as Series;
