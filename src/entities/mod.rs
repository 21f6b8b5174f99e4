pub mod prelude;

pub mod blacklist;
pub mod download_clients;
pub mod downloads;
pub mod episode_files;
pub mod episodes;
pub mod movie_files;
pub mod movies;
pub mod naming_config;
pub mod quality_definitions;
pub mod quality_profile_items;
pub mod quality_profiles;
pub mod seasons;
pub mod series;
