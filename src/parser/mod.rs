pub mod release;

pub use release::{EpisodeNumbers, parse_episode_numbers, parse_release_group, strip_extension};
