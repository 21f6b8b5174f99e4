pub mod blacklist;
pub mod client;
pub mod download;
pub mod media;
pub mod naming;
pub mod quality;
