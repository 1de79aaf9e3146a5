//! Database query operations, one module per catalog entity.

pub mod albums;
pub mod artists;
pub mod devices;
pub mod files;
pub mod folders;
pub mod genres;
pub mod media;
pub mod metadata;
pub mod movies;
pub mod playlists;
pub mod settings;
pub mod shows;
pub mod tasks;
pub mod thumbnails;
pub mod tracks;
