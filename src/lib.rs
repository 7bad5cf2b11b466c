pub mod config;
pub mod constants;
pub mod genre_store;
pub mod hub;
pub mod physics;
pub mod registry;
pub mod server_protocol;
pub mod server_utils;
pub mod tick;
pub mod types;
pub mod zones;
