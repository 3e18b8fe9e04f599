// Library exports for offtrack
// This allows integration tests and the binary to share the modules

pub mod activity;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod identity;
pub mod images;
pub mod routes;
pub mod state;
pub mod time_utils;
