pub mod activity;
pub mod auth;
pub mod cache;
pub mod clients;
pub mod config;
pub mod database;
pub mod duplicates;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod maps_url;
pub mod models;
pub mod usage;
