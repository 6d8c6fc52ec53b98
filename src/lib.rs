pub mod app;
pub mod archive;
pub mod auth;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod index;
pub mod locator;
pub mod naming;
pub mod output;
pub mod portal;
pub mod reconcile;
pub mod tracks;
