#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod compose;
pub mod config;
pub mod controller;
pub mod cursor;
pub mod data;
pub mod enrich;
pub mod feed;
pub mod logging;
pub mod merge;
pub mod model;
pub mod scroll;
pub mod session;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
