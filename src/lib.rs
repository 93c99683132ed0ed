pub mod api;
pub mod config;
pub mod models;
pub mod services;

pub use config::AppConfig;
pub use services::DriveStore;
