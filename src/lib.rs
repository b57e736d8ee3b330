pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

// Convenient re-exports (so call sites can do `starlight_economy::TransactionCoordinator`, etc.)
pub use auth::{LoginVerifier, VerifiedIdentity};
pub use config::Config;
pub use db::Db;
pub use error::{AppResult, DomainError};
pub use services::TransactionCoordinator;
