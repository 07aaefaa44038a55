pub mod calculations;
pub mod db;
pub mod models;
pub mod service;

pub use db::repository::{PayrollRepository, RepositoryError};
pub use models::*;
pub use service::{PayrollService, ServiceError};
