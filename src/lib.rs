//! Pickup-and-Delivery Vehicle Routing Problem (PDPTW) solver
//!
//! This library plans delivery routes for a small fleet operating out of a
//! single depot during a bounded workday. Packages are picked up at the depot
//! and delivered to street addresses; routes minimize total mileage plus the
//! penalties of any packages that had to be dropped to keep the plan feasible.

pub mod engine;
pub mod input;
pub mod model;
pub mod routing;
pub mod solution;
pub mod time;
pub mod validate;

pub use model::*;
pub use routing::solve;
pub use solution::*;
pub use time::RoutingTime;
pub use validate::*;

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;

/// Main errors that can occur while loading data or building the model
#[derive(thiserror::Error, Debug)]
pub enum RoutingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid input format: {0}")]
    InputFormat(String),

    #[error("Unknown reference: {0}")]
    Reference(String),

    #[error("Invalid model: {0}")]
    ModelBuild(String),
}
