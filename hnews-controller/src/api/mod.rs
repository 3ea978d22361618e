//! HTTP API handlers

pub mod health;
pub mod resources;

pub use health::health_routes;
pub use resources::resource_routes;
