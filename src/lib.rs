pub mod api;
pub mod cache;
pub mod config;
pub mod limits;
pub mod model;
pub mod observability;
pub mod planner;
pub mod planning;
