pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod review;
pub mod store;
