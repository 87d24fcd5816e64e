pub mod config;
pub mod db;
pub mod error;
pub mod queue;
pub mod store;
pub mod types;
