pub mod accounts;
pub mod api;
pub mod assistant;
pub mod config;
pub mod db;
pub mod fleet;
