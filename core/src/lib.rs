pub mod db;
pub mod error;
pub mod importer;
pub mod models;
pub mod pagination;
pub mod planner;
pub mod service;
pub mod units;
