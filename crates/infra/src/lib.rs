pub mod config;
pub mod consul;
pub mod db;
pub mod logging;
pub mod references;
pub mod repositories;
