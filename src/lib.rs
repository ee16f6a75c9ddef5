pub mod chain;
pub mod config;
pub mod db;
pub mod detector;
pub mod error;
pub mod output;
pub mod relay;
