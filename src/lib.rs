pub mod analyzers;
pub mod catalog;
pub mod collect;
pub mod config;
pub mod db;
pub mod fetch;
pub mod monitor;
pub mod output;
pub mod parser;
pub mod stats;
