pub mod config;
pub mod consumer;
pub mod db;
pub mod models;
pub mod pipeline;
