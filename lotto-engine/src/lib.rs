pub mod auth;
pub mod config;
pub mod error;
pub mod generator;
pub mod password;
pub mod prize;
pub mod service;
pub mod stats;
