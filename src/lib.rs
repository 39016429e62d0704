pub mod addons;
pub mod config;
pub mod controller;
pub mod persistence;
pub mod platform;
pub mod transport;
