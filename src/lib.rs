pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod services;
pub mod settings;
pub mod state;
