pub mod config;
pub mod personas;
