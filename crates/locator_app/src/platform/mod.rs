pub mod app;
pub mod config;
mod surface;
