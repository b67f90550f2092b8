//! Predict service: HTTP inference gateway over the model host

pub mod api;
pub mod config;
