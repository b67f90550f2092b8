//! Orchestrator - single `/run` endpoint over the acquire -> predict saga

pub mod api;
pub mod config;
