pub mod config;
pub mod expander;
pub mod logging;
pub mod web;
