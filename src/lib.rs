pub mod api;
pub mod config;
pub mod search;
pub mod tracking;
pub mod version;
pub mod web;
