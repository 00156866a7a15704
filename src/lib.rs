//! Clearpath - website for a counseling and corporate training practice
//!
//! This library provides the public site, the appointment booking flow and
//! the admin dashboard backend.

pub mod api;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod models;
pub mod render;
pub mod services;
pub mod site;
