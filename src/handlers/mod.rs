// src/handlers/mod.rs

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod coaching;
pub mod coaching_admin;
pub mod exams;
pub mod maintenance;
pub mod mistakes;
pub mod practice;
