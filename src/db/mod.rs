// src/db/mod.rs

//! Query helpers shared by several handlers.
//! Single-use queries stay in their handler.

pub mod mistakes;
pub mod questions;
pub mod results;
pub mod users;
