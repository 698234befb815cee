// src/models/mod.rs

pub mod coaching;
pub mod exam;
pub mod exam_result;
pub mod mistake;
pub mod question;
pub mod user;
