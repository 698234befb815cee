// src/utils/mod.rs

pub mod analytics;
pub mod exam_clock;
pub mod grading;
pub mod hash;
pub mod html;
pub mod jwt;
