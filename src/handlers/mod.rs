// src/handlers/mod.rs

pub mod auth;
pub mod games;
pub mod levels;
pub mod progress;
pub mod scores;
