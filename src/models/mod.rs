// src/models/mod.rs

pub mod game;
pub mod level;
pub mod question;
pub mod score;
pub mod user;
