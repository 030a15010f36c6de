// src/services/mod.rs

pub mod game;
pub mod ledger;
pub mod progress;
pub mod sync;
