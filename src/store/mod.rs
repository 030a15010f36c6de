// src/store/mod.rs

pub mod local;
pub mod memory;
pub mod postgres;
pub mod remote;
