// src/models/mod.rs

pub mod attempt;
pub mod notification;
pub mod paper;
pub mod result;
pub mod user;
