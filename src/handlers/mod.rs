// src/handlers/mod.rs

pub mod admin;
pub mod attempts;
pub mod auth;
pub mod comments;
pub mod leaderboard;
pub mod questions;
pub mod ratings;
pub mod saved;
