// src/models/mod.rs

pub mod admin;
pub mod attempt;
pub mod comment;
pub mod leaderboard;
pub mod question;
pub mod rating;
pub mod saved;
pub mod user;
