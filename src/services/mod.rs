// src/services/mod.rs
//
// Domain logic kept free of HTTP and SQL so it can be tested directly.

pub mod activity;
pub mod explanation;
pub mod grading;
pub mod leaderboard;
pub mod rating;
pub mod recommendation;
pub mod verification;
