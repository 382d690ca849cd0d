// src/models/leaderboard.rs

use serde::{Deserialize, Serialize};

use crate::services::leaderboard::{LeaderboardFilter, LeaderboardRow};

/// Query parameters shared by the leaderboard endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardParams {
    /// Comma-separated list of weeks.
    pub week: Option<String>,
    pub topic: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`.
    pub from: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    pub to: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl LeaderboardParams {
    pub fn filter(&self) -> LeaderboardFilter {
        LeaderboardFilter::parse(
            self.week.as_deref(),
            self.topic.as_deref(),
            self.from.as_deref(),
            self.to.as_deref(),
        )
    }
}

/// The caller's row plus the size of the board.
#[derive(Debug, Serialize)]
pub struct MyLeaderboardResponse {
    #[serde(flatten)]
    pub me: LeaderboardRow,
    pub total_users: usize,
}

#[derive(Debug, Serialize)]
pub struct AroundResponse {
    pub me: LeaderboardRow,
    pub around: Vec<LeaderboardRow>,
}
