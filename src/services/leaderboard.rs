// src/services/leaderboard.rs

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::config::{LEADERBOARD_MAX_PAGE_SIZE, LEADERBOARD_PAGE_SIZE};

/// Non-attempt activity that can earn leaderboard points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    /// Comments and replies authored.
    Comment,
    /// Question ratings given.
    Rating,
    /// Comment likes given.
    Like,
}

/// Point weights. Passed explicitly so each call can score differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringConfig {
    pub points_per_attempt: i64,
    pub bonus_per_correct: i64,
    pub activity_weights: Vec<(ActivityKind, i64)>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            points_per_attempt: 1,
            bonus_per_correct: 9,
            activity_weights: vec![
                (ActivityKind::Comment, 0),
                (ActivityKind::Rating, 0),
                (ActivityKind::Like, 0),
            ],
        }
    }
}

impl ScoringConfig {
    /// Activity kinds worth counting at all; zero weights are skipped.
    pub fn active_weights(&self) -> impl Iterator<Item = (ActivityKind, i64)> + '_ {
        self.activity_weights
            .iter()
            .copied()
            .filter(|(_, weight)| *weight != 0)
    }

    pub fn base_points(&self, attempts: i64, correct: i64) -> i64 {
        attempts * self.points_per_attempt + correct * self.bonus_per_correct
    }
}

/// Attempt filter parsed from query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaderboardFilter {
    pub weeks: Vec<String>,
    pub topic: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl LeaderboardFilter {
    /// Malformed dates are ignored rather than rejected.
    pub fn parse(
        week: Option<&str>,
        topic: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Self {
        let weeks = week
            .map(|w| {
                w.split(',')
                    .map(str::trim)
                    .filter(|w| !w.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let topic = topic
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Self {
            weeks,
            topic,
            from: parse_date(from),
            to: parse_date(to),
        }
    }
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

/// Aggregated attempts for one user, as grouped by the store.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AttemptTotals {
    pub user_id: i64,
    pub attempts: i64,
    pub correct: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Per-user counts for one activity kind with its weight.
#[derive(Debug, Clone, Default)]
pub struct ActivitySignal {
    pub weight: i64,
    pub counts: HashMap<i64, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardRow {
    pub user_id: i64,
    pub username: String,
    pub attempts: i64,
    pub correct: i64,
    pub points: i64,
    pub last_activity: Option<DateTime<Utc>>,
    pub rank: usize,
}

impl LeaderboardRow {
    fn rank_key(&self) -> (i64, i64, Option<DateTime<Utc>>) {
        (self.points, self.correct, self.last_activity)
    }
}

/// Builds the full ordered, ranked leaderboard.
pub fn compute_rows(
    totals: Vec<AttemptTotals>,
    signals: &[ActivitySignal],
    usernames: &HashMap<i64, String>,
    scoring: &ScoringConfig,
) -> Vec<LeaderboardRow> {
    let display_name = |user_id: i64| {
        usernames
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string())
    };

    let mut rows: HashMap<i64, LeaderboardRow> = totals
        .into_iter()
        .map(|t| {
            let row = LeaderboardRow {
                user_id: t.user_id,
                username: display_name(t.user_id),
                attempts: t.attempts,
                correct: t.correct,
                points: scoring.base_points(t.attempts, t.correct),
                last_activity: t.last_activity,
                rank: 0,
            };
            (t.user_id, row)
        })
        .collect();

    for signal in signals.iter().filter(|s| s.weight != 0) {
        for (&user_id, &count) in &signal.counts {
            let row = rows.entry(user_id).or_insert_with(|| LeaderboardRow {
                user_id,
                username: display_name(user_id),
                attempts: 0,
                correct: 0,
                points: 0,
                last_activity: None,
                rank: 0,
            });
            row.points += count * signal.weight;
        }
    }

    let mut rows: Vec<LeaderboardRow> = rows.into_values().collect();
    rows.sort_by(compare_rows);
    assign_dense_ranks(&mut rows);
    rows
}

/// points desc, correct desc, last_activity desc (None last), user_id asc.
fn compare_rows(a: &LeaderboardRow, b: &LeaderboardRow) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.correct.cmp(&a.correct))
        .then_with(|| b.last_activity.cmp(&a.last_activity))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

/// Ties on (points, correct, last_activity) share a rank; ranks never skip.
fn assign_dense_ranks(rows: &mut [LeaderboardRow]) {
    let mut rank = 0;
    let mut previous = None;
    for row in rows.iter_mut() {
        let key = row.rank_key();
        if previous != Some(key) {
            rank += 1;
            previous = Some(key);
        }
        row.rank = rank;
    }
}

/// Where the caller stands on a computed board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub me: LeaderboardRow,
    pub around: Vec<LeaderboardRow>,
    pub total_users: usize,
}

/// Rows shown either side of the caller.
pub const NEIGHBOUR_WINDOW: usize = 3;
/// Rows shown when the caller is not on the board.
const FALLBACK_WINDOW: usize = 5;

/// Locates the caller, or synthesizes a zero row ranked after everyone.
pub fn standing(rows: &[LeaderboardRow], user_id: i64, username: &str) -> Standing {
    match rows.iter().position(|r| r.user_id == user_id) {
        Some(idx) => {
            let lo = idx.saturating_sub(NEIGHBOUR_WINDOW);
            let hi = (idx + NEIGHBOUR_WINDOW + 1).min(rows.len());
            Standing {
                me: rows[idx].clone(),
                around: rows[lo..hi].to_vec(),
                total_users: rows.len(),
            }
        }
        None => Standing {
            me: LeaderboardRow {
                user_id,
                username: username.to_string(),
                attempts: 0,
                correct: 0,
                points: 0,
                last_activity: None,
                rank: rows.len() + 1,
            },
            around: rows.iter().take(FALLBACK_WINDOW).cloned().collect(),
            total_users: rows.len(),
        },
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub page: usize,
    pub page_size: usize,
    pub results: Vec<T>,
}

/// Default 20, capped at 1000, never zero.
pub fn resolve_page_size(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(LEADERBOARD_PAGE_SIZE)
        .clamp(1, LEADERBOARD_MAX_PAGE_SIZE)
}

/// 1-based page slice. Pages past the end are empty.
pub fn paginate<T: Clone>(rows: &[T], page: Option<usize>, page_size: Option<usize>) -> Page<T> {
    let page = page.unwrap_or(1).max(1);
    let page_size = resolve_page_size(page_size);
    let start = (page - 1).saturating_mul(page_size);
    let results = rows.iter().skip(start).take(page_size).cloned().collect();

    Page {
        count: rows.len(),
        page,
        page_size,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap())
    }

    fn totals(
        user_id: i64,
        attempts: i64,
        correct: i64,
        last: Option<DateTime<Utc>>,
    ) -> AttemptTotals {
        AttemptTotals {
            user_id,
            attempts,
            correct,
            last_activity: last,
        }
    }

    fn names(ids: &[i64]) -> HashMap<i64, String> {
        ids.iter().map(|id| (*id, format!("user{}", id))).collect()
    }

    #[test]
    fn points_weight_correctness_nine_times() {
        let rows = compute_rows(
            vec![totals(1, 3, 2, ts(1))],
            &[],
            &names(&[1]),
            &ScoringConfig::default(),
        );
        assert_eq!(rows[0].points, 3 + 2 * 9);
        assert_eq!(rows[0].username, "user1");
        assert_eq!(rows[0].rank, 1);
    }

    #[test]
    fn custom_weights_apply() {
        let scoring = ScoringConfig {
            points_per_attempt: 2,
            bonus_per_correct: 5,
            activity_weights: vec![],
        };
        let rows = compute_rows(vec![totals(1, 4, 1, ts(1))], &[], &names(&[1]), &scoring);
        assert_eq!(rows[0].points, 13);
    }

    #[test]
    fn sort_order_and_tiebreaks() {
        let rows = compute_rows(
            vec![
                // 10 points
                totals(4, 10, 0, ts(9)),
                // 10 points, more correct
                totals(3, 1, 1, ts(2)),
                // 10 points, more correct, more recent
                totals(2, 1, 1, ts(5)),
                // 20 points
                totals(1, 20, 0, ts(1)),
            ],
            &[],
            &names(&[1, 2, 3, 4]),
            &ScoringConfig::default(),
        );
        let order: Vec<i64> = rows.iter().map(|r| r.user_id).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
        let ranks: Vec<usize> = rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn full_ties_share_a_dense_rank() {
        let rows = compute_rows(
            vec![
                totals(7, 2, 1, ts(3)),
                totals(5, 2, 1, ts(3)),
                totals(9, 1, 0, ts(3)),
            ],
            &[],
            &names(&[5, 7, 9]),
            &ScoringConfig::default(),
        );
        assert_eq!(rows[0].user_id, 5);
        assert_eq!(rows[1].user_id, 7);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[1].rank, 1);
        assert_eq!(rows[2].rank, 2);
    }

    #[test]
    fn dense_rank_property_holds() {
        let input: Vec<AttemptTotals> = (1..=30)
            .map(|i| totals(i, i % 4, i % 3, ts((i % 5) as u32 + 1)))
            .collect();
        let ids: Vec<i64> = (1..=30).collect();
        let rows = compute_rows(input, &[], &names(&ids), &ScoringConfig::default());

        for a in &rows {
            for b in &rows {
                if a.rank_key() == b.rank_key() {
                    assert_eq!(a.rank, b.rank);
                }
            }
        }
        for pair in rows.windows(2) {
            if pair[0].rank_key() != pair[1].rank_key() {
                assert_eq!(pair[1].rank, pair[0].rank + 1);
            }
        }
    }

    #[test]
    fn missing_last_activity_sorts_as_earliest() {
        let scoring = ScoringConfig {
            activity_weights: vec![(ActivityKind::Comment, 2)],
            ..ScoringConfig::default()
        };
        let signal = ActivitySignal {
            weight: 2,
            counts: HashMap::from([(1, 5)]),
        };
        // Both on 10 points and 0 correct; only last_activity separates them,
        // and the comment-only user would win the user_id tiebreak.
        let rows = compute_rows(
            vec![totals(2, 10, 0, ts(1))],
            &[signal],
            &names(&[1, 2]),
            &scoring,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, 2);
        assert_eq!(rows[1].user_id, 1);
        assert_eq!(rows[1].attempts, 0);
        assert_eq!(rows[1].correct, 0);
        assert_eq!(rows[1].points, 10);
        assert_eq!(rows[1].last_activity, None);
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn activity_adds_to_existing_rows() {
        let signals = [
            ActivitySignal {
                weight: 3,
                counts: HashMap::from([(1, 2)]),
            },
            ActivitySignal {
                weight: 1,
                counts: HashMap::from([(1, 4)]),
            },
        ];
        let rows = compute_rows(
            vec![totals(1, 1, 0, ts(1))],
            &signals,
            &names(&[1]),
            &ScoringConfig::default(),
        );
        assert_eq!(rows[0].points, 1 + 6 + 4);
    }

    #[test]
    fn zero_weight_signals_are_skipped() {
        let signal = ActivitySignal {
            weight: 0,
            counts: HashMap::from([(42, 100)]),
        };
        let rows = compute_rows(vec![], &[signal], &names(&[42]), &ScoringConfig::default());
        assert!(rows.is_empty());
    }

    #[test]
    fn active_weights_filter_zero() {
        let scoring = ScoringConfig {
            activity_weights: vec![
                (ActivityKind::Comment, 0),
                (ActivityKind::Rating, 2),
                (ActivityKind::Like, 0),
            ],
            ..ScoringConfig::default()
        };
        let active: Vec<_> = scoring.active_weights().collect();
        assert_eq!(active, vec![(ActivityKind::Rating, 2)]);
    }

    #[test]
    fn standing_returns_neighbours() {
        let input: Vec<AttemptTotals> = (1..=10).map(|i| totals(i, 11 - i, 0, ts(1))).collect();
        let ids: Vec<i64> = (1..=10).collect();
        let rows = compute_rows(input, &[], &names(&ids), &ScoringConfig::default());

        let s = standing(&rows, 5, "user5");
        assert_eq!(s.me.user_id, 5);
        assert_eq!(s.me.rank, 5);
        assert_eq!(s.total_users, 10);
        let around: Vec<i64> = s.around.iter().map(|r| r.user_id).collect();
        assert_eq!(around, vec![2, 3, 4, 5, 6, 7, 8]);

        let top = standing(&rows, 1, "user1");
        assert_eq!(top.around.len(), 4);
    }

    #[test]
    fn absent_user_ranks_after_everyone() {
        let rows = compute_rows(
            vec![totals(1, 1, 1, ts(1)), totals(2, 1, 0, ts(1))],
            &[],
            &names(&[1, 2]),
            &ScoringConfig::default(),
        );
        let s = standing(&rows, 99, "newcomer");
        assert_eq!(s.me.rank, 3);
        assert_eq!(s.me.attempts, 0);
        assert_eq!(s.me.points, 0);
        assert_eq!(s.me.username, "newcomer");
        assert_eq!(s.total_users, 2);
        assert_eq!(s.around.len(), 2);

        let empty = standing(&[], 1, "solo");
        assert_eq!(empty.me.rank, 1);
        assert_eq!(empty.total_users, 0);
    }

    #[test]
    fn pagination_defaults_and_caps() {
        let rows: Vec<i32> = (0..45).collect();
        let first = paginate(&rows, None, None);
        assert_eq!(first.page, 1);
        assert_eq!(first.page_size, 20);
        assert_eq!(first.count, 45);
        assert_eq!(first.results.len(), 20);

        let third = paginate(&rows, Some(3), None);
        assert_eq!(third.results, (40..45).collect::<Vec<_>>());

        let beyond = paginate(&rows, Some(10), None);
        assert!(beyond.results.is_empty());

        assert_eq!(resolve_page_size(Some(5000)), 1000);
        assert_eq!(resolve_page_size(Some(0)), 1);
        assert_eq!(paginate(&rows, Some(0), Some(10)).page, 1);
    }

    #[test]
    fn filter_parsing() {
        let f = LeaderboardFilter::parse(
            Some("Week1, Week2,,"),
            Some("  Physics "),
            Some("2025-01-01"),
            Some("not-a-date"),
        );
        assert_eq!(f.weeks, vec!["Week1".to_string(), "Week2".to_string()]);
        assert_eq!(f.topic.as_deref(), Some("Physics"));
        assert_eq!(f.from, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(f.to, None);

        assert_eq!(
            LeaderboardFilter::parse(None, Some(""), None, None),
            LeaderboardFilter::default()
        );
    }
}
