// src/services/activity.rs
//
// Per-user activity views computed from attempt history at read time.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Anything that records one submission against a question.
pub trait Submission {
    fn attempt_id(&self) -> Uuid;
    fn question_id(&self) -> Uuid;
    fn submitted_at(&self) -> DateTime<Utc>;
}

/// Id for a new attempt. Version 7 ids sort by creation time, so the id
/// tie-break below agrees with submission order.
pub fn new_attempt_id() -> Uuid {
    Uuid::now_v7()
}

/// Keeps one attempt per question: the one with the greatest
/// `(submitted_at, id)`. Result is ordered most recent first.
pub fn latest_per_question<T: Submission>(attempts: Vec<T>) -> Vec<T> {
    let mut latest: HashMap<Uuid, T> = HashMap::new();

    for attempt in attempts {
        let newer = match latest.get(&attempt.question_id()) {
            Some(current) => {
                (attempt.submitted_at(), attempt.attempt_id())
                    > (current.submitted_at(), current.attempt_id())
            }
            None => true,
        };
        if newer {
            latest.insert(attempt.question_id(), attempt);
        }
    }

    let mut rows: Vec<T> = latest.into_values().collect();
    rows.sort_by(|a, b| {
        (b.submitted_at(), b.attempt_id()).cmp(&(a.submitted_at(), a.attempt_id()))
    });
    rows
}

/// Attempt counts per UTC calendar date. Days without attempts are absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heatmap {
    pub activity: BTreeMap<NaiveDate, i64>,
    pub total_attempts: i64,
}

/// Buckets timestamps by UTC date over the `days` calendar days ending at `today`.
pub fn heatmap(timestamps: &[DateTime<Utc>], today: NaiveDate, days: i64) -> Heatmap {
    let start = today - Duration::days(days.max(1) - 1);
    let mut activity = BTreeMap::new();
    let mut total_attempts = 0;

    for ts in timestamps {
        let date = ts.date_naive();
        if date < start || date > today {
            continue;
        }
        *activity.entry(date).or_insert(0) += 1;
        total_attempts += 1;
    }

    Heatmap {
        activity,
        total_attempts,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Streaks {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub has_attempted_today: bool,
}

/// Streaks over the set of dates with at least one attempt.
///
/// The current streak is anchored at today when there is activity today,
/// otherwise at yesterday, so an unfinished day does not break it.
pub fn streaks(dates: &[NaiveDate], today: NaiveDate) -> Streaks {
    let days: BTreeSet<NaiveDate> = dates.iter().copied().collect();

    let has_attempted_today = days.contains(&today);

    let mut cursor = if has_attempted_today {
        today
    } else {
        today - Duration::days(1)
    };
    let mut current_streak = 0;
    while days.contains(&cursor) {
        current_streak += 1;
        cursor -= Duration::days(1);
    }

    let mut longest_streak = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in &days {
        run = match previous {
            Some(prev) if *day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest_streak = longest_streak.max(run);
        previous = Some(*day);
    }

    Streaks {
        current_streak,
        longest_streak,
        has_attempted_today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    fn days_ago(n: i64) -> NaiveDate {
        today() - Duration::days(n)
    }

    #[derive(Debug, Clone)]
    struct Row {
        id: Uuid,
        question: Uuid,
        at: DateTime<Utc>,
    }

    impl Submission for Row {
        fn attempt_id(&self) -> Uuid {
            self.id
        }
        fn question_id(&self) -> Uuid {
            self.question
        }
        fn submitted_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, hour, 0, 0).unwrap()
    }

    #[test]
    fn three_consecutive_days_ending_today() {
        let s = streaks(&[days_ago(0), days_ago(1), days_ago(2)], today());
        assert_eq!(s.current_streak, 3);
        assert_eq!(s.longest_streak, 3);
        assert!(s.has_attempted_today);
    }

    #[test]
    fn gap_at_today_and_yesterday_breaks_current() {
        let s = streaks(&[days_ago(2), days_ago(3)], today());
        assert_eq!(s.current_streak, 0);
        assert_eq!(s.longest_streak, 2);
        assert!(!s.has_attempted_today);
    }

    #[test]
    fn streak_anchored_at_yesterday() {
        let s = streaks(&[days_ago(1), days_ago(2), days_ago(4)], today());
        assert_eq!(s.current_streak, 2);
        assert_eq!(s.longest_streak, 2);
        assert!(!s.has_attempted_today);
    }

    #[test]
    fn longest_streak_found_in_the_past() {
        let dates = [
            days_ago(0),
            days_ago(10),
            days_ago(11),
            days_ago(12),
            days_ago(13),
            days_ago(20),
        ];
        let s = streaks(&dates, today());
        assert_eq!(s.current_streak, 1);
        assert_eq!(s.longest_streak, 4);
    }

    #[test]
    fn no_dates() {
        let s = streaks(&[], today());
        assert_eq!(s.current_streak, 0);
        assert_eq!(s.longest_streak, 0);
        assert!(!s.has_attempted_today);
    }

    #[test]
    fn single_old_date_has_longest_one() {
        let s = streaks(&[days_ago(30)], today());
        assert_eq!(s.current_streak, 0);
        assert_eq!(s.longest_streak, 1);
    }

    #[test]
    fn duplicate_and_unsorted_dates() {
        let s = streaks(&[days_ago(1), days_ago(0), days_ago(1), days_ago(2)], today());
        assert_eq!(s.current_streak, 3);
        assert_eq!(s.longest_streak, 3);
    }

    #[test]
    fn heatmap_counts_per_day_within_window() {
        let base = Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap();
        let stamps = vec![
            base,
            base - Duration::hours(1),
            base - Duration::days(1),
            base - Duration::days(400),
        ];
        let map = heatmap(&stamps, today(), 365);
        assert_eq!(map.total_attempts, 3);
        assert_eq!(map.activity.get(&today()), Some(&2));
        assert_eq!(map.activity.get(&days_ago(1)), Some(&1));
        assert_eq!(map.activity.get(&days_ago(2)), None);
        assert_eq!(map.activity.len(), 2);
    }

    #[test]
    fn one_day_window_is_today_only() {
        let base = Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap();
        let map = heatmap(&[base, base - Duration::days(1)], today(), 1);
        assert_eq!(map.total_attempts, 1);
        assert_eq!(map.activity.len(), 1);
    }

    #[test]
    fn heatmap_serializes_dates_as_keys() {
        let map = heatmap(&[at(9)], today(), 365);
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["activity"]["2025-03-15"], 1);
        assert_eq!(json["total_attempts"], 1);
    }

    #[test]
    fn latest_attempt_per_question_wins() {
        let q1 = Uuid::new_v4();
        let q2 = Uuid::new_v4();
        let old = Row {
            id: new_attempt_id(),
            question: q1,
            at: at(8),
        };
        let newest = Row {
            id: new_attempt_id(),
            question: q1,
            at: at(10),
        };
        let other = Row {
            id: new_attempt_id(),
            question: q2,
            at: at(9),
        };

        let rows = latest_per_question(vec![old, newest.clone(), other.clone()]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, newest.id);
        assert_eq!(rows[1].id, other.id);
    }

    #[test]
    fn equal_timestamps_break_ties_on_id() {
        let q = Uuid::new_v4();
        let low = Row {
            id: Uuid::from_u128(1),
            question: q,
            at: at(10),
        };
        let high = Row {
            id: Uuid::from_u128(2),
            question: q,
            at: at(10),
        };

        let rows = latest_per_question(vec![high.clone(), low]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, high.id);
    }

    #[test]
    fn same_instant_resubmission_keeps_the_later_one() {
        let q = Uuid::new_v4();
        let first = Row {
            id: new_attempt_id(),
            question: q,
            at: at(10),
        };
        let second = Row {
            id: new_attempt_id(),
            question: q,
            at: at(10),
        };

        let rows = latest_per_question(vec![second.clone(), first]);
        assert_eq!(rows[0].id, second.id);
    }

    #[test]
    fn attempt_ids_increase_in_creation_order() {
        let ids: Vec<Uuid> = (0..100).map(|_| new_attempt_id()).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
