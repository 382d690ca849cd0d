// src/services/recommendation.rs
//
// Picks a small, varied set of unattempted questions. Each strategy orders
// its candidates, keeps a top-K pool and samples from it at random so that
// repeated calls do not show identical lists.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::services::verification::VerifyStatus;

pub const RECOMMENDATION_LIMIT: usize = 6;

const SAME_TOPIC_PICKS: usize = 3;
const SAME_TOPIC_POOL: usize = 10;

const QUALITY_PICKS: usize = 2;
const QUALITY_POOL: usize = 8;
const QUALITY_MIN_RATING: f64 = 3.5;

const POPULAR_PICKS: usize = 1;
const POPULAR_POOL: usize = 5;
const POPULAR_MIN_ATTEMPTS: i64 = 5;

/// The fields the recommender ranks on.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Candidate {
    pub id: Uuid,
    pub topic: Option<String>,
    #[sqlx(try_from = "String")]
    pub verify_status: VerifyStatus,
    pub rating: f64,
    pub num_attempts: i64,
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    pub fn priority_score(&self) -> i32 {
        priority_score(self.verify_status)
    }
}

/// Biases toward reviewed content without excluding unreviewed content.
pub fn priority_score(status: VerifyStatus) -> i32 {
    match status {
        VerifyStatus::Approved => 1000,
        VerifyStatus::Pending => 100,
        VerifyStatus::Rejected => 0,
    }
}

/// (priority, rating, num_attempts, created_at), all descending.
fn by_quality(a: &&Candidate, b: &&Candidate) -> Ordering {
    b.priority_score()
        .cmp(&a.priority_score())
        .then_with(|| b.rating.total_cmp(&a.rating))
        .then_with(|| b.num_attempts.cmp(&a.num_attempts))
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// (priority, num_attempts, rating), all descending.
fn by_popularity(a: &&Candidate, b: &&Candidate) -> Ordering {
    b.priority_score()
        .cmp(&a.priority_score())
        .then_with(|| b.num_attempts.cmp(&a.num_attempts))
        .then_with(|| b.rating.total_cmp(&a.rating))
}

fn sample<R: Rng + ?Sized>(
    mut pool: Vec<&Candidate>,
    order: fn(&&Candidate, &&Candidate) -> Ordering,
    pool_size: usize,
    picks: usize,
    rng: &mut R,
) -> Vec<Uuid> {
    pool.sort_by(order);
    pool.truncate(pool_size);
    pool.choose_multiple(rng, picks).map(|c| c.id).collect()
}

/// Returns up to six question ids, none in `attempted`, without duplicates.
///
/// `recent_topic` is the topic of the question behind the caller's most
/// recent attempt; without one the same-topic strategy contributes nothing.
pub fn recommend<R: Rng + ?Sized>(
    candidates: &[Candidate],
    attempted: &HashSet<Uuid>,
    recent_topic: Option<&str>,
    rng: &mut R,
) -> Vec<Uuid> {
    let pool: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| !attempted.contains(&c.id))
        .collect();

    let mut picked: Vec<Uuid> = Vec::with_capacity(RECOMMENDATION_LIMIT);
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut take = |ids: Vec<Uuid>, picked: &mut Vec<Uuid>| {
        for id in ids {
            if picked.len() < RECOMMENDATION_LIMIT && seen.insert(id) {
                picked.push(id);
            }
        }
    };

    // A: continue the topic the user was last working on.
    if let Some(topic) = recent_topic {
        let same_topic = pool
            .iter()
            .copied()
            .filter(|c| c.topic.as_deref() == Some(topic))
            .collect();
        let ids = sample(same_topic, by_quality, SAME_TOPIC_POOL, SAME_TOPIC_PICKS, rng);
        take(ids, &mut picked);
    }

    // B: well-rated questions from other topics.
    let quality = pool
        .iter()
        .copied()
        .filter(|c| c.rating >= QUALITY_MIN_RATING)
        .filter(|c| recent_topic.is_none() || c.topic.as_deref() != recent_topic)
        .filter(|c| !picked.contains(&c.id))
        .collect();
    let ids = sample(quality, by_quality, QUALITY_POOL, QUALITY_PICKS, rng);
    take(ids, &mut picked);

    // C: something many others have tried.
    let popular = pool
        .iter()
        .copied()
        .filter(|c| c.num_attempts >= POPULAR_MIN_ATTEMPTS)
        .filter(|c| !picked.contains(&c.id))
        .collect();
    let ids = sample(popular, by_popularity, POPULAR_POOL, POPULAR_PICKS, rng);
    take(ids, &mut picked);

    // Backfill from everything left, sampling a pool twice the gap.
    let remaining = RECOMMENDATION_LIMIT - picked.len();
    if remaining > 0 {
        let rest = pool
            .iter()
            .copied()
            .filter(|c| !picked.contains(&c.id))
            .collect();
        let ids = sample(rest, by_quality, remaining * 2, remaining, rng);
        take(ids, &mut picked);
    }

    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn candidate(
        topic: &str,
        status: VerifyStatus,
        rating: f64,
        num_attempts: i64,
        age_days: i64,
    ) -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            topic: Some(topic.to_string()),
            verify_status: status,
            rating,
            num_attempts,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
                - Duration::days(age_days),
        }
    }

    fn fixture() -> Vec<Candidate> {
        vec![
            candidate("JAVA basics", VerifyStatus::Approved, 4.5, 10, 1),
            candidate("JAVA basics", VerifyStatus::Approved, 4.2, 8, 2),
            candidate("Classes and Objects", VerifyStatus::Approved, 4.8, 15, 3),
            candidate("Inheritance and Polymorphism", VerifyStatus::Pending, 3.8, 5, 4),
            candidate("Arrays and Strings", VerifyStatus::Approved, 4.6, 12, 5),
        ]
    }

    fn large_fixture() -> Vec<Candidate> {
        let topics = ["Loops", "Arrays", "Classes", "Generics", "Streams"];
        let statuses = [VerifyStatus::Approved, VerifyStatus::Pending, VerifyStatus::Rejected];
        (0..40)
            .map(|i| {
                candidate(
                    topics[i % topics.len()],
                    statuses[i % statuses.len()],
                    (i % 6) as f64,
                    (i % 9) as i64,
                    i as i64,
                )
            })
            .collect()
    }

    #[test]
    fn priority_scores() {
        assert_eq!(priority_score(VerifyStatus::Approved), 1000);
        assert_eq!(priority_score(VerifyStatus::Pending), 100);
        assert_eq!(priority_score(VerifyStatus::Rejected), 0);
    }

    #[test]
    fn never_returns_attempted_or_duplicates_and_stays_bounded() {
        let candidates = large_fixture();
        let attempted: HashSet<Uuid> = candidates.iter().step_by(3).map(|c| c.id).collect();

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picks = recommend(&candidates, &attempted, Some("Loops"), &mut rng);
            assert!(picks.len() <= RECOMMENDATION_LIMIT);
            assert_eq!(picks.len(), RECOMMENDATION_LIMIT);
            let unique: HashSet<&Uuid> = picks.iter().collect();
            assert_eq!(unique.len(), picks.len());
            assert!(picks.iter().all(|id| !attempted.contains(id)));
        }
    }

    #[test]
    fn no_history_still_recommends() {
        let candidates = fixture();
        let mut rng = StdRng::seed_from_u64(7);
        let picks = recommend(&candidates, &HashSet::new(), None, &mut rng);
        assert_eq!(picks.len(), candidates.len());
    }

    #[test]
    fn same_topic_is_prioritized() {
        let candidates = fixture();
        let attempted: HashSet<Uuid> = [candidates[0].id].into();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picks = recommend(&candidates, &attempted, Some("JAVA basics"), &mut rng);
            // The only remaining JAVA basics question is picked first.
            assert_eq!(picks[0], candidates[1].id);
            assert!(!picks.contains(&candidates[0].id));

            let topics: HashSet<&str> = picks
                .iter()
                .filter_map(|id| candidates.iter().find(|c| c.id == *id))
                .filter_map(|c| c.topic.as_deref())
                .collect();
            assert!(topics.len() > 1);
        }
    }

    #[test]
    fn pending_questions_are_included_when_space_allows() {
        let candidates = fixture();
        let mut rng = StdRng::seed_from_u64(3);
        let picks = recommend(&candidates, &HashSet::new(), None, &mut rng);
        assert!(picks.contains(&candidates[3].id));
    }

    #[test]
    fn everything_attempted_yields_nothing() {
        let candidates = fixture();
        let attempted: HashSet<Uuid> = candidates.iter().map(|c| c.id).collect();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(recommend(&candidates, &attempted, Some("JAVA basics"), &mut rng).is_empty());
    }

    #[test]
    fn same_topic_samples_only_from_top_ten() {
        // Twelve same-topic questions; the two worst must never be picked by strategy A.
        let mut candidates: Vec<Candidate> = (0..12)
            .map(|i| candidate("Loops", VerifyStatus::Approved, 5.0 - i as f64 * 0.1, 0, i))
            .collect();
        candidates[10].verify_status = VerifyStatus::Rejected;
        candidates[11].verify_status = VerifyStatus::Rejected;

        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picks = recommend(&candidates, &HashSet::new(), Some("Loops"), &mut rng);
            for id in &picks[..3] {
                assert!(*id != candidates[10].id && *id != candidates[11].id);
            }
        }
    }

    #[test]
    fn sampling_varies_between_calls() {
        let candidates = large_fixture();
        let mut outcomes = HashSet::new();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            outcomes.insert(recommend(&candidates, &HashSet::new(), Some("Arrays"), &mut rng));
        }
        assert!(outcomes.len() > 1);
    }
}
