use rand::seq::IndexedRandom;
use thiserror::Error;

/// Surfaced to callers as the distinct "no tasks available" outcome, never a
/// generic failure.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("task pool is empty")]
pub struct EmptyPool;

/// Uniform random pick over the pool's current members. Stateless; purely a
/// function of the input slice.
pub fn pick_one(pool: &[String]) -> Result<&String, EmptyPool> {
    pool.choose(&mut rand::rng()).ok_or(EmptyPool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_is_a_distinct_outcome() {
        assert_eq!(pick_one(&[]), Err(EmptyPool));
    }

    #[test]
    fn singleton_pool_always_picks_the_member() {
        let pool = vec!["t-42".to_string()];
        for _ in 0..10 {
            assert_eq!(pick_one(&pool).unwrap(), "t-42");
        }
    }

    #[test]
    fn pick_is_always_a_member_of_the_pool() {
        let pool: Vec<String> = (0..20).map(|i| format!("t-{i}")).collect();
        for _ in 0..100 {
            let picked = pick_one(&pool).unwrap();
            assert!(pool.contains(picked));
        }
    }

    #[test]
    fn pick_covers_more_than_one_member() {
        let pool: Vec<String> = (0..10).map(|i| format!("t-{i}")).collect();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(pick_one(&pool).unwrap().clone());
        }
        assert!(seen.len() > 1, "uniform pick should not be constant");
    }
}
