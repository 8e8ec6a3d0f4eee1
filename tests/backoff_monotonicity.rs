//! Backoff curves must never relax an already-admitted match window as a
//! player waits longer, and must never exceed the configured ceiling.

use matchmaking_sim::MatchmakingConfig;
use proptest::prelude::*;

proptest! {
    #[test]
    fn delta_ping_backoff_is_monotone_and_bounded(
        earlier in 0.0f64..5_000.0,
        extra_wait in 0.0f64..5_000.0,
    ) {
        let config = MatchmakingConfig::default();
        let later = earlier + extra_wait;

        let earlier_value = config.delta_ping_backoff(earlier);
        let later_value = config.delta_ping_backoff(later);

        prop_assert!(later_value >= earlier_value - 1e-9);
        prop_assert!(earlier_value <= config.delta_ping_max + 1e-9);
        prop_assert!(later_value <= config.delta_ping_max + 1e-9);
    }

    #[test]
    fn skill_similarity_backoff_is_monotone_and_bounded(
        earlier in 0.0f64..5_000.0,
        extra_wait in 0.0f64..5_000.0,
    ) {
        let config = MatchmakingConfig::default();
        let later = earlier + extra_wait;

        let earlier_value = config.skill_similarity_backoff(earlier);
        let later_value = config.skill_similarity_backoff(later);

        prop_assert!(later_value >= earlier_value - 1e-9);
        prop_assert!(earlier_value <= config.skill_similarity_max + 1e-9);
        prop_assert!(later_value <= config.skill_similarity_max + 1e-9);
    }

    #[test]
    fn skill_disparity_backoff_is_monotone_and_bounded(
        earlier in 0.0f64..5_000.0,
        extra_wait in 0.0f64..5_000.0,
    ) {
        let config = MatchmakingConfig::default();
        let later = earlier + extra_wait;

        let earlier_value = config.skill_disparity_backoff(earlier);
        let later_value = config.skill_disparity_backoff(later);

        prop_assert!(later_value >= earlier_value - 1e-9);
        prop_assert!(earlier_value <= config.max_skill_disparity_max + 1e-9);
        prop_assert!(later_value <= config.max_skill_disparity_max + 1e-9);
    }

    #[test]
    fn backoffs_never_go_below_their_initial_floor(wait_time in 0.0f64..10_000.0) {
        let config = MatchmakingConfig::default();
        prop_assert!(config.delta_ping_backoff(wait_time) >= config.delta_ping_initial - 1e-9);
        prop_assert!(config.skill_similarity_backoff(wait_time) >= config.skill_similarity_initial - 1e-9);
        prop_assert!(config.skill_disparity_backoff(wait_time) >= config.max_skill_disparity_initial - 1e-9);
    }
}
