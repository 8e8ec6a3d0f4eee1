use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::RetentionConfig;
use crate::player::ExperienceVector;

/// Blowout severity classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlowoutSeverity {
    Mild,
    Moderate,
    Severe,
}

/// Outcome of a completed match: which team won, whether it was a blowout,
/// and the blowout's severity classification if so.
#[derive(Clone, Copy, Debug)]
pub struct MatchOutcome {
    pub winning_team: usize,
    pub is_blowout: bool,
    pub blowout_severity: Option<BlowoutSeverity>,
}

/// Logistic win probability for team 0 given the skill difference
/// `team_skills[0] - team_skills[1]` and the config's gamma coefficient.
pub fn win_probability(skill_diff: f64, gamma: f64) -> f64 {
    let p = 1.0 / (1.0 + (-gamma * skill_diff).exp());
    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Draws a match outcome from team skills via a logistic win probability,
/// then draws blowout occurrence as an explicit Bernoulli trial (not a score
/// threshold) whose probability blends normalized skill gap and win-probability
/// imbalance. Severity is only assigned for blowouts whose driving probability
/// clears the moderate/severe thresholds; a blowout below the mild threshold is
/// too marginal to classify and reports `None`.
#[allow(clippy::too_many_arguments)]
pub fn determine_outcome(
    team_skills: &[f64],
    gamma: f64,
    blowout_skill_coefficient: f64,
    blowout_imbalance_coefficient: f64,
    blowout_mild_threshold: f64,
    blowout_moderate_threshold: f64,
    blowout_severe_threshold: f64,
    rng: &mut impl Rng,
) -> MatchOutcome {
    if team_skills.len() < 2 {
        return MatchOutcome {
            winning_team: 0,
            is_blowout: false,
            blowout_severity: None,
        };
    }

    let skill_diff = team_skills[0] - team_skills[1];
    let skill_diff_abs = skill_diff.abs();

    let p_team0_wins = win_probability(skill_diff, gamma);
    let winning_team = if rng.gen_bool(p_team0_wins) { 0 } else { 1 };

    let win_prob_imbalance = (p_team0_wins - 0.5).abs() * 2.0;
    let normalized_skill_diff = (skill_diff_abs / 2.0).min(1.0);

    let blowout_prob = (blowout_skill_coefficient * normalized_skill_diff
        + blowout_imbalance_coefficient * win_prob_imbalance)
        .clamp(0.0, 1.0);
    let blowout_prob = if blowout_prob.is_finite() { blowout_prob } else { 0.0 };

    let is_blowout = rng.gen_bool(blowout_prob);

    let blowout_severity = if !is_blowout {
        None
    } else if blowout_prob < blowout_mild_threshold {
        None
    } else if blowout_prob < blowout_moderate_threshold {
        Some(BlowoutSeverity::Mild)
    } else if blowout_prob < blowout_severe_threshold {
        Some(BlowoutSeverity::Moderate)
    } else {
        Some(BlowoutSeverity::Severe)
    };

    MatchOutcome {
        winning_team,
        is_blowout,
        blowout_severity,
    }
}

/// Formal retention model: P(continue) = sigma(theta^T z + base), where z is
/// the mean experience vector over the player's trailing match window. This is
/// the live continuation path; it supersedes any ad-hoc penalty formula by
/// actually consuming the configured theta coefficients. The result is
/// clamped to `[retention_floor, 1]` so a rough patch of matches never drives
/// a player's odds of returning all the way to zero.
pub fn continuation_probability(
    recent_experience: &[ExperienceVector],
    retention_config: &RetentionConfig,
) -> f64 {
    if recent_experience.is_empty() {
        return sigmoid(retention_config.base_continue_prob).max(retention_config.retention_floor);
    }

    let window = &recent_experience[recent_experience
        .len()
        .saturating_sub(retention_config.experience_window_size)..];
    let n = window.len() as f64;

    let avg_delta_ping = window.iter().map(|z| z.avg_delta_ping).sum::<f64>() / n;
    let avg_search_time = window.iter().map(|z| z.avg_search_time).sum::<f64>() / n;
    let blowout_rate = window.iter().filter(|z| z.was_blowout).count() as f64 / n;
    let win_rate = window.iter().filter(|z| z.won).count() as f64 / n;
    let avg_performance = window.iter().map(|z| z.performance).sum::<f64>() / n;

    let logit = retention_config.base_continue_prob
        + retention_config.theta_ping * avg_delta_ping
        + retention_config.theta_search_time * avg_search_time
        + retention_config.theta_blowout * blowout_rate
        + retention_config.theta_win_rate * win_rate
        + retention_config.theta_performance * avg_performance;

    sigmoid(logit).max(retention_config.retention_floor)
}

/// Deterministic expected in-match performance given a player's skill and the
/// lobby's average skill: the noise-free counterpart of the sampled
/// performance draw used by skill evolution. Centered at 0.5 when the player
/// is exactly average.
pub fn expected_performance(player_skill: f64, lobby_avg_skill: f64) -> f64 {
    sigmoid(2.0 * (player_skill - lobby_avg_skill))
}

/// Picks a winner among more than two teams (FFA, one player per team) by
/// ranking skill with independent jitter. The two-team logistic win-probability
/// model doesn't generalize past two parties, so FFA outcomes use this
/// simpler skill-plus-noise ranking instead and are never classified as
/// blowouts.
pub fn determine_ffa_winner(team_skills: &[f64], noise_std: f64, rng: &mut impl Rng) -> usize {
    team_skills
        .iter()
        .enumerate()
        .map(|(i, &skill)| (i, skill + rng.gen_range(-noise_std..=noise_std)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn sigmoid(x: f64) -> f64 {
    let p = 1.0 / (1.0 + (-x).exp());
    if p.is_finite() {
        p
    } else {
        0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn experience(delta_ping: f64, search_time: f64, blowout: bool, won: bool, performance: f64) -> ExperienceVector {
        ExperienceVector {
            avg_delta_ping: delta_ping,
            avg_search_time: search_time,
            was_blowout: blowout,
            won,
            performance,
        }
    }

    fn default_retention() -> RetentionConfig {
        RetentionConfig {
            theta_ping: -0.02,
            theta_search_time: -0.015,
            theta_blowout: -0.5,
            theta_win_rate: 0.8,
            theta_performance: 0.6,
            base_continue_prob: 0.0,
            experience_window_size: 5,
            retention_floor: 0.3,
        }
    }

    #[test]
    fn empty_history_gives_base_sigmoid() {
        let retention = default_retention();
        let prob = continuation_probability(&[], &retention);
        assert!((prob - 0.5).abs() < 1e-9);
    }

    #[test]
    fn winning_raises_continuation_probability() {
        let retention = default_retention();
        let lost = vec![experience(10.0, 20.0, false, false, 0.5); 5];
        let won = vec![experience(10.0, 20.0, false, true, 0.5); 5];
        assert!(continuation_probability(&won, &retention) > continuation_probability(&lost, &retention));
    }

    #[test]
    fn repeated_blowouts_lower_continuation_probability() {
        let retention = default_retention();
        let clean = vec![experience(10.0, 20.0, false, true, 0.5); 5];
        let blown_out = vec![experience(10.0, 20.0, true, true, 0.5); 5];
        assert!(
            continuation_probability(&blown_out, &retention)
                < continuation_probability(&clean, &retention)
        );
    }

    #[test]
    fn window_only_considers_trailing_matches() {
        let mut retention = default_retention();
        retention.experience_window_size = 2;
        let history = vec![
            experience(0.0, 0.0, false, false, 0.0),
            experience(0.0, 0.0, false, false, 0.0),
            experience(0.0, 0.0, false, true, 1.0),
            experience(0.0, 0.0, false, true, 1.0),
        ];
        let prob = continuation_probability(&history, &retention);
        let expected = continuation_probability(&history[2..], &retention);
        assert!((prob - expected).abs() < 1e-9);
    }

    #[test]
    fn continuation_probability_never_drops_below_floor() {
        let mut retention = default_retention();
        retention.theta_ping = -5.0;
        retention.theta_blowout = -5.0;
        retention.base_continue_prob = -5.0;
        let miserable = vec![experience(500.0, 300.0, true, false, 0.0); 5];
        assert_eq!(continuation_probability(&miserable, &retention), retention.retention_floor);
    }

    #[test]
    fn uneven_skill_and_few_rounds_never_panics() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let outcome = determine_outcome(&[1.0, -1.0], 2.0, 0.4, 0.3, 0.15, 0.35, 0.6, &mut rng);
            assert!(outcome.winning_team == 0 || outcome.winning_team == 1);
        }
    }

    #[test]
    fn expected_performance_is_centered_at_half_for_average_player() {
        assert!((expected_performance(0.0, 0.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn expected_performance_rewards_above_average_skill() {
        assert!(expected_performance(0.5, 0.0) > expected_performance(-0.5, 0.0));
    }

    #[test]
    fn ffa_winner_is_always_a_valid_index() {
        let mut rng = StdRng::seed_from_u64(9);
        let skills = vec![0.1, -0.2, 0.3, 0.0];
        for _ in 0..50 {
            let winner = determine_ffa_winner(&skills, 0.05, &mut rng);
            assert!(winner < skills.len());
        }
    }

    #[test]
    fn equal_skill_lobbies_never_classify_as_severe_blowout_with_zero_coefficients() {
        let mut rng = StdRng::seed_from_u64(3);
        let outcome = determine_outcome(&[0.0, 0.0], 2.0, 0.0, 0.0, 0.15, 0.35, 0.6, &mut rng);
        assert!(!outcome.is_blowout);
        assert!(outcome.blowout_severity.is_none());
    }
}
