use std::collections::HashMap;

use crate::player::Player;
use crate::playlist::Playlist;
use crate::player::Party;

/// Key identifying one balancing unit: a real party, or a solo player treated
/// as a party of one. Solo players must each get their own key — keying
/// directly on `Option<party_id>` would collapse every solo player in the
/// lobby into a single `None` bucket.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum PartyKey {
    Party(usize),
    Solo(usize),
}

/// One balancing unit: a party (or solo player, treated as a party of one).
type PartyEntry = (Option<usize>, Vec<usize>, f64, usize);

/// Splits a lobby's players into teams, respecting party boundaries: every
/// member of a party always lands on the same team.
///
/// Small even-team playlists use exact branch-and-bound minimization of the
/// skill-sum difference between teams; everything else falls back to a
/// snake draft over parties sorted by descending average skill.
pub fn balance_teams(
    config_use_exact_team_balancing: bool,
    player_ids: &[usize],
    players: &HashMap<usize, Player>,
    parties: &HashMap<usize, Party>,
    playlist: Playlist,
) -> Vec<Vec<usize>> {
    let team_count = playlist.team_count();

    if team_count == player_ids.len() {
        return player_ids.iter().map(|&id| vec![id]).collect();
    }

    let mut party_groups: HashMap<PartyKey, (Option<usize>, Vec<usize>)> = HashMap::new();
    for &player_id in player_ids {
        let party_id = players.get(&player_id).and_then(|p| p.party_id);
        let key = party_id.map(PartyKey::Party).unwrap_or(PartyKey::Solo(player_id));
        party_groups.entry(key).or_insert_with(|| (party_id, Vec::new())).1.push(player_id);
    }

    let mut party_entries: Vec<PartyEntry> = Vec::new();
    for (party_id, member_ids) in party_groups.into_values() {
        let avg_skill = if let Some(pid) = party_id {
            parties.get(&pid).map(|p| p.avg_skill).unwrap_or_else(|| {
                member_ids
                    .iter()
                    .filter_map(|id| players.get(id).map(|p| p.skill))
                    .sum::<f64>()
                    / member_ids.len() as f64
            })
        } else {
            member_ids
                .first()
                .and_then(|id| players.get(id).map(|p| p.skill))
                .unwrap_or(0.0)
        };
        let party_size = member_ids.len();
        party_entries.push((party_id, member_ids, avg_skill, party_size));
    }

    let required_players = playlist.required_players();
    let is_small_playlist = required_players <= 12 && team_count == 2;

    if is_small_playlist && config_use_exact_team_balancing {
        if let Some(best_teams) = exact_partition_teams(&party_entries, required_players) {
            return best_teams;
        }
    }

    party_entries.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap());

    let mut teams: Vec<Vec<usize>> = vec![Vec::new(); team_count];
    let mut forward = true;
    let mut team_idx = 0;

    for (_, member_ids, _, _) in party_entries {
        for &player_id in &member_ids {
            teams[team_idx].push(player_id);
        }

        if forward {
            if team_idx == team_count - 1 {
                forward = false;
            } else {
                team_idx += 1;
            }
        } else if team_idx == 0 {
            forward = true;
        } else {
            team_idx -= 1;
        }
    }

    teams
}

/// Finds the 2-way partition of `party_entries` minimizing the absolute
/// skill-sum difference between teams, subject to both teams totaling
/// `required_players / 2` players. Returns `None` if total size doesn't
/// match `required_players` exactly.
fn exact_partition_teams(
    party_entries: &[PartyEntry],
    required_players: usize,
) -> Option<Vec<Vec<usize>>> {
    let target_team_size = required_players / 2;

    let total_size: usize = party_entries.iter().map(|(_, _, _, size)| *size).sum();
    if total_size != required_players {
        return None;
    }

    let mut best_diff = f64::MAX;
    let mut best_partition: Option<Vec<Vec<usize>>> = None;

    let mut team1_indices = Vec::new();
    let mut team1_size = 0;
    let mut team1_skill = 0.0;

    exact_partition_recursive(
        party_entries,
        target_team_size,
        0,
        &mut team1_indices,
        &mut team1_size,
        &mut team1_skill,
        &mut best_diff,
        &mut best_partition,
        0,
    );

    best_partition
}

/// Depth-bounded (1000 levels) branch-and-bound search over which parties
/// join team 1 vs team 2, pruning branches whose best achievable skill gap
/// already exceeds the incumbent.
#[allow(clippy::too_many_arguments)]
fn exact_partition_recursive(
    party_entries: &[PartyEntry],
    target_team_size: usize,
    idx: usize,
    team1_indices: &mut Vec<usize>,
    team1_size: &mut usize,
    team1_skill: &mut f64,
    best_diff: &mut f64,
    best_partition: &mut Option<Vec<Vec<usize>>>,
    depth: usize,
) {
    if depth > 1000 {
        return;
    }

    if idx >= party_entries.len() {
        if *team1_size == target_team_size {
            let team2_skill: f64 = party_entries
                .iter()
                .enumerate()
                .filter(|(i, _)| !team1_indices.contains(i))
                .map(|(_, (_, _, skill, size))| skill * *size as f64)
                .sum();

            let diff = (*team1_skill - team2_skill).abs();
            if diff < *best_diff {
                *best_diff = diff;

                let mut teams = vec![Vec::new(), Vec::new()];
                for (i, (_, member_ids, _, _)) in party_entries.iter().enumerate() {
                    if team1_indices.contains(&i) {
                        teams[0].extend_from_slice(member_ids);
                    } else {
                        teams[1].extend_from_slice(member_ids);
                    }
                }
                *best_partition = Some(teams);
            }
        }
        return;
    }

    let (_, _, skill, size) = &party_entries[idx];

    if *team1_size + size <= target_team_size {
        team1_indices.push(idx);
        *team1_size += size;
        *team1_skill += skill * *size as f64;

        let remaining_skill: f64 = party_entries
            .iter()
            .enumerate()
            .filter(|(i, _)| *i > idx && !team1_indices.contains(i))
            .map(|(_, (_, _, s, sz))| s * *sz as f64)
            .sum();
        let current_diff = (*team1_skill - remaining_skill).abs();

        if current_diff < *best_diff {
            exact_partition_recursive(
                party_entries,
                target_team_size,
                idx + 1,
                team1_indices,
                team1_size,
                team1_skill,
                best_diff,
                best_partition,
                depth + 1,
            );
        }

        team1_indices.pop();
        *team1_size -= size;
        *team1_skill -= skill * *size as f64;
    }

    if *team1_size < target_team_size {
        exact_partition_recursive(
            party_entries,
            target_team_size,
            idx + 1,
            team1_indices,
            team1_size,
            team1_skill,
            best_diff,
            best_partition,
            depth + 1,
        );
    }
}
