//! Derived validator metrics.
//!
//! Everything here is a pure function of data already fetched this cycle.
//! Missing inputs come back as `None` so the caller can mark the metric
//! unavailable instead of exporting a zero.

use valwatch_types::{EpochCredits, VoteAccountRecord, VoteAccountsSnapshot, LAMPORTS_PER_SOL};

/// Convert lamports to SOL.
pub fn normalize_stake(activated_stake: u64) -> f64 {
    activated_stake as f64 / LAMPORTS_PER_SOL
}

/// `(current, previous)` credits for `epoch`, or `(0, 0)` when the epoch is
/// absent. The first matching entry wins.
pub fn epoch_credits_for(credits: &[EpochCredits], epoch: u64) -> (u64, u64) {
    credits
        .iter()
        .find(|c| c.epoch == epoch)
        .map(|c| (c.credits, c.previous_credits))
        .unwrap_or((0, 0))
}

/// Mean `(current, previous)` credits over validators that earned credits in
/// both columns for `epoch`.
///
/// Validators with a zero in either column are left out of both averages.
/// Returns `None` when no validator qualifies.
pub fn network_average_credits(current: &[VoteAccountRecord], epoch: u64) -> Option<(f64, f64)> {
    let (sum_current, sum_previous, count) = current
        .iter()
        .map(|r| epoch_credits_for(&r.epoch_credits, epoch))
        .filter(|&(cur, prev)| cur != 0 && prev != 0)
        .fold((0.0, 0.0, 0u64), |(sc, sp, n), (cur, prev)| {
            (sc + cur as f64, sp + prev as f64, n + 1)
        });

    if count == 0 {
        return None;
    }
    Some((sum_current / count as f64, sum_previous / count as f64))
}

/// Last-voted slot of the tracked validator as seen by its own node and by
/// the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteHeight {
    pub validator: Option<u64>,
    pub network: Option<u64>,
}

impl VoteHeight {
    /// `network - validator`, when both sides were found.
    pub fn diff(&self) -> Option<i64> {
        match (self.validator, self.network) {
            (Some(v), Some(n)) => Some(n as i64 - v as i64),
            _ => None,
        }
    }
}

/// Look the identity up in the `current` set of each snapshot. A snapshot
/// that is missing, or that does not list the identity, yields `None` for
/// that side.
pub fn vote_height(
    validator: Option<&VoteAccountsSnapshot>,
    network: Option<&VoteAccountsSnapshot>,
    identity: &str,
) -> VoteHeight {
    let last_vote = |snapshot: Option<&VoteAccountsSnapshot>| {
        snapshot
            .and_then(|s| s.find_current(identity))
            .map(|r| r.last_vote)
    };

    VoteHeight {
        validator: last_vote(validator),
        network: last_vote(network),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotingStatus {
    Voting,
    NotVoting,
}

impl VotingStatus {
    /// Label for `solana_val_status`.
    pub fn label(&self) -> &'static str {
        match self {
            VotingStatus::Voting => "Voting",
            VotingStatus::NotVoting => "Jailed",
        }
    }

    pub fn gauge(&self) -> f64 {
        match self {
            VotingStatus::Voting => 1.0,
            VotingStatus::NotVoting => 0.0,
        }
    }

    /// Status alert text.
    pub fn message(&self) -> &'static str {
        match self {
            VotingStatus::Voting => "Solana validator is VOTING",
            VotingStatus::NotVoting => "Solana validator is NOT VOTING",
        }
    }
}

/// Not voting only when the account is neither an epoch vote account nor
/// carrying any activated stake.
pub fn classify_voting(record: &VoteAccountRecord) -> VotingStatus {
    if !record.epoch_vote_account && record.activated_stake == 0 {
        VotingStatus::NotVoting
    } else {
        VotingStatus::Voting
    }
}

/// Absolute difference between two block times in seconds, rounded to two
/// decimals. The formatted string is the value of record; the number is
/// parsed back from it.
pub fn block_time_diff(a: i64, b: i64) -> (f64, String) {
    let diff = (a as f64 - b as f64).abs();
    let formatted = format!("{:.2}", diff);
    let value = formatted.parse().unwrap_or(diff);
    (value, formatted)
}

/// Short human label for large counts: `999`, `15.3K`, `1.23M`, `4.5B`.
///
/// The scale is chosen after rounding, so `999_999` is `1M` rather than
/// `1000K`.
pub fn nearest_thousand_label(count: u64) -> String {
    const SUFFIXES: &[(f64, &str)] = &[(1e3, "K"), (1e6, "M"), (1e9, "B"), (1e12, "T")];

    if count < 1_000 {
        return count.to_string();
    }

    let n = count as f64;
    let mut label = String::new();
    for &(scale, suffix) in SUFFIXES {
        let rounded = (n / scale * 100.0).round() / 100.0;
        let scaled = format!("{:.2}", rounded);
        label = format!("{}{}", scaled.trim_end_matches('0').trim_end_matches('.'), suffix);
        if rounded < 1_000.0 {
            break;
        }
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(node: &str, credits: &[[u64; 3]]) -> VoteAccountRecord {
        VoteAccountRecord {
            node_pubkey: node.to_string(),
            vote_pubkey: format!("vote-{node}"),
            epoch_credits: credits
                .iter()
                .map(|c| EpochCredits::new(c[0], c[1], c[2]))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_stake() {
        assert_eq!(normalize_stake(5_000_000_000), 5.0);
        assert_eq!(normalize_stake(0), 0.0);
        assert_eq!(normalize_stake(1_500_000_000), 1.5);
    }

    #[test]
    fn test_epoch_credits_lookup() {
        let credits = [EpochCredits::new(100, 50, 40), EpochCredits::new(101, 60, 50)];
        assert_eq!(epoch_credits_for(&credits, 101), (60, 50));
        assert_eq!(epoch_credits_for(&credits, 100), (50, 40));
        assert_eq!(epoch_credits_for(&credits, 999), (0, 0));
        assert_eq!(epoch_credits_for(&[], 101), (0, 0));
    }

    #[test]
    fn test_epoch_credits_first_match_wins() {
        let credits = [EpochCredits::new(7, 1, 2), EpochCredits::new(7, 3, 4)];
        assert_eq!(epoch_credits_for(&credits, 7), (1, 2));
    }

    #[test]
    fn test_network_average_uses_both_nonzero_subset() {
        let current = vec![
            record("a", &[[10, 100, 80]]),
            record("b", &[[10, 200, 120]]),
            record("c", &[[10, 300, 0]]),
            record("d", &[[10, 0, 90]]),
            record("e", &[[9, 500, 500]]),
        ];

        assert_eq!(network_average_credits(&current, 10), Some((150.0, 100.0)));
    }

    #[test]
    fn test_network_average_without_qualifying_validators() {
        let current = vec![record("a", &[[10, 0, 0]]), record("b", &[[10, 5, 0]])];
        assert_eq!(network_average_credits(&current, 10), None);
        assert_eq!(network_average_credits(&[], 10), None);
    }

    #[test]
    fn test_vote_height() {
        let mut local = VoteAccountsSnapshot::default();
        let mut rec = record("me", &[]);
        rec.last_vote = 1000;
        local.current.push(rec.clone());

        let mut network = VoteAccountsSnapshot::default();
        rec.last_vote = 1004;
        network.current.push(rec);

        let height = vote_height(Some(&local), Some(&network), "me");
        assert_eq!(height.validator, Some(1000));
        assert_eq!(height.network, Some(1004));
        assert_eq!(height.diff(), Some(4));
    }

    #[test]
    fn test_vote_height_missing_side() {
        let mut local = VoteAccountsSnapshot::default();
        let mut rec = record("me", &[]);
        rec.last_vote = 1000;
        local.delinquent.push(rec.clone());
        local.current.push(record("other", &[]));

        let height = vote_height(Some(&local), None, "me");
        assert_eq!(height, VoteHeight::default());
        assert_eq!(height.diff(), None);

        local.current.push(rec);
        let height = vote_height(Some(&local), None, "me");
        assert_eq!(height.validator, Some(1000));
        assert_eq!(height.diff(), None);
    }

    #[test]
    fn test_classify_voting_truth_table() {
        let cases = [
            (false, 0, VotingStatus::NotVoting),
            (false, 1, VotingStatus::Voting),
            (true, 0, VotingStatus::Voting),
            (true, 1, VotingStatus::Voting),
        ];
        for (epoch_vote_account, activated_stake, expected) in cases {
            let rec = VoteAccountRecord {
                epoch_vote_account,
                activated_stake,
                ..Default::default()
            };
            assert_eq!(
                classify_voting(&rec),
                expected,
                "epoch_vote_account={epoch_vote_account} stake={activated_stake}"
            );
        }
    }

    #[test]
    fn test_voting_status_labels() {
        assert_eq!(VotingStatus::NotVoting.label(), "Jailed");
        assert_eq!(VotingStatus::Voting.gauge(), 1.0);
        assert_eq!(VotingStatus::NotVoting.message(), "Solana validator is NOT VOTING");
    }

    #[test]
    fn test_block_time_diff_symmetric_and_non_negative() {
        let pairs = [(1_700_000_000, 1_700_000_003), (5, 5), (-10, 20), (0, i64::from(u32::MAX))];
        for (a, b) in pairs {
            let (ab, ab_str) = block_time_diff(a, b);
            let (ba, ba_str) = block_time_diff(b, a);
            assert!(ab >= 0.0);
            assert_eq!(ab, ba);
            assert_eq!(ab_str, ba_str);
        }
        assert_eq!(block_time_diff(1_700_000_000, 1_700_000_003), (3.0, "3.00".to_string()));
    }

    #[test]
    fn test_nearest_thousand_label() {
        assert_eq!(nearest_thousand_label(0), "0");
        assert_eq!(nearest_thousand_label(999), "999");
        assert_eq!(nearest_thousand_label(1_000), "1K");
        assert_eq!(nearest_thousand_label(15_300), "15.3K");
        assert_eq!(nearest_thousand_label(1_234_567), "1.23M");
        assert_eq!(nearest_thousand_label(4_500_000_000), "4.5B");
        assert_eq!(nearest_thousand_label(999_999), "1M");
        assert_eq!(nearest_thousand_label(999_999_999), "1B");
        assert_eq!(nearest_thousand_label(999_994), "999.99K");
    }
}
