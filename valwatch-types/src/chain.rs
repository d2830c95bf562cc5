//! Chain-state records as returned by a Solana JSON-RPC endpoint.

use std::fmt;

/// Which RPC endpoint a query is sent to.
///
/// The tracked validator's own node answers `Validator` queries; a public
/// cluster endpoint answers `Network` queries so the two views can be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Validator,
    Network,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Validator => f.write_str("validator"),
            Target::Network => f.write_str("network"),
        }
    }
}

/// Snapshot of `getEpochInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct EpochInfo {
    pub epoch: u64,
    pub absolute_slot: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub slot_index: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub slots_in_epoch: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub block_height: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub transaction_count: Option<u64>,
}

/// Vote credits earned by a vote account during one epoch.
///
/// On the wire this is a `[epoch, credits, previous_credits]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochCredits {
    pub epoch: u64,
    pub credits: u64,
    pub previous_credits: u64,
}

impl EpochCredits {
    pub const fn new(epoch: u64, credits: u64, previous_credits: u64) -> Self {
        Self {
            epoch,
            credits,
            previous_credits,
        }
    }

    /// Build from a raw wire entry. Entries shorter than three elements are
    /// rejected rather than padded.
    pub fn from_slice(raw: &[u64]) -> Option<Self> {
        match raw {
            [epoch, credits, previous_credits, ..] => {
                Some(Self::new(*epoch, *credits, *previous_credits))
            }
            _ => None,
        }
    }
}

/// One entry of `getVoteAccounts`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct VoteAccountRecord {
    pub node_pubkey: String,
    pub vote_pubkey: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub activated_stake: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub last_vote: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub root_slot: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub commission: u8,
    #[cfg_attr(feature = "serde", serde(default))]
    pub epoch_vote_account: bool,
    #[cfg_attr(
        feature = "serde",
        serde(default, with = "epoch_credits_wire")
    )]
    pub epoch_credits: Vec<EpochCredits>,
}

/// Where a node identity was found in a [`VoteAccountsSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership<'a> {
    Current(&'a VoteAccountRecord),
    Delinquent(&'a VoteAccountRecord),
}

impl<'a> Membership<'a> {
    pub fn record(&self) -> &'a VoteAccountRecord {
        match self {
            Membership::Current(r) | Membership::Delinquent(r) => r,
        }
    }

    pub fn is_delinquent(&self) -> bool {
        matches!(self, Membership::Delinquent(_))
    }
}

/// Result of `getVoteAccounts`: vote accounts split by delinquency.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoteAccountsSnapshot {
    #[cfg_attr(feature = "serde", serde(default))]
    pub current: Vec<VoteAccountRecord>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub delinquent: Vec<VoteAccountRecord>,
}

impl VoteAccountsSnapshot {
    /// Locate a node identity. The current set is searched first; an identity
    /// is expected in at most one of the two sets.
    pub fn find(&self, node_pubkey: &str) -> Option<Membership<'_>> {
        if let Some(r) = self.current.iter().find(|r| r.node_pubkey == node_pubkey) {
            return Some(Membership::Current(r));
        }
        self.delinquent
            .iter()
            .find(|r| r.node_pubkey == node_pubkey)
            .map(Membership::Delinquent)
    }

    /// Look up a node identity in the current set only.
    pub fn find_current(&self, node_pubkey: &str) -> Option<&VoteAccountRecord> {
        self.current.iter().find(|r| r.node_pubkey == node_pubkey)
    }
}

/// One entry of `getClusterNodes`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterNode {
    pub pubkey: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub gossip: Option<String>,
}

/// The subset of `getBlock` the monitor cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ConfirmedBlock {
    /// Unix seconds; `None` when the node has not recorded a time for the slot.
    #[cfg_attr(feature = "serde", serde(default))]
    pub block_time: Option<i64>,
}

/// Result of `getVersion`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeVersion {
    #[cfg_attr(feature = "serde", serde(rename = "solana-core"))]
    pub solana_core: String,
    #[cfg_attr(feature = "serde", serde(rename = "feature-set", default))]
    pub feature_set: Option<u64>,
}

#[cfg(feature = "serde")]
mod epoch_credits_wire {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::EpochCredits;

    pub fn serialize<S: Serializer>(credits: &[EpochCredits], s: S) -> Result<S::Ok, S::Error> {
        credits
            .iter()
            .map(|c| [c.epoch, c.credits, c.previous_credits])
            .collect::<Vec<_>>()
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<EpochCredits>, D::Error> {
        let raw = Vec::<Vec<u64>>::deserialize(d)?;
        Ok(raw.iter().filter_map(|e| EpochCredits::from_slice(e)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(node: &str) -> VoteAccountRecord {
        VoteAccountRecord {
            node_pubkey: node.to_string(),
            vote_pubkey: format!("vote-{node}"),
            ..Default::default()
        }
    }

    #[test]
    fn epoch_credits_from_short_slice_is_rejected() {
        assert_eq!(EpochCredits::from_slice(&[1, 2]), None);
        assert_eq!(
            EpochCredits::from_slice(&[101, 60, 50]),
            Some(EpochCredits::new(101, 60, 50))
        );
    }

    #[test]
    fn find_reports_membership() {
        let snapshot = VoteAccountsSnapshot {
            current: vec![record("a"), record("b")],
            delinquent: vec![record("c")],
        };

        assert!(matches!(snapshot.find("a"), Some(Membership::Current(_))));
        let c = snapshot.find("c").unwrap();
        assert!(c.is_delinquent());
        assert_eq!(c.record().vote_pubkey, "vote-c");
        assert!(snapshot.find("z").is_none());
        assert!(snapshot.find_current("c").is_none());
    }

    #[test]
    fn target_display() {
        assert_eq!(Target::Validator.to_string(), "validator");
        assert_eq!(Target::Network.to_string(), "network");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn vote_accounts_parse_from_rpc_json() {
        let json = r#"{
            "current": [{
                "commission": 10,
                "epochVoteAccount": true,
                "epochCredits": [[100, 50, 40], [101], [101, 60, 50]],
                "nodePubkey": "node1",
                "lastVote": 1000,
                "activatedStake": 5000000000,
                "votePubkey": "vote1",
                "rootSlot": 968
            }],
            "delinquent": []
        }"#;

        let snapshot: VoteAccountsSnapshot = serde_json::from_str(json).unwrap();
        let rec = &snapshot.current[0];
        assert_eq!(rec.activated_stake, 5_000_000_000);
        assert_eq!(rec.commission, 10);
        assert_eq!(
            rec.epoch_credits,
            vec![EpochCredits::new(100, 50, 40), EpochCredits::new(101, 60, 50)]
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn version_uses_dashed_field_names() {
        let v: NodeVersion =
            serde_json::from_str(r#"{"solana-core":"1.18.22","feature-set":3241752014}"#).unwrap();
        assert_eq!(v.solana_core, "1.18.22");
        assert_eq!(v.feature_set, Some(3241752014));
    }
}
