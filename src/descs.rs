//! Gauge families exported by the collector.
//!
//! Names and label keys are a compatibility surface for existing dashboards
//! and must not change, including the `delinquuent` spelling.

use valwatch_types::MetricDesc;

pub const ACTIVE_VALIDATORS: MetricDesc = MetricDesc::new(
    "solana_active_validators",
    "Total number of active validators by state",
    &["state"],
);

pub const ACTIVATED_STAKE: MetricDesc = MetricDesc::new(
    "solana_validator_activated_stake",
    "Activated stake per validator",
    &["votekey", "pubkey"],
);

pub const LAST_VOTE: MetricDesc = MetricDesc::new(
    "solana_validator_last_vote",
    "Last voted slot per validator",
    &["votekey", "pubkey"],
);

pub const ROOT_SLOT: MetricDesc = MetricDesc::new(
    "solana_validator_root_slot",
    "Root slot per validator",
    &["votekey", "pubkey"],
);

pub const DELINQUENT: MetricDesc = MetricDesc::new(
    "solana_validator_delinquent",
    "Whether a validator is delinquent",
    &["votekey", "pubkey"],
);

pub const NODE_VERSION: MetricDesc =
    MetricDesc::new("solana_node_version", "Node version of solana", &["version"]);

pub const ACCOUNT_BALANCE: MetricDesc = MetricDesc::new(
    "solana_account_balance",
    "Solana identity account balance",
    &["solana_acc_balance"],
);

pub const SLOT_LEADER: MetricDesc = MetricDesc::new(
    "solana_slot_leader",
    "Current slot leader",
    &["solana_slot_leader"],
);

pub const CURRENT_SLOT: MetricDesc = MetricDesc::new(
    "solana_current_slot",
    "Current slot height",
    &["solana_current_slot"],
);

pub const BLOCK_TIME: MetricDesc = MetricDesc::new(
    "solana_block_time",
    "Current block time.",
    &["solana_block_time"],
);

pub const COMMISSION: MetricDesc = MetricDesc::new(
    "solana_val_commission",
    "Solana validator current commission.",
    &["solana_val_commission"],
);

pub const DELINQUENT_COMMISSION: MetricDesc = MetricDesc::new(
    "solana_val_delinquuent_commission",
    "Solana validator delinquent commission.",
    &["solana_delinquent_commission"],
);

pub const VOTE_ACCOUNT: MetricDesc = MetricDesc::new(
    "solana_vote_account",
    "Whether the vote account is staked for this epoch",
    &["state"],
);

pub const ALERT_COUNT: MetricDesc = MetricDesc::new(
    "solana_val_alert_count",
    "Count of alerts about validator status alerting",
    &["alert_count"],
);

pub const IP_ADDRESS: MetricDesc = MetricDesc::new(
    "solana_ip_address",
    "IP Address from cluster node information, gossip",
    &["ip_address"],
);

pub const TX_COUNT: MetricDesc =
    MetricDesc::new("solana_tx_count", "solana transaction count", &["solana_tx_count"]);

pub const NETWORK_VOTE_HEIGHT: MetricDesc = MetricDesc::new(
    "solana_network_vote_height",
    "solana network vote height",
    &["solana_network_vote_height"],
);

pub const VALIDATOR_VOTE_HEIGHT: MetricDesc = MetricDesc::new(
    "solana_validator_vote_height",
    "solana validator vote height",
    &["solana_validator_vote_height"],
);

pub const VOTE_HEIGHT_DIFF: MetricDesc = MetricDesc::new(
    "solana_vote_height_diff",
    "solana vote height difference of validator and network",
    &["solana_vote_height_diff"],
);

pub const VAL_STATUS: MetricDesc = MetricDesc::new(
    "solana_val_status",
    "solana validator voting status i.e., voting or jailed.",
    &["solana_val_status"],
);

pub const VALIDATOR_VOTE_CREDITS: MetricDesc = MetricDesc::new(
    "solana_validator_vote_credits",
    "solana validator vote credits of previous and current epoch.",
    &["type"],
);

pub const NETWORK_VOTE_CREDITS: MetricDesc = MetricDesc::new(
    "solana_network_vote_credits",
    "solana network average vote credits of previous and current epoch.",
    &["type"],
);

pub const NETWORK_CONFIRMED_TIME: MetricDesc = MetricDesc::new(
    "solana_network_confirmed_time",
    "Confirmed Block time of network",
    &["solana_network_confirmed_time"],
);

pub const VALIDATOR_CONFIRMED_TIME: MetricDesc = MetricDesc::new(
    "solana_val_confirmed_time",
    "Confirmed Block time of validator",
    &["solana_val_confirmed_time"],
);

pub const BLOCKTIME_DIFF: MetricDesc = MetricDesc::new(
    "solana_confirmed_blocktime_diff",
    "Block time difference of network and validator",
    &["solana_confirmed_blocktime_diff"],
);

pub const VOTE_ACCOUNT_BALANCE: MetricDesc = MetricDesc::new(
    "solana_vote_account_balance",
    "Vote account balance",
    &["solana_vote_acc_bal"],
);

pub const IDENTITY_ACCOUNT_BALANCE: MetricDesc = MetricDesc::new(
    "solana_identity_account_balance",
    "Identity account balance",
    &["solana_identity_acc_bal"],
);
