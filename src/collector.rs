//! One collection cycle: query, derive, alert, emit.
//!
//! Queries are grouped by dependency and each group runs concurrently. Every
//! call is bounded by a timeout and a failure only marks the metrics derived
//! from that call as unavailable. Nothing in a cycle is fatal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use valwatch_adapters::{AdapterError, ChainQuery, DEFAULT_TIMEOUT};
use valwatch_types::{
    ConfirmedBlock, EpochInfo, Membership, MetricSet, Target, VoteAccountsSnapshot,
};

use crate::alert::AlertScheduler;
use crate::cache::TtlCache;
use crate::compute::{
    block_time_diff, classify_voting, epoch_credits_for, nearest_thousand_label,
    network_average_credits, normalize_stake, vote_height,
};
use crate::config::{ConfigError, Settings};
use crate::descs;

const DELINQUENT_MESSAGE: &str = "Your solana validator is in DELINQUENT state";
const NOT_FOUND: &str = "validator not found in vote accounts";

/// What the collector tracks and which unscheduled alerts it sends.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub validator_name: String,
    /// Node identity pubkey.
    pub identity: String,
    pub vote_key: String,
    pub call_timeout: Duration,
    pub status_alerts: bool,
    pub delinquency_alerts: bool,
    pub new_epoch_alerts: bool,
}

impl CollectorSettings {
    pub fn new(identity: impl Into<String>, vote_key: impl Into<String>) -> Self {
        Self {
            validator_name: String::new(),
            identity: identity.into(),
            vote_key: vote_key.into(),
            call_timeout: DEFAULT_TIMEOUT,
            status_alerts: true,
            delinquency_alerts: true,
            new_epoch_alerts: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let prefs = &settings.alerter_preferences;
        Ok(Self {
            validator_name: settings.validator_details.validator_name.clone(),
            identity: settings.validator_details.pub_key.clone(),
            vote_key: settings.validator_details.vote_key.clone(),
            call_timeout: settings.timeout()?,
            status_alerts: prefs.node_status(),
            delinquency_alerts: prefs.delinquency(),
            new_epoch_alerts: prefs.new_epoch(),
        })
    }
}

/// Runs collection cycles against a [`ChainQuery`].
///
/// State carried between cycles: the epoch-info cache, the last seen epoch
/// and whether the validator was delinquent on the previous cycle.
pub struct Collector {
    chain: Arc<dyn ChainQuery>,
    settings: CollectorSettings,
    epoch_cache: TtlCache<EpochInfo>,
    scheduler: AlertScheduler,
    previous_epoch: Option<u64>,
    delinquent: bool,
}

impl Collector {
    pub fn new(
        chain: Arc<dyn ChainQuery>,
        settings: CollectorSettings,
        scheduler: AlertScheduler,
    ) -> Self {
        Self {
            chain,
            settings,
            epoch_cache: TtlCache::default(),
            scheduler,
            previous_epoch: None,
            delinquent: false,
        }
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    pub fn scheduler(&self) -> &AlertScheduler {
        &self.scheduler
    }

    /// Run one cycle stamped with the current time.
    pub async fn collect(&mut self) -> MetricSet {
        self.collect_at(Utc::now()).await
    }

    /// Run one cycle as if the wall clock read `now`.
    pub async fn collect_at(&mut self, now: DateTime<Utc>) -> MetricSet {
        let mut set = MetricSet::with_timestamp(now.timestamp_millis().max(0) as u64);

        // Read once so every credit computation this cycle agrees on the epoch.
        let epoch = match self.epoch_info().await {
            Ok(info) => Some(info.epoch),
            Err(e) => {
                let stale = self.epoch_cache.peek().await.map(|info| info.epoch);
                warn!(error = %e, last_known_epoch = ?stale, "epoch info unavailable");
                None
            }
        };
        if let Some(epoch) = epoch {
            self.track_epoch(epoch).await;
        }

        let (local, network) = tokio::join!(
            self.guarded("vote_accounts", self.chain.vote_accounts(Target::Validator)),
            self.guarded("network_vote_accounts", self.chain.vote_accounts(Target::Network)),
        );
        self.emit_vote_accounts(&mut set, now, &local, epoch).await;
        self.emit_vote_height(&mut set, local.as_ref().ok(), network.as_ref().ok());

        let chain = &self.chain;
        let (version, leader, slot, tx_count, nodes, identity_balance, vote_balance) = tokio::join!(
            self.guarded("version", chain.version()),
            self.guarded("slot_leader", chain.slot_leader()),
            self.guarded("current_slot", chain.current_slot(Target::Validator)),
            self.guarded("tx_count", chain.tx_count()),
            self.guarded("cluster_nodes", chain.cluster_nodes()),
            self.guarded(
                "identity_balance",
                chain.balance(Target::Validator, &self.settings.identity)
            ),
            self.guarded(
                "vote_balance",
                chain.balance(Target::Validator, &self.settings.vote_key)
            ),
        );

        match version {
            Ok(v) if !v.solana_core.is_empty() => {
                set.gauge(&descs::NODE_VERSION, &[v.solana_core.as_str()], 1.0)
            }
            Ok(_) => set.unavailable(&descs::NODE_VERSION, "empty version string"),
            Err(e) => set.unavailable(&descs::NODE_VERSION, e.to_string()),
        }

        match leader {
            Ok(leader) => set.gauge(&descs::SLOT_LEADER, &[leader.as_str()], 1.0),
            Err(e) => set.unavailable(&descs::SLOT_LEADER, e.to_string()),
        }

        match tx_count {
            Ok(count) => {
                let label = nearest_thousand_label(count);
                set.gauge(&descs::TX_COUNT, &[label.as_str()], count as f64);
            }
            Err(e) => set.unavailable(&descs::TX_COUNT, e.to_string()),
        }

        match nodes {
            Ok(nodes) => {
                let gossip = nodes
                    .iter()
                    .find(|n| n.pubkey == self.settings.identity)
                    .and_then(|n| n.gossip.as_deref());
                match gossip {
                    Some(addr) => set.gauge(&descs::IP_ADDRESS, &[addr], 1.0),
                    None => set.unavailable(&descs::IP_ADDRESS, "identity not in cluster nodes"),
                }
            }
            Err(e) => set.unavailable(&descs::IP_ADDRESS, e.to_string()),
        }

        match identity_balance {
            Ok(lamports) => {
                let sol = normalize_stake(lamports);
                let label = sol.to_string();
                set.gauge(&descs::IDENTITY_ACCOUNT_BALANCE, &[label.as_str()], sol);
                set.gauge(&descs::ACCOUNT_BALANCE, &[label.as_str()], sol);
            }
            Err(e) => {
                set.unavailable(&descs::IDENTITY_ACCOUNT_BALANCE, e.to_string());
                set.unavailable(&descs::ACCOUNT_BALANCE, e.to_string());
            }
        }

        match vote_balance {
            Ok(lamports) => {
                let sol = normalize_stake(lamports);
                let label = sol.to_string();
                set.gauge(&descs::VOTE_ACCOUNT_BALANCE, &[label.as_str()], sol);
            }
            Err(e) => set.unavailable(&descs::VOTE_ACCOUNT_BALANCE, e.to_string()),
        }

        match slot {
            Ok(slot) => {
                let label = slot.to_string();
                set.gauge(&descs::CURRENT_SLOT, &[label.as_str()], slot as f64);
                self.emit_block_times(&mut set, slot).await;
            }
            Err(e) => {
                let reason = e.to_string();
                set.unavailable(&descs::CURRENT_SLOT, reason.as_str());
                for desc in [
                    &descs::BLOCK_TIME,
                    &descs::VALIDATOR_CONFIRMED_TIME,
                    &descs::NETWORK_CONFIRMED_TIME,
                    &descs::BLOCKTIME_DIFF,
                ] {
                    set.unavailable(desc, format!("current slot unavailable: {}", reason));
                }
            }
        }

        debug!(families = set.len(), "collection cycle complete");
        set
    }

    async fn epoch_info(&self) -> Result<EpochInfo, AdapterError> {
        self.epoch_cache
            .get_or_refresh(|| self.guarded("epoch_info", self.chain.epoch_info(Target::Validator)))
            .await
    }

    async fn track_epoch(&mut self, epoch: u64) {
        let previous = self.previous_epoch.replace(epoch);
        match previous {
            Some(prev) if prev != epoch => {
                info!(previous = prev, epoch, "new epoch started");
                if self.settings.new_epoch_alerts {
                    let message = self.alert_text(&format!("A new epoch has started: {}", epoch));
                    self.scheduler.notify(&message).await;
                }
            }
            _ => {}
        }
    }

    async fn emit_vote_accounts(
        &mut self,
        set: &mut MetricSet,
        now: DateTime<Utc>,
        local: &Result<VoteAccountsSnapshot, AdapterError>,
        epoch: Option<u64>,
    ) {
        let snapshot = match local {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let reason = e.to_string();
                for desc in [
                    &descs::ACTIVE_VALIDATORS,
                    &descs::ACTIVATED_STAKE,
                    &descs::LAST_VOTE,
                    &descs::ROOT_SLOT,
                    &descs::DELINQUENT,
                    &descs::COMMISSION,
                    &descs::VOTE_ACCOUNT,
                    &descs::VAL_STATUS,
                    &descs::VALIDATOR_VOTE_CREDITS,
                    &descs::NETWORK_VOTE_CREDITS,
                ] {
                    set.unavailable(desc, reason.as_str());
                }
                return;
            }
        };

        set.gauge(&descs::ACTIVE_VALIDATORS, &["current"], snapshot.current.len() as f64);
        set.gauge(&descs::ACTIVE_VALIDATORS, &["delinquent"], snapshot.delinquent.len() as f64);

        match epoch {
            Some(epoch) => match network_average_credits(&snapshot.current, epoch) {
                Some((current, previous)) => {
                    set.gauge(&descs::NETWORK_VOTE_CREDITS, &["current"], current);
                    set.gauge(&descs::NETWORK_VOTE_CREDITS, &["previous"], previous);
                }
                None => set.unavailable(
                    &descs::NETWORK_VOTE_CREDITS,
                    "no validator earned credits in both epochs",
                ),
            },
            None => set.unavailable(&descs::NETWORK_VOTE_CREDITS, "epoch info unavailable"),
        }

        let Some(membership) = snapshot.find(&self.settings.identity) else {
            warn!(identity = %self.settings.identity, "validator not found in vote accounts");
            for desc in [
                &descs::ACTIVATED_STAKE,
                &descs::LAST_VOTE,
                &descs::ROOT_SLOT,
                &descs::DELINQUENT,
                &descs::COMMISSION,
                &descs::VOTE_ACCOUNT,
                &descs::VAL_STATUS,
                &descs::VALIDATOR_VOTE_CREDITS,
            ] {
                set.unavailable(desc, NOT_FOUND);
            }
            // An absent validator is no longer known to be delinquent.
            self.delinquent = false;
            return;
        };

        let record = membership.record();
        let keys = [record.vote_pubkey.as_str(), record.node_pubkey.as_str()];
        let commission = record.commission.to_string();
        set.gauge(&descs::LAST_VOTE, &keys, record.last_vote as f64);
        set.gauge(&descs::ROOT_SLOT, &keys, record.root_slot as f64);

        match membership {
            Membership::Current(record) => {
                set.gauge(&descs::DELINQUENT, &keys, 0.0);
                set.gauge(&descs::ACTIVATED_STAKE, &keys, normalize_stake(record.activated_stake));
                set.gauge(&descs::COMMISSION, &[commission.as_str()], f64::from(record.commission));
                set.gauge(
                    &descs::VOTE_ACCOUNT,
                    &["current"],
                    if record.epoch_vote_account { 1.0 } else { 0.0 },
                );

                match epoch {
                    Some(epoch) => {
                        let (current, previous) = epoch_credits_for(&record.epoch_credits, epoch);
                        set.gauge(&descs::VALIDATOR_VOTE_CREDITS, &["current"], current as f64);
                        set.gauge(&descs::VALIDATOR_VOTE_CREDITS, &["previous"], previous as f64);
                    }
                    None => set.unavailable(&descs::VALIDATOR_VOTE_CREDITS, "epoch info unavailable"),
                }

                let status = classify_voting(record);
                set.gauge(&descs::VAL_STATUS, &[status.label()], status.gauge());
                if self.settings.status_alerts {
                    let message = self.alert_text(status.message());
                    self.scheduler.evaluate(now, &message, set).await;
                }
            }
            Membership::Delinquent(record) => {
                set.gauge(&descs::DELINQUENT, &keys, 1.0);
                set.gauge(
                    &descs::DELINQUENT_COMMISSION,
                    &[commission.as_str()],
                    f64::from(record.commission),
                );
                set.unavailable(&descs::VALIDATOR_VOTE_CREDITS, "validator is delinquent");

                if !self.delinquent {
                    warn!(identity = %self.settings.identity, "validator is delinquent");
                    if self.settings.delinquency_alerts {
                        let message = self.alert_text(DELINQUENT_MESSAGE);
                        self.scheduler.notify(&message).await;
                    }
                }
            }
        }
        self.delinquent = membership.is_delinquent();
    }

    fn emit_vote_height(
        &self,
        set: &mut MetricSet,
        local: Option<&VoteAccountsSnapshot>,
        network: Option<&VoteAccountsSnapshot>,
    ) {
        let height = vote_height(local, network, &self.settings.identity);

        match height.validator {
            Some(v) => set.gauge(&descs::VALIDATOR_VOTE_HEIGHT, &["validator"], v as f64),
            None => set.unavailable(&descs::VALIDATOR_VOTE_HEIGHT, "validator vote height unknown"),
        }
        match height.network {
            Some(n) => set.gauge(&descs::NETWORK_VOTE_HEIGHT, &["network"], n as f64),
            None => set.unavailable(&descs::NETWORK_VOTE_HEIGHT, "network vote height unknown"),
        }
        match height.diff() {
            Some(d) => set.gauge(&descs::VOTE_HEIGHT_DIFF, &["vote height difference"], d as f64),
            None => set.unavailable(&descs::VOTE_HEIGHT_DIFF, "vote height missing on one side"),
        }
    }

    async fn emit_block_times(&self, set: &mut MetricSet, slot: u64) {
        let chain = &self.chain;
        let (validator, network) = tokio::join!(
            self.guarded("validator_block", chain.confirmed_block(Target::Validator, slot)),
            self.guarded("network_block", chain.confirmed_block(Target::Network, slot)),
        );

        let validator = block_time(validator, slot);
        let network = block_time(network, slot);

        match &validator {
            Ok(t) => {
                let label = t.to_string();
                set.gauge(&descs::VALIDATOR_CONFIRMED_TIME, &[label.as_str()], *t as f64);
                let when = DateTime::from_timestamp(*t, 0)
                    .map(|d| d.to_rfc3339())
                    .unwrap_or(label);
                set.gauge(&descs::BLOCK_TIME, &[when.as_str()], *t as f64);
            }
            Err(reason) => {
                set.unavailable(&descs::VALIDATOR_CONFIRMED_TIME, reason.as_str());
                set.unavailable(&descs::BLOCK_TIME, reason.as_str());
            }
        }
        match &network {
            Ok(t) => {
                let label = t.to_string();
                set.gauge(&descs::NETWORK_CONFIRMED_TIME, &[label.as_str()], *t as f64);
            }
            Err(reason) => set.unavailable(&descs::NETWORK_CONFIRMED_TIME, reason.as_str()),
        }
        match (validator, network) {
            (Ok(v), Ok(n)) => {
                let (diff, formatted) = block_time_diff(n, v);
                set.gauge(&descs::BLOCKTIME_DIFF, &[formatted.as_str()], diff);
            }
            _ => set.unavailable(&descs::BLOCKTIME_DIFF, "block time missing on one side"),
        }
    }

    async fn guarded<T, F>(&self, query: &'static str, call: F) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, AdapterError>>,
    {
        let result = match tokio::time::timeout(self.settings.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout),
        };
        if let Err(e) = &result {
            warn!(query, error = %e, "chain query failed");
        }
        result
    }

    fn alert_text(&self, message: &str) -> String {
        if self.settings.validator_name.is_empty() {
            message.to_string()
        } else {
            format!("{}: {}", self.settings.validator_name, message)
        }
    }
}

fn block_time(result: Result<ConfirmedBlock, AdapterError>, slot: u64) -> Result<i64, String> {
    let block = result.map_err(|e| e.to_string())?;
    block
        .block_time
        .ok_or_else(|| format!("no block time recorded for slot {}", slot))
}
