//! Configuration for a bank run

use ipc_bus::WaitConfig;
use serde::{Deserialize, Serialize};

use crate::{
    driver::RingDriver,
    ledger::MAX_HISTORY_LEN,
    types::{worker_ids, Balance, TransferOrder, MAX_WORKERS},
    Error, Result,
};

/// Bank run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Opening balance of each worker; worker `i` gets `balances[i - 1]`
    pub balances: Vec<Balance>,

    /// Explicit transfer script; the ring sequence is used when absent
    pub transfers: Option<Vec<TransferOrder>>,

    /// Channel wait tuning
    pub transport: TransportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "bank-sim".to_string(),
            balances: vec![10, 20, 30],
            transfers: None,
            transport: TransportConfig::default(),
        }
    }
}

/// Channel wait tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Backoff rounds before sleeping
    pub spin_limit: u32,

    /// Sleep between polls (microseconds)
    pub idle_sleep_us: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let wait = WaitConfig::default();
        Self {
            spin_limit: wait.spin_limit,
            idle_sleep_us: wait.idle_sleep_us,
        }
    }
}

impl TransportConfig {
    /// Bus wait settings
    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig {
            spin_limit: self.spin_limit,
            idle_sleep_us: self.idle_sleep_us,
        }
    }
}

impl Config {
    /// Configuration with the given opening balances
    pub fn with_balances(balances: Vec<Balance>) -> Self {
        Self {
            balances,
            ..Self::default()
        }
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(balances) = std::env::var("BANK_BALANCES") {
            config.balances = parse_balances(&balances)?;
        }

        if let Ok(spin) = std::env::var("BANK_SPIN_LIMIT") {
            config.transport.spin_limit = spin
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("BANK_SPIN_LIMIT: {}", e)))?;
        }

        if let Ok(sleep) = std::env::var("BANK_IDLE_SLEEP_US") {
            config.transport.idle_sleep_us = sleep
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("BANK_IDLE_SLEEP_US: {}", e)))?;
        }

        Ok(config)
    }

    /// Number of workers
    pub fn workers(&self) -> usize {
        self.balances.len()
    }

    /// Number of participants, coordinator included
    pub fn participants(&self) -> usize {
        self.balances.len() + 1
    }

    /// Opening balance of `worker`
    pub fn balance_of(&self, worker: usize) -> Option<Balance> {
        worker
            .checked_sub(1)
            .and_then(|index| self.balances.get(index))
            .copied()
    }

    /// Transfers the run will issue, in order
    pub fn transfer_plan(&self) -> Vec<TransferOrder> {
        match &self.transfers {
            Some(orders) => orders.clone(),
            None => RingDriver::orders(worker_ids(self.participants())),
        }
    }

    /// Reject configurations the protocol cannot complete.
    ///
    /// A refused transfer is never acknowledged and would leave the
    /// coordinator waiting forever, so the plan is replayed against the
    /// opening balances and every order must be covered.
    pub fn validate(&self) -> Result<()> {
        if self.balances.is_empty() || self.balances.len() > MAX_WORKERS {
            return Err(Error::Config(format!(
                "expected 1..={} workers, got {}",
                MAX_WORKERS,
                self.balances.len()
            )));
        }
        if let Some(index) = self.balances.iter().position(|&b| b <= 0) {
            return Err(Error::Config(format!(
                "worker {} has non-positive opening balance {}",
                index + 1,
                self.balances[index]
            )));
        }

        let plan = self.transfer_plan();
        let horizon = tick_horizon(self.workers(), plan.len());
        if horizon >= MAX_HISTORY_LEN {
            return Err(Error::Config(format!(
                "{} transfers across {} workers may reach logical time {}, beyond the {}-entry history",
                plan.len(),
                self.workers(),
                horizon,
                MAX_HISTORY_LEN
            )));
        }

        let mut balances = self.balances.clone();
        for (step, order) in plan.iter().enumerate() {
            order.validate(self.participants())?;

            let src = order.src as usize - 1;
            if balances[src] < order.amount {
                return Err(Error::Config(format!(
                    "transfer #{} ({}) overdraws worker {} holding ${}",
                    step + 1,
                    order,
                    order.src,
                    balances[src]
                )));
            }
            balances[src] -= order.amount;
            balances[order.dst as usize - 1] += order.amount;
        }
        Ok(())
    }
}

/// Upper bound on any participant's logical time before the histories are sent.
///
/// Every send or receive raises the largest clock in the run by at most one,
/// so counting events bounds every clock. Startup takes `W` STARTED sends and
/// `W * W` barrier receives; each transfer takes six events (order, forward
/// receive, forward send, credit receive, ACK send, ACK receive); shutdown
/// takes one STOP, `W` STOP receives, `W` DONE sends and `W * W` DONE receives.
fn tick_horizon(workers: usize, transfers: usize) -> usize {
    (workers + 1)
        .saturating_mul(2 * workers + 1)
        .saturating_add(transfers.saturating_mul(6))
}

fn parse_balances(raw: &str) -> Result<Vec<Balance>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Balance>()
                .map_err(|e| Error::Config(format!("BANK_BALANCES entry {:?}: {}", s, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "bank-sim");
        assert_eq!(config.participants(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_balances() {
        assert_eq!(parse_balances("10, 20,30").unwrap(), vec![10, 20, 30]);
        assert!(parse_balances("10,x").is_err());
    }

    #[test]
    fn test_validate_worker_count() {
        assert!(Config::with_balances(vec![]).validate().is_err());
        assert!(Config::with_balances(vec![1; MAX_WORKERS + 1]).validate().is_err());
        assert!(Config::with_balances(vec![10; MAX_WORKERS]).validate().is_ok());
        assert!(Config::with_balances(vec![10, 0]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overdraw() {
        let mut config = Config::with_balances(vec![10, 20]);
        config.transfers = Some(vec![TransferOrder::new(1, 2, 5), TransferOrder::new(1, 2, 6)]);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        // Incoming money covers the later debit
        config.transfers = Some(vec![TransferOrder::new(2, 1, 10), TransferOrder::new(1, 2, 15)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_order() {
        let mut config = Config::with_balances(vec![10, 20]);
        config.transfers = Some(vec![TransferOrder::new(1, 3, 5)]);
        assert!(matches!(config.validate(), Err(Error::InvalidTransfer(_))));
    }

    #[test]
    fn test_validate_rejects_plan_outgrowing_history() {
        let mut config = Config::with_balances(vec![1000, 1000]);
        let alternating: Vec<_> = (0..200)
            .map(|i| {
                if i % 2 == 0 {
                    TransferOrder::new(1, 2, 1)
                } else {
                    TransferOrder::new(2, 1, 1)
                }
            })
            .collect();
        config.transfers = Some(alternating.clone());
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.transfers = Some(alternating[..100].to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tick_horizon() {
        assert_eq!(tick_horizon(1, 0), 6);
        assert_eq!(tick_horizon(2, 1), 21);
        // The default ring at the largest fabric fits with room to spare
        assert!(tick_horizon(MAX_WORKERS, MAX_WORKERS) < MAX_HISTORY_LEN);
    }

    #[test]
    fn test_ring_plan_is_default() {
        let config = Config::with_balances(vec![1, 1, 1]);
        assert_eq!(
            config.transfer_plan(),
            vec![
                TransferOrder::new(1, 2, 1),
                TransferOrder::new(2, 3, 2),
                TransferOrder::new(3, 1, 1),
            ]
        );
        // Each hop forwards what it just received plus one
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
balances = [10, 20]

[[transfers]]
src = 1
dst = 2
amount = 5

[transport]
spin_limit = 4
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.balances, vec![10, 20]);
        assert_eq!(config.transfer_plan(), vec![TransferOrder::new(1, 2, 5)]);
        assert_eq!(config.transport.spin_limit, 4);
        assert_eq!(
            config.transport.idle_sleep_us,
            TransportConfig::default().idle_sleep_us
        );
        assert_eq!(config.service_name, "bank-sim");
    }
}
