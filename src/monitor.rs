//! Deposit monitoring and forwarding loop
//!
//! One cycle per tick: observe the balance, recognize a deposit by delta,
//! scan new history through the forward-only signature cursor, attribute
//! inbound transfers by destination address, and bounce nearly the whole
//! balance back to one randomly chosen depositor.

use std::time::Duration;

use rand::prelude::*;
use rand::rngs::StdRng;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chain::{lamports_to_sol, ChainClient, DecodedInstruction};
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::wallet::WalletIdentity;

/// Mutable loop state, owned exclusively by the monitor
///
/// `previous_balance` always reflects the last successfully observed
/// balance. `last_checked_signature` only ever advances to a strictly
/// newer transaction and never resets.
#[derive(Debug, Default)]
pub struct CycleState {
    pub previous_balance: u64,
    pub last_checked_signature: Option<Signature>,
}

/// What a single cycle did, for logging and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Balance did not increase; nothing to do
    NoDeposit,
    /// Balance query failed; state untouched
    BalanceUnavailable,
    /// Deposit recognized but the signature page came back empty
    NoNewSignatures,
    /// Deposit recognized but no decoded transfer targeted our address
    NoSenders,
    /// Deposit recognized but the balance does not clear the fee reserve
    BelowFeeReserve,
    /// Listing, decoding, or submission failed after the balance was read
    DepositHandlingFailed,
    /// Funds forwarded to a randomly selected depositor
    Forwarded {
        recipient: Pubkey,
        lamports: u64,
        signature: Signature,
    },
}

/// Monitoring loop over a single wallet address
pub struct Monitor<C> {
    chain: C,
    wallet: WalletIdentity,
    config: MonitorConfig,
    state: CycleState,
    rng: StdRng,
    consecutive_failures: u32,
}

impl<C: ChainClient> Monitor<C> {
    /// Create a monitor with an optional RNG seed
    ///
    /// Pass a seed to make recipient selection deterministic in tests;
    /// production callers pass `None`.
    pub fn new(chain: C, wallet: WalletIdentity, config: MonitorConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            chain,
            wallet,
            config,
            state: CycleState::default(),
            rng,
            consecutive_failures: 0,
        }
    }

    /// Current loop state
    pub fn state(&self) -> &CycleState {
        &self.state
    }

    /// Run cycles until the cancellation token is triggered
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            "Monitoring {} every {}s (fee reserve {} lamports)",
            self.wallet.pubkey(),
            self.config.poll_interval_secs,
            self.config.fee_reserve_lamports
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Monitor shutting down");
                return;
            }

            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.current_interval()) => {}
                _ = shutdown.cancelled() => {
                    info!("Monitor shutting down");
                    return;
                }
            }
        }
    }

    /// Execute exactly one cycle; failures never escape
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let balance = match self.chain.get_balance(&self.wallet.pubkey()).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!("Balance query failed, skipping cycle: {}", e);
                self.consecutive_failures += 1;
                return CycleOutcome::BalanceUnavailable;
            }
        };

        let outcome = if balance > self.state.previous_balance {
            let received = balance - self.state.previous_balance;
            info!("Received {} SOL", lamports_to_sol(received));

            match self.handle_deposit(balance).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Deposit handling failed: {}", e);
                    CycleOutcome::DepositHandlingFailed
                }
            }
        } else {
            CycleOutcome::NoDeposit
        };

        // Unconditional after a successful balance read, even when the
        // deposit steps above failed.
        self.state.previous_balance = balance;

        match outcome {
            CycleOutcome::DepositHandlingFailed => self.consecutive_failures += 1,
            _ => self.consecutive_failures = 0,
        }

        outcome
    }

    /// Scan new history and forward the balance to one depositor
    async fn handle_deposit(&mut self, balance: u64) -> Result<CycleOutcome> {
        let address = self.wallet.pubkey();

        let signatures = self
            .chain
            .list_signatures(&address, self.state.last_checked_signature.as_ref())
            .await?;

        if signatures.is_empty() {
            return Ok(CycleOutcome::NoNewSignatures);
        }

        // Advance the cursor before fetching: the page is consumed whether
        // or not the transactions inside yield any senders.
        self.state.last_checked_signature = Some(signatures[0]);

        let mut senders = Vec::new();
        for signature in &signatures {
            let instructions = self.chain.get_decoded_transaction(signature).await?;
            for instruction in instructions {
                if let DecodedInstruction::Transfer {
                    source,
                    destination,
                    lamports,
                } = instruction
                {
                    if destination == address {
                        info!(
                            "Inbound transfer: {} lamports from {} ({})",
                            lamports, source, signature
                        );
                        senders.push(source);
                    }
                }
            }
        }

        if senders.is_empty() {
            return Ok(CycleOutcome::NoSenders);
        }

        let recipient = self.pick_recipient(&senders);

        if balance <= self.config.fee_reserve_lamports {
            info!(
                "Balance {} does not clear the fee reserve, not forwarding",
                balance
            );
            return Ok(CycleOutcome::BelowFeeReserve);
        }
        let amount = balance - self.config.fee_reserve_lamports;

        info!(
            "Sending {} SOL to random sender: {}",
            lamports_to_sol(amount),
            recipient
        );

        let signature = self
            .chain
            .submit_transfer(self.wallet.keypair(), &recipient, amount)
            .await?;

        info!("Sent funds: {}", signature);

        Ok(CycleOutcome::Forwarded {
            recipient,
            lamports: amount,
            signature,
        })
    }

    /// Pick one sender uniformly at random
    fn pick_recipient(&mut self, senders: &[Pubkey]) -> Pubkey {
        senders[self.rng.gen_range(0..senders.len())]
    }

    /// Sleep duration for the next tick, stretched while degraded
    fn current_interval(&self) -> Duration {
        if self.consecutive_failures >= self.config.degraded_after_failures {
            self.config.degraded_interval()
        } else {
            self.config.poll_interval()
        }
    }
}
