//! Solana RPC adapter
//!
//! Wraps the ledger RPC behind the `ChainClient` seam so the monitor loop
//! can be driven by a mock in tests. Each operation is independently
//! fallible and non-retrying; retries belong to the caller.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::parse_instruction::ParsedInstruction;
use solana_transaction_status::{
    EncodedTransaction, UiInstruction, UiMessage, UiParsedInstruction, UiTransactionEncoding,
};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Closed set of instruction classifications
///
/// Anything that is not a jsonParsed system-program transfer lands in
/// `Other`; the decoder never infers a transfer from instruction shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedInstruction {
    Transfer {
        source: Pubkey,
        destination: Pubkey,
        lamports: u64,
    },
    Other,
}

/// Ledger operations the monitor loop depends on
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current balance of `address` in lamports
    async fn get_balance(&self, address: &Pubkey) -> Result<u64>;

    /// Signatures touching `address`, newest first, one bounded page
    ///
    /// When `until` is set, only signatures strictly newer than it are
    /// returned.
    async fn list_signatures(
        &self,
        address: &Pubkey,
        until: Option<&Signature>,
    ) -> Result<Vec<Signature>>;

    /// Decoded instructions of a confirmed transaction
    async fn get_decoded_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Vec<DecodedInstruction>>;

    /// Submit a lamport transfer and wait for ledger confirmation
    async fn submit_transfer(
        &self,
        from: &Keypair,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<Signature>;
}

/// Production `ChainClient` backed by the Solana JSON-RPC API
pub struct RpcChainClient {
    rpc: RpcClient,
    commitment: CommitmentConfig,
    signature_page_limit: usize,
}

impl RpcChainClient {
    /// Connect to the given RPC endpoint with an explicit per-call timeout
    pub fn new(
        endpoint: String,
        timeout: std::time::Duration,
        commitment: CommitmentConfig,
        signature_page_limit: usize,
    ) -> Self {
        Self {
            rpc: RpcClient::new_with_timeout_and_commitment(endpoint, timeout, commitment),
            commitment,
            signature_page_limit,
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        Ok(self.rpc.get_balance(address).await?)
    }

    async fn list_signatures(
        &self,
        address: &Pubkey,
        until: Option<&Signature>,
    ) -> Result<Vec<Signature>> {
        let config = GetConfirmedSignaturesForAddress2Config {
            before: None,
            until: until.copied(),
            limit: Some(self.signature_page_limit),
            commitment: Some(self.commitment),
        };

        let statuses = self
            .rpc
            .get_signatures_for_address_with_config(address, config)
            .await?;

        debug!("Listed {} signatures for {}", statuses.len(), address);

        statuses
            .into_iter()
            .map(|s| {
                s.signature
                    .parse::<Signature>()
                    .map_err(|e| Error::InvalidSignature(format!("{}: {}", s.signature, e)))
            })
            .collect()
    }

    async fn get_decoded_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Vec<DecodedInstruction>> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };

        let transaction = self
            .rpc
            .get_transaction_with_config(signature, config)
            .await?;

        Ok(decode_transaction(&transaction.transaction.transaction))
    }

    async fn submit_transfer(
        &self,
        from: &Keypair,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<Signature> {
        debug!(
            "Executing transfer: {} lamports from {} to {}",
            lamports,
            from.pubkey(),
            to
        );

        let instruction = system_instruction::transfer(&from.pubkey(), to, lamports);

        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| Error::TransactionSend(format!("Failed to get blockhash: {}", e)))?;

        let transaction = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&from.pubkey()),
            &[from],
            blockhash,
        );

        let signature = self
            .rpc
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| Error::TransactionSend(format!("Transfer failed: {}", e)))?;

        info!(
            "Transfer complete: {} lamports to {} (sig: {})",
            lamports, to, signature
        );

        Ok(signature)
    }
}

/// Classify every instruction of an encoded transaction
fn decode_transaction(transaction: &EncodedTransaction) -> Vec<DecodedInstruction> {
    let EncodedTransaction::Json(ui_transaction) = transaction else {
        return Vec::new();
    };
    let UiMessage::Parsed(message) = &ui_transaction.message else {
        return Vec::new();
    };

    message.instructions.iter().map(classify).collect()
}

/// Classify a single instruction into the closed decoded set
fn classify(instruction: &UiInstruction) -> DecodedInstruction {
    match instruction {
        UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) => classify_parsed(parsed),
        _ => DecodedInstruction::Other,
    }
}

fn classify_parsed(instruction: &ParsedInstruction) -> DecodedInstruction {
    if instruction.program != "system" {
        return DecodedInstruction::Other;
    }
    if instruction.parsed.get("type").and_then(|t| t.as_str()) != Some("transfer") {
        return DecodedInstruction::Other;
    }

    let info = &instruction.parsed["info"];
    let source = info.get("source").and_then(|s| s.as_str());
    let destination = info.get("destination").and_then(|d| d.as_str());
    let lamports = info.get("lamports").and_then(|l| l.as_u64());

    match (source, destination, lamports) {
        (Some(source), Some(destination), Some(lamports)) => {
            match (source.parse::<Pubkey>(), destination.parse::<Pubkey>()) {
                (Ok(source), Ok(destination)) => DecodedInstruction::Transfer {
                    source,
                    destination,
                    lamports,
                },
                _ => DecodedInstruction::Other,
            }
        }
        _ => DecodedInstruction::Other,
    }
}

/// Convert lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(program: &str, value: serde_json::Value) -> UiInstruction {
        UiInstruction::Parsed(UiParsedInstruction::Parsed(ParsedInstruction {
            program: program.to_string(),
            program_id: "11111111111111111111111111111111".to_string(),
            parsed: value,
            stack_height: None,
        }))
    }

    #[test]
    fn test_classifies_system_transfer() {
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let instruction = parsed(
            "system",
            json!({
                "type": "transfer",
                "info": {
                    "source": source.to_string(),
                    "destination": destination.to_string(),
                    "lamports": 1_000_000u64,
                }
            }),
        );

        assert_eq!(
            classify(&instruction),
            DecodedInstruction::Transfer {
                source,
                destination,
                lamports: 1_000_000,
            }
        );
    }

    #[test]
    fn test_non_system_program_is_other() {
        let instruction = parsed(
            "spl-token",
            json!({
                "type": "transfer",
                "info": {
                    "source": Pubkey::new_unique().to_string(),
                    "destination": Pubkey::new_unique().to_string(),
                    "lamports": 5u64,
                }
            }),
        );
        assert_eq!(classify(&instruction), DecodedInstruction::Other);
    }

    #[test]
    fn test_non_transfer_type_is_other() {
        let instruction = parsed(
            "system",
            json!({
                "type": "createAccount",
                "info": { "newAccount": Pubkey::new_unique().to_string() }
            }),
        );
        assert_eq!(classify(&instruction), DecodedInstruction::Other);
    }

    #[test]
    fn test_malformed_transfer_info_is_other() {
        // Missing lamports
        let missing_amount = parsed(
            "system",
            json!({
                "type": "transfer",
                "info": {
                    "source": Pubkey::new_unique().to_string(),
                    "destination": Pubkey::new_unique().to_string(),
                }
            }),
        );
        assert_eq!(classify(&missing_amount), DecodedInstruction::Other);

        // Unparseable addresses
        let bad_address = parsed(
            "system",
            json!({
                "type": "transfer",
                "info": {
                    "source": "not-an-address",
                    "destination": "also-not",
                    "lamports": 1u64,
                }
            }),
        );
        assert_eq!(classify(&bad_address), DecodedInstruction::Other);
    }

    #[test]
    fn test_partially_decoded_is_other() {
        use solana_transaction_status::UiPartiallyDecodedInstruction;

        let instruction = UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(
            UiPartiallyDecodedInstruction {
                program_id: Pubkey::new_unique().to_string(),
                accounts: vec![],
                data: "3Bxs4h24hBtQy9rw".to_string(),
                stack_height: None,
            },
        ));
        assert_eq!(classify(&instruction), DecodedInstruction::Other);
    }

    #[test]
    fn test_lamports_to_sol() {
        assert_eq!(lamports_to_sol(1_000_000_000), 1.0);
        assert_eq!(lamports_to_sol(999_995), 0.000999995);
    }
}
