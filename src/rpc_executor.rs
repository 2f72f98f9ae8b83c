//! RpcExecutor: carries operations out on a Solana cluster.
//! - rotates over configured RPC endpoints (client per endpoint, built once)
//! - retry/backoff with jitter for blockhash fetch
//! - reads mint decimals / token-account mints from chain when the form has none
//! - builds the spl-token instruction, signs with the payer keypair, sends and confirms

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nonempty::NonEmpty;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    instruction::Instruction,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair, Signer},
    transaction::Transaction,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use spl_token::instruction::{self as token_ix, AuthorityType};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::executor::{ExecutionError, ExecutionResult, OperationExecutor};
use crate::types::{Address, AuthorityKind, Operation, TxKind};

/// Chain data an operation needs beyond what the form carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainContext {
    /// Decimals of the mint involved.
    pub decimals: Option<u8>,
    /// Mint of the token account involved.
    pub account_mint: Option<Pubkey>,
}

pub struct RpcExecutor {
    payer: Arc<Keypair>,
    endpoints: NonEmpty<String>,
    clients: Vec<Arc<RpcClient>>,
    rotation: AtomicUsize,
    retry_attempts: usize,
}

impl std::fmt::Debug for RpcExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcExecutor")
            .field("payer", &self.payer.pubkey())
            .field("endpoints", &self.endpoints)
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

pub fn to_pubkey(addr: &Address) -> Result<Pubkey, ExecutionError> {
    Pubkey::from_str(addr.as_str()).map_err(|e| ExecutionError::InvalidPubkey(format!("{addr}: {e}")))
}

impl RpcExecutor {
    pub fn new(
        payer: Keypair,
        endpoints: NonEmpty<String>,
        timeout: Duration,
        retry_attempts: usize,
    ) -> Self {
        let clients = endpoints
            .iter()
            .map(|endpoint| {
                Arc::new(RpcClient::new_with_timeout_and_commitment(
                    endpoint.clone(),
                    timeout,
                    CommitmentConfig::confirmed(),
                ))
            })
            .collect();

        Self {
            payer: Arc::new(payer),
            endpoints,
            clients,
            rotation: AtomicUsize::new(0),
            retry_attempts: retry_attempts.max(1),
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ExecutionError> {
        let path = cfg
            .keypair_path
            .as_deref()
            .ok_or_else(|| ExecutionError::Keypair("keypair_path is not configured".to_string()))?;
        let payer = read_keypair_file(path)
            .map_err(|e| ExecutionError::Keypair(format!("failed to read {path}: {e}")))?;
        info!(payer=%payer.pubkey(), endpoints=?cfg.rpc_endpoints(), "RPC executor ready");
        Ok(Self::new(
            payer,
            cfg.rpc_endpoints(),
            cfg.rpc_timeout(),
            cfg.rpc_retry_attempts,
        ))
    }

    pub fn payer(&self) -> Pubkey {
        self.payer.pubkey()
    }

    /// Next client in round-robin order, with its endpoint.
    fn next_client(&self) -> (Arc<RpcClient>, &str) {
        let idx = self.rotation.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        let endpoint = self
            .endpoints
            .get(idx)
            .map(String::as_str)
            .unwrap_or(self.endpoints.head.as_str());
        (self.clients[idx].clone(), endpoint)
    }

    async fn latest_blockhash(&self) -> Result<Hash, ExecutionError> {
        let mut last_err = None;

        for attempt in 0..self.retry_attempts {
            let (client, endpoint) = self.next_client();
            let retry_strategy = ExponentialBackoff::from_millis(50)
                .max_delay(Duration::from_millis(1000))
                .map(jitter)
                .take(3);

            match Retry::spawn(retry_strategy, || async {
                client.get_latest_blockhash().await.map_err(|e| e.to_string())
            })
            .await
            {
                Ok(hash) => return Ok(hash),
                Err(e) => {
                    debug!(attempt, endpoint, "Blockhash fetch failed: {}", e);
                    last_err = Some(e);
                }
            }
        }

        Err(ExecutionError::BlockhashFetch(format!(
            "all RPC endpoints failed: {}",
            last_err.unwrap_or_default()
        )))
    }

    async fn mint_decimals(&self, client: &RpcClient, mint: &Pubkey) -> Result<u8, ExecutionError> {
        let data = client
            .get_account_data(mint)
            .await
            .map_err(|e| ExecutionError::Rpc(e.to_string()))?;
        spl_token::state::Mint::unpack(&data)
            .map(|m| m.decimals)
            .map_err(|e| ExecutionError::AccountData {
                account: mint.to_string(),
                expected: "mint",
                reason: e.to_string(),
            })
    }

    async fn token_account_mint(
        &self,
        client: &RpcClient,
        account: &Pubkey,
    ) -> Result<Pubkey, ExecutionError> {
        let data = client
            .get_account_data(account)
            .await
            .map_err(|e| ExecutionError::Rpc(e.to_string()))?;
        spl_token::state::Account::unpack(&data)
            .map(|a| a.mint)
            .map_err(|e| ExecutionError::AccountData {
                account: account.to_string(),
                expected: "token",
                reason: e.to_string(),
            })
    }

    /// Fetch whatever chain data `op` needs.
    async fn chain_context(
        &self,
        client: &RpcClient,
        op: &Operation,
    ) -> Result<ChainContext, ExecutionError> {
        let ctx = match op {
            Operation::Mint { decimals, .. } => ChainContext {
                decimals: Some(*decimals),
                account_mint: None,
            },
            Operation::Transfer { mint, .. } | Operation::Burn { mint, .. } => ChainContext {
                decimals: Some(self.mint_decimals(client, &to_pubkey(mint)?).await?),
                account_mint: None,
            },
            Operation::Approve { account, .. } => {
                let mint = self.token_account_mint(client, &to_pubkey(account)?).await?;
                ChainContext {
                    decimals: Some(self.mint_decimals(client, &mint).await?),
                    account_mint: Some(mint),
                }
            }
            Operation::Freeze { account } | Operation::Thaw { account } => ChainContext {
                decimals: None,
                account_mint: Some(self.token_account_mint(client, &to_pubkey(account)?).await?),
            },
            Operation::Close { .. } | Operation::SetAuthority { .. } | Operation::Revoke { .. } => {
                ChainContext::default()
            }
        };
        Ok(ctx)
    }

    async fn submit(&self, op: &Operation) -> ExecutionResult {
        let kind = op.kind();
        let (client, endpoint) = self.next_client();
        let payer = self.payer.pubkey();

        let ctx = self.chain_context(&client, op).await?;
        let instructions = build_instructions(op, &payer, &ctx)?;
        let blockhash = self.latest_blockhash().await?;

        let tx = Transaction::new_signed_with_payer(
            &instructions,
            Some(&payer),
            &[self.payer.as_ref()],
            blockhash,
        );

        info!(kind=%kind, endpoint, instructions=instructions.len(), "Sending transaction");
        match client.send_and_confirm_transaction(&tx).await {
            Ok(sig) => {
                info!(kind=%kind, sig=%sig, "Transaction confirmed");
                Ok(sig.to_string())
            }
            Err(e) => {
                warn!(kind=%kind, endpoint, error=%e, "Transaction failed");
                Err(ExecutionError::Rpc(e.to_string()))
            }
        }
    }
}

impl OperationExecutor for RpcExecutor {
    fn execute<'a>(
        &'a self,
        op: &'a Operation,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>> {
        Box::pin(self.submit(op))
    }
}

fn require(value: Option<u8>, kind: TxKind, what: &str) -> Result<u8, ExecutionError> {
    value.ok_or_else(|| ExecutionError::InstructionBuild {
        kind,
        reason: format!("{what} unknown"),
    })
}

fn require_signer(field: &'static str, addr: &Pubkey, payer: &Pubkey) -> Result<(), ExecutionError> {
    if addr == payer {
        Ok(())
    } else {
        Err(ExecutionError::SignerMismatch {
            field,
            payer: payer.to_string(),
        })
    }
}

/// Build the instruction list for `op` with `payer` as fee payer and signing authority.
pub fn build_instructions(
    op: &Operation,
    payer: &Pubkey,
    ctx: &ChainContext,
) -> Result<Vec<Instruction>, ExecutionError> {
    let kind = op.kind();
    let program = spl_token::id();
    let built = |r: Result<Instruction, solana_sdk::program_error::ProgramError>| {
        r.map_err(|e| ExecutionError::InstructionBuild {
            kind,
            reason: e.to_string(),
        })
    };
    let account_mint = || {
        ctx.account_mint.ok_or_else(|| ExecutionError::InstructionBuild {
            kind,
            reason: "token account mint unknown".to_string(),
        })
    };

    let ixs = match op {
        Operation::Mint { mint, destination, amount, decimals } => {
            let mint = to_pubkey(mint)?;
            let wallet = to_pubkey(destination)?;
            let ata = get_associated_token_address(&wallet, &mint);
            vec![
                create_associated_token_account_idempotent(payer, &wallet, &mint, &program),
                built(token_ix::mint_to_checked(
                    &program,
                    &mint,
                    &ata,
                    payer,
                    &[],
                    spl_token::ui_amount_to_amount(*amount, *decimals),
                    *decimals,
                ))?,
            ]
        }
        Operation::Transfer { mint, source, destination, amount } => {
            let mint = to_pubkey(mint)?;
            let source = to_pubkey(source)?;
            let destination = to_pubkey(destination)?;
            require_signer("source", &source, payer)?;
            let decimals = require(ctx.decimals, kind, "mint decimals")?;
            let source_ata = get_associated_token_address(&source, &mint);
            let destination_ata = get_associated_token_address(&destination, &mint);
            vec![
                create_associated_token_account_idempotent(payer, &destination, &mint, &program),
                built(token_ix::transfer_checked(
                    &program,
                    &source_ata,
                    &mint,
                    &destination_ata,
                    &source,
                    &[],
                    spl_token::ui_amount_to_amount(*amount, decimals),
                    decimals,
                ))?,
            ]
        }
        Operation::Burn { mint, account, amount } => {
            let decimals = require(ctx.decimals, kind, "mint decimals")?;
            vec![built(token_ix::burn_checked(
                &program,
                &to_pubkey(account)?,
                &to_pubkey(mint)?,
                payer,
                &[],
                spl_token::ui_amount_to_amount(*amount, decimals),
                decimals,
            ))?]
        }
        Operation::Close { account, destination } => vec![built(token_ix::close_account(
            &program,
            &to_pubkey(account)?,
            &to_pubkey(destination)?,
            payer,
            &[],
        ))?],
        Operation::SetAuthority {
            account,
            authority_kind,
            current_authority,
            new_authority,
        } => {
            let current = to_pubkey(current_authority)?;
            require_signer("current-authority", &current, payer)?;
            let new_authority = new_authority.as_ref().map(to_pubkey).transpose()?;
            let authority_type = match authority_kind {
                AuthorityKind::Mint => AuthorityType::MintTokens,
                AuthorityKind::Freeze => AuthorityType::FreezeAccount,
                AuthorityKind::Close => AuthorityType::CloseAccount,
            };
            vec![built(token_ix::set_authority(
                &program,
                &to_pubkey(account)?,
                new_authority.as_ref(),
                authority_type,
                &current,
                &[],
            ))?]
        }
        Operation::Approve { account, delegate, amount } => {
            let decimals = require(ctx.decimals, kind, "mint decimals")?;
            vec![built(token_ix::approve_checked(
                &program,
                &to_pubkey(account)?,
                &account_mint()?,
                &to_pubkey(delegate)?,
                payer,
                &[],
                spl_token::ui_amount_to_amount(*amount, decimals),
                decimals,
            ))?]
        }
        Operation::Revoke { account } => vec![built(token_ix::revoke(
            &program,
            &to_pubkey(account)?,
            payer,
            &[],
        ))?],
        Operation::Freeze { account } => vec![built(token_ix::freeze_account(
            &program,
            &to_pubkey(account)?,
            &account_mint()?,
            payer,
            &[],
        ))?],
        Operation::Thaw { account } => vec![built(token_ix::thaw_account(
            &program,
            &to_pubkey(account)?,
            &account_mint()?,
            payer,
            &[],
        ))?],
    };
    Ok(ixs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address_of(pk: &Pubkey) -> Address {
        Address::parse(&pk.to_string()).unwrap()
    }

    fn unique() -> Address {
        address_of(&Pubkey::new_unique())
    }

    #[test]
    fn mint_creates_destination_ata_then_mints() {
        let payer = Pubkey::new_unique();
        let op = Operation::Mint {
            mint: unique(),
            destination: unique(),
            amount: 2.5,
            decimals: 6,
        };
        let ixs = build_instructions(&op, &payer, &ChainContext::default()).unwrap();
        assert_eq!(ixs.len(), 2);
        assert_eq!(ixs[0].program_id, spl_associated_token_account::id());
        assert_eq!(ixs[1].program_id, spl_token::id());
    }

    #[test]
    fn transfer_requires_payer_as_source() {
        let payer = Pubkey::new_unique();
        let ctx = ChainContext {
            decimals: Some(9),
            account_mint: None,
        };
        let foreign = Operation::Transfer {
            mint: unique(),
            source: unique(),
            destination: unique(),
            amount: 1.0,
        };
        assert!(matches!(
            build_instructions(&foreign, &payer, &ctx),
            Err(ExecutionError::SignerMismatch { field: "source", .. })
        ));

        let own = Operation::Transfer {
            mint: unique(),
            source: address_of(&payer),
            destination: unique(),
            amount: 1.0,
        };
        let ixs = build_instructions(&own, &payer, &ctx).unwrap();
        assert_eq!(ixs.last().unwrap().program_id, spl_token::id());
    }

    #[test]
    fn amount_operations_need_decimals() {
        let payer = Pubkey::new_unique();
        let op = Operation::Burn {
            mint: unique(),
            account: unique(),
            amount: 1.0,
        };
        assert!(matches!(
            build_instructions(&op, &payer, &ChainContext::default()),
            Err(ExecutionError::InstructionBuild { kind: TxKind::Burn, .. })
        ));
    }

    #[test]
    fn freeze_and_thaw_need_the_account_mint() {
        let payer = Pubkey::new_unique();
        let op = Operation::Freeze { account: unique() };
        assert!(build_instructions(&op, &payer, &ChainContext::default()).is_err());

        let ctx = ChainContext {
            decimals: None,
            account_mint: Some(Pubkey::new_unique()),
        };
        for op in [Operation::Freeze { account: unique() }, Operation::Thaw { account: unique() }] {
            let ixs = build_instructions(&op, &payer, &ctx).unwrap();
            assert_eq!(ixs.len(), 1);
            assert_eq!(ixs[0].program_id, spl_token::id());
        }
    }

    #[test]
    fn set_authority_signer_and_revocation() {
        let payer = Pubkey::new_unique();
        let op = Operation::SetAuthority {
            account: unique(),
            authority_kind: AuthorityKind::Mint,
            current_authority: address_of(&payer),
            new_authority: None,
        };
        assert_eq!(
            build_instructions(&op, &payer, &ChainContext::default())
                .unwrap()
                .len(),
            1
        );

        let op = Operation::SetAuthority {
            account: unique(),
            authority_kind: AuthorityKind::Close,
            current_authority: unique(),
            new_authority: Some(unique()),
        };
        assert!(matches!(
            build_instructions(&op, &payer, &ChainContext::default()),
            Err(ExecutionError::SignerMismatch { field: "current-authority", .. })
        ));
    }

    #[test]
    fn base58_that_is_not_a_pubkey_is_rejected() {
        // Right alphabet and length, but decodes to more than 32 bytes.
        let addr = Address::parse(&"z".repeat(44)).unwrap();
        assert!(matches!(to_pubkey(&addr), Err(ExecutionError::InvalidPubkey(_))));
    }

    #[test]
    fn clients_rotate() {
        let endpoints = NonEmpty::from_vec(vec![
            "http://127.0.0.1:8899".to_string(),
            "http://127.0.0.1:8898".to_string(),
        ])
        .unwrap();
        let exec = RpcExecutor::new(Keypair::new(), endpoints, Duration::from_secs(1), 0);
        assert_eq!(exec.retry_attempts, 1);
        let (_, first) = exec.next_client();
        let (_, second) = exec.next_client();
        let (_, third) = exec.next_client();
        assert_eq!(first, "http://127.0.0.1:8899");
        assert_eq!(second, "http://127.0.0.1:8898");
        assert_eq!(third, first);
    }

    #[test]
    fn missing_keypair_is_reported() {
        let cfg = Config {
            keypair_path: Some("/nonexistent/payer.json".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            RpcExecutor::from_config(&cfg),
            Err(ExecutionError::Keypair(_))
        ));
    }
}
