//! Per-operation form controllers and the toolkit that owns them.
//!
//! A controller keeps the raw field values for one operation. `submit`
//! validates, hands the operation to the shared simulator and turns the result
//! into a `Notice`. Fields listed in `cleared_on_success` are wiped only when
//! the transaction succeeds.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info};

use crate::config::Config;
use crate::executor::{self, ExecutionError, OperationExecutor};
use crate::simulator::{SubmitOutcome, TransactionSimulator};
use crate::tx_log::{new_shared, SharedTransactionLog};
use crate::types::{Operation, TransactionRecord, TxKind};
use crate::validation::{cleared_on_success, validate, FormFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeVariant {
    Default,
    Destructive,
}

/// User-facing result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub variant: NoticeVariant,
}

impl Notice {
    pub(crate) fn info(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            variant: NoticeVariant::Default,
        }
    }

    pub(crate) fn destructive(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            variant: NoticeVariant::Destructive,
        }
    }

    pub fn is_destructive(&self) -> bool {
        self.variant == NoticeVariant::Destructive
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

fn success_notice(op: &Operation) -> Notice {
    let amount = op.amount().map(|a| a.to_string()).unwrap_or_default();
    match op {
        Operation::Mint { .. } => {
            Notice::info("Mint Successful", format!("Successfully minted {amount} tokens"))
        }
        Operation::Transfer { .. } => Notice::info(
            "Transfer Successful",
            format!("Successfully transferred {amount} tokens"),
        ),
        Operation::Burn { .. } => {
            Notice::info("Burn Successful", format!("Successfully burned {amount} tokens"))
        }
        Operation::Close { .. } => Notice::info(
            "Account Closed",
            "Successfully closed token account and reclaimed SOL",
        ),
        Operation::SetAuthority { authority_kind, .. } => Notice::info(
            "Authority Updated",
            format!("Successfully updated {authority_kind} authority"),
        ),
        Operation::Approve { .. } => Notice::info(
            "Approval Successful",
            format!("Successfully approved {amount} tokens to delegate"),
        ),
        Operation::Revoke { .. } => Notice::info(
            "Revoke Successful",
            "Successfully revoked all delegated authority",
        ),
        Operation::Freeze { .. } => {
            Notice::info("Account Frozen", "Successfully froze token account")
        }
        Operation::Thaw { .. } => {
            Notice::info("Account Thawed", "Successfully thawed token account")
        }
    }
}

fn failure_notice(kind: TxKind, error: &ExecutionError) -> Notice {
    let (title, hint) = match kind {
        TxKind::Mint => ("Mint Failed", "Transaction failed. Please try again."),
        TxKind::Transfer => (
            "Transfer Failed",
            "Transaction failed. Please check balances and try again.",
        ),
        TxKind::Burn => (
            "Burn Failed",
            "Transaction failed. Please check token balance and try again.",
        ),
        TxKind::Close => (
            "Close Failed",
            "Failed to close account. Ensure the account is empty.",
        ),
        TxKind::SetAuthority => (
            "Authority Update Failed",
            "Failed to update authority. Check permissions.",
        ),
        TxKind::Approve => ("Approval Failed", "Failed to approve delegate"),
        TxKind::Revoke => ("Revoke Failed", "Failed to revoke delegate"),
        TxKind::Freeze => (
            "Freeze Failed",
            "Failed to freeze account. Check freeze authority.",
        ),
        TxKind::Thaw => (
            "Thaw Failed",
            "Failed to thaw account. Check freeze authority.",
        ),
    };
    match error {
        ExecutionError::SimulatedFailure { .. } => Notice::destructive(title, hint),
        other => Notice::destructive(title, format!("{hint} ({other})")),
    }
}

#[derive(Debug)]
pub struct FormController {
    kind: TxKind,
    fields: Mutex<FormFields>,
    in_flight: AtomicUsize,
    simulator: Arc<TransactionSimulator>,
}

impl FormController {
    pub fn new(kind: TxKind, simulator: Arc<TransactionSimulator>) -> Self {
        Self {
            kind,
            fields: Mutex::new(FormFields::new()),
            in_flight: AtomicUsize::new(0),
            simulator,
        }
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    fn fields_guard(&self) -> MutexGuard<'_, FormFields> {
        match self.fields.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_field(&self, name: &str, value: &str) {
        self.fields_guard().set(name, value);
    }

    pub fn field(&self, name: &str) -> Option<String> {
        self.fields_guard().get(name).map(str::to_string)
    }

    pub fn fields(&self) -> FormFields {
        self.fields_guard().clone()
    }

    /// Number of submissions still awaiting their executor.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight() > 0
    }

    /// Validate the current fields without submitting.
    pub fn preview(&self) -> Result<Operation, crate::validation::ValidationError> {
        validate(self.kind, &self.fields_guard())
    }

    pub async fn submit(&self) -> Notice {
        let op = match self.preview() {
            Ok(op) => op,
            Err(e) => {
                debug!(kind=%self.kind, error=%e, "Form rejected");
                return Notice::destructive(e.title(), e.to_string());
            }
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _loading = scopeguard::guard(&self.in_flight, |n| {
            n.fetch_sub(1, Ordering::SeqCst);
        });

        match self.simulator.submit(op.clone()).await {
            Ok(SubmitOutcome::Confirmed { .. }) => {
                let mut fields = self.fields_guard();
                for name in cleared_on_success(self.kind) {
                    fields.clear(name);
                }
                success_notice(&op)
            }
            Ok(SubmitOutcome::Failed { error, .. }) => failure_notice(self.kind, &error),
            Err(e) => {
                error!(kind=%self.kind, error=%e, "Transaction log rejected update");
                Notice::destructive("Error", "An unexpected error occurred")
            }
        }
    }
}

/// Every operation form over one shared log.
#[derive(Debug)]
pub struct Toolkit {
    log: SharedTransactionLog,
    controllers: BTreeMap<&'static str, FormController>,
}

impl Toolkit {
    pub fn new(executor: Arc<dyn OperationExecutor>, history_limit: usize) -> Self {
        let log = new_shared(history_limit);
        let simulator = Arc::new(TransactionSimulator::new(log, executor));
        Self::with_simulator(simulator)
    }

    pub fn with_simulator(simulator: Arc<TransactionSimulator>) -> Self {
        let log = simulator.log().clone();
        let controllers = TxKind::ALL
            .into_iter()
            .map(|kind| (kind.as_str(), FormController::new(kind, simulator.clone())))
            .collect();
        Self { log, controllers }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ExecutionError> {
        let executor = executor::from_config(cfg)?;
        info!(executor=?cfg.executor, network=?cfg.network, "Toolkit ready");
        Ok(Self::new(executor, cfg.history_limit))
    }

    pub fn controller(&self, kind: TxKind) -> &FormController {
        // Populated for every kind in `with_simulator`.
        &self.controllers[kind.as_str()]
    }

    pub fn log(&self) -> &SharedTransactionLog {
        &self.log
    }

    /// Snapshot of the display view, newest first.
    pub async fn recent(&self) -> Vec<TransactionRecord> {
        self.log.lock().await.recent().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionResult;
    use std::future::Future;
    use std::pin::Pin;

    const A: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
    const B: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    #[derive(Debug)]
    struct Fixed(bool);

    impl OperationExecutor for Fixed {
        fn execute<'a>(
            &'a self,
            op: &'a Operation,
        ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>> {
            let ok = self.0;
            let kind = op.kind();
            Box::pin(async move {
                if ok {
                    Ok("sig".to_string())
                } else {
                    Err(ExecutionError::SimulatedFailure { kind })
                }
            })
        }
    }

    fn fill_mint(c: &FormController) {
        c.set_field("mint", A);
        c.set_field("amount", "1000");
        c.set_field("destination", B);
        c.set_field("decimals", "6");
    }

    #[tokio::test]
    async fn success_clears_operation_fields() {
        let toolkit = Toolkit::new(Arc::new(Fixed(true)), 5);
        let mint = toolkit.controller(TxKind::Mint);
        fill_mint(mint);

        let notice = mint.submit().await;
        assert_eq!(notice.title, "Mint Successful");
        assert_eq!(notice.description, "Successfully minted 1000 tokens");
        assert!(!notice.is_destructive());
        assert_eq!(mint.field("amount"), None);
        assert_eq!(mint.field("destination"), None);
        assert_eq!(mint.field("mint").as_deref(), Some(A));
        assert_eq!(mint.field("decimals").as_deref(), Some("6"));
        assert!(!mint.is_loading());
    }

    #[tokio::test]
    async fn failure_preserves_fields() {
        let toolkit = Toolkit::new(Arc::new(Fixed(false)), 5);
        let close = toolkit.controller(TxKind::Close);
        close.set_field("account", A);
        close.set_field("destination", B);

        let notice = close.submit().await;
        assert_eq!(notice.title, "Close Failed");
        assert!(notice.is_destructive());
        assert_eq!(close.field("account").as_deref(), Some(A));
        assert_eq!(close.field("destination").as_deref(), Some(B));
        assert_eq!(toolkit.recent().await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_form_leaves_no_record() {
        let toolkit = Toolkit::new(Arc::new(Fixed(true)), 5);
        let transfer = toolkit.controller(TxKind::Transfer);
        transfer.set_field("mint", A);
        transfer.set_field("source", B);
        transfer.set_field("destination", B);
        transfer.set_field("amount", "3");

        let notice = transfer.submit().await;
        assert_eq!(notice.title, "Invalid Transfer");
        assert!(notice.is_destructive());
        assert!(toolkit.log().lock().await.is_empty());
        assert_eq!(transfer.field("amount").as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn set_authority_notice_names_the_authority() {
        let toolkit = Toolkit::new(Arc::new(Fixed(true)), 5);
        let c = toolkit.controller(TxKind::SetAuthority);
        c.set_field("account", A);
        c.set_field("authority-type", "freeze");
        c.set_field("current-authority", B);
        c.set_field("new-authority", A);

        let notice = c.submit().await;
        assert_eq!(notice.description, "Successfully updated freeze authority");
        assert_eq!(c.field("new-authority"), None);
        assert_eq!(c.field("authority-type").as_deref(), Some("freeze"));
    }

    #[test]
    fn non_simulated_failures_carry_the_cause() {
        let n = failure_notice(TxKind::Transfer, &ExecutionError::Rpc("node is behind".into()));
        assert_eq!(n.title, "Transfer Failed");
        assert!(n.description.ends_with("(RPC send failed: node is behind)"));
    }
}
