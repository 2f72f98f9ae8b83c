//! Transaction lifecycle driver.
//!
//! `submit` prepends a pending record, awaits the executor without holding the
//! log lock, then resolves that one record to success or error.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::executor::{ExecutionError, OperationExecutor};
use crate::tx_log::{LogError, SharedTransactionLog};
use crate::types::{Operation, TxId, TxKind, TxStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Confirmed { id: TxId, kind: TxKind, signature: String },
    Failed { id: TxId, kind: TxKind, error: ExecutionError },
}

impl SubmitOutcome {
    pub fn id(&self) -> &TxId {
        match self {
            SubmitOutcome::Confirmed { id, .. } | SubmitOutcome::Failed { id, .. } => id,
        }
    }

    pub fn status(&self) -> TxStatus {
        match self {
            SubmitOutcome::Confirmed { .. } => TxStatus::Success,
            SubmitOutcome::Failed { .. } => TxStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Confirmed { .. })
    }
}

#[derive(Debug)]
pub struct TransactionSimulator {
    log: SharedTransactionLog,
    executor: Arc<dyn OperationExecutor>,
    ids: Mutex<fastrand::Rng>,
}

impl TransactionSimulator {
    pub fn new(log: SharedTransactionLog, executor: Arc<dyn OperationExecutor>) -> Self {
        Self {
            log,
            executor,
            ids: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Seeded record ids, for reproducible runs.
    pub fn with_id_seed(mut self, seed: u64) -> Self {
        self.ids = Mutex::new(fastrand::Rng::with_seed(seed));
        self
    }

    pub fn log(&self) -> &SharedTransactionLog {
        &self.log
    }

    fn next_id(&self) -> TxId {
        let mut rng = match self.ids.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        TxId::generate(&mut rng)
    }

    pub async fn submit(&self, op: Operation) -> Result<SubmitOutcome, LogError> {
        let kind = op.kind();

        let id = {
            let mut log = self.log.lock().await;
            let mut id = self.next_id();
            while log.contains(&id) {
                id = self.next_id();
            }
            log.record_pending(id, op.clone())?
        };
        info!(kind=%kind, id=%id.abbreviated(), "Transaction pending");

        let result = self.executor.execute(&op).await;

        let outcome = {
            let mut log = self.log.lock().await;
            match result {
                Ok(signature) => {
                    log.resolve(&id, TxStatus::Success, Some(signature.clone()), None)?;
                    SubmitOutcome::Confirmed {
                        id,
                        kind,
                        signature,
                    }
                }
                Err(error) => {
                    log.resolve(&id, TxStatus::Error, None, Some(error.to_string()))?;
                    SubmitOutcome::Failed { id, kind, error }
                }
            }
        };

        match &outcome {
            SubmitOutcome::Confirmed { id, signature, .. } => {
                info!(kind=%kind, id=%id.abbreviated(), sig=%signature, "Transaction succeeded")
            }
            SubmitOutcome::Failed { id, error, .. } => {
                warn!(kind=%kind, id=%id.abbreviated(), error=%error, "Transaction failed")
            }
        }
        debug!(kind=%kind, "Transaction resolved");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionResult;
    use crate::tx_log::new_shared;
    use crate::types::Address;
    use std::future::Future;
    use std::pin::Pin;

    #[derive(Debug)]
    struct AlwaysOk;

    impl OperationExecutor for AlwaysOk {
        fn execute<'a>(
            &'a self,
            _op: &'a Operation,
        ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>> {
            Box::pin(async { Ok("5igSig".to_string()) })
        }
    }

    #[derive(Debug)]
    struct AlwaysFail;

    impl OperationExecutor for AlwaysFail {
        fn execute<'a>(
            &'a self,
            op: &'a Operation,
        ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>> {
            let kind = op.kind();
            Box::pin(async move { Err(ExecutionError::SimulatedFailure { kind }) })
        }
    }

    fn freeze() -> Operation {
        Operation::Freeze {
            account: Address::parse("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU").unwrap(),
        }
    }

    #[tokio::test]
    async fn success_resolves_the_record() {
        let sim = TransactionSimulator::new(new_shared(5), Arc::new(AlwaysOk)).with_id_seed(1);
        let outcome = sim.submit(freeze()).await.unwrap();
        assert!(outcome.is_success());

        let log = sim.log().lock().await;
        let rec = log.get(outcome.id()).unwrap();
        assert_eq!(rec.status, TxStatus::Success);
        assert_eq!(rec.signature.as_deref(), Some("5igSig"));
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn failure_keeps_the_message() {
        let sim = TransactionSimulator::new(new_shared(5), Arc::new(AlwaysFail));
        let outcome = sim.submit(freeze()).await.unwrap();
        assert_eq!(outcome.status(), TxStatus::Error);

        let log = sim.log().lock().await;
        let rec = log.get(outcome.id()).unwrap();
        assert_eq!(rec.status, TxStatus::Error);
        assert!(rec.failure.as_deref().unwrap().contains("freeze"));
        assert_eq!(log.pending_count(), 0);
    }

    #[tokio::test]
    async fn ids_are_unique_across_submissions() {
        let sim = TransactionSimulator::new(new_shared(5), Arc::new(AlwaysOk)).with_id_seed(9);
        let mut ids = Vec::new();
        for _ in 0..20 {
            ids.push(sim.submit(freeze()).await.unwrap().id().clone());
        }
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids.dedup();
        assert_eq!(ids.len(), 20);
        assert_eq!(sim.log().lock().await.recent().count(), 5);
    }
}
