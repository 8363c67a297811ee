pub mod repo;

use tracing::{debug, error};
use uuid::Uuid;

use crate::db::{Store, StoreError};
use repo::{NewTransaction, OperationKind, Transaction};

/// Appends one ledger row. Failures are logged and returned; the product
/// mutation that triggered the append is not rolled back.
pub async fn record(
    store: &dyn Store,
    user_id: Uuid,
    product_id: Uuid,
    kind: OperationKind,
    amount: i64,
) -> Result<Transaction, StoreError> {
    let entry = NewTransaction {
        user_id,
        product_id,
        kind,
        amount,
    };
    match store.append_transaction(&entry).await {
        Ok(tx) => {
            debug!(tx_id = %tx.id, %product_id, ?kind, amount, "ledger entry appended");
            Ok(tx)
        }
        Err(e) => {
            error!(error = %e, %user_id, %product_id, ?kind, amount, "ledger append failed");
            Err(e)
        }
    }
}
