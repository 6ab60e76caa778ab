use thiserror::Error;
use uuid::Uuid;

use crate::store::ReservationStore;

/// Minimum wallet balance (in cents) required to attempt a reservation
pub const MIN_BALANCE_CENTS: i64 = 500;

#[derive(Debug, Error)]
pub enum BalanceGateError {
    #[error("wallet unavailable")]
    WalletUnavailable,

    #[error("insufficient funds: {balance_cents} cents")]
    InsufficientFunds { balance_cents: i64 },
}

/// Reads the wallet balance fresh (never cached across requests) and
/// enforces the minimum-funds precondition. Advisory: the reserve
/// transaction re-checks the balance to close the check/commit race.
pub async fn ensure_min_balance(
    store: &dyn ReservationStore,
    user_id: Uuid,
) -> Result<i64, BalanceGateError> {
    let balance = store
        .wallet_balance(user_id)
        .await
        .map_err(|_| BalanceGateError::WalletUnavailable)?
        .ok_or(BalanceGateError::WalletUnavailable)?;

    if balance < MIN_BALANCE_CENTS {
        tracing::debug!(balance_cents = balance, "Balance gate failed");
        return Err(BalanceGateError::InsufficientFunds {
            balance_cents: balance,
        });
    }

    Ok(balance)
}
