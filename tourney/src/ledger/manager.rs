//! Balance ledger operating inside one unit of work.

use super::{
    errors::{LedgerError, LedgerResult},
    models::{Balance, NewOperation, OperationKind, PointsOperation, Posting, UserId},
};
use crate::db::StoreTransaction;

/// Credits, debits and reads of point balances.
///
/// Every mutation appends exactly one [`PointsOperation`]. Nothing is visible
/// to other callers until the enclosing unit of work commits.
pub struct BalanceLedger<'t> {
    tx: &'t mut dyn StoreTransaction,
}

impl<'t> BalanceLedger<'t> {
    pub fn new(tx: &'t mut dyn StoreTransaction) -> Self {
        Self { tx }
    }

    /// Increase a balance, creating it at zero first if absent.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - `amount` is not positive
    /// * `LedgerError::BalanceOverflow` - the new balance does not fit in an `i64`
    pub async fn credit(
        &mut self,
        user_id: UserId,
        amount: i64,
        posting: Posting,
    ) -> LedgerResult<Balance> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        // Bound and update in one statement so concurrent credits cannot both pass
        let balance = self
            .tx
            .add_to_balance(user_id, amount)
            .await?
            .ok_or(LedgerError::BalanceOverflow(user_id))?;
        self.append(&balance, OperationKind::Credit, amount, posting)
            .await?;

        Ok(balance)
    }

    /// Decrease a balance.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - `amount` is not positive
    /// * `LedgerError::InsufficientFunds` - balance absent or smaller than `amount`
    pub async fn debit(
        &mut self,
        user_id: UserId,
        amount: i64,
        posting: Posting,
    ) -> LedgerResult<Balance> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        // Check and update in one statement so concurrent debits cannot both pass
        let balance = match self.tx.subtract_from_balance(user_id, amount).await? {
            Some(balance) => balance,
            None => {
                let available = self
                    .tx
                    .fetch_balance(user_id)
                    .await?
                    .map_or(0, |balance| balance.amount);
                return Err(LedgerError::InsufficientFunds {
                    user_id,
                    available,
                    required: amount,
                });
            }
        };

        self.append(&balance, OperationKind::Debit, amount, posting)
            .await?;

        Ok(balance)
    }

    /// Current balance of a user.
    pub async fn get(&mut self, user_id: UserId) -> LedgerResult<Balance> {
        self.tx
            .fetch_balance(user_id)
            .await?
            .ok_or(LedgerError::BalanceNotFound(user_id))
    }

    /// Balances of the users in `user_ids` that have one, locked for the rest
    /// of the unit of work.
    ///
    /// Callers compare the result length with the request to detect missing
    /// accounts.
    pub async fn get_many(&mut self, user_ids: &[UserId]) -> LedgerResult<Vec<Balance>> {
        Ok(self.tx.fetch_balances(user_ids).await?)
    }

    /// Recent audit entries, newest first.
    pub async fn operations(
        &mut self,
        user_id: UserId,
        limit: i64,
    ) -> LedgerResult<Vec<PointsOperation>> {
        Ok(self.tx.fetch_operations(user_id, limit).await?)
    }

    async fn append(
        &mut self,
        balance: &Balance,
        kind: OperationKind,
        amount: i64,
        posting: Posting,
    ) -> LedgerResult<PointsOperation> {
        let operation = self
            .tx
            .insert_operation(NewOperation {
                user_id: balance.user_id,
                kind,
                amount,
                balance_after: balance.amount,
                reason: posting.reason,
                tournament_id: posting.tournament_id,
            })
            .await?;

        log::debug!(
            "{} {} points for user {} ({}), balance now {}",
            kind,
            amount,
            balance.user_id,
            posting.reason,
            balance.amount
        );

        Ok(operation)
    }
}
