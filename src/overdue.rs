use solana_program::clock::UnixTimestamp;
use std::convert::TryFrom;

use crate::{
    error::MarketplaceError,
    state::{ClosureReason, Item, Marketplace, RentalAgreement, Settlement, SECONDS_PER_MONTH},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Resolution {
    NotOverdue,
    /// The rental was terminated and the deposit goes to the item owner
    Resolved(Settlement),
}

/// Installments that should have been paid by `now`: whole months elapsed
/// since the agreement started, never more than the rental duration.
pub fn installments_expected(
    agreement: &RentalAgreement,
    rental_duration: u64,
    now: UnixTimestamp,
) -> u64 {
    let elapsed = now.saturating_sub(agreement.start_time).max(0);
    u64::try_from(elapsed / SECONDS_PER_MONTH)
        .unwrap_or_default()
        .min(rental_duration)
}

/// Past the next deadline and behind the schedule implied by wall-clock time.
pub fn is_overdue(item: &Item, agreement: &RentalAgreement, now: UnixTimestamp) -> bool {
    let expected_rent = installments_expected(agreement, item.rental_duration, now)
        .saturating_mul(item.rental_price);

    now > agreement.next_payment_due && agreement.total_rent_paid < expected_rent
}

impl Marketplace {
    pub fn is_overdue(&self, item_id: u64, now: UnixTimestamp) -> Result<bool, MarketplaceError> {
        let item = self.registry.get_item(item_id)?;
        if !item.is_rented() {
            return Err(MarketplaceError::NoActiveAgreement);
        }
        let agreement = self
            .ledger
            .get_agreement(item_id)
            .ok_or(MarketplaceError::NoActiveAgreement)?;

        Ok(is_overdue(item, agreement, now))
    }

    /// Terminates a delinquent rental and forfeits its deposit to the owner.
    /// A no-op while the renter is on schedule.
    pub fn check_and_resolve_overdue(
        &mut self,
        item_id: u64,
        now: UnixTimestamp,
    ) -> Result<Resolution, MarketplaceError> {
        if !self.is_overdue(item_id, now)? {
            return Ok(Resolution::NotOverdue);
        }

        self.close_agreement(item_id, ClosureReason::Forfeited, now)
            .map(Resolution::Resolved)
    }
}
