use solana_program::{clock::UnixTimestamp, pubkey::Pubkey};

use crate::{
    error::MarketplaceError,
    state::{ClosureReason, Marketplace, RentalAgreement, Settlement},
};

/// Result of an accepted rent payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// Agreement as it stands after the payment
    pub agreement: RentalAgreement,
    /// Deposit refund, present when this payment settled the full obligation
    pub settlement: Option<Settlement>,
}

impl Marketplace {
    /// Applies a rent payment to the item's active agreement.
    ///
    /// Any amount up to the remaining obligation is accepted; the schedule
    /// advances by whole installments only. The payment that meets the full
    /// obligation also completes the rental.
    pub fn pay_rent(
        &mut self,
        item_id: u64,
        renter: &Pubkey,
        amount: u64,
        now: UnixTimestamp,
    ) -> Result<PaymentReceipt, MarketplaceError> {
        let item = self.registry.get_item(item_id)?;
        if !item.is_rented() {
            return Err(MarketplaceError::NoActiveAgreement);
        }
        let rental_price = item.rental_price;
        let obligation = item.total_obligation();

        let agreement = self.ledger.active_agreement_mut(item_id)?;
        if agreement.renter != *renter {
            return Err(MarketplaceError::WrongRenter);
        }
        let total_rent_paid = agreement
            .total_rent_paid
            .checked_add(amount)
            .filter(|total| *total <= obligation)
            .ok_or(MarketplaceError::PaymentExceedsObligation)?;

        agreement.total_rent_paid = total_rent_paid;
        agreement.reschedule(rental_price);

        let settlement = if total_rent_paid == obligation {
            Some(self.close_agreement(item_id, ClosureReason::PaidInFull, now)?)
        } else {
            None
        };

        let agreement = self
            .ledger
            .get_agreement(item_id)
            .cloned()
            .ok_or(MarketplaceError::NoActiveAgreement)?;

        Ok(PaymentReceipt {
            agreement,
            settlement,
        })
    }
}
