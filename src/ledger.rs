use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, pubkey::Pubkey};
use std::collections::BTreeMap;

use crate::{
    error::MarketplaceError,
    state::{ClosureReason, Item, ItemState, Marketplace, RentalAgreement, Settlement},
};

/// Rental agreements indexed by item id. An entry is created when the item
/// is rented and kept as history once the item is `Completed`.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AgreementLedger {
    agreements: BTreeMap<u64, RentalAgreement>,
}

impl AgreementLedger {
    pub fn get_agreement(&self, item_id: u64) -> Option<&RentalAgreement> {
        self.agreements.get(&item_id)
    }

    pub(crate) fn active_agreement_mut(
        &mut self,
        item_id: u64,
    ) -> Result<&mut RentalAgreement, MarketplaceError> {
        self.agreements
            .get_mut(&item_id)
            .filter(|agreement| agreement.is_active())
            .ok_or(MarketplaceError::NoActiveAgreement)
    }

    fn open(&mut self, agreement: RentalAgreement) -> &RentalAgreement {
        let item_id = agreement.item_id;
        self.agreements.insert(item_id, agreement);
        &self.agreements[&item_id]
    }
}

impl Marketplace {
    pub fn get_item(&self, item_id: u64) -> Result<&Item, MarketplaceError> {
        self.registry.get_item(item_id)
    }

    pub fn get_agreement(&self, item_id: u64) -> Result<&RentalAgreement, MarketplaceError> {
        self.registry.get_item(item_id)?;
        self.ledger
            .get_agreement(item_id)
            .ok_or(MarketplaceError::NoActiveAgreement)
    }

    /// Opens a rental on an `Available` item. The deposit must match the
    /// item's security deposit exactly.
    pub fn rent_item(
        &mut self,
        item_id: u64,
        renter: Pubkey,
        deposit_paid: u64,
        now: UnixTimestamp,
    ) -> Result<&RentalAgreement, MarketplaceError> {
        let item = self.registry.get_item_mut(item_id)?;
        if !item.is_available() {
            return Err(MarketplaceError::ItemNotAvailable);
        }
        if deposit_paid != item.security_deposit {
            return Err(MarketplaceError::InsufficientDeposit);
        }

        item.state = ItemState::Rented;
        Ok(self
            .ledger
            .open(RentalAgreement::new(item_id, renter, deposit_paid, now)))
    }

    /// Ends a rental whose obligation has been met. Returns `None` when the
    /// rental was already completed by its final payment.
    pub fn end_rental(
        &mut self,
        item_id: u64,
        now: UnixTimestamp,
    ) -> Result<Option<Settlement>, MarketplaceError> {
        let item = self.registry.get_item(item_id)?;
        match item.state {
            ItemState::Available => Err(MarketplaceError::NoActiveAgreement),
            ItemState::Completed => match self.ledger.get_agreement(item_id) {
                Some(agreement) if agreement.is_fully_paid(item) => Ok(None),
                _ => Err(MarketplaceError::NoActiveAgreement),
            },
            ItemState::Rented => {
                let agreement = self
                    .ledger
                    .get_agreement(item_id)
                    .ok_or(MarketplaceError::NoActiveAgreement)?;
                if !agreement.is_fully_paid(item) {
                    return Err(MarketplaceError::RentalNotEligibleForEnd);
                }
                self.close_agreement(item_id, ClosureReason::PaidInFull, now)
                    .map(Some)
            }
        }
    }

    /// Items currently rented by `renter`.
    pub fn list_rented_by<'a>(&'a self, renter: &'a Pubkey) -> impl Iterator<Item = &'a Item> + 'a {
        let ledger = &self.ledger;
        self.registry.iter().filter(move |item| {
            item.is_rented()
                && ledger
                    .get_agreement(item.id)
                    .map_or(false, |agreement| agreement.renter == *renter)
        })
    }

    /// Items of `owner` that are currently rented out, with their agreements.
    pub fn list_rented_out_by<'a>(
        &'a self,
        owner: &'a Pubkey,
    ) -> impl Iterator<Item = (&'a Item, &'a RentalAgreement)> + 'a {
        let ledger = &self.ledger;
        self.registry
            .list_owned_by(owner)
            .filter(|item| item.is_rented())
            .filter_map(move |item| ledger.get_agreement(item.id).map(|agreement| (item, agreement)))
    }

    /// Moves a `Rented` item to `Completed`, freezes its agreement and says
    /// where the escrowed deposit goes.
    pub(crate) fn close_agreement(
        &mut self,
        item_id: u64,
        reason: ClosureReason,
        now: UnixTimestamp,
    ) -> Result<Settlement, MarketplaceError> {
        let item = self.registry.get_item_mut(item_id)?;
        if !item.is_rented() {
            return Err(MarketplaceError::NoActiveAgreement);
        }
        let agreement = self.ledger.active_agreement_mut(item_id)?;

        item.state = ItemState::Completed;
        agreement.close(reason, now);

        Ok(match reason {
            ClosureReason::PaidInFull => Settlement::RefundDeposit {
                to: agreement.renter,
                amount: agreement.deposit,
            },
            ClosureReason::Forfeited => Settlement::ForfeitDeposit {
                to: item.owner,
                amount: agreement.deposit,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{registry::ItemTerms, state::Closure};

    fn marketplace_with_item(price: u64, deposit: u64, duration: u64) -> (Marketplace, Pubkey) {
        let owner = Pubkey::new_unique();
        let mut marketplace = Marketplace::new();
        marketplace
            .registry
            .list_item(
                owner,
                ItemTerms {
                    name: "Kayak".to_string(),
                    description: String::new(),
                    category: "outdoor".to_string(),
                    location: "Porto".to_string(),
                    rental_price: price,
                    security_deposit: deposit,
                    rental_duration: duration,
                },
                0,
            )
            .unwrap();
        (marketplace, owner)
    }

    #[test]
    fn rent_item_opens_agreement() {
        let (mut marketplace, _) = marketplace_with_item(100, 50, 3);
        let renter = Pubkey::new_unique();

        let agreement = marketplace.rent_item(1, renter, 50, 1_000).unwrap().clone();

        assert_eq!(agreement.renter, renter);
        assert_eq!(agreement.start_time, 1_000);
        assert_eq!(agreement.total_rent_paid, 0);
        assert_eq!(agreement.number_of_payments_made, 0);
        assert_eq!(agreement.next_payment_due, 1_000 + 2_592_000);
        assert_eq!(marketplace.get_item(1).unwrap().state, ItemState::Rented);
    }

    #[test]
    fn rent_item_requires_exact_deposit() {
        let (mut marketplace, _) = marketplace_with_item(100, 50, 3);
        let renter = Pubkey::new_unique();

        for deposit in &[0, 49, 51] {
            assert_eq!(
                marketplace.rent_item(1, renter, *deposit, 0).map(|_| ()),
                Err(MarketplaceError::InsufficientDeposit)
            );
        }
        assert!(marketplace.get_item(1).unwrap().is_available());
        assert_eq!(
            marketplace.get_agreement(1),
            Err(MarketplaceError::NoActiveAgreement)
        );
    }

    #[test]
    fn rented_item_cannot_be_rented_again() {
        let (mut marketplace, _) = marketplace_with_item(100, 50, 3);
        let first = Pubkey::new_unique();
        marketplace.rent_item(1, first, 50, 0).unwrap();

        assert_eq!(
            marketplace.rent_item(1, Pubkey::new_unique(), 50, 10).map(|_| ()),
            Err(MarketplaceError::ItemNotAvailable)
        );
        assert_eq!(marketplace.get_agreement(1).unwrap().renter, first);
    }

    #[test]
    fn rent_unknown_item_is_not_found() {
        let (mut marketplace, _) = marketplace_with_item(100, 50, 3);

        assert_eq!(
            marketplace.rent_item(7, Pubkey::new_unique(), 50, 0).map(|_| ()),
            Err(MarketplaceError::ItemNotFound)
        );
    }

    #[test]
    fn end_rental_requires_full_payment() {
        let (mut marketplace, _) = marketplace_with_item(100, 50, 3);
        assert_eq!(
            marketplace.end_rental(1, 0),
            Err(MarketplaceError::NoActiveAgreement)
        );

        marketplace.rent_item(1, Pubkey::new_unique(), 50, 0).unwrap();
        assert_eq!(
            marketplace.end_rental(1, 0),
            Err(MarketplaceError::RentalNotEligibleForEnd)
        );
        assert!(marketplace.get_item(1).unwrap().is_rented());
    }

    #[test]
    fn end_rental_closes_fully_paid_rental() {
        let (mut marketplace, _) = marketplace_with_item(100, 50, 3);
        let renter = Pubkey::new_unique();
        marketplace.rent_item(1, renter, 50, 0).unwrap();
        marketplace.ledger.active_agreement_mut(1).unwrap().total_rent_paid = 300;

        assert_eq!(
            marketplace.end_rental(1, 99),
            Ok(Some(Settlement::RefundDeposit { to: renter, amount: 50 }))
        );
        assert!(marketplace.get_item(1).unwrap().is_completed());
        assert_eq!(
            marketplace.get_agreement(1).unwrap().closure,
            Some(Closure { reason: ClosureReason::PaidInFull, ended_at: 99 })
        );

        // already completed: no-op
        assert_eq!(marketplace.end_rental(1, 100), Ok(None));
    }

    #[test]
    fn forfeited_rental_cannot_be_ended() {
        let (mut marketplace, owner) = marketplace_with_item(100, 50, 3);
        marketplace.rent_item(1, Pubkey::new_unique(), 50, 0).unwrap();

        assert_eq!(
            marketplace.close_agreement(1, ClosureReason::Forfeited, 10),
            Ok(Settlement::ForfeitDeposit { to: owner, amount: 50 })
        );
        assert_eq!(
            marketplace.end_rental(1, 11),
            Err(MarketplaceError::NoActiveAgreement)
        );
        assert_eq!(
            marketplace.close_agreement(1, ClosureReason::Forfeited, 12),
            Err(MarketplaceError::NoActiveAgreement)
        );
    }

    #[test]
    fn rented_by_lists_only_current_rentals_of_renter() {
        let (mut marketplace, owner) = marketplace_with_item(100, 0, 1);
        let template = marketplace.get_item(1).unwrap().clone();
        for _ in 0..2 {
            marketplace
                .registry
                .list_item(
                    owner,
                    ItemTerms {
                        name: template.name.clone(),
                        description: template.description.clone(),
                        category: template.category.clone(),
                        location: template.location.clone(),
                        rental_price: 100,
                        security_deposit: 0,
                        rental_duration: 1,
                    },
                    0,
                )
                .unwrap();
        }
        let renter = Pubkey::new_unique();
        marketplace.rent_item(1, renter, 0, 0).unwrap();
        marketplace.rent_item(2, Pubkey::new_unique(), 0, 0).unwrap();
        marketplace.rent_item(3, renter, 0, 0).unwrap();
        marketplace.close_agreement(3, ClosureReason::Forfeited, 1).unwrap();

        let rented: Vec<u64> = marketplace.list_rented_by(&renter).map(|item| item.id).collect();
        assert_eq!(rented, vec![1]);
    }

    #[test]
    fn rented_out_by_pairs_owner_items_with_their_agreements() {
        let (mut marketplace, owner) = marketplace_with_item(100, 0, 1);
        let other_owner = Pubkey::new_unique();
        for lister in &[owner, other_owner, owner] {
            marketplace
                .registry
                .list_item(
                    *lister,
                    ItemTerms {
                        name: "Canoe".to_string(),
                        description: String::new(),
                        category: "outdoor".to_string(),
                        location: "Porto".to_string(),
                        rental_price: 100,
                        security_deposit: 0,
                        rental_duration: 1,
                    },
                    0,
                )
                .unwrap();
        }
        let renter = Pubkey::new_unique();
        marketplace.rent_item(1, renter, 0, 5).unwrap();
        marketplace.rent_item(3, renter, 0, 5).unwrap();
        marketplace.rent_item(4, renter, 0, 5).unwrap();
        marketplace.close_agreement(4, ClosureReason::Forfeited, 6).unwrap();

        let rented_out: Vec<(u64, Pubkey)> = marketplace
            .list_rented_out_by(&owner)
            .map(|(item, agreement)| (item.id, agreement.renter))
            .collect();
        assert_eq!(rented_out, vec![(1, renter)]);
        assert_eq!(marketplace.list_rented_out_by(&renter).count(), 0);
    }
}
