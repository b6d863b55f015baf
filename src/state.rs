use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Sealed},
    pubkey::Pubkey,
};
use std::convert::TryFrom;

use crate::{ledger::AgreementLedger, registry::ItemRegistry};

/// Length of one rent installment: 30 days.
pub const SECONDS_PER_MONTH: UnixTimestamp = 30 * 24 * 60 * 60;

#[derive(BorshSerialize, BorshDeserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ItemState {
    Available,
    Rented,
    Completed,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: u64,
    pub owner: Pubkey,
    pub name: String,
    pub description: String,
    pub category: String,
    pub location: String,
    /// Monthly rent in lamports
    pub rental_price: u64,
    /// Escrowed by the renter when the rental starts
    pub security_deposit: u64,
    /// Number of monthly installments owed over the item's life
    pub rental_duration: u64,
    pub listed_at: UnixTimestamp,
    pub state: ItemState,
}

impl Item {
    /// `rental_price * rental_duration`; listing rejects items where this overflows.
    pub fn total_obligation(&self) -> u64 {
        self.rental_price.saturating_mul(self.rental_duration)
    }

    pub fn is_available(&self) -> bool {
        self.state == ItemState::Available
    }

    pub fn is_rented(&self) -> bool {
        self.state == ItemState::Rented
    }

    pub fn is_completed(&self) -> bool {
        self.state == ItemState::Completed
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClosureReason {
    PaidInFull,
    Forfeited,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct Closure {
    pub reason: ClosureReason,
    pub ended_at: UnixTimestamp,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct RentalAgreement {
    pub item_id: u64,
    pub renter: Pubkey,
    pub deposit: u64,
    pub start_time: UnixTimestamp,
    pub total_rent_paid: u64,
    pub number_of_payments_made: u64,
    pub next_payment_due: UnixTimestamp,
    /// Set once the agreement leaves `Rented`; the record is frozen afterwards.
    pub closure: Option<Closure>,
}

impl RentalAgreement {
    pub fn new(item_id: u64, renter: Pubkey, deposit: u64, start_time: UnixTimestamp) -> Self {
        Self {
            item_id,
            renter,
            deposit,
            start_time,
            total_rent_paid: 0,
            number_of_payments_made: 0,
            next_payment_due: installment_deadline(start_time, 0),
            closure: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.closure.is_none()
    }

    pub fn remaining_obligation(&self, item: &Item) -> u64 {
        item.total_obligation().saturating_sub(self.total_rent_paid)
    }

    pub fn is_fully_paid(&self, item: &Item) -> bool {
        self.total_rent_paid == item.total_obligation()
    }

    /// Recomputes the installment count and the next deadline from the amount paid.
    pub fn reschedule(&mut self, rental_price: u64) {
        self.number_of_payments_made = self
            .total_rent_paid
            .checked_div(rental_price)
            .unwrap_or_default();
        self.next_payment_due = installment_deadline(self.start_time, self.number_of_payments_made);
    }

    pub(crate) fn close(&mut self, reason: ClosureReason, ended_at: UnixTimestamp) {
        self.closure = Some(Closure { reason, ended_at });
    }
}

/// Deadline of the installment following `payments_made` completed ones.
pub fn installment_deadline(start_time: UnixTimestamp, payments_made: u64) -> UnixTimestamp {
    let months = i64::try_from(payments_made)
        .unwrap_or(i64::MAX)
        .saturating_add(1);
    start_time.saturating_add(months.saturating_mul(SECONDS_PER_MONTH))
}

/// Lamport movement out of the escrow that the program has to carry out
/// after an agreement closes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Settlement {
    RefundDeposit { to: Pubkey, amount: u64 },
    ForfeitDeposit { to: Pubkey, amount: u64 },
}

#[derive(Copy, Clone)]
pub enum MarketplaceStatus {
    Uninitialized = 0,
    Initialized,
}

/// The whole ledger, stored in the marketplace account. The same account
/// escrows the renters' security deposits.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Marketplace {
    pub status: u8,
    pub registry: ItemRegistry,
    pub ledger: AgreementLedger,
}

impl Sealed for Marketplace {}

impl IsInitialized for Marketplace {
    fn is_initialized(&self) -> bool {
        self.status != MarketplaceStatus::Uninitialized as u8
    }
}

impl Default for Marketplace {
    fn default() -> Self {
        Self {
            status: MarketplaceStatus::Uninitialized as u8,
            registry: ItemRegistry::default(),
            ledger: AgreementLedger::default(),
        }
    }
}

impl Marketplace {
    pub fn new() -> Self {
        Self {
            status: MarketplaceStatus::Initialized as u8,
            ..Self::default()
        }
    }

    /// Decodes the ledger from account data. Trailing bytes are the unused
    /// part of the account; zeroed data decodes as an uninitialized ledger.
    pub fn unpack_from_slice(data: &[u8]) -> Result<Self, ProgramError> {
        Self::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)
    }

    pub fn pack_into_slice(&self, data: &mut [u8]) -> Result<(), ProgramError> {
        self.serialize(&mut &mut data[..])
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }
}
