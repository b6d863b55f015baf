use thiserror::Error;

use solana_program::{decode_error::DecodeError, program_error::ProgramError};

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum MarketplaceError {
    #[error("Invalid Item Fields")]
    InvalidItemFields = 100,

    #[error("Item Not Found")]
    ItemNotFound,

    #[error("Item Not Available For Rent")]
    ItemNotAvailable,

    #[error("Deposit Does Not Match Item Security Deposit")]
    InsufficientDeposit,

    #[error("No Active Rental Agreement")]
    NoActiveAgreement,

    #[error("Caller Is Not The Agreement Renter")]
    WrongRenter,

    #[error("Payment Exceeds Remaining Obligation")]
    PaymentExceedsObligation,

    #[error("Rental Not Eligible For End")]
    RentalNotEligibleForEnd,
}

impl MarketplaceError {
    /// Maps a `ProgramError::Custom` code back to the error it was raised from.
    pub fn from_code(code: u32) -> Option<Self> {
        use MarketplaceError::*;

        [
            InvalidItemFields,
            ItemNotFound,
            ItemNotAvailable,
            InsufficientDeposit,
            NoActiveAgreement,
            WrongRenter,
            PaymentExceedsObligation,
            RentalNotEligibleForEnd,
        ]
        .iter()
        .copied()
        .find(|e| *e as u32 == code)
    }
}

impl From<MarketplaceError> for ProgramError {
    fn from(e: MarketplaceError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for MarketplaceError {
    fn type_of() -> &'static str {
        "MarketplaceError"
    }
}
