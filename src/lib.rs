pub mod clock;
pub mod error;
pub mod instruction;
pub mod ledger;
pub mod overdue;
pub mod payment;
pub mod processor;
pub mod registry;
pub mod state;

#[cfg(not(feature = "exclude_entrypoint"))]
pub mod entrypoint;
