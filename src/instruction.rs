use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::program_error::ProgramError;
use std::convert::TryInto;

use crate::registry::ItemTerms;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketplaceInstruction {
    /// Initialize an empty marketplace ledger
    ///
    /// Accounts expected:
    /// 0. `[writable]` The Marketplace account holding the ledger and escrowed deposits; owned by program id.
    /// 1. `[]` Sysvar Rent Account to validate rent exemption (SYSVAR_RENT_PUBKEY)
    InitializeMarketplace,

    /// List a new item for rent; the signer becomes its owner
    ///
    /// Accounts expected:
    /// 0. `[writable]` The Marketplace account; owned by program id.
    /// 1. `[signer]` Owner account
    ListItem { terms: ItemTerms },

    /// Rent an available item, escrowing its security deposit in the marketplace account
    ///
    /// Accounts expected:
    /// 0. `[writable]` The Marketplace account; owned by program id.
    /// 1. `[signer, writable]` Renter account (keypair)
    /// 2. `[]` System program account
    RentItem { item_id: u64, deposit: u64 },

    /// Pay rent from renter to item owner
    ///
    /// Accounts expected:
    /// 0. `[writable]` The Marketplace account; owned by program id.
    /// 1. `[signer, writable]` Renter account (keypair)
    /// 2. `[writable]` Item owner account (public key)
    /// 3. `[]` System program account
    PayRent { item_id: u64, amount: u64 },

    /// End a rental whose rent has been paid in full, refunding the deposit
    ///
    /// Accounts expected:
    /// 0. `[writable]` The Marketplace account; owned by program id.
    /// 1. `[signer]` Caller account
    /// 2. `[writable]` Renter account (public key)
    EndRental { item_id: u64 },

    /// Terminate a delinquent rental, forfeiting the deposit to the item owner
    ///
    /// Accounts expected:
    /// 0. `[writable]` The Marketplace account; owned by program id.
    /// 1. `[writable]` Item owner account (public key)
    CheckAndResolveOverdue { item_id: u64 },
}

impl MarketplaceInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(ProgramError::InvalidInstructionData)?;

        Ok(match tag {
            0 => Self::InitializeMarketplace,
            1 => {
                let terms = ItemTerms::try_from_slice(rest)
                    .map_err(|_| ProgramError::InvalidInstructionData)?;
                Self::ListItem { terms }
            }
            2 => {
                let item_id = Self::unpack_u64(rest, 0)?;
                let deposit = Self::unpack_u64(rest, 8)?;
                Self::RentItem { item_id, deposit }
            }
            3 => {
                let item_id = Self::unpack_u64(rest, 0)?;
                let amount = Self::unpack_u64(rest, 8)?;
                Self::PayRent { item_id, amount }
            }
            4 => Self::EndRental {
                item_id: Self::unpack_u64(rest, 0)?,
            },
            5 => Self::CheckAndResolveOverdue {
                item_id: Self::unpack_u64(rest, 0)?,
            },
            _ => return Err(ProgramError::InvalidInstructionData),
        })
    }

    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        let mut buf = Vec::new();
        match self {
            Self::InitializeMarketplace => buf.push(0),
            Self::ListItem { terms } => {
                buf.push(1);
                terms
                    .serialize(&mut buf)
                    .map_err(|_| ProgramError::InvalidInstructionData)?;
            }
            Self::RentItem { item_id, deposit } => {
                buf.push(2);
                buf.extend_from_slice(&item_id.to_le_bytes());
                buf.extend_from_slice(&deposit.to_le_bytes());
            }
            Self::PayRent { item_id, amount } => {
                buf.push(3);
                buf.extend_from_slice(&item_id.to_le_bytes());
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::EndRental { item_id } => {
                buf.push(4);
                buf.extend_from_slice(&item_id.to_le_bytes());
            }
            Self::CheckAndResolveOverdue { item_id } => {
                buf.push(5);
                buf.extend_from_slice(&item_id.to_le_bytes());
            }
        }
        Ok(buf)
    }

    fn unpack_u64(input: &[u8], start: usize) -> Result<u64, ProgramError> {
        let value = input
            .get(start..8 + start)
            .and_then(|slice| slice.try_into().ok())
            .map(u64::from_le_bytes)
            .ok_or(ProgramError::InvalidInstructionData)?;
        Ok(value)
    }
}
