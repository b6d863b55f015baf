use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    msg,
    program::invoke,
    program_error::ProgramError,
    program_pack::IsInitialized,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{rent::Rent, Sysvar},
};

use crate::{
    clock::{SysvarClock, TimeSource},
    error::MarketplaceError,
    instruction::MarketplaceInstruction,
    overdue::Resolution,
    registry::ItemTerms,
    state::{Marketplace, Settlement},
};

static LOG_TAG_NAME: &str = "[rental_marketplace]";

pub struct Processor;
impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        Self::process_at(program_id, accounts, instruction_data, &SysvarClock)
    }

    /// Same as [`Processor::process`] with the time source supplied by the caller.
    pub fn process_at<T: TimeSource>(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
        clock: &T,
    ) -> ProgramResult {
        let instruction = MarketplaceInstruction::unpack(instruction_data)?;

        match instruction {
            MarketplaceInstruction::InitializeMarketplace => {
                Self::initialize_marketplace(accounts, program_id)
            }

            MarketplaceInstruction::ListItem { terms } => {
                Self::list_item(accounts, program_id, terms, clock.now()?)
            }

            MarketplaceInstruction::RentItem { item_id, deposit } => {
                Self::rent_item(accounts, program_id, item_id, deposit, clock.now()?)
            }

            MarketplaceInstruction::PayRent { item_id, amount } => {
                Self::pay_rent(accounts, program_id, item_id, amount, clock.now()?)
            }

            MarketplaceInstruction::EndRental { item_id } => {
                Self::end_rental(accounts, program_id, item_id, clock.now()?)
            }

            MarketplaceInstruction::CheckAndResolveOverdue { item_id } => {
                Self::check_and_resolve_overdue(accounts, program_id, item_id, clock.now()?)
            }
        }
    }

    fn initialize_marketplace(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let accounts_iter = &mut accounts.iter();

        let marketplace_account = next_account_info(accounts_iter)?;
        Self::check_program_owned(marketplace_account, program_id)?;

        let solana_rent = &Rent::from_account_info(next_account_info(accounts_iter)?)?;
        if !solana_rent.is_exempt(marketplace_account.lamports(), marketplace_account.data_len()) {
            msg!(
                "{} Marketplace account not rent exempt on Solana; balance: {}",
                LOG_TAG_NAME,
                marketplace_account.lamports()
            );
            return Err(ProgramError::AccountNotRentExempt);
        }

        let existing = Marketplace::unpack_from_slice(&marketplace_account.data.borrow())?;
        if existing.is_initialized() {
            msg!("{} Marketplace already initialized", LOG_TAG_NAME);
            return Err(ProgramError::AccountAlreadyInitialized);
        }

        Self::store(&Marketplace::new(), marketplace_account)?;

        msg!(
            "{} Initialized marketplace {}",
            LOG_TAG_NAME,
            marketplace_account.key
        );

        Ok(())
    }

    fn list_item(
        accounts: &[AccountInfo],
        program_id: &Pubkey,
        terms: ItemTerms,
        now: UnixTimestamp,
    ) -> ProgramResult {
        let accounts_iter = &mut accounts.iter();

        let marketplace_account = next_account_info(accounts_iter)?;
        let mut marketplace = Self::load(marketplace_account, program_id)?;

        let owner_account = next_account_info(accounts_iter)?;
        Self::check_signer(owner_account)?;

        let item_id = marketplace
            .registry
            .list_item(*owner_account.key, terms, now)
            .map_err(Self::rejected)?;

        Self::store(&marketplace, marketplace_account)?;

        msg!(
            "{} Listed item {} for owner {}",
            LOG_TAG_NAME,
            item_id,
            owner_account.key
        );

        Ok(())
    }

    fn rent_item(
        accounts: &[AccountInfo],
        program_id: &Pubkey,
        item_id: u64,
        deposit: u64,
        now: UnixTimestamp,
    ) -> ProgramResult {
        let accounts_iter = &mut accounts.iter();

        let marketplace_account = next_account_info(accounts_iter)?;
        let mut marketplace = Self::load(marketplace_account, program_id)?;

        let renter_account = next_account_info(accounts_iter)?;
        let system_program_account = next_account_info(accounts_iter)?;
        Self::check_signer(renter_account)?;

        let agreement = marketplace
            .rent_item(item_id, *renter_account.key, deposit, now)
            .map_err(Self::rejected)?;

        msg!(
            "{} Item {} rented by {}; next payment due {}",
            LOG_TAG_NAME,
            item_id,
            agreement.renter,
            agreement.next_payment_due
        );

        Self::transfer(
            renter_account,
            marketplace_account,
            system_program_account,
            deposit,
        )?;
        Self::store(&marketplace, marketplace_account)
    }

    fn pay_rent(
        accounts: &[AccountInfo],
        program_id: &Pubkey,
        item_id: u64,
        amount: u64,
        now: UnixTimestamp,
    ) -> ProgramResult {
        let accounts_iter = &mut accounts.iter();

        let marketplace_account = next_account_info(accounts_iter)?;
        let mut marketplace = Self::load(marketplace_account, program_id)?;

        let renter_account = next_account_info(accounts_iter)?;
        let owner_account = next_account_info(accounts_iter)?;
        let system_program_account = next_account_info(accounts_iter)?;
        Self::check_signer(renter_account)?;

        // Rent goes to the owner recorded at listing time
        let item = marketplace.get_item(item_id).map_err(Self::rejected)?;
        if item.owner != *owner_account.key {
            msg!(
                "{} Payee must match the owner of item {}",
                LOG_TAG_NAME,
                item_id
            );
            return Err(ProgramError::InvalidAccountData);
        }

        let receipt = marketplace
            .pay_rent(item_id, renter_account.key, amount, now)
            .map_err(Self::rejected)?;

        msg!(
            "{} Item {} received {} lamports; paid {} installments, next payment due {}",
            LOG_TAG_NAME,
            item_id,
            amount,
            receipt.agreement.number_of_payments_made,
            receipt.agreement.next_payment_due
        );

        Self::transfer(renter_account, owner_account, system_program_account, amount)?;

        if let Some(settlement) = receipt.settlement {
            msg!("{} Item {} paid in full", LOG_TAG_NAME, item_id);
            Self::settle(marketplace_account, renter_account, settlement)?;
        }

        Self::store(&marketplace, marketplace_account)
    }

    fn end_rental(
        accounts: &[AccountInfo],
        program_id: &Pubkey,
        item_id: u64,
        now: UnixTimestamp,
    ) -> ProgramResult {
        let accounts_iter = &mut accounts.iter();

        let marketplace_account = next_account_info(accounts_iter)?;
        let mut marketplace = Self::load(marketplace_account, program_id)?;

        let caller_account = next_account_info(accounts_iter)?;
        let renter_account = next_account_info(accounts_iter)?;
        Self::check_signer(caller_account)?;

        match marketplace.end_rental(item_id, now).map_err(Self::rejected)? {
            Some(settlement) => {
                msg!(
                    "{} Rental of item {} ended by {}",
                    LOG_TAG_NAME,
                    item_id,
                    caller_account.key
                );
                Self::settle(marketplace_account, renter_account, settlement)?;
                Self::store(&marketplace, marketplace_account)
            }
            None => {
                msg!("{} Rental of item {} already completed", LOG_TAG_NAME, item_id);
                Ok(())
            }
        }
    }

    fn check_and_resolve_overdue(
        accounts: &[AccountInfo],
        program_id: &Pubkey,
        item_id: u64,
        now: UnixTimestamp,
    ) -> ProgramResult {
        let accounts_iter = &mut accounts.iter();

        let marketplace_account = next_account_info(accounts_iter)?;
        let mut marketplace = Self::load(marketplace_account, program_id)?;

        let owner_account = next_account_info(accounts_iter)?;

        match marketplace
            .check_and_resolve_overdue(item_id, now)
            .map_err(Self::rejected)?
        {
            Resolution::NotOverdue => {
                msg!("{} Rent for item {} is up to date", LOG_TAG_NAME, item_id);
                Ok(())
            }
            Resolution::Resolved(settlement) => {
                msg!(
                    "{} Item {} overdue at {}; deposit forfeited",
                    LOG_TAG_NAME,
                    item_id,
                    now
                );
                Self::settle(marketplace_account, owner_account, settlement)?;
                Self::store(&marketplace, marketplace_account)
            }
        }
    }

    fn load(marketplace_account: &AccountInfo, program_id: &Pubkey) -> Result<Marketplace, ProgramError> {
        Self::check_program_owned(marketplace_account, program_id)?;

        let marketplace = Marketplace::unpack_from_slice(&marketplace_account.data.borrow())
            .map_err(|e| {
                msg!(
                    "{} Marketplace account data invalid; size: {}",
                    LOG_TAG_NAME,
                    marketplace_account.data_len()
                );
                e
            })?;
        if !marketplace.is_initialized() {
            msg!("{} Marketplace account not initialized", LOG_TAG_NAME);
            return Err(ProgramError::UninitializedAccount);
        }

        Ok(marketplace)
    }

    // The account is only rewritten once every check of the instruction has passed
    fn store(marketplace: &Marketplace, marketplace_account: &AccountInfo) -> ProgramResult {
        marketplace
            .pack_into_slice(&mut marketplace_account.data.borrow_mut()[..])
            .map_err(|e| {
                msg!(
                    "{} Marketplace account full; size: {}",
                    LOG_TAG_NAME,
                    marketplace_account.data_len()
                );
                e
            })
    }

    fn check_program_owned(account: &AccountInfo, program_id: &Pubkey) -> ProgramResult {
        if account.owner != program_id {
            msg!("{} Marketplace account not owned by this program", LOG_TAG_NAME);
            return Err(ProgramError::IncorrectProgramId);
        }
        Ok(())
    }

    fn check_signer(account: &AccountInfo) -> ProgramResult {
        if !account.is_signer {
            msg!("{} Missing signature from {}", LOG_TAG_NAME, account.key);
            return Err(ProgramError::MissingRequiredSignature);
        }
        Ok(())
    }

    fn rejected(e: MarketplaceError) -> ProgramError {
        msg!("{} Rejected: {}", LOG_TAG_NAME, e);
        e.into()
    }

    fn transfer<'a>(
        from: &AccountInfo<'a>,
        to: &AccountInfo<'a>,
        system_program_account: &AccountInfo<'a>,
        lamports: u64,
    ) -> ProgramResult {
        if lamports == 0 {
            return Ok(());
        }
        // Transfer to self - nothing moves
        if from.key == to.key {
            return Ok(());
        }
        if from.lamports() < lamports {
            msg!(
                "{} Insufficient funds: {} lamports requested, balance {}",
                LOG_TAG_NAME,
                lamports,
                from.lamports()
            );
            return Err(ProgramError::InsufficientFunds);
        }

        let instruction = system_instruction::transfer(from.key, to.key, lamports);
        invoke(
            &instruction,
            &[from.clone(), to.clone(), system_program_account.clone()],
        )
    }

    /// Pays an escrowed deposit out of the program-owned marketplace account.
    fn settle(
        marketplace_account: &AccountInfo,
        recipient_account: &AccountInfo,
        settlement: Settlement,
    ) -> ProgramResult {
        let (to, amount) = match settlement {
            Settlement::RefundDeposit { to, amount } => (to, amount),
            Settlement::ForfeitDeposit { to, amount } => (to, amount),
        };
        if *recipient_account.key != to {
            msg!("{} Deposit recipient must be {}", LOG_TAG_NAME, to);
            return Err(ProgramError::InvalidAccountData);
        }
        if amount == 0 {
            return Ok(());
        }

        let escrow_balance = marketplace_account
            .lamports()
            .checked_sub(amount)
            .ok_or(ProgramError::InsufficientFunds)?;
        let recipient_balance = recipient_account
            .lamports()
            .checked_add(amount)
            .ok_or(ProgramError::InvalidArgument)?;
        **marketplace_account.try_borrow_mut_lamports()? = escrow_balance;
        **recipient_account.try_borrow_mut_lamports()? = recipient_balance;

        msg!("{} Moved {} lamports of deposit to {}", LOG_TAG_NAME, amount, to);

        Ok(())
    }
}
