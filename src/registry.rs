use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, pubkey::Pubkey};

use crate::{
    error::MarketplaceError,
    state::{Item, ItemState},
};

/// Descriptive fields and terms of a new listing.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct ItemTerms {
    pub name: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub rental_price: u64,
    pub security_deposit: u64,
    pub rental_duration: u64,
}

impl ItemTerms {
    fn validate(&self) -> Result<(), MarketplaceError> {
        let missing_field = [&self.name, &self.category, &self.location]
            .iter()
            .any(|field| field.trim().is_empty());
        if missing_field || self.rental_price == 0 || self.rental_duration == 0 {
            return Err(MarketplaceError::InvalidItemFields);
        }

        self.rental_price
            .checked_mul(self.rental_duration)
            .ok_or(MarketplaceError::InvalidItemFields)?;

        Ok(())
    }
}

/// Catalog of listed items. Item `n` lives at index `n - 1`; ids are
/// handed out sequentially from 1 and the arena only grows.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemRegistry {
    items: Vec<Item>,
}

impl ItemRegistry {
    pub fn list_item(
        &mut self,
        owner: Pubkey,
        terms: ItemTerms,
        now: UnixTimestamp,
    ) -> Result<u64, MarketplaceError> {
        terms.validate()?;

        let id = self.item_count() + 1;
        self.items.push(Item {
            id,
            owner,
            name: terms.name,
            description: terms.description,
            category: terms.category,
            location: terms.location,
            rental_price: terms.rental_price,
            security_deposit: terms.security_deposit,
            rental_duration: terms.rental_duration,
            listed_at: now,
            state: ItemState::Available,
        });

        Ok(id)
    }

    pub fn get_item(&self, item_id: u64) -> Result<&Item, MarketplaceError> {
        Self::index_of(item_id)
            .and_then(|index| self.items.get(index))
            .ok_or(MarketplaceError::ItemNotFound)
    }

    pub(crate) fn get_item_mut(&mut self, item_id: u64) -> Result<&mut Item, MarketplaceError> {
        Self::index_of(item_id)
            .and_then(move |index| self.items.get_mut(index))
            .ok_or(MarketplaceError::ItemNotFound)
    }

    /// Highest id assigned so far.
    pub fn item_count(&self) -> u64 {
        self.items.len() as u64
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.iter()
    }

    pub fn list_available(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.iter().filter(|item| item.is_available())
    }

    pub fn list_owned_by<'a>(&'a self, owner: &'a Pubkey) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.iter().filter(move |item| item.owner == *owner)
    }

    /// Distinct categories in the order they were first listed.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for item in &self.items {
            if !categories.contains(&item.category.as_str()) {
                categories.push(&item.category);
            }
        }
        categories
    }

    fn index_of(item_id: u64) -> Option<usize> {
        item_id.checked_sub(1).map(|index| index as usize)
    }
}
