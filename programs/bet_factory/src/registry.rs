use std::ops::Range;

use anchor_lang::prelude::*;

use crate::{pda, BetError, Registry, MAX_PAGE_SIZE};

/// Indices of the page starting at `offset`, at most `limit` long.
/// `offset == count` is a valid, empty page.
pub fn page_range(count: u64, limit: u64, offset: u64) -> Result<Range<u64>> {
    require!(offset <= count, BetError::OffsetOutOfBounds);
    let len = limit.min(count - offset);
    Ok(offset..offset + len)
}

impl Registry {
    /// Claim the next index. Returns the index the new bet was derived from.
    pub fn register(&mut self) -> Result<u64> {
        let index = self.bets_count;
        self.bets_count = index.checked_add(1).ok_or(BetError::MathOverflow)?;
        Ok(index)
    }

    pub fn page(&self, limit: u64, offset: u64) -> Result<Range<u64>> {
        page_range(self.bets_count, limit, offset)
    }

    /// Bet PDAs of one page. Pages longer than `MAX_PAGE_SIZE` do not fit in
    /// return data and fail with `PageTooLarge`.
    pub fn bet_addresses(
        &self,
        registry: &Pubkey,
        limit: u64,
        offset: u64,
        program_id: &Pubkey,
    ) -> Result<Vec<Pubkey>> {
        let range = self.page(limit, offset)?;
        require!(
            range.end - range.start <= MAX_PAGE_SIZE,
            BetError::PageTooLarge
        );

        Ok(range
            .map(|index| pda::derive_bet_pda(registry, index, program_id).0)
            .collect())
    }
}
