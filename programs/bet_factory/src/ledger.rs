//! Stake bookkeeping for a single bet.
//!
//! Each bettor owns one `Stake` PDA per bet. A stake is live while its
//! `amount` is non-zero; the aggregates on `BettingPool` (`total_pool`,
//! `option_totals`, `bettor_count`) always equal the sum over live stakes
//! until a winner is declared.

use anchor_lang::prelude::*;

use crate::{BetError, BettingPool, Stake, StakeInfo};

impl BettingPool {
    /// Record a new stake. Fails with `AlreadyBet` while the bettor still
    /// has a live stake, whatever option it is on.
    pub fn record_stake(
        &mut self,
        stake: &mut Stake,
        pool: Pubkey,
        bettor: Pubkey,
        option: u8,
        amount: u64,
    ) -> Result<()> {
        require!(stake.amount == 0, BetError::AlreadyBet);

        let index = option as usize;
        let option_total = self
            .option_totals
            .get(index)
            .ok_or(BetError::InvalidOption)?
            .checked_add(amount)
            .ok_or(BetError::MathOverflow)?;
        let total_pool = self
            .total_pool
            .checked_add(amount)
            .ok_or(BetError::MathOverflow)?;
        let bettor_count = self
            .bettor_count
            .checked_add(1)
            .ok_or(BetError::MathOverflow)?;

        self.option_totals[index] = option_total;
        self.total_pool = total_pool;
        self.bettor_count = bettor_count;

        stake.pool = pool;
        stake.bettor = bettor;
        stake.option = option;
        stake.amount = amount;
        stake.paid_out = 0;

        Ok(())
    }

    /// Zero a live stake and take it out of the aggregates.
    /// Returns the cleared amount; a stake that is already clear yields 0.
    pub fn clear_stake(&mut self, stake: &mut Stake) -> Result<u64> {
        let amount = stake.amount;
        if amount == 0 {
            return Ok(0);
        }

        let index = stake.option as usize;
        let option_total = self
            .option_totals
            .get(index)
            .ok_or(BetError::InvalidOption)?
            .checked_sub(amount)
            .ok_or(BetError::MathOverflow)?;
        let total_pool = self
            .total_pool
            .checked_sub(amount)
            .ok_or(BetError::MathOverflow)?;
        let bettor_count = self
            .bettor_count
            .checked_sub(1)
            .ok_or(BetError::MathOverflow)?;

        self.option_totals[index] = option_total;
        self.total_pool = total_pool;
        self.bettor_count = bettor_count;

        stake.amount = 0;
        stake.paid_out = amount;

        Ok(amount)
    }

    pub fn stake_of(&self, stake: Option<&Stake>) -> StakeInfo {
        match stake {
            Some(stake) if stake.amount > 0 => StakeInfo {
                option: stake.option,
                amount: stake.amount,
            },
            _ => StakeInfo::default(),
        }
    }
}
