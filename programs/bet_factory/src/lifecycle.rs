//! Bet state machine and payout rules.
//!
//! Open -> Closed -> Finished, Open | Closed -> Canceled. Canceled and
//! Finished are terminal. Every method that hands lamports back clears the
//! stake first and returns the amount; the caller moves the lamports after.

use anchor_lang::prelude::*;

use crate::constants::*;
use crate::{BetError, BetInfo, BetStatus, BettingPool, Stake};

/// Check a title and option list before a bet is created.
pub fn validate_bet(title: &str, options: &[String]) -> Result<()> {
    require!(options.len() >= MIN_OPTIONS as usize, BetError::TooFewOptions);
    require!(options.len() <= MAX_OPTIONS as usize, BetError::TooManyOptions);
    require!(title.len() <= MAX_TITLE_LEN as usize, BetError::TitleTooLong);

    for (i, option) in options.iter().enumerate() {
        require!(!option.is_empty(), BetError::EmptyOption);
        require!(option.len() <= MAX_OPTION_LEN as usize, BetError::OptionTooLong);
        require!(
            !options[..i].contains(option),
            BetError::DuplicateOption
        );
    }

    Ok(())
}

/// Stake plus floor(losing_pool * stake / winning_total).
/// Whatever the floor drops stays in the pool as dust.
pub fn winner_share(amount: u64, winning_total: u64, final_pool: u64) -> Result<u64> {
    require!(winning_total > 0, BetError::NoWinningBets);

    let losing_pool = final_pool
        .checked_sub(winning_total)
        .ok_or(BetError::MathOverflow)?;

    let share = (losing_pool as u128)
        .checked_mul(amount as u128)
        .ok_or(BetError::MathOverflow)?
        .checked_div(winning_total as u128)
        .ok_or(BetError::MathOverflow)?;
    let share = u64::try_from(share).map_err(|_| BetError::MathOverflow)?;

    Ok(amount.checked_add(share).ok_or(BetError::MathOverflow)?)
}

impl BettingPool {
    /// Constructor: the only place option bounds are enforced.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        creator: Pubkey,
        registry: Pubkey,
        index: u64,
        title: String,
        options: Vec<String>,
        created_at: i64,
        bump: u8,
    ) -> Result<()> {
        validate_bet(&title, &options)?;

        self.creator = creator;
        self.registry = registry;
        self.index = index;
        self.title = title;
        self.options = options;
        self.status = BetStatus::Open;
        self.winning_option = None;
        self.option_totals = [0u64; 8];
        self.total_pool = 0;
        self.bettor_count = 0;
        self.final_pool = 0;
        self.winning_total = 0;
        self.created_at = created_at;
        self.resolved_at = 0;
        self.bump = bump;

        Ok(())
    }

    pub fn is_valid_option(&self, option: u8) -> bool {
        (option as usize) < self.options.len()
    }

    pub fn place(
        &mut self,
        stake: &mut Stake,
        pool: Pubkey,
        bettor: Pubkey,
        option: u8,
        amount: u64,
    ) -> Result<()> {
        require!(self.status == BetStatus::Open, BetError::BettingClosed);
        require!(self.is_valid_option(option), BetError::InvalidOption);
        require!(amount > 0, BetError::InvalidAmount);

        self.record_stake(stake, pool, bettor, option, amount)
    }

    pub fn close_betting(&mut self, caller: Pubkey) -> Result<()> {
        require_keys_eq!(caller, self.creator, BetError::NotCreator);
        require!(self.status == BetStatus::Open, BetError::BettingClosed);

        self.status = BetStatus::Closed;
        Ok(())
    }

    /// Only flips the status. Refunds go through `refund_stake`.
    pub fn cancel_betting(&mut self, caller: Pubkey, now: i64) -> Result<()> {
        require_keys_eq!(caller, self.creator, BetError::NotCreator);
        require!(
            matches!(self.status, BetStatus::Open | BetStatus::Closed),
            BetError::BettingClosed
        );

        self.status = BetStatus::Canceled;
        self.resolved_at = now;
        Ok(())
    }

    pub fn declare_winner(&mut self, caller: Pubkey, winning_option: u8, now: i64) -> Result<()> {
        require_keys_eq!(caller, self.creator, BetError::NotCreator);
        require!(self.status == BetStatus::Closed, BetError::BetNotClosed);
        require!(self.is_valid_option(winning_option), BetError::InvalidOption);

        let winning_total = self.option_totals[winning_option as usize];
        require!(winning_total > 0, BetError::NoWinningBets);

        self.status = BetStatus::Finished;
        self.winning_option = Some(winning_option);
        self.final_pool = self.total_pool;
        self.winning_total = winning_total;
        self.resolved_at = now;
        Ok(())
    }

    /// Bettor leaves an open bet with exactly what they put in.
    pub fn cashback(&mut self, stake: &mut Stake) -> Result<u64> {
        require!(self.status == BetStatus::Open, BetError::BettingClosed);
        require!(stake.amount > 0, BetError::DidNotBet);

        self.clear_stake(stake)
    }

    /// Return the stake of a canceled bet.
    pub fn refund_stake(&mut self, stake: &mut Stake) -> Result<u64> {
        require!(self.status == BetStatus::Canceled, BetError::BetNotCanceled);
        require!(stake.amount > 0, BetError::NoFundsToWithdraw);

        self.clear_stake(stake)
    }

    /// Payout owed to `stake` in a finished bet, 0 for losing or cleared stakes.
    pub fn payout_for(&self, stake: &Stake) -> Result<u64> {
        if stake.amount == 0 || self.winning_option != Some(stake.option) {
            return Ok(0);
        }
        winner_share(stake.amount, self.winning_total, self.final_pool)
    }

    /// Settle a winning stake. The whole payout leaves `total_pool`, so once
    /// every winner has withdrawn only rounding dust is left.
    pub fn withdraw_winnings(&mut self, stake: &mut Stake) -> Result<u64> {
        require!(self.status == BetStatus::Finished, BetError::BetNotFinished);

        let payout = self.payout_for(stake)?;
        require!(payout > 0, BetError::NoFundsToWithdraw);

        let total_pool = self
            .total_pool
            .checked_sub(payout)
            .ok_or(BetError::MathOverflow)?;
        let bettor_count = self
            .bettor_count
            .checked_sub(1)
            .ok_or(BetError::MathOverflow)?;

        self.total_pool = total_pool;
        self.bettor_count = bettor_count;
        stake.amount = 0;
        stake.paid_out = payout;

        Ok(payout)
    }

    /// What `stake` could collect right now without a status change.
    pub fn pending_balance(&self, stake: &Stake) -> Result<u64> {
        match self.status {
            BetStatus::Finished => self.payout_for(stake),
            BetStatus::Canceled => Ok(stake.amount),
            BetStatus::Open | BetStatus::Closed => Ok(0),
        }
    }

    pub fn info(&self) -> BetInfo {
        BetInfo {
            creator: self.creator,
            index: self.index,
            title: self.title.clone(),
            options: self.options.clone(),
            status: self.status,
            winning_option: self.winning_option,
            option_totals: self.option_totals[..self.options.len()].to_vec(),
            total_pool: self.total_pool,
            bettor_count: self.bettor_count,
        }
    }
}
