#![allow(unexpected_cfgs)]

use anchor_lang::prelude::*;
use anchor_lang::system_program;

pub mod constants;
pub mod ledger;
pub mod lifecycle;
pub mod pda;
pub mod registry;

pub use constants::*;

declare_id!("6Xc4QjtvPB4Pn1sSKBJtWJ9T3BqmYxN2sWEqTz4Hf8vR");

/// Bet Factory
/// Pari-mutuel betting pools deployed through a single registry.
/// Winners split the losing side pro rata, cancellations refund every stake.

#[program]
pub mod bet_factory {
    use super::*;

    /// Create the registry that numbers and enumerates every bet
    pub fn initialize_registry(ctx: Context<InitializeRegistry>) -> Result<()> {
        let registry = &mut ctx.accounts.registry;
        registry.bets_count = 0;
        registry.bump = ctx.bumps.registry;

        emit!(RegistryInitialized {
            registry: ctx.accounts.registry.key(),
        });

        Ok(())
    }

    // ==================== REGISTRY ====================

    /// Deploy a new bet owned by the caller and append it to the registry
    /// title: Short description (e.g., "Who wins the final?")
    /// options: 2-8 distinct option labels (e.g., ["Home", "Away", "Draw"])
    pub fn create_bet(
        ctx: Context<CreateBet>,
        title: String,
        options: Vec<String>,
    ) -> Result<()> {
        let clock = Clock::get()?;
        let registry_key = ctx.accounts.registry.key();
        let creator_key = ctx.accounts.creator.key();

        // Pool PDA was derived from the count before this increment
        let index = ctx.accounts.registry.register()?;

        let pool = &mut ctx.accounts.pool;
        pool.initialize(
            creator_key,
            registry_key,
            index,
            title,
            options,
            clock.unix_timestamp,
            ctx.bumps.pool,
        )?;

        msg!("Bet #{} created by {}", index, creator_key);

        emit!(PoolCreated {
            creator: creator_key,
            pool: ctx.accounts.pool.key(),
            index,
        });

        Ok(())
    }

    /// Page through bet addresses in creation order.
    /// Returns `min(limit, bets_count - offset)` addresses. Return data is
    /// capped at 1024 bytes, so a page longer than `MAX_PAGE_SIZE` (31) fails
    /// with `PageTooLarge`; page in chunks of at most 31.
    pub fn get_bets(ctx: Context<ReadRegistry>, limit: u64, offset: u64) -> Result<Vec<Pubkey>> {
        let registry_key = ctx.accounts.registry.key();
        ctx.accounts
            .registry
            .bet_addresses(&registry_key, limit, offset, ctx.program_id)
    }

    /// Number of bets created so far
    pub fn bets_count(ctx: Context<ReadRegistry>) -> Result<u64> {
        Ok(ctx.accounts.registry.bets_count)
    }

    // ==================== BETTING ====================

    /// Stake `amount` lamports on `option`. One live stake per bettor and bet.
    pub fn place_bet(ctx: Context<PlaceBet>, option: u8, amount: u64) -> Result<()> {
        // Capture keys before mutable borrows
        let pool_key = ctx.accounts.pool.key();
        let bettor_key = ctx.accounts.bettor.key();

        let pool = &mut ctx.accounts.pool;
        let stake = &mut ctx.accounts.stake;
        pool.place(stake, pool_key, bettor_key, option, amount)?;
        stake.bump = ctx.bumps.stake;

        // Transfer stake to the pool account (escrow)
        let cpi_context = CpiContext::new(
            ctx.accounts.system_program.to_account_info(),
            system_program::Transfer {
                from: ctx.accounts.bettor.to_account_info(),
                to: ctx.accounts.pool.to_account_info(),
            },
        );
        system_program::transfer(cpi_context, amount)?;

        emit!(BetPlaced {
            pool: pool_key,
            participant: bettor_key,
            option,
            amount,
            total_pool: ctx.accounts.pool.total_pool,
        });

        Ok(())
    }

    /// Recover your own stake while betting is still open
    pub fn cashback_bet(ctx: Context<SettleStake>) -> Result<()> {
        let amount = ctx.accounts.settle(|pool, stake| pool.cashback(stake))?;

        // Ledger is cleared above; only now move the lamports
        pay_out(
            &ctx.accounts.pool.to_account_info(),
            &ctx.accounts.bettor.to_account_info(),
            amount,
        )?;

        emit!(Cashback {
            pool: ctx.accounts.pool.key(),
            participant: ctx.accounts.bettor.key(),
            amount,
        });

        Ok(())
    }

    /// Collect stake plus pro-rata share of the losing pool from a finished bet
    pub fn withdraw(ctx: Context<SettleStake>) -> Result<()> {
        let payout = ctx
            .accounts
            .settle(|pool, stake| pool.withdraw_winnings(stake))?;

        pay_out(
            &ctx.accounts.pool.to_account_info(),
            &ctx.accounts.bettor.to_account_info(),
            payout,
        )?;

        msg!("Paid {} lamports to {}", payout, ctx.accounts.bettor.key());

        emit!(Withdrawal {
            pool: ctx.accounts.pool.key(),
            participant: ctx.accounts.bettor.key(),
            amount: payout,
        });

        Ok(())
    }

    /// Claim a refund from a canceled bet that was not pushed during cancel
    pub fn claim_refund(ctx: Context<SettleStake>) -> Result<()> {
        let amount = ctx.accounts.settle(|pool, stake| pool.refund_stake(stake))?;

        pay_out(
            &ctx.accounts.pool.to_account_info(),
            &ctx.accounts.bettor.to_account_info(),
            amount,
        )?;

        emit!(Refund {
            pool: ctx.accounts.pool.key(),
            participant: ctx.accounts.bettor.key(),
            amount,
        });

        Ok(())
    }

    // ==================== CREATOR ACTIONS ====================

    /// Stop accepting bets (creator only)
    pub fn close_bet(ctx: Context<ManageBet>) -> Result<()> {
        let creator = ctx.accounts.creator.key();
        ctx.accounts.pool.close_betting(creator)?;

        msg!("Bet {} closed", ctx.accounts.pool.key());

        emit!(PoolClosed {
            pool: ctx.accounts.pool.key(),
            total_pool: ctx.accounts.pool.total_pool,
        });

        Ok(())
    }

    /// Cancel an open or closed bet (creator only)
    /// remaining_accounts: optional `(stake, bettor)` pairs refunded right away.
    /// Any stake left out stays claimable through `claim_refund`.
    pub fn cancel_bet<'info>(ctx: Context<'_, '_, 'info, 'info, ManageBet<'info>>) -> Result<()> {
        let clock = Clock::get()?;
        let creator = ctx.accounts.creator.key();
        let pool_key = ctx.accounts.pool.key();
        ctx.accounts.pool.cancel_betting(creator, clock.unix_timestamp)?;

        let pool_info = ctx.accounts.pool.to_account_info();
        let refunds = refund_pairs(
            &mut ctx.accounts.pool,
            pool_key,
            &pool_info,
            ctx.remaining_accounts,
        )?;

        for &(participant, amount) in &refunds {
            emit!(Refund {
                pool: pool_key,
                participant,
                amount,
            });
        }
        let refunded = refunds.len() as u32;

        msg!(
            "Bet {} canceled, {} refunds pushed, {} left to claim",
            pool_key,
            refunded,
            ctx.accounts.pool.bettor_count
        );

        emit!(PoolCanceled {
            pool: pool_key,
            refunded,
            unclaimed: ctx.accounts.pool.total_pool,
        });

        Ok(())
    }

    /// Declare the winning option of a closed bet (creator only)
    pub fn set_winner(ctx: Context<ManageBet>, winning_option: u8) -> Result<()> {
        let clock = Clock::get()?;
        let creator = ctx.accounts.creator.key();
        let pool = &mut ctx.accounts.pool;
        pool.declare_winner(creator, winning_option, clock.unix_timestamp)?;

        let final_pool = pool.final_pool;
        let winning_total = pool.winning_total;

        msg!(
            "Winner of {} is option {}: {} of {} lamports on it",
            ctx.accounts.pool.key(),
            winning_option,
            winning_total,
            final_pool
        );

        emit!(WinnerDeclared {
            pool: ctx.accounts.pool.key(),
            winning_option,
            final_pool,
            winning_total,
        });

        Ok(())
    }

    // ==================== VIEWS ====================

    pub fn get_name(ctx: Context<ReadBet>) -> Result<String> {
        Ok(ctx.accounts.pool.title.clone())
    }

    pub fn get_options(ctx: Context<ReadBet>) -> Result<Vec<String>> {
        Ok(ctx.accounts.pool.options.clone())
    }

    pub fn get_status(ctx: Context<ReadBet>) -> Result<BetStatus> {
        Ok(ctx.accounts.pool.status)
    }

    /// Lamports of stake currently held by the bet
    pub fn get_balance(ctx: Context<ReadBet>) -> Result<u64> {
        Ok(ctx.accounts.pool.total_pool)
    }

    pub fn get_creator(ctx: Context<ReadBet>) -> Result<Pubkey> {
        Ok(ctx.accounts.pool.creator)
    }

    pub fn get_winner(ctx: Context<ReadBet>) -> Result<Option<u8>> {
        Ok(ctx.accounts.pool.winning_option)
    }

    pub fn get_bet_info(ctx: Context<ReadBet>) -> Result<BetInfo> {
        Ok(ctx.accounts.pool.info())
    }

    /// The caller's own stake, zeroed when there is none
    pub fn get_bet(ctx: Context<ReadStake>) -> Result<StakeInfo> {
        let stake = ctx.accounts.checked_stake()?;
        Ok(ctx.accounts.pool.stake_of(stake))
    }

    /// What the caller could collect right now (winnings or refund)
    pub fn get_user_balance(ctx: Context<ReadStake>) -> Result<u64> {
        match ctx.accounts.checked_stake()? {
            Some(stake) => ctx.accounts.pool.pending_balance(stake),
            None => Ok(0),
        }
    }
}

// === Helper Functions ===

/// Push refunds for `(stake, bettor)` pairs of a canceled bet.
/// Returns the bettors actually paid; cleared or repeated stakes are skipped.
fn refund_pairs<'info>(
    pool: &mut BettingPool,
    pool_key: Pubkey,
    pool_info: &AccountInfo<'info>,
    accounts: &[AccountInfo<'info>],
) -> Result<Vec<(Pubkey, u64)>> {
    require!(accounts.len() % 2 == 0, BetError::InvalidRefundAccounts);

    let mut refunds = Vec::with_capacity(accounts.len() / 2);
    for pair in accounts.chunks(2) {
        let (stake_info, bettor_info) = (&pair[0], &pair[1]);
        let amount = refund_pair(pool, pool_key, pool_info, stake_info, bettor_info)?;
        if amount > 0 {
            refunds.push((bettor_info.key(), amount));
        }
    }

    Ok(refunds)
}

/// Refund one `(stake, bettor)` pair of a canceled bet.
/// The stake is cleared and written back before any lamports move.
/// Returns 0 for a stake that holds nothing.
fn refund_pair<'info>(
    pool: &mut BettingPool,
    pool_key: Pubkey,
    pool_info: &AccountInfo<'info>,
    stake_info: &AccountInfo<'info>,
    bettor_info: &AccountInfo<'info>,
) -> Result<u64> {
    require_keys_eq!(*stake_info.owner, crate::ID, BetError::InvalidRefundAccounts);

    let mut stake = {
        let data = stake_info.try_borrow_data()?;
        let mut slice: &[u8] = &data;
        Stake::try_deserialize(&mut slice)?
    };
    require_keys_eq!(stake.pool, pool_key, BetError::InvalidRefundAccounts);
    require_keys_eq!(stake.bettor, bettor_info.key(), BetError::InvalidRefundAccounts);

    if stake.amount == 0 {
        return Ok(0);
    }

    let amount = pool.refund_stake(&mut stake)?;
    {
        let mut data = stake_info.try_borrow_mut_data()?;
        let mut writer: &mut [u8] = &mut data;
        stake.try_serialize(&mut writer)?;
    }

    pay_out(pool_info, bettor_info, amount)?;
    Ok(amount)
}

/// Move lamports out of a program-owned bet account.
/// Callers must clear the ledger entry before calling.
fn pay_out<'info>(
    pool: &AccountInfo<'info>,
    recipient: &AccountInfo<'info>,
    amount: u64,
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }

    let pool_lamports = pool.lamports();
    let recipient_lamports = recipient.lamports();

    **pool.try_borrow_mut_lamports()? = pool_lamports
        .checked_sub(amount)
        .ok_or(BetError::MathOverflow)?;
    **recipient.try_borrow_mut_lamports()? = recipient_lamports
        .checked_add(amount)
        .ok_or(BetError::MathOverflow)?;

    Ok(())
}

// === Account Structures ===

#[derive(Accounts)]
pub struct InitializeRegistry<'info> {
    #[account(
        init,
        payer = payer,
        space = 8 + Registry::INIT_SPACE,
        seeds = [REGISTRY_SEED],
        bump
    )]
    pub registry: Account<'info, Registry>,

    #[account(mut)]
    pub payer: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct CreateBet<'info> {
    #[account(mut, seeds = [REGISTRY_SEED], bump = registry.bump)]
    pub registry: Account<'info, Registry>,

    #[account(
        init,
        payer = creator,
        space = 8 + BettingPool::INIT_SPACE,
        seeds = [BET_SEED, registry.key().as_ref(), &registry.bets_count.to_le_bytes()],
        bump
    )]
    pub pool: Account<'info, BettingPool>,

    #[account(mut)]
    pub creator: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct ReadRegistry<'info> {
    #[account(seeds = [REGISTRY_SEED], bump = registry.bump)]
    pub registry: Account<'info, Registry>,
}

#[derive(Accounts)]
pub struct PlaceBet<'info> {
    #[account(
        mut,
        constraint = pool.status == BetStatus::Open @ BetError::BettingClosed
    )]
    pub pool: Account<'info, BettingPool>,

    #[account(
        init_if_needed,
        payer = bettor,
        space = 8 + Stake::INIT_SPACE,
        seeds = [STAKE_SEED, pool.key().as_ref(), bettor.key().as_ref()],
        bump
    )]
    pub stake: Account<'info, Stake>,

    #[account(mut)]
    pub bettor: Signer<'info>,
    pub system_program: Program<'info, System>,
}

/// Shared by cashback, withdraw and refund claims.
/// `stake` may be omitted by a caller who never bet.
#[derive(Accounts)]
pub struct SettleStake<'info> {
    #[account(mut)]
    pub pool: Account<'info, BettingPool>,

    #[account(mut)]
    pub stake: Option<Account<'info, Stake>>,

    #[account(mut)]
    pub bettor: Signer<'info>,
}

impl<'info> SettleStake<'info> {
    /// Run `settle` on the bet and the caller's stake. Without a stake account
    /// it runs on an empty stake, so the bet decides which error applies.
    pub fn settle(
        &mut self,
        settle: impl FnOnce(&mut BettingPool, &mut Stake) -> Result<u64>,
    ) -> Result<u64> {
        let pool_key = self.pool.key();
        let bettor_key = self.bettor.key();
        let pool: &mut BettingPool = &mut self.pool;

        match self.stake.as_deref_mut() {
            Some(stake) => {
                require_keys_eq!(stake.pool, pool_key, BetError::NotStakeOwner);
                require_keys_eq!(stake.bettor, bettor_key, BetError::NotStakeOwner);
                settle(pool, stake)
            }
            None => settle(pool, &mut Stake::default()),
        }
    }
}

/// Shared by close_bet, cancel_bet and set_winner
#[derive(Accounts)]
pub struct ManageBet<'info> {
    #[account(
        mut,
        constraint = pool.creator == creator.key() @ BetError::NotCreator
    )]
    pub pool: Account<'info, BettingPool>,

    pub creator: Signer<'info>,
}

#[derive(Accounts)]
pub struct ReadBet<'info> {
    pub pool: Account<'info, BettingPool>,
}

#[derive(Accounts)]
pub struct ReadStake<'info> {
    pub pool: Account<'info, BettingPool>,

    pub stake: Option<Account<'info, Stake>>,

    pub bettor: Signer<'info>,
}

impl<'info> ReadStake<'info> {
    /// The supplied stake, if any, must belong to this pool and the caller.
    pub fn checked_stake(&self) -> Result<Option<&Stake>> {
        let Some(stake) = self.stake.as_ref() else {
            return Ok(None);
        };
        require_keys_eq!(stake.pool, self.pool.key(), BetError::NotStakeOwner);
        require_keys_eq!(stake.bettor, self.bettor.key(), BetError::NotStakeOwner);
        let stake: &Stake = stake;
        Ok(Some(stake))
    }
}

// === State Accounts ===

#[account]
#[derive(InitSpace, Default)]
pub struct Registry {
    pub bets_count: u64,
    pub bump: u8,
}

#[account]
#[derive(InitSpace, Default)]
pub struct BettingPool {
    pub creator: Pubkey,
    pub registry: Pubkey,
    pub index: u64,
    #[max_len(200)]
    pub title: String,
    #[max_len(8, 32)]
    pub options: Vec<String>,
    pub status: BetStatus,
    pub winning_option: Option<u8>,
    pub option_totals: [u64; 8], // Live stake per option
    pub total_pool: u64,
    pub bettor_count: u32,
    pub final_pool: u64,    // total_pool when the winner was declared
    pub winning_total: u64, // winning option's total at the same moment
    pub created_at: i64,
    pub resolved_at: i64,
    pub bump: u8,
}

#[account]
#[derive(InitSpace, Default)]
pub struct Stake {
    pub pool: Pubkey,
    pub bettor: Pubkey,
    pub option: u8,
    pub amount: u64,   // 0 once paid back or never placed
    pub paid_out: u64, // last payout, kept for history
    pub bump: u8,
}

// === Types ===

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug, Default, InitSpace)]
pub enum BetStatus {
    #[default]
    Open,
    Closed,
    Canceled,
    Finished,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct StakeInfo {
    pub option: u8,
    pub amount: u64,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, PartialEq, Eq, Debug)]
pub struct BetInfo {
    pub creator: Pubkey,
    pub index: u64,
    pub title: String,
    pub options: Vec<String>,
    pub status: BetStatus,
    pub winning_option: Option<u8>,
    pub option_totals: Vec<u64>,
    pub total_pool: u64,
    pub bettor_count: u32,
}

// === Events ===

#[event]
pub struct RegistryInitialized {
    pub registry: Pubkey,
}

#[event]
pub struct PoolCreated {
    pub creator: Pubkey,
    pub pool: Pubkey,
    pub index: u64,
}

#[event]
pub struct BetPlaced {
    pub pool: Pubkey,
    pub participant: Pubkey,
    pub option: u8,
    pub amount: u64,
    pub total_pool: u64,
}

#[event]
pub struct PoolClosed {
    pub pool: Pubkey,
    pub total_pool: u64,
}

#[event]
pub struct PoolCanceled {
    pub pool: Pubkey,
    pub refunded: u32,
    pub unclaimed: u64,
}

#[event]
pub struct WinnerDeclared {
    pub pool: Pubkey,
    pub winning_option: u8,
    pub final_pool: u64,
    pub winning_total: u64,
}

#[event]
pub struct Cashback {
    pub pool: Pubkey,
    pub participant: Pubkey,
    pub amount: u64,
}

#[event]
pub struct Withdrawal {
    pub pool: Pubkey,
    pub participant: Pubkey,
    pub amount: u64,
}

#[event]
pub struct Refund {
    pub pool: Pubkey,
    pub participant: Pubkey,
    pub amount: u64,
}

// === Errors ===

#[error_code]
pub enum BetError {
    // State errors
    #[msg("Betting is closed")]
    BettingClosed,
    #[msg("Betting must be closed to set a winner")]
    BetNotClosed,
    #[msg("Bet is not finished")]
    BetNotFinished,
    #[msg("Bet was not canceled")]
    BetNotCanceled,
    // Authorization errors
    #[msg("Only the bet creator can do this")]
    NotCreator,
    #[msg("Stake does not belong to this bettor")]
    NotStakeOwner,
    // Validation errors
    #[msg("At least 2 options required")]
    TooFewOptions,
    #[msg("Maximum 8 options allowed")]
    TooManyOptions,
    #[msg("Title too long (max 200 bytes)")]
    TitleTooLong,
    #[msg("Option label cannot be empty")]
    EmptyOption,
    #[msg("Option label too long (max 32 bytes)")]
    OptionTooLong,
    #[msg("Option labels must be distinct")]
    DuplicateOption,
    #[msg("Invalid option")]
    InvalidOption,
    #[msg("Value must be greater than 0")]
    InvalidAmount,
    #[msg("No winning bets")]
    NoWinningBets,
    #[msg("Offset out of bounds")]
    OffsetOutOfBounds,
    #[msg("Page too large for return data")]
    PageTooLarge,
    #[msg("Refund accounts must be (stake, bettor) pairs of this bet")]
    InvalidRefundAccounts,
    // Duplicate actions
    #[msg("Already bet")]
    AlreadyBet,
    #[msg("You didn't bet")]
    DidNotBet,
    // Funds
    #[msg("No funds to withdraw")]
    NoFundsToWithdraw,
    #[msg("Arithmetic overflow")]
    MathOverflow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::error::Error;

    /// Backing storage for an `AccountInfo` in host tests
    struct TestAccount {
        key: Pubkey,
        owner: Pubkey,
        lamports: u64,
        data: Vec<u8>,
        is_signer: bool,
    }

    impl TestAccount {
        fn wallet(lamports: u64) -> Self {
            Self {
                key: Pubkey::new_unique(),
                owner: Pubkey::default(),
                lamports,
                data: Vec::new(),
                is_signer: true,
            }
        }

        fn program<T: AccountSerialize>(state: &T, lamports: u64) -> Self {
            let mut data = Vec::new();
            state.try_serialize(&mut data).unwrap();
            Self {
                key: Pubkey::new_unique(),
                owner: crate::ID,
                lamports,
                data,
                is_signer: false,
            }
        }

        fn info(&mut self) -> AccountInfo<'_> {
            AccountInfo::new(
                &self.key,
                self.is_signer,
                true,
                &mut self.lamports,
                &mut self.data,
                &self.owner,
                false,
                0,
            )
        }
    }

    fn open_pool() -> BettingPool {
        let mut pool = BettingPool::default();
        pool.initialize(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            0,
            "Who wins?".to_string(),
            vec!["Home".to_string(), "Away".to_string()],
            1_700_000_000,
            255,
        )
        .unwrap();
        pool
    }

    fn stake_in(pool: &mut BettingPool, pool_key: Pubkey, bettor: Pubkey, option: u8, amount: u64) -> Stake {
        let mut stake = Stake::default();
        pool.place(&mut stake, pool_key, bettor, option, amount).unwrap();
        stake
    }

    fn stored_stake(info: &AccountInfo) -> Stake {
        let data = info.try_borrow_data().unwrap();
        let mut slice: &[u8] = &data;
        Stake::try_deserialize(&mut slice).unwrap()
    }

    #[test]
    fn test_pushed_refunds_return_every_stake() {
        let mut pool = open_pool();
        let pool_key = Pubkey::new_unique();
        let mut alice = TestAccount::wallet(0);
        let mut bob = TestAccount::wallet(5);
        let alice_stake = stake_in(&mut pool, pool_key, alice.key, 0, 1_000);
        let bob_stake = stake_in(&mut pool, pool_key, bob.key, 1, 2_500);
        let before = pool.total_pool;

        let creator = pool.creator;
        pool.cancel_betting(creator, 10).unwrap();

        let mut vault = TestAccount::program(&pool, 10_000 + before);
        let mut alice_stake = TestAccount::program(&alice_stake, 1);
        let mut bob_stake = TestAccount::program(&bob_stake, 1);
        let vault_info = vault.info();
        let accounts = vec![alice_stake.info(), alice.info(), bob_stake.info(), bob.info()];

        let refunds = refund_pairs(&mut pool, pool_key, &vault_info, &accounts).unwrap();

        assert_eq!(refunds, vec![(accounts[1].key(), 1_000), (accounts[3].key(), 2_500)]);
        assert_eq!(refunds.iter().map(|r| r.1).sum::<u64>(), before);
        assert_eq!(pool.total_pool, 0);
        assert_eq!(pool.bettor_count, 0);
        assert_eq!(vault_info.lamports(), 10_000);
        assert_eq!(accounts[1].lamports(), 1_000);
        assert_eq!(accounts[3].lamports(), 2_505);

        let stored = stored_stake(&accounts[0]);
        assert_eq!(stored.amount, 0);
        assert_eq!(stored.paid_out, 1_000);
    }

    #[test]
    fn test_repeated_pair_refunded_once() {
        let mut pool = open_pool();
        let pool_key = Pubkey::new_unique();
        let mut alice = TestAccount::wallet(0);
        let mut carol = TestAccount::wallet(0);
        let alice_stake = stake_in(&mut pool, pool_key, alice.key, 0, 700);
        let mut carol_stake = stake_in(&mut pool, pool_key, carol.key, 1, 300);

        // Carol cashed back before the cancel
        pool.cashback(&mut carol_stake).unwrap();
        let creator = pool.creator;
        pool.cancel_betting(creator, 10).unwrap();

        let mut vault = TestAccount::program(&pool, 700);
        let mut alice_stake = TestAccount::program(&alice_stake, 1);
        let mut carol_stake = TestAccount::program(&carol_stake, 1);
        let vault_info = vault.info();
        let alice_stake_info = alice_stake.info();
        let alice_info = alice.info();
        let accounts = vec![
            alice_stake_info.clone(),
            alice_info.clone(),
            alice_stake_info,
            alice_info,
            carol_stake.info(),
            carol.info(),
        ];

        let refunds = refund_pairs(&mut pool, pool_key, &vault_info, &accounts).unwrap();

        assert_eq!(refunds, vec![(accounts[1].key(), 700)]);
        assert_eq!(accounts[1].lamports(), 700);
        assert_eq!(accounts[5].lamports(), 0);
        assert_eq!(vault_info.lamports(), 0);
        assert_eq!(pool.total_pool, 0);
    }

    #[test]
    fn test_malformed_refund_accounts_rejected() {
        let mut pool = open_pool();
        let pool_key = Pubkey::new_unique();
        let mut alice = TestAccount::wallet(0);
        let mut mallory = TestAccount::wallet(0);
        let alice_stake = stake_in(&mut pool, pool_key, alice.key, 0, 400);
        let foreign_stake = stake_in(&mut pool, Pubkey::new_unique(), mallory.key, 1, 100);
        let creator = pool.creator;
        pool.cancel_betting(creator, 10).unwrap();

        let mut vault = TestAccount::program(&pool, 500);
        let mut alice_stake = TestAccount::program(&alice_stake, 1);
        let mut foreign_stake = TestAccount::program(&foreign_stake, 1);
        let mut not_ours = TestAccount::program(&Stake::default(), 1);
        not_ours.owner = Pubkey::new_unique();
        let mut not_a_stake = TestAccount::program(&Registry::default(), 1);

        let vault_info = vault.info();
        let alice_stake_info = alice_stake.info();
        let alice_info = alice.info();
        let mallory_info = mallory.info();
        let invalid = Error::from(BetError::InvalidRefundAccounts);

        // Odd number of accounts
        let odd = vec![alice_stake_info.clone()];
        assert_eq!(refund_pairs(&mut pool, pool_key, &vault_info, &odd).unwrap_err(), invalid);

        // Stake owned by another program
        let foreign_owner = vec![not_ours.info(), alice_info.clone()];
        assert_eq!(
            refund_pairs(&mut pool, pool_key, &vault_info, &foreign_owner).unwrap_err(),
            invalid
        );

        // Stake of another bet
        let other_bet = vec![foreign_stake.info(), mallory_info.clone()];
        assert_eq!(
            refund_pairs(&mut pool, pool_key, &vault_info, &other_bet).unwrap_err(),
            invalid
        );

        // Refund redirected to someone else
        let wrong_bettor = vec![alice_stake_info.clone(), mallory_info];
        assert_eq!(
            refund_pairs(&mut pool, pool_key, &vault_info, &wrong_bettor).unwrap_err(),
            invalid
        );

        // Program account that is not a stake
        let wrong_type = vec![not_a_stake.info(), alice_info];
        assert!(refund_pairs(&mut pool, pool_key, &vault_info, &wrong_type).is_err());

        assert_eq!(pool.total_pool, 500);
        assert_eq!(vault_info.lamports(), 500);
        assert_eq!(stored_stake(&alice_stake_info).amount, 400);
    }

    #[test]
    fn test_pay_out_moves_exact_lamports() {
        let mut vault = TestAccount::program(&open_pool(), 1_000);
        let mut bettor = TestAccount::wallet(50);
        let vault_info = vault.info();
        let bettor_info = bettor.info();

        pay_out(&vault_info, &bettor_info, 0).unwrap();
        assert_eq!(vault_info.lamports(), 1_000);
        assert_eq!(bettor_info.lamports(), 50);

        pay_out(&vault_info, &bettor_info, 400).unwrap();
        assert_eq!(vault_info.lamports(), 600);
        assert_eq!(bettor_info.lamports(), 450);

        assert_eq!(
            pay_out(&vault_info, &bettor_info, 601).unwrap_err(),
            Error::from(BetError::MathOverflow)
        );
        assert_eq!(vault_info.lamports(), 600);
        assert_eq!(bettor_info.lamports(), 450);
    }

    #[test]
    fn test_settle_without_stake_account() {
        let mut pool = open_pool();
        stake_in(&mut pool, Pubkey::new_unique(), Pubkey::new_unique(), 0, 900);
        let creator = pool.creator;

        let mut vault = TestAccount::program(&pool, 900);
        let mut bettor = TestAccount::wallet(0);
        let vault_info = vault.info();
        let bettor_info = bettor.info();
        let mut accounts = SettleStake {
            pool: Account::try_from(&vault_info).unwrap(),
            stake: None,
            bettor: Signer::try_from(&bettor_info).unwrap(),
        };

        assert_eq!(
            accounts.settle(|pool, stake| pool.cashback(stake)).unwrap_err(),
            Error::from(BetError::DidNotBet)
        );
        assert_eq!(
            accounts.settle(|pool, stake| pool.withdraw_winnings(stake)).unwrap_err(),
            Error::from(BetError::BetNotFinished)
        );

        accounts.pool.close_betting(creator).unwrap();
        accounts.pool.declare_winner(creator, 0, 1_700_000_100).unwrap();
        assert_eq!(
            accounts.settle(|pool, stake| pool.withdraw_winnings(stake)).unwrap_err(),
            Error::from(BetError::NoFundsToWithdraw)
        );
        assert_eq!(accounts.pool.total_pool, 900);
    }

    #[test]
    fn test_settle_rejects_someone_elses_stake() {
        let mut pool = open_pool();
        let pool_key = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let stake = stake_in(&mut pool, pool_key, owner, 1, 250);

        let mut vault = TestAccount::program(&pool, 250);
        vault.key = pool_key;
        let mut stake = TestAccount::program(&stake, 1);
        let mut bettor = TestAccount::wallet(0);
        let vault_info = vault.info();
        let stake_info = stake.info();
        let bettor_info = bettor.info();
        let mut accounts = SettleStake {
            pool: Account::try_from(&vault_info).unwrap(),
            stake: Some(Account::try_from(&stake_info).unwrap()),
            bettor: Signer::try_from(&bettor_info).unwrap(),
        };

        assert_eq!(
            accounts.settle(|pool, stake| pool.cashback(stake)).unwrap_err(),
            Error::from(BetError::NotStakeOwner)
        );
        assert_eq!(accounts.pool.total_pool, 250);
    }
}
