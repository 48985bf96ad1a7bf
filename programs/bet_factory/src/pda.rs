//! PDA derivations for Bet Factory accounts
//!
//! Clients and other programs use these to locate the registry, a bet by its
//! creation index, and a bettor's stake in a bet.
//!
//! # Example
//!
//! ```ignore
//! use bet_factory::pda;
//!
//! let (registry, _) = pda::derive_registry_pda(&bet_factory::ID);
//! let (bet, _) = pda::derive_bet_pda(&registry, 0, &bet_factory::ID);
//! let (stake, _) = pda::derive_stake_pda(&bet, &bettor, &bet_factory::ID);
//! ```

use anchor_lang::prelude::*;

use crate::constants::{BET_SEED, REGISTRY_SEED, STAKE_SEED};

/// Derive the registry PDA address
pub fn derive_registry_pda(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[REGISTRY_SEED], program_id)
}

/// Derive the PDA of the bet created at `index`
pub fn derive_bet_pda(registry: &Pubkey, index: u64, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[BET_SEED, registry.as_ref(), &index.to_le_bytes()],
        program_id,
    )
}

/// Derive the stake PDA of `bettor` in `bet`
pub fn derive_stake_pda(bet: &Pubkey, bettor: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[STAKE_SEED, bet.as_ref(), bettor.as_ref()], program_id)
}
