use anchor_lang::prelude::*;

/// PDA Seeds
#[constant]
pub const REGISTRY_SEED: &[u8] = b"registry";
#[constant]
pub const BET_SEED: &[u8] = b"bet";
#[constant]
pub const STAKE_SEED: &[u8] = b"stake";

/// Option bounds enforced by the pool constructor
#[constant]
pub const MIN_OPTIONS: u8 = 2;
#[constant]
pub const MAX_OPTIONS: u8 = 8;

#[constant]
pub const MAX_TITLE_LEN: u32 = 200;
#[constant]
pub const MAX_OPTION_LEN: u32 = 32;

/// Return data is capped at 1024 bytes: 4 byte length prefix + 31 pubkeys.
#[constant]
pub const MAX_PAGE_SIZE: u64 = 31;
