//! Cabal Program
//!
//! Shared-custody trading vaults on Solana. A cabal is a small group of
//! members who pool lamports into a program-controlled vault and trade it
//! through the Jupiter router, paying a protocol fee per swap.
//!
//! Flow:
//! 1. CreateCabal: creator fixes buy-in and fee rate, vault rent is reserved
//! 2. JoinCabal / LurkerDeposit: deposits land in the vault
//! 3. Swap: a member submits an untrusted routing payload, which is
//!    validated before the vault signs anything
//! 4. Withdraw: a depositor exits with a pro-rata share of the vault

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use pinocchio::{AccountView, Address, ProgramResult};

pub mod config;
pub mod error;
pub mod fee;
pub mod instruction;
pub mod processor;
pub mod route;
pub mod state;
pub mod vault;
pub mod verification;

// Program ID: 3jUomWjaKdsxzKt6Tn5DkzeAy3Yw686XDdT8dyWVeVmq
pub const ID: Address = Address::new_from_array([
    0x28, 0x99, 0x35, 0x64, 0x08, 0xc8, 0x58, 0xe7,
    0x23, 0x9e, 0xdd, 0x1d, 0x14, 0x2e, 0x22, 0xe9,
    0x2c, 0x23, 0xd7, 0x0c, 0x21, 0xd0, 0xe7, 0x67,
    0xc4, 0x24, 0x93, 0x98, 0x60, 0x57, 0xf5, 0xc0,
]);

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint {
    use super::*;
    use pinocchio::{entrypoint, nostd_panic_handler};

    // Set up panic handler for no_std
    nostd_panic_handler!();

    entrypoint!(process_instruction);
}

pub fn process_instruction(
    program_id: &Address,
    accounts: &[AccountView],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::process(program_id, accounts, instruction_data)
}
