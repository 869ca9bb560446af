//! Vault custody and CPI wrappers
//!
//! The vault is a system-owned PDA holding the pooled lamports. It has no
//! private key: the only way to move funds out is a [`VaultAuthority`],
//! minted per call after re-deriving the vault address, which supplies the
//! signer seeds to `invoke_signed`. It is never stored and never built from
//! caller data.

use alloc::vec::Vec;
use pinocchio::{AccountView, Address, ProgramResult};
use solana_instruction_view::{
    cpi::{invoke, invoke_signed, invoke_signed_with_bounds, Signer},
    seeds, InstructionAccount, InstructionView,
};

#[cfg(feature = "verbose-logs")]
use solana_program_log::log;

#[cfg(feature = "verbose-logs")]
macro_rules! verbose_log {
    ($($arg:tt)*) => { log!($($arg)*) };
}

#[cfg(not(feature = "verbose-logs"))]
macro_rules! verbose_log {
    ($($arg:tt)*) => { };
}

use crate::{
    config::MAX_ROUTE_ACCOUNTS,
    error::CabalError,
    route::ValidatedRoute,
    state::seeds as state_seeds,
    verification::verify_vault_pda,
};

// ============================================================
// SYSTEM PROGRAM CPI
// ============================================================

/// System Program Transfer instruction data: [2u32 LE][lamports u64 LE]
fn transfer_data(lamports: u64) -> [u8; 12] {
    let mut ix_data = [0u8; 12];
    ix_data[0..4].copy_from_slice(&2u32.to_le_bytes());
    ix_data[4..12].copy_from_slice(&lamports.to_le_bytes());
    ix_data
}

/// Transfer lamports from a transaction signer
pub fn transfer_lamports<'a>(
    from: &'a AccountView,
    to: &'a AccountView,
    system_program: &'a AccountView,
    lamports: u64,
) -> ProgramResult {
    verbose_log!("Transferring {} lamports", lamports);

    let ix_data = transfer_data(lamports);
    let accounts = [
        InstructionAccount::writable_signer(from.address()),
        InstructionAccount::writable(to.address()),
    ];

    let instruction = InstructionView {
        program_id: system_program.address(),
        accounts: &accounts,
        data: &ix_data,
    };

    invoke(&instruction, &[from, to, system_program])
}

/// Create a program-owned PDA account funded by `payer`
pub fn create_pda_account<'a>(
    payer: &'a AccountView,
    new_account: &'a AccountView,
    system_program: &'a AccountView,
    lamports: u64,
    space: u64,
    owner: &Address,
    signer: Signer,
) -> ProgramResult {
    verbose_log!("Creating account with {} lamports, {} bytes", lamports, space);

    // System Program CreateAccount instruction data:
    // [0..4]: discriminator = 0
    // [4..12]: lamports (u64 LE)
    // [12..20]: space (u64 LE)
    // [20..52]: owner (32 bytes)
    let mut ix_data = [0u8; 52];
    ix_data[0..4].copy_from_slice(&0u32.to_le_bytes());
    ix_data[4..12].copy_from_slice(&lamports.to_le_bytes());
    ix_data[12..20].copy_from_slice(&space.to_le_bytes());
    ix_data[20..52].copy_from_slice(owner.as_ref());

    let accounts = [
        InstructionAccount::writable_signer(payer.address()),
        InstructionAccount::writable_signer(new_account.address()),
    ];

    let instruction = InstructionView {
        program_id: system_program.address(),
        accounts: &accounts,
        data: &ix_data,
    };

    invoke_signed(&instruction, &[payer, new_account, system_program], &[signer])
}

// ============================================================
// SPL TOKEN CPI
// ============================================================

/// SyncNative (instruction 17): credit lamports sent to a wrapped-SOL
/// account to its token balance. Needs no signer.
pub fn sync_native<'a>(wsol_account: &'a AccountView, token_program: &'a AccountView) -> ProgramResult {
    let ix_data = [17u8];
    let accounts = [InstructionAccount::writable(wsol_account.address())];

    let instruction = InstructionView {
        program_id: token_program.address(),
        accounts: &accounts,
        data: &ix_data,
    };

    invoke(&instruction, &[wsol_account, token_program])
}

// ============================================================
// VAULT AUTHORITY
// ============================================================

/// Proof that this call may sign for a cabal's vault.
///
/// Only obtainable through [`VaultAuthority::prove`], which re-derives the
/// vault address from the cabal and its stored bump.
pub struct VaultAuthority {
    vault: Address,
    cabal: [u8; 32],
    bump: [u8; 1],
}

impl VaultAuthority {
    /// Verify `vault` is the PDA ["vault", cabal] and mint its signing proof
    pub fn prove(
        vault: &AccountView,
        cabal: &Address,
        bump: u8,
        program_id: &Address,
    ) -> Result<Self, pinocchio::error::ProgramError> {
        verify_vault_pda(vault, cabal, bump, program_id)?;

        let mut cabal_bytes = [0u8; 32];
        cabal_bytes.copy_from_slice(cabal.as_ref());

        Ok(Self {
            vault: vault.address().clone(),
            cabal: cabal_bytes,
            bump: [bump],
        })
    }

    pub fn vault(&self) -> &Address {
        &self.vault
    }

    /// Run `f` with the vault's signer seeds
    fn with_signer<R>(&self, f: impl FnOnce(Signer) -> R) -> R {
        let vault_seeds = seeds!(state_seeds::VAULT, self.cabal.as_slice(), self.bump.as_slice());
        f(Signer::from(&vault_seeds))
    }

    /// Transfer lamports out of the vault
    pub fn transfer<'a>(
        &self,
        vault: &'a AccountView,
        to: &'a AccountView,
        system_program: &'a AccountView,
        lamports: u64,
    ) -> ProgramResult {
        if vault.address() != &self.vault {
            return Err(CabalError::InvalidPda.into());
        }
        verbose_log!("Vault transferring {} lamports", lamports);

        let ix_data = transfer_data(lamports);
        let accounts = [
            InstructionAccount::writable_signer(vault.address()),
            InstructionAccount::writable(to.address()),
        ];

        let instruction = InstructionView {
            program_id: system_program.address(),
            accounts: &accounts,
            data: &ix_data,
        };

        self.with_signer(|signer| invoke_signed(&instruction, &[vault, to, system_program], &[signer]))
    }

    /// Forward a validated route to the swap router.
    ///
    /// Flags come from the validated payload; the vault entry alone is
    /// raised to signer, backed by this proof.
    pub fn forward(&self, route: &ValidatedRoute, route_accounts: &[AccountView]) -> ProgramResult {
        if route_accounts.len() != route.accounts().len() || route_accounts.len() > MAX_ROUTE_ACCOUNTS {
            return Err(CabalError::InvalidInstructionData.into());
        }

        let metas: Vec<InstructionAccount> = route
            .accounts()
            .iter()
            .map(|account| {
                let signer = account.is_signer || route.is_vault(account);
                instruction_account(&account.address, account.is_writable, signer)
            })
            .collect();

        let views: Vec<&AccountView> = route_accounts.iter().collect();

        let instruction = InstructionView {
            program_id: route.program_id(),
            accounts: &metas,
            data: route.data(),
        };

        verbose_log!("Forwarding {} accounts to router", metas.len());

        self.with_signer(|signer| {
            invoke_signed_with_bounds::<MAX_ROUTE_ACCOUNTS>(&instruction, &views, &[signer])
        })
        .map_err(|_| CabalError::SwapExecutionFailed.into())
    }
}

fn instruction_account(address: &Address, writable: bool, signer: bool) -> InstructionAccount<'_> {
    match (writable, signer) {
        (true, true) => InstructionAccount::writable_signer(address),
        (true, false) => InstructionAccount::writable(address),
        (false, true) => InstructionAccount::readonly_signer(address),
        (false, false) => InstructionAccount::readonly(address),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_system_transfer() {
        let data = transfer_data(1_010_000);
        assert_eq!(&data[0..4], &[2, 0, 0, 0]);
        assert_eq!(u64::from_le_bytes(data[4..12].try_into().unwrap()), 1_010_000);
    }
}
