//! Security verification helpers
//!
//! Known program IDs, PDA re-derivation from client-supplied bumps, owner
//! checks and vault holding-account checks.

use pinocchio::{AccountView, Address, ProgramResult};
use pinocchio_pubkey::derive_address;
use solana_program_log::log;

use crate::{
    config::ProtocolConfig,
    error::CabalError,
    state::{seeds, TokenHolding},
};

// ============================================================
// KNOWN PROGRAM IDS
// ============================================================

/// SPL Token Program ID
/// Address: TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA
pub const SPL_TOKEN_PROGRAM_ID: [u8; 32] = [
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93,
    0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79, 0xac,
    0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91,
    0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff, 0x00, 0xa9,
];

/// System Program ID
/// Address: 11111111111111111111111111111111
pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// Clock Sysvar ID
/// Address: SysvarC1ock11111111111111111111111111111111
pub const CLOCK_SYSVAR_ID: [u8; 32] = [
    0x06, 0xa7, 0xd5, 0x17, 0x18, 0xc7, 0x74, 0xc9,
    0x28, 0x56, 0x63, 0x98, 0x69, 0x1d, 0x5e, 0xb6,
    0x8b, 0x5e, 0xb8, 0xa3, 0x9b, 0x4b, 0x6d, 0x5c,
    0x73, 0x55, 0x5b, 0x21, 0x00, 0x00, 0x00, 0x00,
];

/// Wrapped SOL mint
/// Address: So11111111111111111111111111111111111111112
pub const NATIVE_MINT: [u8; 32] = [
    0x06, 0x9b, 0x88, 0x57, 0xfe, 0xab, 0x81, 0x84,
    0xfb, 0x68, 0x7f, 0x63, 0x46, 0x18, 0xc0, 0x35,
    0xda, 0xc4, 0x39, 0xdc, 0x1a, 0xeb, 0x3b, 0x55,
    0x98, 0xa0, 0xf0, 0x00, 0x00, 0x00, 0x00, 0x01,
];

// ============================================================
// CPI PROGRAM VERIFICATION
// ============================================================

/// Verify the account is the SPL Token Program
pub fn verify_spl_token_program(token_program: &AccountView) -> ProgramResult {
    if token_program.address().as_ref() != &SPL_TOKEN_PROGRAM_ID {
        log!("SECURITY: Invalid SPL Token program!");
        return Err(CabalError::InvalidProgram.into());
    }
    Ok(())
}

/// Verify the account is the System Program
pub fn verify_system_program(system_program: &AccountView) -> ProgramResult {
    if system_program.address().as_ref() != &SYSTEM_PROGRAM_ID {
        log!("SECURITY: Invalid System program!");
        return Err(CabalError::InvalidProgram.into());
    }
    Ok(())
}

/// Verify the account is the Clock sysvar
pub fn verify_clock_sysvar(clock_account: &AccountView) -> ProgramResult {
    if clock_account.address().as_ref() != &CLOCK_SYSVAR_ID {
        log!("SECURITY: Invalid Clock sysvar!");
        return Err(CabalError::InvalidProgram.into());
    }
    Ok(())
}

/// Read current slot from Clock sysvar data.
/// Layout: slot u64 at offset 0.
pub fn read_clock_slot(clock_data: &[u8]) -> Option<u64> {
    let slot_bytes: [u8; 8] = clock_data.get(0..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(slot_bytes))
}

/// Verify the fee account is the configured fee wallet
pub fn verify_fee_wallet(fee_wallet: &AccountView, config: &ProtocolConfig) -> ProgramResult {
    if fee_wallet.address() != &config.fee_wallet {
        log!("SECURITY: Fee account is not the protocol fee wallet!");
        return Err(CabalError::InvalidFeeDestination.into());
    }
    Ok(())
}

// ============================================================
// PDA VERIFICATION
// ============================================================

fn address_to_bytes(addr: &Address) -> [u8; 32] {
    let slice: &[u8] = addr.as_ref();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(slice);
    bytes
}

/// Verify cabal PDA derivation
/// Seeds: ["cabal", creator, nonce_le]
pub fn verify_cabal_pda(
    cabal_account: &AccountView,
    creator: &Address,
    nonce: u64,
    bump: u8,
    program_id: &Address,
) -> ProgramResult {
    let nonce_bytes = nonce.to_le_bytes();
    let expected = derive_address::<3>(
        &[seeds::CABAL, creator.as_ref(), &nonce_bytes],
        Some(bump),
        &address_to_bytes(program_id),
    );

    if cabal_account.address().as_ref() != expected.as_ref() {
        log!("Cabal PDA verification FAILED!");
        return Err(CabalError::InvalidPda.into());
    }
    Ok(())
}

/// Verify vault PDA derivation
/// Seeds: ["vault", cabal]
pub fn verify_vault_pda(
    vault_account: &AccountView,
    cabal: &Address,
    bump: u8,
    program_id: &Address,
) -> ProgramResult {
    let expected = derive_address::<2>(
        &[seeds::VAULT, cabal.as_ref()],
        Some(bump),
        &address_to_bytes(program_id),
    );

    if vault_account.address().as_ref() != expected.as_ref() {
        log!("Vault PDA verification FAILED!");
        return Err(CabalError::InvalidPda.into());
    }
    Ok(())
}

/// Verify membership PDA derivation
/// Seeds: ["membership", cabal, depositor]
pub fn verify_membership_pda(
    membership_account: &AccountView,
    cabal: &Address,
    depositor: &Address,
    bump: u8,
    program_id: &Address,
) -> ProgramResult {
    let expected = derive_address::<3>(
        &[seeds::MEMBERSHIP, cabal.as_ref(), depositor.as_ref()],
        Some(bump),
        &address_to_bytes(program_id),
    );

    if membership_account.address().as_ref() != expected.as_ref() {
        log!("Membership PDA verification FAILED!");
        return Err(CabalError::InvalidPda.into());
    }
    Ok(())
}

/// Verify account is owned by this program
pub fn verify_program_owner(account: &AccountView, program_id: &Address) -> ProgramResult {
    // SAFETY: no outstanding mutable borrow of the account exists here
    let owner = unsafe { account.owner() };

    if owner != program_id {
        log!("Account owner verification FAILED!");
        return Err(CabalError::InvalidOwner.into());
    }
    Ok(())
}

/// Verify an account is writable
pub fn verify_writable(account: &AccountView) -> ProgramResult {
    if !account.is_writable() {
        return Err(CabalError::AccountNotWritable.into());
    }
    Ok(())
}

/// Verify accounts are distinct
pub fn verify_distinct_accounts(pairs: &[(&AccountView, &AccountView, &str)]) -> ProgramResult {
    for (account_a, account_b, description) in pairs {
        if account_a.address() == account_b.address() {
            log!("SECURITY: Duplicate accounts detected!");
            log!("  Accounts must be distinct: {}", *description);
            return Err(CabalError::DuplicateAccount.into());
        }
    }
    Ok(())
}

// ============================================================
// VAULT HOLDING ACCOUNTS
// ============================================================

/// Check a decoded token account belongs to `vault`, optionally of `mint`
pub fn check_holding(holding: &TokenHolding, vault: &Address, mint: Option<&[u8; 32]>) -> Result<(), CabalError> {
    if holding.owner.as_slice() != vault.as_ref() {
        return Err(CabalError::InvalidOwner);
    }
    if let Some(mint) = mint {
        if &holding.mint != mint {
            return Err(CabalError::InvalidAccount);
        }
    }
    Ok(())
}

/// Verify a vault holding account and return its token balance
///
/// Must be an SPL token account whose token owner is the vault PDA.
pub fn verify_vault_holding(
    holding_account: &AccountView,
    vault: &Address,
    mint: Option<&[u8; 32]>,
) -> Result<u64, CabalError> {
    // SAFETY: no outstanding mutable borrow of the account exists here
    if unsafe { holding_account.owner() }.as_ref() != &SPL_TOKEN_PROGRAM_ID {
        log!("SECURITY: Holding account not owned by SPL Token!");
        return Err(CabalError::InvalidOwner);
    }

    let data = holding_account
        .try_borrow()
        .map_err(|_| CabalError::AccountBorrowFailed)?;
    let holding = TokenHolding::unpack(&data).ok_or(CabalError::InvalidAccount)?;

    check_holding(&holding, vault, mint).map_err(|e| {
        log!("SECURITY: Holding account not controlled by vault!");
        e
    })?;

    Ok(holding.amount)
}

/// True if `holding` is a vault token account other than the `allowed` ones
pub fn is_stray_vault_holding(holding: &TokenHolding, address: &Address, vault: &Address, allowed: &[&Address]) -> bool {
    holding.owner.as_slice() == vault.as_ref() && !allowed.iter().any(|a| *a == address)
}

/// Reject routes that reference any other token account the vault owns.
///
/// The vault signs the forwarded call, so every vault holding in the route
/// is spendable by it; settlement only measures the two swap holdings.
pub fn verify_no_stray_vault_holdings(
    route_accounts: &[AccountView],
    vault: &Address,
    holdings: [&AccountView; 2],
) -> ProgramResult {
    let allowed = [holdings[0].address(), holdings[1].address()];

    for account in route_accounts {
        // SAFETY: no outstanding mutable borrow of the account exists here
        if unsafe { account.owner() }.as_ref() != &SPL_TOKEN_PROGRAM_ID {
            continue;
        }
        if allowed.iter().any(|a| *a == account.address()) {
            continue;
        }

        let data = account
            .try_borrow()
            .map_err(|_| CabalError::AccountBorrowFailed)?;
        let stray = TokenHolding::unpack(&data)
            .map(|holding| is_stray_vault_holding(&holding, account.address(), vault, &allowed))
            .unwrap_or(false);
        if stray {
            log!("SECURITY: Route references another vault holding!");
            return Err(CabalError::PrivilegeEscalation.into());
        }
    }
    Ok(())
}

/// Token balance of a holding account already verified this call
pub fn read_token_balance(holding_account: &AccountView) -> Result<u64, CabalError> {
    let data = holding_account
        .try_borrow()
        .map_err(|_| CabalError::AccountBorrowFailed)?;
    TokenHolding::unpack(&data)
        .map(|holding| holding.amount)
        .ok_or(CabalError::InvalidAccount)
}
