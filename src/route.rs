//! Route validator
//!
//! A routing payload is caller-built: opaque swap-router instruction bytes
//! plus the account list the router needs, each tagged with claimed
//! writable/signer flags. Nothing in it is trusted. `validate_route` is the
//! single place every rule is applied, and the only way to obtain a
//! [`ValidatedRoute`], which is the only thing the vault will forward.

use alloc::vec::Vec;
use pinocchio::Address;

use crate::{
    config::{ProtocolConfig, BASIS_POINTS_DENOMINATOR, MAX_ROUTE_ACCOUNTS},
    error::CabalError,
    fee::total_debit,
};

/// Privilege bit: writable
pub const FLAG_WRITABLE: u8 = 0b01;
/// Privilege bit: signer
pub const FLAG_SIGNER: u8 = 0b10;

/// Privileges an account actually holds in the enclosing transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Granted {
    pub writable: bool,
    pub signer: bool,
}

/// One account reference of a routing payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAccount {
    pub address: Address,
    /// Claimed by the payload
    pub is_writable: bool,
    /// Claimed by the payload
    pub is_signer: bool,
    /// Held by the account in this transaction
    pub granted: Granted,
}

impl RouteAccount {
    pub fn from_flags(address: Address, flags: u8, granted: Granted) -> Self {
        Self {
            address,
            is_writable: flags & FLAG_WRITABLE != 0,
            is_signer: flags & FLAG_SIGNER != 0,
            granted,
        }
    }
}

/// Untrusted swap instruction to forward
#[derive(Debug, Clone)]
pub struct RoutingPayload<'a> {
    pub program_id: Address,
    pub data: &'a [u8],
    pub accounts: Vec<RouteAccount>,
}

/// Trade parameters and the custody accounts the payload is checked against
#[derive(Debug, Clone)]
pub struct RouteContext {
    /// Vault custody PDA
    pub vault: Address,
    /// Vault's wrapped-SOL holding account (swap input)
    pub input_holding: Address,
    /// Vault's output token holding account
    pub output_holding: Address,
    /// Lamports to trade
    pub amount: u64,
    /// Range-checked only. The output floor enforced at settlement is
    /// `min_out`, which the client derives from its quote and this rate.
    pub slippage_bps: u16,
    /// Least output tokens the swap must deliver, non-zero
    pub min_out: u64,
    /// Cabal fee rate, paid on top of `amount`
    pub fee_bps: u16,
    /// Vault lamports available for trading
    pub available: u64,
}

/// A payload that passed every rule. Only constructible here.
#[derive(Debug)]
pub struct ValidatedRoute<'p> {
    payload: &'p RoutingPayload<'p>,
    vault: Address,
}

impl<'p> ValidatedRoute<'p> {
    pub fn program_id(&self) -> &Address {
        &self.payload.program_id
    }

    pub fn data(&self) -> &[u8] {
        self.payload.data
    }

    pub fn accounts(&self) -> &[RouteAccount] {
        &self.payload.accounts
    }

    /// True for the entry that receives signer status from the vault's
    /// derivation proof when forwarded
    pub fn is_vault(&self, account: &RouteAccount) -> bool {
        account.address == self.vault
    }
}

/// Approve or reject `payload` before any custody-affecting call.
///
/// Rules, first failure wins:
/// 1. target program is the configured router
/// 2. data starts with an allowed entry point and is long enough
/// 3. account permissions match the fixed template
/// 4. amount (plus fee) fits the vault's available balance
/// 5. slippage below 10000 bps and a non-zero minimum output
pub fn validate_route<'p>(
    payload: &'p RoutingPayload<'p>,
    ctx: &RouteContext,
    config: &ProtocolConfig,
) -> Result<ValidatedRoute<'p>, CabalError> {
    check_target(payload, config)?;
    check_instruction_shape(payload, config)?;
    check_account_template(payload, ctx)?;
    check_amount(ctx)?;
    check_slippage(ctx)?;

    Ok(ValidatedRoute {
        payload,
        vault: ctx.vault.clone(),
    })
}

fn check_target(payload: &RoutingPayload, config: &ProtocolConfig) -> Result<(), CabalError> {
    if payload.program_id != config.swap_program {
        return Err(CabalError::UntrustedTarget);
    }
    Ok(())
}

fn check_instruction_shape(payload: &RoutingPayload, config: &ProtocolConfig) -> Result<(), CabalError> {
    if payload.data.len() < config.min_route_data_len || !config.is_route_entry_point(payload.data) {
        return Err(CabalError::InvalidInstructionData);
    }
    if payload.accounts.is_empty() || payload.accounts.len() > MAX_ROUTE_ACCOUNTS {
        return Err(CabalError::InvalidInstructionData);
    }
    Ok(())
}

fn check_account_template(payload: &RoutingPayload, ctx: &RouteContext) -> Result<(), CabalError> {
    if ctx.input_holding == ctx.output_holding {
        return Err(CabalError::DuplicateAccount);
    }

    let mut saw_input = false;
    let mut saw_output = false;

    for account in &payload.accounts {
        if account.address == ctx.vault {
            // Custody PDA signs only through the program's derivation proof
            if account.is_signer {
                return Err(CabalError::PrivilegeEscalation);
            }
        } else if account.address == ctx.input_holding || account.address == ctx.output_holding {
            if account.is_signer {
                return Err(CabalError::PrivilegeEscalation);
            }
            if !account.is_writable {
                return Err(CabalError::AccountNotWritable);
            }
            saw_input |= account.address == ctx.input_holding;
            saw_output |= account.address == ctx.output_holding;
        }

        // No claim may exceed what the transaction granted
        if account.is_signer && !account.granted.signer {
            return Err(CabalError::PrivilegeEscalation);
        }
        if account.is_writable && !account.granted.writable {
            return Err(CabalError::PrivilegeEscalation);
        }
    }

    if !saw_input || !saw_output {
        return Err(CabalError::HoldingAccountMissing);
    }
    Ok(())
}

fn check_amount(ctx: &RouteContext) -> Result<(), CabalError> {
    if ctx.amount == 0 {
        return Err(CabalError::InvalidParameters);
    }
    if ctx.amount > ctx.available {
        return Err(CabalError::InsufficientFunds);
    }
    // Fee is drawn from the same balance after the swap
    if total_debit(ctx.amount, ctx.fee_bps)? > ctx.available {
        return Err(CabalError::InsufficientFunds);
    }
    Ok(())
}

fn check_slippage(ctx: &RouteContext) -> Result<(), CabalError> {
    if u64::from(ctx.slippage_bps) >= BASIS_POINTS_DENOMINATOR {
        return Err(CabalError::InvalidSlippage);
    }
    // A zero floor would accept a route that pays nothing
    if ctx.min_out == 0 {
        return Err(CabalError::InvalidParameters);
    }
    Ok(())
}

// ============================================================
// SETTLEMENT
// ============================================================

/// Vault balances captured around the forwarded call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultSnapshot {
    pub vault_lamports: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Check the forwarded call's effect and return the output received.
///
/// The route must spend exactly the wrapped `amount`, since nothing
/// unwraps a remainder back into the vault. The output holding may only
/// grow. Growth is measured from balances, never taken from the payload.
pub fn verify_settlement(
    before: &VaultSnapshot,
    after: &VaultSnapshot,
    amount: u64,
    min_out: u64,
) -> Result<u64, CabalError> {
    if after.vault_lamports < before.vault_lamports {
        return Err(CabalError::VaultBalanceChanged);
    }

    let spent = before
        .input_tokens
        .checked_sub(after.input_tokens)
        .ok_or(CabalError::InvalidSwapAmount)?;
    if spent != amount {
        return Err(CabalError::InvalidSwapAmount);
    }

    let received = after
        .output_tokens
        .checked_sub(before.output_tokens)
        .ok_or(CabalError::VaultBalanceChanged)?;
    if received < min_out {
        return Err(CabalError::SlippageExceeded);
    }

    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEPLOYMENT, JUPITER_ROUTE_DISC, MIN_ROUTE_DATA_LEN};
    use alloc::vec;

    const VAULT: Address = Address::new_from_array([10u8; 32]);
    const WSOL: Address = Address::new_from_array([11u8; 32]);
    const OUT: Address = Address::new_from_array([12u8; 32]);
    const POOL: Address = Address::new_from_array([13u8; 32]);

    const RW: Granted = Granted { writable: true, signer: false };
    const RO: Granted = Granted { writable: false, signer: false };

    fn route_data() -> [u8; MIN_ROUTE_DATA_LEN] {
        let mut data = [0u8; MIN_ROUTE_DATA_LEN];
        data[..8].copy_from_slice(&JUPITER_ROUTE_DISC);
        data
    }

    fn ctx() -> RouteContext {
        RouteContext {
            vault: VAULT,
            input_holding: WSOL,
            output_holding: OUT,
            amount: 1_000_000,
            slippage_bps: 100,
            min_out: 1,
            fee_bps: 100,
            available: 20_000_000,
        }
    }

    fn accounts() -> Vec<RouteAccount> {
        vec![
            RouteAccount::from_flags(VAULT, 0, RO),
            RouteAccount::from_flags(WSOL, FLAG_WRITABLE, RW),
            RouteAccount::from_flags(OUT, FLAG_WRITABLE, RW),
            RouteAccount::from_flags(POOL, FLAG_WRITABLE, RW),
        ]
    }

    fn make_payload(data: &[u8]) -> RoutingPayload<'_> {
        RoutingPayload {
            program_id: DEPLOYMENT.swap_program,
            data,
            accounts: accounts(),
        }
    }

    #[test]
    fn accepts_well_formed_route() {
        let data = route_data();
        let payload = make_payload(&data);
        let route = validate_route(&payload, &ctx(), &DEPLOYMENT).unwrap();
        assert!(route.program_id() == &DEPLOYMENT.swap_program);
        assert_eq!(route.accounts().len(), 4);
        assert!(route.is_vault(&route.accounts()[0]));
        assert!(!route.is_vault(&route.accounts()[1]));
    }

    #[test]
    fn rejects_untrusted_target() {
        let data = route_data();
        let mut payload = make_payload(&data);
        payload.program_id = POOL;
        assert_eq!(validate_route(&payload, &ctx(), &DEPLOYMENT).unwrap_err(), CabalError::UntrustedTarget);
    }

    #[test]
    fn target_checked_before_anything_else() {
        let payload = RoutingPayload {
            program_id: POOL,
            data: &[],
            accounts: Vec::new(),
        };
        assert_eq!(validate_route(&payload, &ctx(), &DEPLOYMENT).unwrap_err(), CabalError::UntrustedTarget);
    }

    #[test]
    fn rejects_foreign_discriminator() {
        let mut data = route_data();
        data[3] ^= 0x01;
        let payload = make_payload(&data);
        assert_eq!(
            validate_route(&payload, &ctx(), &DEPLOYMENT).unwrap_err(),
            CabalError::InvalidInstructionData
        );
    }

    #[test]
    fn rejects_short_data() {
        let data = route_data();
        let payload = make_payload(&data[..MIN_ROUTE_DATA_LEN - 1]);
        assert_eq!(
            validate_route(&payload, &ctx(), &DEPLOYMENT).unwrap_err(),
            CabalError::InvalidInstructionData
        );
    }

    #[test]
    fn rejects_empty_account_list() {
        let data = route_data();
        let mut payload = make_payload(&data);
        payload.accounts.clear();
        assert_eq!(
            validate_route(&payload, &ctx(), &DEPLOYMENT).unwrap_err(),
            CabalError::InvalidInstructionData
        );
    }

    #[test]
    fn rejects_vault_claimed_as_signer() {
        let data = route_data();
        let mut payload = make_payload(&data);
        // Even if the transaction somehow granted it
        payload.accounts[0] =
            RouteAccount::from_flags(VAULT, FLAG_SIGNER, Granted { writable: false, signer: true });
        assert_eq!(
            validate_route(&payload, &ctx(), &DEPLOYMENT).unwrap_err(),
            CabalError::PrivilegeEscalation
        );
    }

    #[test]
    fn rejects_holding_account_as_signer() {
        let data = route_data();
        let mut payload = make_payload(&data);
        payload.accounts[2] = RouteAccount::from_flags(
            OUT,
            FLAG_WRITABLE | FLAG_SIGNER,
            Granted { writable: true, signer: true },
        );
        assert_eq!(
            validate_route(&payload, &ctx(), &DEPLOYMENT).unwrap_err(),
            CabalError::PrivilegeEscalation
        );
    }

    #[test]
    fn rejects_read_only_holding_account() {
        let data = route_data();
        let mut payload = make_payload(&data);
        payload.accounts[1] = RouteAccount::from_flags(WSOL, 0, RW);
        assert_eq!(
            validate_route(&payload, &ctx(), &DEPLOYMENT).unwrap_err(),
            CabalError::AccountNotWritable
        );
    }

    #[test]
    fn rejects_claims_beyond_granted_privileges() {
        let data = route_data();

        let mut payload = make_payload(&data);
        payload.accounts[3] = RouteAccount::from_flags(POOL, FLAG_WRITABLE, RO);
        assert_eq!(
            validate_route(&payload, &ctx(), &DEPLOYMENT).unwrap_err(),
            CabalError::PrivilegeEscalation
        );

        let mut payload = make_payload(&data);
        payload.accounts[3] = RouteAccount::from_flags(POOL, FLAG_SIGNER, RW);
        assert_eq!(
            validate_route(&payload, &ctx(), &DEPLOYMENT).unwrap_err(),
            CabalError::PrivilegeEscalation
        );
    }

    #[test]
    fn requires_both_holding_accounts() {
        let data = route_data();
        let mut payload = make_payload(&data);
        payload.accounts.remove(2);
        assert_eq!(
            validate_route(&payload, &ctx(), &DEPLOYMENT).unwrap_err(),
            CabalError::HoldingAccountMissing
        );
    }

    #[test]
    fn rejects_aliased_holding_accounts() {
        let data = route_data();
        let payload = make_payload(&data);
        let ctx = RouteContext { output_holding: WSOL, ..ctx() };
        assert_eq!(validate_route(&payload, &ctx, &DEPLOYMENT).unwrap_err(), CabalError::DuplicateAccount);
    }

    #[test]
    fn amount_must_fit_available_balance() {
        let data = route_data();
        let payload = make_payload(&data);

        let over = RouteContext { amount: 20_000_001, ..ctx() };
        assert_eq!(validate_route(&payload, &over, &DEPLOYMENT).unwrap_err(), CabalError::InsufficientFunds);

        // Amount fits, amount + fee does not
        let fee_over = RouteContext { amount: 20_000_000, ..ctx() };
        assert_eq!(
            validate_route(&payload, &fee_over, &DEPLOYMENT).unwrap_err(),
            CabalError::InsufficientFunds
        );

        let zero = RouteContext { amount: 0, ..ctx() };
        assert_eq!(validate_route(&payload, &zero, &DEPLOYMENT).unwrap_err(), CabalError::InvalidParameters);
    }

    #[test]
    fn slippage_boundary() {
        let data = route_data();
        let payload = make_payload(&data);

        let max = RouteContext { slippage_bps: 9_999, ..ctx() };
        assert!(validate_route(&payload, &max, &DEPLOYMENT).is_ok());

        let full = RouteContext { slippage_bps: 10_000, ..ctx() };
        assert_eq!(validate_route(&payload, &full, &DEPLOYMENT).unwrap_err(), CabalError::InvalidSlippage);
    }

    #[test]
    fn rejects_zero_minimum_output() {
        let data = route_data();
        let payload = make_payload(&data);
        let no_floor = RouteContext { min_out: 0, ..ctx() };
        assert_eq!(
            validate_route(&payload, &no_floor, &DEPLOYMENT).unwrap_err(),
            CabalError::InvalidParameters
        );
    }

    fn snapshot(vault_lamports: u64, input_tokens: u64, output_tokens: u64) -> VaultSnapshot {
        VaultSnapshot {
            vault_lamports,
            input_tokens,
            output_tokens,
        }
    }

    #[test]
    fn settlement_measures_output_delta() {
        let before = snapshot(100, 1_000, 50);
        let after = snapshot(100, 0, 1_050);
        assert_eq!(verify_settlement(&before, &after, 1_000, 1_000), Ok(1_000));
        assert_eq!(verify_settlement(&before, &after, 1_000, 1_001), Err(CabalError::SlippageExceeded));
    }

    #[test]
    fn settlement_rejects_overspent_input() {
        let before = snapshot(100, 5_000, 0);
        let after = snapshot(100, 3_000, 500);
        assert_eq!(verify_settlement(&before, &after, 1_000, 1), Err(CabalError::InvalidSwapAmount));
    }

    #[test]
    fn settlement_rejects_partially_spent_input() {
        // Leftover wrapped lamports would be stranded outside the vault
        let before = snapshot(100, 1_000, 0);
        let after = snapshot(100, 1, 500);
        assert_eq!(verify_settlement(&before, &after, 1_000, 1), Err(CabalError::InvalidSwapAmount));

        let grown = snapshot(100, 1_001, 500);
        assert_eq!(verify_settlement(&before, &grown, 1_000, 1), Err(CabalError::InvalidSwapAmount));
    }

    #[test]
    fn settlement_rejects_shrunken_output_holding() {
        // Route moved tokens out of the output holding instead of into it
        let before = snapshot(20_000_000, 1, 1_000_000);
        let after = snapshot(20_000_000, 0, 0);
        assert_eq!(verify_settlement(&before, &after, 1, 0), Err(CabalError::VaultBalanceChanged));
        assert_eq!(verify_settlement(&before, &after, 1, 1), Err(CabalError::VaultBalanceChanged));
    }

    #[test]
    fn settlement_rejects_drained_vault() {
        let before = snapshot(100, 1_000, 0);
        let after = snapshot(99, 0, 500);
        assert_eq!(verify_settlement(&before, &after, 1_000, 1), Err(CabalError::VaultBalanceChanged));
    }
}
