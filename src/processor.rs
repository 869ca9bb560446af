//! Instruction processor
//!
//! Handlers load and check accounts, run the pure state transitions and
//! route validator, then perform transfers. Any error aborts the whole
//! instruction, so state is written only after every check has passed.
//!
//! Amounts are logged only with the `verbose-logs` feature.

use alloc::vec::Vec;
use pinocchio::{error::ProgramError, AccountView, Address, ProgramResult};
use solana_instruction_view::{cpi::Signer, seeds};
use solana_program_log::log;

#[cfg(feature = "verbose-logs")]
macro_rules! verbose_log {
    ($($arg:tt)*) => {
        log!($($arg)*)
    };
}

#[cfg(not(feature = "verbose-logs"))]
macro_rules! verbose_log {
    ($($arg:tt)*) => {};
}

use crate::{
    config::{ProtocolConfig, DEPLOYMENT},
    error::CabalError,
    fee::protocol_fee,
    instruction::{discriminator, CreateCabalArgs, DepositArgs, SwapArgs},
    route::{validate_route, verify_settlement, Granted, RouteAccount, RouteContext, RoutingPayload, VaultSnapshot},
    state::{available_balance, rent_exempt_balance, seeds as state_seeds, Cabal, Membership, Role, VAULT_RENT_RESERVE},
    vault::{create_pda_account, sync_native, transfer_lamports, VaultAuthority},
    verification::{
        read_clock_slot, read_token_balance, verify_cabal_pda, verify_clock_sysvar, verify_distinct_accounts,
        verify_fee_wallet, verify_membership_pda, verify_no_stray_vault_holdings, verify_program_owner,
        verify_spl_token_program,
        verify_system_program, verify_vault_holding, verify_writable, NATIVE_MINT,
    },
};

/// Main instruction processor
pub fn process(program_id: &Address, accounts: &[AccountView], instruction_data: &[u8]) -> ProgramResult {
    process_with_config(program_id, accounts, instruction_data, &DEPLOYMENT)
}

/// Dispatch against an explicit deployment configuration
pub fn process_with_config(
    program_id: &Address,
    accounts: &[AccountView],
    instruction_data: &[u8],
    config: &ProtocolConfig,
) -> ProgramResult {
    let Some(&instruction) = instruction_data.first() else {
        return Err(CabalError::InvalidInstruction.into());
    };

    match instruction {
        discriminator::CREATE_CABAL => {
            log!("Instruction: CreateCabal");
            process_create_cabal(program_id, accounts, instruction_data)
        }
        discriminator::JOIN_CABAL => {
            log!("Instruction: JoinCabal");
            process_deposit(program_id, accounts, instruction_data, Role::Member)
        }
        discriminator::LURKER_DEPOSIT => {
            log!("Instruction: LurkerDeposit");
            process_deposit(program_id, accounts, instruction_data, Role::Lurker)
        }
        discriminator::SWAP => {
            log!("Instruction: Swap");
            process_swap(program_id, accounts, instruction_data, config)
        }
        discriminator::WITHDRAW => {
            log!("Instruction: Withdraw");
            process_withdraw(program_id, accounts)
        }
        _ => Err(CabalError::InvalidInstruction.into()),
    }
}

// ============================================================
// ACCOUNT LOADING
// ============================================================

fn load_cabal(cabal_account: &AccountView, program_id: &Address) -> Result<Cabal, ProgramError> {
    verify_program_owner(cabal_account, program_id)?;
    let data = cabal_account
        .try_borrow()
        .map_err(|_| CabalError::AccountBorrowFailed)?;
    Ok(Cabal::unpack(&data).ok_or(CabalError::InvalidAccount)?)
}

fn store_cabal(cabal_account: &AccountView, cabal: &Cabal) -> ProgramResult {
    let mut data = cabal_account
        .try_borrow_mut()
        .map_err(|_| CabalError::AccountBorrowFailed)?;
    cabal.pack(&mut data)?;
    Ok(())
}

/// Membership owned by this program, or None
fn load_membership(membership_account: &AccountView, program_id: &Address) -> Result<Option<Membership>, ProgramError> {
    // SAFETY: no outstanding mutable borrow of the account exists here
    if unsafe { membership_account.owner() } != program_id {
        return Ok(None);
    }
    let data = membership_account
        .try_borrow()
        .map_err(|_| CabalError::AccountBorrowFailed)?;
    Ok(Membership::unpack(&data))
}

fn store_membership(membership_account: &AccountView, membership: &Membership) -> ProgramResult {
    let mut data = membership_account
        .try_borrow_mut()
        .map_err(|_| CabalError::AccountBorrowFailed)?;
    membership.pack(&mut data)?;
    Ok(())
}

// ============================================================
// CREATE CABAL
// ============================================================

/// Create a cabal and fund its vault's rent reserve
///
/// Accounts:
/// 0. [signer, writable] Creator (pays rent)
/// 1. [writable] Cabal PDA ["cabal", creator, nonce]
/// 2. [writable] Vault PDA ["vault", cabal]
/// 3. [] System program
fn process_create_cabal(program_id: &Address, accounts: &[AccountView], instruction_data: &[u8]) -> ProgramResult {
    let args = CreateCabalArgs::unpack(instruction_data).ok_or(CabalError::InvalidInstruction)?;

    let [creator, cabal_account, vault, system_program, ..] = accounts else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    if !creator.is_signer() {
        return Err(CabalError::UnauthorizedSigner.into());
    }
    verify_system_program(system_program)?;
    verify_writable(cabal_account)?;
    verify_writable(vault)?;

    let cabal = Cabal::new(
        creator.address().clone(),
        args.buy_in,
        args.fee_bps,
        args.nonce,
        args.cabal_bump,
        args.vault_bump,
    )?;

    verify_cabal_pda(cabal_account, creator.address(), args.nonce, args.cabal_bump, program_id)?;
    if cabal_account.data_len() != 0 {
        return Err(CabalError::AccountAlreadyInitialized.into());
    }

    let cabal_address = cabal_account.address().clone();
    VaultAuthority::prove(vault, &cabal_address, args.vault_bump, program_id)?;
    verbose_log!("  Cabal and vault PDAs verified");

    let creator_key: &[u8] = creator.address().as_ref();
    let nonce_bytes = args.nonce.to_le_bytes();
    let bump = [args.cabal_bump];
    let cabal_seeds = seeds!(
        state_seeds::CABAL,
        creator_key,
        nonce_bytes.as_slice(),
        bump.as_slice()
    );
    create_pda_account(
        creator,
        cabal_account,
        system_program,
        rent_exempt_balance(Cabal::LEN as u64),
        Cabal::LEN as u64,
        program_id,
        Signer::from(&cabal_seeds),
    )?;

    // Vault stays system-owned; only its rent reserve is funded here
    let vault_lamports = vault.lamports();
    if vault_lamports < VAULT_RENT_RESERVE {
        transfer_lamports(creator, vault, system_program, VAULT_RENT_RESERVE - vault_lamports)?;
    }

    store_cabal(cabal_account, &cabal)?;

    log!("CabalCreated: buy_in={} fee_bps={}", cabal.buy_in, cabal.fee_bps as u64);
    verbose_log!("  Vault: {} lamports reserved", VAULT_RENT_RESERVE);

    Ok(())
}

// ============================================================
// JOIN CABAL / LURKER DEPOSIT
// ============================================================

/// Deposit into a cabal, as a seated member or a lurker
///
/// Accounts:
/// 0. [signer, writable] Depositor
/// 1. [writable] Cabal
/// 2. [writable] Membership PDA ["membership", cabal, depositor] (created)
/// 3. [writable] Vault PDA
/// 4. [] System program
/// 5. [] Clock sysvar
fn process_deposit(
    program_id: &Address,
    accounts: &[AccountView],
    instruction_data: &[u8],
    role: Role,
) -> ProgramResult {
    let args = DepositArgs::unpack(instruction_data).ok_or(CabalError::InvalidInstruction)?;

    let [depositor, cabal_account, membership_account, vault, system_program, clock, ..] = accounts else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    if !depositor.is_signer() {
        return Err(CabalError::UnauthorizedSigner.into());
    }
    verify_system_program(system_program)?;
    verify_clock_sysvar(clock)?;
    verify_writable(cabal_account)?;
    verify_writable(membership_account)?;
    verify_writable(vault)?;

    let cabal_address = cabal_account.address().clone();
    let mut cabal = load_cabal(cabal_account, program_id)?;
    VaultAuthority::prove(vault, &cabal_address, cabal.vault_bump, program_id)?;

    match role {
        Role::Member => cabal.admit_member(args.amount)?,
        Role::Lurker => cabal.admit_lurker(args.amount)?,
        Role::Withdrawn => return Err(CabalError::InvalidInstruction.into()),
    }

    verify_membership_pda(
        membership_account,
        &cabal_address,
        depositor.address(),
        args.membership_bump,
        program_id,
    )?;
    // Any record, including a withdrawn one, blocks a second deposit
    if membership_account.data_len() != 0 {
        log!("Depositor already has a membership in this cabal");
        return Err(CabalError::DuplicateMember.into());
    }

    let joined_at = {
        let clock_data = clock.try_borrow().map_err(|_| CabalError::AccountBorrowFailed)?;
        read_clock_slot(&clock_data).ok_or(CabalError::InvalidAccount)?
    };

    transfer_lamports(depositor, vault, system_program, args.amount)?;

    let cabal_key: &[u8] = cabal_address.as_ref();
    let depositor_key: &[u8] = depositor.address().as_ref();
    let bump = [args.membership_bump];
    let membership_seeds = seeds!(
        state_seeds::MEMBERSHIP,
        cabal_key,
        depositor_key,
        bump.as_slice()
    );
    create_pda_account(
        depositor,
        membership_account,
        system_program,
        rent_exempt_balance(Membership::LEN as u64),
        Membership::LEN as u64,
        program_id,
        Signer::from(&membership_seeds),
    )?;

    let membership = Membership {
        cabal: cabal_address,
        member: depositor.address().clone(),
        contribution: args.amount,
        joined_at,
        role,
        bump: args.membership_bump,
    };
    store_membership(membership_account, &membership)?;
    store_cabal(cabal_account, &cabal)?;

    log!(
        "MemberJoined: role={} members={} slot={}",
        role as u64,
        cabal.member_count as u64,
        joined_at
    );
    verbose_log!("  Deposit: {} lamports", args.amount);

    Ok(())
}

// ============================================================
// SWAP
// ============================================================

/// Trade vault lamports through the allow-listed swap router
///
/// Accounts:
/// 0. [signer] Member
/// 1. [] Cabal
/// 2. [] Membership of the member
/// 3. [writable] Vault PDA
/// 4. [writable] Vault wrapped-SOL holding account
/// 5. [writable] Vault output holding account
/// 6. [writable] Fee wallet (must be the configured one)
/// 7. [] Swap router program
/// 8. [] SPL Token program
/// 9. [] System program
/// 10.. Routing accounts, one per flags byte
fn process_swap(
    program_id: &Address,
    accounts: &[AccountView],
    instruction_data: &[u8],
    config: &ProtocolConfig,
) -> ProgramResult {
    let args = SwapArgs::unpack(instruction_data).ok_or(CabalError::InvalidInstruction)?;

    let [member, cabal_account, membership_account, vault, vault_wsol, vault_output, fee_wallet, swap_program, token_program, system_program, route_accounts @ ..] =
        accounts
    else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    // === STEP 1: Caller must be a seated member ===
    if !member.is_signer() {
        return Err(CabalError::UnauthorizedSigner.into());
    }

    let cabal_address = cabal_account.address().clone();
    let cabal = load_cabal(cabal_account, program_id)?;

    let authorized = load_membership(membership_account, program_id)?
        .map(|membership| membership.authorizes_swap(&cabal_address, member.address()))
        .unwrap_or(false);
    if !authorized {
        log!("SECURITY: Swap signer is not a member of this cabal!");
        return Err(CabalError::UnauthorizedSigner.into());
    }

    verify_spl_token_program(token_program)?;
    verify_system_program(system_program)?;
    verify_fee_wallet(fee_wallet, config)?;
    verify_writable(vault)?;
    verify_writable(vault_wsol)?;
    verify_writable(vault_output)?;
    verify_writable(fee_wallet)?;
    verify_distinct_accounts(&[
        (vault_wsol, vault_output, "input and output holdings"),
        (vault, fee_wallet, "vault and fee wallet"),
    ])?;

    let authority = VaultAuthority::prove(vault, &cabal_address, cabal.vault_bump, program_id)?;
    verify_vault_holding(vault_wsol, authority.vault(), Some(&NATIVE_MINT))?;
    let output_before = verify_vault_holding(vault_output, authority.vault(), None)?;

    // === STEP 2: Validate the routing payload ===
    if route_accounts.len() != args.account_flags.len() {
        return Err(CabalError::InvalidInstruction.into());
    }

    let payload = RoutingPayload {
        program_id: swap_program.address().clone(),
        data: args.route_data,
        accounts: route_accounts
            .iter()
            .zip(args.account_flags)
            .map(|(view, flags)| {
                RouteAccount::from_flags(
                    view.address().clone(),
                    *flags,
                    Granted {
                        writable: view.is_writable(),
                        signer: view.is_signer(),
                    },
                )
            })
            .collect::<Vec<_>>(),
    };

    let ctx = RouteContext {
        vault: authority.vault().clone(),
        input_holding: vault_wsol.address().clone(),
        output_holding: vault_output.address().clone(),
        amount: args.amount,
        slippage_bps: args.slippage_bps,
        min_out: args.min_out,
        fee_bps: cabal.fee_bps,
        available: available_balance(vault.lamports()),
    };

    let route = validate_route(&payload, &ctx, config).map_err(|e| {
        log!("SECURITY: Routing payload rejected, code {}", e as u32 as u64);
        e
    })?;
    verify_no_stray_vault_holdings(route_accounts, authority.vault(), [vault_wsol, vault_output])?;
    let fee = protocol_fee(args.amount, cabal.fee_bps)?;
    verbose_log!("  Route validated: amount={} fee={}", args.amount, fee);

    // === STEP 3: Wrap the traded lamports ===
    authority.transfer(vault, vault_wsol, system_program, args.amount)?;
    sync_native(vault_wsol, token_program)?;

    let before = VaultSnapshot {
        vault_lamports: vault.lamports(),
        input_tokens: read_token_balance(vault_wsol)?,
        output_tokens: output_before,
    };

    // === STEP 4: Forward to the router, vault signs by derivation ===
    authority.forward(&route, route_accounts)?;

    // === STEP 5: Settle against measured balances ===
    let after = VaultSnapshot {
        vault_lamports: vault.lamports(),
        input_tokens: read_token_balance(vault_wsol)?,
        output_tokens: read_token_balance(vault_output)?,
    };
    let received = verify_settlement(&before, &after, args.amount, args.min_out).map_err(|e| {
        log!("Swap settlement failed, code {}", e as u32 as u64);
        e
    })?;

    // === STEP 6: Protocol fee ===
    if fee > 0 {
        authority.transfer(vault, fee_wallet, system_program, fee)?;
    }

    log!("SwapSettled: amount={} received={} fee={}", args.amount, received, fee);

    Ok(())
}

// ============================================================
// WITHDRAW
// ============================================================

/// Exit a cabal with the pro-rata share of the vault's available lamports
///
/// Accounts:
/// 0. [signer, writable] Depositor
/// 1. [writable] Cabal
/// 2. [writable] Membership of the depositor
/// 3. [writable] Vault PDA
/// 4. [] System program
fn process_withdraw(program_id: &Address, accounts: &[AccountView]) -> ProgramResult {
    let [depositor, cabal_account, membership_account, vault, system_program, ..] = accounts else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };

    if !depositor.is_signer() {
        return Err(CabalError::UnauthorizedSigner.into());
    }
    verify_system_program(system_program)?;
    verify_writable(depositor)?;
    verify_writable(cabal_account)?;
    verify_writable(membership_account)?;
    verify_writable(vault)?;

    let cabal_address = cabal_account.address().clone();
    let mut cabal = load_cabal(cabal_account, program_id)?;

    let mut membership = load_membership(membership_account, program_id)?
        .filter(|m| m.cabal == cabal_address && &m.member == depositor.address() && m.role != Role::Withdrawn)
        .ok_or(CabalError::NotDepositor)?;

    let authority = VaultAuthority::prove(vault, &cabal_address, cabal.vault_bump, program_id)?;

    let share = cabal.withdrawal_share(available_balance(vault.lamports()), membership.contribution)?;
    if share == 0 {
        return Err(CabalError::NothingToWithdraw.into());
    }

    // Books first, then funds
    cabal.release(&membership)?;
    membership.mark_withdrawn();
    store_cabal(cabal_account, &cabal)?;
    store_membership(membership_account, &membership)?;

    authority.transfer(vault, depositor, system_program, share)?;

    log!("Withdrawn: share={} members={}", share, cabal.member_count as u64);

    Ok(())
}
