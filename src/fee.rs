//! Protocol fee engine

use crate::{config::BASIS_POINTS_DENOMINATOR, error::CabalError};

/// `floor(amount * fee_bps / 10000)`
///
/// The product is formed in u128 so any u64 amount is safe. Rates of 10000
/// bps or more are rejected rather than clamped.
#[inline]
pub fn protocol_fee(amount: u64, fee_bps: u16) -> Result<u64, CabalError> {
    if u64::from(fee_bps) >= BASIS_POINTS_DENOMINATOR {
        return Err(CabalError::InvalidParameters);
    }

    let fee = (amount as u128)
        .checked_mul(fee_bps as u128)
        .ok_or(CabalError::MathOverflow)?
        / BASIS_POINTS_DENOMINATOR as u128;

    // fee < amount since fee_bps < 10000
    u64::try_from(fee).map_err(|_| CabalError::MathOverflow)
}

/// Amount plus its fee, the total a swap draws from the vault
#[inline]
pub fn total_debit(amount: u64, fee_bps: u16) -> Result<u64, CabalError> {
    amount
        .checked_add(protocol_fee(amount, fee_bps)?)
        .ok_or(CabalError::MathOverflow)
}
