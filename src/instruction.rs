//! Program instructions
//!
//! Every instruction is a 1-byte discriminator followed by little-endian
//! fields. Swap additionally carries the opaque routing bytes and one flags
//! byte per forwarded account.

use alloc::vec::Vec;

/// Instruction discriminators
pub mod discriminator {
    pub const CREATE_CABAL: u8 = 0;
    pub const JOIN_CABAL: u8 = 1;
    /// Passive deposit without a seat
    pub const LURKER_DEPOSIT: u8 = 2;
    pub const SWAP: u8 = 3;
    pub const WITHDRAW: u8 = 4;
}

/// Create a cabal and fund its vault rent reserve
///
/// NOTE: Client must derive the PDA bumps off-chain and pass them here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCabalArgs {
    /// Seed distinguishing this creator's cabals
    pub nonce: u64,
    /// Lamports each member pays to join
    pub buy_in: u64,
    /// Swap fee in basis points
    pub fee_bps: u16,
    /// Cabal PDA bump (derived by client)
    pub cabal_bump: u8,
    /// Vault PDA bump (derived by client)
    pub vault_bump: u8,
}

impl CreateCabalArgs {
    // discriminator(1) + nonce(8) + buy_in(8) + fee_bps(2) + bumps(2) = 21
    pub const SIZE: usize = 1 + 8 + 8 + 2 + 1 + 1;

    pub fn unpack(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            nonce: u64::from_le_bytes(data[1..9].try_into().ok()?),
            buy_in: u64::from_le_bytes(data[9..17].try_into().ok()?),
            fee_bps: u16::from_le_bytes(data[17..19].try_into().ok()?),
            cabal_bump: data[19],
            vault_bump: data[20],
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(Self::SIZE);
        data.push(discriminator::CREATE_CABAL);
        data.extend_from_slice(&self.nonce.to_le_bytes());
        data.extend_from_slice(&self.buy_in.to_le_bytes());
        data.extend_from_slice(&self.fee_bps.to_le_bytes());
        data.push(self.cabal_bump);
        data.push(self.vault_bump);
        data
    }
}

/// JoinCabal and LurkerDeposit share this layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositArgs {
    /// Lamports deposited (must equal buy-in for JoinCabal)
    pub amount: u64,
    /// Membership PDA bump (derived by client)
    pub membership_bump: u8,
}

impl DepositArgs {
    // discriminator(1) + amount(8) + membership_bump(1) = 10
    pub const SIZE: usize = 1 + 8 + 1;

    pub fn unpack(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            amount: u64::from_le_bytes(data[1..9].try_into().ok()?),
            membership_bump: data[9],
        })
    }

    pub fn pack(&self, discriminator: u8) -> Vec<u8> {
        let mut data = Vec::with_capacity(Self::SIZE);
        data.push(discriminator);
        data.extend_from_slice(&self.amount.to_le_bytes());
        data.push(self.membership_bump);
        data
    }
}

/// Trade vault lamports through the swap router
///
/// Format:
/// - [0]: discriminator
/// - [1..9]: amount (lamports)
/// - [9..11]: slippage_bps
/// - [11..19]: min_out (output token units)
/// - [19..23]: route_len (u32)
/// - [23..23+route_len]: routing instruction bytes (opaque)
/// - [next]: account_count (u8)
/// - [next..next+account_count]: per-account flags, bit0 writable, bit1 signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapArgs<'a> {
    pub amount: u64,
    pub slippage_bps: u16,
    pub min_out: u64,
    pub route_data: &'a [u8],
    pub account_flags: &'a [u8],
}

impl<'a> SwapArgs<'a> {
    /// Header before the routing bytes
    pub const HEADER_SIZE: usize = 1 + 8 + 2 + 8 + 4;

    pub fn unpack(data: &'a [u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }

        let amount = u64::from_le_bytes(data[1..9].try_into().ok()?);
        let slippage_bps = u16::from_le_bytes(data[9..11].try_into().ok()?);
        let min_out = u64::from_le_bytes(data[11..19].try_into().ok()?);
        let route_len = u32::from_le_bytes(data[19..23].try_into().ok()?) as usize;

        let route_end = Self::HEADER_SIZE.checked_add(route_len)?;
        let route_data = data.get(Self::HEADER_SIZE..route_end)?;

        let account_count = *data.get(route_end)? as usize;
        let flags_start = route_end + 1;
        let account_flags = data.get(flags_start..flags_start + account_count)?;

        // Trailing bytes mean the caller and program disagree on the layout
        if data.len() != flags_start + account_count {
            return None;
        }

        Some(Self {
            amount,
            slippage_bps,
            min_out,
            route_data,
            account_flags,
        })
    }

    /// None if the routing bytes or the flags list overflow their length prefix
    pub fn pack(&self) -> Option<Vec<u8>> {
        let route_len = u32::try_from(self.route_data.len()).ok()?;
        let account_count = u8::try_from(self.account_flags.len()).ok()?;

        let mut data =
            Vec::with_capacity(Self::HEADER_SIZE + self.route_data.len() + 1 + self.account_flags.len());
        data.push(discriminator::SWAP);
        data.extend_from_slice(&self.amount.to_le_bytes());
        data.extend_from_slice(&self.slippage_bps.to_le_bytes());
        data.extend_from_slice(&self.min_out.to_le_bytes());
        data.extend_from_slice(&route_len.to_le_bytes());
        data.extend_from_slice(self.route_data);
        data.push(account_count);
        data.extend_from_slice(self.account_flags);
        Some(data)
    }
}
