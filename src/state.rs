//! Program state accounts
//!
//! Cabal and Membership records use a fixed little-endian layout behind an
//! 8-byte discriminator. The vault itself carries no data: it is a
//! system-owned PDA whose lamports are the pooled funds.

use pinocchio::Address;

use crate::{config::MAX_MEMBERS, error::CabalError};

/// PDA seeds for deriving program addresses
pub mod seeds {
    pub const CABAL: &[u8] = b"cabal";
    pub const VAULT: &[u8] = b"vault";
    pub const MEMBERSHIP: &[u8] = b"membership";
}

/// Rent-exempt minimum of the zero-data vault PDA.
/// Funded at creation and never available for trading or withdrawal.
pub const VAULT_RENT_RESERVE: u64 = rent_exempt_balance(0);

/// Rent-exempt balance for an account of `space` bytes:
/// (128 + space) * 3480 lamports/byte-year * 2 years
pub const fn rent_exempt_balance(space: u64) -> u64 {
    (128 + space) * 6960
}

/// Vault lamports that may be traded or withdrawn
#[inline]
pub fn available_balance(vault_lamports: u64) -> u64 {
    vault_lamports.saturating_sub(VAULT_RENT_RESERVE)
}

// ============================================================
// MEMBERSHIP ROLE
// ============================================================

/// What a membership record entitles its holder to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Role {
    /// Seated member: paid the buy-in, may trigger swaps
    Member = 0,
    /// Passive depositor: no seat, no trading authority
    Lurker = 1,
    /// Exited via Withdraw; terminal
    Withdrawn = 2,
}

impl Role {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Role::Member),
            1 => Some(Role::Lurker),
            2 => Some(Role::Withdrawn),
            _ => None,
        }
    }
}

// ============================================================
// CABAL
// ============================================================

/// Cabal byte layout
pub mod cabal_layout {
    pub const DISCRIMINATOR_OFFSET: usize = 0;
    pub const CREATOR_OFFSET: usize = 8;
    pub const BUY_IN_OFFSET: usize = 40;
    pub const FEE_BPS_OFFSET: usize = 48;
    pub const MAX_MEMBERS_OFFSET: usize = 50;
    pub const MEMBER_COUNT_OFFSET: usize = 51;
    pub const TOTAL_CONTRIBUTIONS_OFFSET: usize = 52;
    pub const NONCE_OFFSET: usize = 60;
    pub const BUMP_OFFSET: usize = 68;
    pub const VAULT_BUMP_OFFSET: usize = 69;
}

/// One trading group and its pooled-vault bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cabal {
    /// Who created it (no special privileges)
    pub creator: Address,
    /// Exact lamports a member pays to take a seat
    pub buy_in: u64,
    /// Swap fee in basis points, below 10000
    pub fee_bps: u16,
    pub max_members: u8,
    pub member_count: u8,
    /// Outstanding contributions of every active depositor
    pub total_contributions: u64,
    /// Creator-chosen seed so one creator can run several cabals
    pub nonce: u64,
    pub bump: u8,
    pub vault_bump: u8,
}

impl Cabal {
    pub const LEN: usize = 8 + 32 + 8 + 2 + 1 + 1 + 8 + 8 + 1 + 1;
    pub const DISCRIMINATOR: [u8; 8] = *b"cabalv01";

    /// Validate creation parameters and build an empty cabal
    pub fn new(
        creator: Address,
        buy_in: u64,
        fee_bps: u16,
        nonce: u64,
        bump: u8,
        vault_bump: u8,
    ) -> Result<Self, CabalError> {
        if buy_in == 0 || fee_bps >= 10_000 {
            return Err(CabalError::InvalidParameters);
        }

        Ok(Self {
            creator,
            buy_in,
            fee_bps,
            max_members: MAX_MEMBERS,
            member_count: 0,
            total_contributions: 0,
            nonce,
            bump,
            vault_bump,
        })
    }

    pub fn is_full(&self) -> bool {
        self.member_count >= self.max_members
    }

    /// Seat a new member paying `deposit`.
    ///
    /// The caller has already ruled out an existing membership record.
    pub fn admit_member(&mut self, deposit: u64) -> Result<(), CabalError> {
        if self.is_full() {
            return Err(CabalError::CabalFull);
        }
        if deposit != self.buy_in {
            return Err(CabalError::InvalidParameters);
        }

        self.total_contributions = self
            .total_contributions
            .checked_add(deposit)
            .ok_or(CabalError::MathOverflow)?;
        self.member_count += 1;
        Ok(())
    }

    /// Record a passive deposit; consumes no seat
    pub fn admit_lurker(&mut self, amount: u64) -> Result<(), CabalError> {
        if amount == 0 {
            return Err(CabalError::InvalidParameters);
        }

        self.total_contributions = self
            .total_contributions
            .checked_add(amount)
            .ok_or(CabalError::MathOverflow)?;
        Ok(())
    }

    /// Pro-rata share of `available` owed to `contribution`
    pub fn withdrawal_share(&self, available: u64, contribution: u64) -> Result<u64, CabalError> {
        if self.total_contributions == 0 || contribution > self.total_contributions {
            return Err(CabalError::InvalidAccount);
        }

        let share = (available as u128)
            .checked_mul(contribution as u128)
            .ok_or(CabalError::MathOverflow)?
            / self.total_contributions as u128;

        // share <= available since contribution <= total
        u64::try_from(share).map_err(|_| CabalError::MathOverflow)
    }

    /// Remove an exiting depositor from the books
    pub fn release(&mut self, membership: &Membership) -> Result<(), CabalError> {
        self.total_contributions = self
            .total_contributions
            .checked_sub(membership.contribution)
            .ok_or(CabalError::MathOverflow)?;

        if membership.role == Role::Member {
            self.member_count = self
                .member_count
                .checked_sub(1)
                .ok_or(CabalError::MathOverflow)?;
        }
        Ok(())
    }

    pub fn unpack(data: &[u8]) -> Option<Self> {
        use cabal_layout::*;

        if data.len() < Self::LEN || data[..8] != Self::DISCRIMINATOR {
            return None;
        }

        let cabal = Self {
            creator: Address::new_from_array(data[CREATOR_OFFSET..CREATOR_OFFSET + 32].try_into().ok()?),
            buy_in: u64::from_le_bytes(data[BUY_IN_OFFSET..BUY_IN_OFFSET + 8].try_into().ok()?),
            fee_bps: u16::from_le_bytes(data[FEE_BPS_OFFSET..FEE_BPS_OFFSET + 2].try_into().ok()?),
            max_members: data[MAX_MEMBERS_OFFSET],
            member_count: data[MEMBER_COUNT_OFFSET],
            total_contributions: u64::from_le_bytes(
                data[TOTAL_CONTRIBUTIONS_OFFSET..TOTAL_CONTRIBUTIONS_OFFSET + 8].try_into().ok()?,
            ),
            nonce: u64::from_le_bytes(data[NONCE_OFFSET..NONCE_OFFSET + 8].try_into().ok()?),
            bump: data[BUMP_OFFSET],
            vault_bump: data[VAULT_BUMP_OFFSET],
        };

        // Stored records always satisfy the creation invariants
        if cabal.buy_in == 0 || cabal.fee_bps >= 10_000 || cabal.member_count > cabal.max_members {
            return None;
        }

        Some(cabal)
    }

    pub fn pack(&self, data: &mut [u8]) -> Result<(), CabalError> {
        use cabal_layout::*;

        if data.len() < Self::LEN {
            return Err(CabalError::InvalidAccount);
        }

        data[DISCRIMINATOR_OFFSET..DISCRIMINATOR_OFFSET + 8].copy_from_slice(&Self::DISCRIMINATOR);
        data[CREATOR_OFFSET..CREATOR_OFFSET + 32].copy_from_slice(self.creator.as_ref());
        data[BUY_IN_OFFSET..BUY_IN_OFFSET + 8].copy_from_slice(&self.buy_in.to_le_bytes());
        data[FEE_BPS_OFFSET..FEE_BPS_OFFSET + 2].copy_from_slice(&self.fee_bps.to_le_bytes());
        data[MAX_MEMBERS_OFFSET] = self.max_members;
        data[MEMBER_COUNT_OFFSET] = self.member_count;
        data[TOTAL_CONTRIBUTIONS_OFFSET..TOTAL_CONTRIBUTIONS_OFFSET + 8]
            .copy_from_slice(&self.total_contributions.to_le_bytes());
        data[NONCE_OFFSET..NONCE_OFFSET + 8].copy_from_slice(&self.nonce.to_le_bytes());
        data[BUMP_OFFSET] = self.bump;
        data[VAULT_BUMP_OFFSET] = self.vault_bump;
        Ok(())
    }
}

// ============================================================
// MEMBERSHIP
// ============================================================

/// Membership byte layout
pub mod membership_layout {
    pub const DISCRIMINATOR_OFFSET: usize = 0;
    pub const CABAL_OFFSET: usize = 8;
    pub const MEMBER_OFFSET: usize = 40;
    pub const CONTRIBUTION_OFFSET: usize = 72;
    pub const JOINED_AT_OFFSET: usize = 80;
    pub const ROLE_OFFSET: usize = 88;
    pub const BUMP_OFFSET: usize = 89;
}

/// One depositor's stake in one cabal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub cabal: Address,
    pub member: Address,
    /// Lamports deposited (buy-in for members), zero once withdrawn
    pub contribution: u64,
    /// Slot of the deposit
    pub joined_at: u64,
    pub role: Role,
    pub bump: u8,
}

impl Membership {
    pub const LEN: usize = 8 + 32 + 32 + 8 + 8 + 1 + 1;
    pub const DISCRIMINATOR: [u8; 8] = *b"membrv01";

    /// True if this record grants trading authority in `cabal` to `signer`
    pub fn authorizes_swap(&self, cabal: &Address, signer: &Address) -> bool {
        self.role == Role::Member && &self.cabal == cabal && &self.member == signer
    }

    /// Terminal transition on Withdraw
    pub fn mark_withdrawn(&mut self) {
        self.role = Role::Withdrawn;
        self.contribution = 0;
    }

    pub fn unpack(data: &[u8]) -> Option<Self> {
        use membership_layout::*;

        if data.len() < Self::LEN || data[..8] != Self::DISCRIMINATOR {
            return None;
        }

        Some(Self {
            cabal: Address::new_from_array(data[CABAL_OFFSET..CABAL_OFFSET + 32].try_into().ok()?),
            member: Address::new_from_array(data[MEMBER_OFFSET..MEMBER_OFFSET + 32].try_into().ok()?),
            contribution: u64::from_le_bytes(
                data[CONTRIBUTION_OFFSET..CONTRIBUTION_OFFSET + 8].try_into().ok()?,
            ),
            joined_at: u64::from_le_bytes(data[JOINED_AT_OFFSET..JOINED_AT_OFFSET + 8].try_into().ok()?),
            role: Role::from_u8(data[ROLE_OFFSET])?,
            bump: data[BUMP_OFFSET],
        })
    }

    pub fn pack(&self, data: &mut [u8]) -> Result<(), CabalError> {
        use membership_layout::*;

        if data.len() < Self::LEN {
            return Err(CabalError::InvalidAccount);
        }

        data[DISCRIMINATOR_OFFSET..DISCRIMINATOR_OFFSET + 8].copy_from_slice(&Self::DISCRIMINATOR);
        data[CABAL_OFFSET..CABAL_OFFSET + 32].copy_from_slice(self.cabal.as_ref());
        data[MEMBER_OFFSET..MEMBER_OFFSET + 32].copy_from_slice(self.member.as_ref());
        data[CONTRIBUTION_OFFSET..CONTRIBUTION_OFFSET + 8].copy_from_slice(&self.contribution.to_le_bytes());
        data[JOINED_AT_OFFSET..JOINED_AT_OFFSET + 8].copy_from_slice(&self.joined_at.to_le_bytes());
        data[ROLE_OFFSET] = self.role as u8;
        data[BUMP_OFFSET] = self.bump;
        Ok(())
    }
}

// ============================================================
// SPL TOKEN ACCOUNT VIEW
// ============================================================

/// Fields of an SPL token account the vault logic needs.
/// Layout: mint(32) + owner(32) + amount(8) + ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenHolding {
    pub mint: [u8; 32],
    pub owner: [u8; 32],
    pub amount: u64,
}

impl TokenHolding {
    /// SPL token account size
    pub const LEN: usize = 165;

    pub fn unpack(data: &[u8]) -> Option<Self> {
        if data.len() < Self::LEN {
            return None;
        }
        Some(Self {
            mint: data[0..32].try_into().ok()?,
            owner: data[32..64].try_into().ok()?,
            amount: u64::from_le_bytes(data[64..72].try_into().ok()?),
        })
    }
}
