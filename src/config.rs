//! Deployment configuration
//!
//! Fixed at build time and passed explicitly into the route validator and
//! handlers. Nothing here can be supplied or overridden by instruction data.

use pinocchio::Address;

/// Seats per cabal
pub const MAX_MEMBERS: u8 = 6;

/// Upper bound on accounts forwarded to the swap router in one call
pub const MAX_ROUTE_ACCOUNTS: usize = 48;

/// Basis points denominator: 10000 = 100%
pub const BASIS_POINTS_DENOMINATOR: u64 = 10_000;

/// Jupiter `route` discriminator: sha256("global:route")[..8]
pub const JUPITER_ROUTE_DISC: [u8; 8] = [0xe5, 0x17, 0xcb, 0x97, 0x7a, 0xe3, 0xad, 0x2a];

/// Jupiter `shared_accounts_route` discriminator
pub const JUPITER_SHARED_ROUTE_DISC: [u8; 8] = [0xc1, 0x20, 0x9b, 0x33, 0x41, 0xd6, 0x9c, 0x81];

/// discriminator(8) + route_plan len(4) + in_amount(8) + quoted_out_amount(8)
/// + slippage_bps(2) + platform_fee_bps(1)
pub const MIN_ROUTE_DATA_LEN: usize = 8 + 4 + 8 + 8 + 2 + 1;

/// Fee wallet: A8aTLejFzPYqFmBtq7586VTfbsroXS4AMAPvtA3DXH8q
pub const FEE_WALLET: Address = Address::new_from_array([
    0x87, 0xaa, 0x13, 0x1e, 0xfe, 0x8d, 0x98, 0xf0,
    0xfd, 0xd0, 0x7d, 0x78, 0x97, 0x88, 0x79, 0xe0,
    0x87, 0x45, 0x7e, 0x18, 0xaf, 0x9b, 0x23, 0x57,
    0x71, 0xec, 0x68, 0x33, 0x80, 0xdf, 0x61, 0x76,
]);

/// Jupiter Aggregator V6: JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4
pub const JUPITER_V6_PROGRAM: Address = Address::new_from_array([
    0x04, 0x79, 0xd5, 0x5b, 0xf2, 0x31, 0xc0, 0x6e,
    0xee, 0x74, 0xc5, 0x6e, 0xce, 0x68, 0x15, 0x07,
    0xfd, 0xb1, 0xb2, 0xde, 0xa3, 0xf4, 0x8e, 0x51,
    0x02, 0xb1, 0xcd, 0xa2, 0x56, 0xbc, 0x13, 0x8f,
]);

/// Protocol-wide constants the handlers are parameterized over
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Only destination for swap fees
    pub fee_wallet: Address,
    /// Only program a routing payload may target
    pub swap_program: Address,
    /// Accepted swap entry points of `swap_program`
    pub route_discriminators: &'static [[u8; 8]],
    /// Shortest routing payload accepted
    pub min_route_data_len: usize,
}

/// The configuration this program is deployed with
pub const DEPLOYMENT: ProtocolConfig = ProtocolConfig {
    fee_wallet: FEE_WALLET,
    swap_program: JUPITER_V6_PROGRAM,
    route_discriminators: &[JUPITER_ROUTE_DISC, JUPITER_SHARED_ROUTE_DISC],
    min_route_data_len: MIN_ROUTE_DATA_LEN,
};

impl ProtocolConfig {
    /// True if `data` starts with an allowed swap entry point discriminator
    pub fn is_route_entry_point(&self, data: &[u8]) -> bool {
        data.len() >= 8
            && self
                .route_discriminators
                .iter()
                .any(|disc| &data[..8] == disc.as_slice())
    }
}
