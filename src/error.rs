//! Program errors

use pinocchio::error::ProgramError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CabalError {
    /// Unknown instruction discriminator or truncated instruction data
    InvalidInstruction = 0,
    /// Bad buy-in, fee rate or amount
    InvalidParameters = 1,
    /// Cabal already seats MAX_MEMBERS members
    CabalFull = 2,
    /// Depositor already has a membership record in this cabal
    DuplicateMember = 3,
    /// Caller is not a signing member of this cabal
    UnauthorizedSigner = 4,
    /// Vault cannot cover the requested amount
    InsufficientFunds = 5,
    /// Routing payload targets a program other than the allow-listed router
    UntrustedTarget = 6,
    /// Routing payload bytes are not a recognized swap entry point
    InvalidInstructionData = 7,
    /// Routing payload claims a privilege it may not have
    /// (vault or holding account as signer, or a flag the transaction never granted)
    PrivilegeEscalation = 8,
    /// Output received is below the caller's minimum
    SlippageExceeded = 9,
    /// Forwarded swap call failed
    SwapExecutionFailed = 10,
    /// PDA derivation does not match the supplied account
    InvalidPda = 11,
    /// Account data has the wrong size or discriminator
    InvalidAccount = 12,
    /// Account is not owned by the expected program
    InvalidOwner = 13,
    /// Program account is not the expected program
    InvalidProgram = 14,
    /// Account must be writable
    AccountNotWritable = 15,
    /// Failed to borrow account data
    AccountBorrowFailed = 16,
    /// Account already initialized
    AccountAlreadyInitialized = 17,
    /// Arithmetic overflow
    MathOverflow = 18,
    /// Slippage must be below 10000 basis points
    InvalidSlippage = 19,
    /// A vault holding account is absent from the routing payload
    HoldingAccountMissing = 20,
    /// Same account passed where distinct accounts are required
    DuplicateAccount = 21,
    /// Fee account is not the configured fee wallet
    InvalidFeeDestination = 22,
    /// Swap consumed more wrapped input than the requested amount
    InvalidSwapAmount = 23,
    /// Vault lamports dropped during the forwarded call
    VaultBalanceChanged = 24,
    /// Pro-rata share rounds to zero
    NothingToWithdraw = 25,
    /// Signer has no active deposit in this cabal
    NotDepositor = 26,
}

impl From<CabalError> for ProgramError {
    fn from(e: CabalError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
