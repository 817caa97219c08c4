use solana_program::{program_error::ProgramError, decode_error::DecodeError, msg, program_error::PrintProgramError};
use thiserror::Error;

/// Errors that may be returned by the raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstructionData,

    /// Payment is below the entrance fee
    #[error("Payment is below the entrance fee")]
    InsufficientPayment,

    /// The round is not accepting entries
    #[error("Round is not open")]
    RoundNotOpen,

    /// The round cannot be closed yet
    #[error("Round is not eligible for closing")]
    CloseNotEligible,

    /// No outstanding randomness request matches the callback
    #[error("Unknown randomness request")]
    UnknownRequest,

    /// The pot could not be delivered to the winner
    #[error("Payout to the winner failed")]
    PayoutFailed,

    #[error("Player index out of range")]
    IndexOutOfRange,

    /// Every ledger slot of the raffle account is taken
    #[error("Entry ledger is full")]
    LedgerFull,

    #[error("Amount overflow")]
    AmountOverflow,

    /// Entrance fee and interval must both be positive
    #[error("Invalid raffle configuration")]
    InvalidConfig,

    #[error("Raffle already initialized")]
    AlreadyInitialized,

    #[error("Raffle not initialized")]
    NotInitialized,

    /// The account passed is not the raffle PDA
    #[error("Invalid raffle account")]
    InvalidRaffleAccount,

    /// Only the configured oracle may deliver randomness
    #[error("Signer is not the raffle oracle")]
    UnauthorizedOracle,

    /// The winner account passed does not hold the winning ledger slot
    #[error("Winner account does not match the drawn winner")]
    WinnerAccountMismatch,

    /// Only the program's upgrade authority may create the raffle
    #[error("Signer is not the program upgrade authority")]
    UnauthorizedInitializer,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
