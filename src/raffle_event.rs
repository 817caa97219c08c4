use crate::raffle_state::RequestId;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, program_error::ProgramError, pubkey::Pubkey};

/// Notifications emitted by the raffle program.
///
/// Each event is written as a Borsh payload with `sol_log_data`, so indexers
/// can decode it from the `Program data:` log lines.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    EntryAccepted {
        participant: Pubkey,
        ledger_size: u32,
    },
    ClosingRequested {
        request_id: RequestId,
    },
    WinnerPicked {
        winner: Pubkey,
        payout: u64,
        round_number: u64,
    },
}

impl RaffleEvent {
    pub fn emit(&self) -> Result<(), ProgramError> {
        match self {
            RaffleEvent::EntryAccepted { participant, ledger_size } => {
                msg!("Entry accepted: participant={}, ledger size={}", participant, ledger_size);
            }
            RaffleEvent::ClosingRequested { request_id } => {
                msg!("Closing requested: request_id={}", request_id);
            }
            RaffleEvent::WinnerPicked { winner, payout, round_number } => {
                msg!("Winner picked for round {}: {} won {} lamports", round_number, winner, payout);
            }
        }

        let data = self.try_to_vec().map_err(serialization_error)?;
        sol_log_data(&[data.as_slice()]);
        Ok(())
    }
}

fn serialization_error(err: std::io::Error) -> ProgramError {
    ProgramError::BorshIoError(err.to_string())
}
