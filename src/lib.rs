// Periodic Raffle
// A lottery that closes on a fixed interval and pays one winner per round,
// drawn from randomness delivered by an off-chain oracle

// Round state and lifecycle
pub mod raffle_state;
pub mod raffle_round;
pub mod raffle_event;
pub mod raffle_error;

// Program surface
pub mod raffle_instruction;
pub mod raffle_processor;
#[cfg(not(feature = "no-entrypoint"))]
pub mod raffle_entrypoint;
pub mod utils;

// Oracle integration
pub mod vrf;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    raffle_processor::Processor::process(program_id, accounts, instruction_data)
}
