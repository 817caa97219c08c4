use crate::raffle_error::RaffleError;
use crate::raffle_state::RequestId;
use crate::utils::{find_program_data_address, find_raffle_address};
use crate::vrf::RandomWord;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::convert::TryInto;
use std::mem::size_of;

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Create the raffle account and open the first round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The program's upgrade authority, funding the raffle account
    /// 1. `[writable]` The raffle account (PDA of `["raffle"]`)
    /// 2. `[]` The program's `ProgramData` account
    /// 3. `[]` The system program
    InitializeRaffle {
        /// Minimum payment per entry in lamports
        entrance_fee: u64,
        /// Minimum seconds between two round opens
        interval: i64,
        /// Key allowed to deliver randomness
        oracle: Pubkey,
    },

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The participant paying the entry
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    Enter {
        /// Lamports paid, at least the entrance fee
        payment: u64,
    },

    /// Close entry and request randomness (anyone, usually an automation trigger)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The caller
    /// 1. `[writable]` The raffle account
    RequestClose {},

    /// Deliver the random word for the outstanding request and pay the winner
    ///
    /// Accounts expected:
    /// 0. `[signer]` The oracle authority
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The winner drawn from the ledger
    Fulfill {
        request_id: RequestId,
        random_word: RandomWord,
    },

    /// Report whether the round may be closed now, as one byte of return data
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckEligibility {},
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input.split_first().ok_or(RaffleError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                let (entrance_fee, rest) = Self::unpack_u64(rest)?;
                let (interval, rest) = Self::unpack_i64(rest)?;
                let (oracle, _) = Self::unpack_fixed_bytes::<32>(rest)?;
                Self::InitializeRaffle {
                    entrance_fee,
                    interval,
                    oracle: Pubkey::new_from_array(oracle),
                }
            }
            1 => {
                let (payment, _) = Self::unpack_u64(rest)?;
                Self::Enter { payment }
            }
            2 => Self::RequestClose {},
            3 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (random_word, _) = Self::unpack_fixed_bytes::<32>(rest)?;
                Self::Fulfill { request_id, random_word }
            }
            4 => Self::CheckEligibility {},
            _ => return Err(RaffleError::InvalidInstructionData.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match *self {
            Self::InitializeRaffle {
                entrance_fee,
                interval,
                ref oracle,
            } => {
                buf.push(0);
                buf.extend_from_slice(&entrance_fee.to_le_bytes());
                buf.extend_from_slice(&interval.to_le_bytes());
                buf.extend_from_slice(oracle.as_ref());
            }
            Self::Enter { payment } => {
                buf.push(1);
                buf.extend_from_slice(&payment.to_le_bytes());
            }
            Self::RequestClose {} => buf.push(2),
            Self::Fulfill {
                request_id,
                ref random_word,
            } => {
                buf.push(3);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.extend_from_slice(random_word);
            }
            Self::CheckEligibility {} => buf.push(4),
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<8>(input)?;
        Ok((u64::from_le_bytes(bytes), rest))
    }

    fn unpack_i64(input: &[u8]) -> Result<(i64, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<8>(input)?;
        Ok((i64::from_le_bytes(bytes), rest))
    }

    fn unpack_fixed_bytes<const N: usize>(input: &[u8]) -> Result<([u8; N], &[u8]), ProgramError> {
        if input.len() < N {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (bytes, rest) = input.split_at(N);
        let bytes: [u8; N] = bytes.try_into().map_err(|_| RaffleError::InvalidInstructionData)?;
        Ok((bytes, rest))
    }
}

/// Create initialize_raffle instruction
pub fn initialize_raffle(
    program_id: &Pubkey,
    authority: &Pubkey,
    entrance_fee: u64,
    interval: i64,
    oracle: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::InitializeRaffle {
        entrance_fee,
        interval,
        oracle: *oracle,
    }
    .pack();
    let (raffle, _) = find_raffle_address(program_id);

    let accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new(raffle, false),
        AccountMeta::new_readonly(find_program_data_address(program_id), false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create enter instruction
pub fn enter(program_id: &Pubkey, participant: &Pubkey, payment: u64) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::Enter { payment }.pack();
    let (raffle, _) = find_raffle_address(program_id);

    let accounts = vec![
        AccountMeta::new(*participant, true),
        AccountMeta::new(raffle, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create request_close instruction
pub fn request_close(program_id: &Pubkey, caller: &Pubkey) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::RequestClose {}.pack();
    let (raffle, _) = find_raffle_address(program_id);

    let accounts = vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(raffle, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create fulfill instruction
pub fn fulfill(
    program_id: &Pubkey,
    oracle: &Pubkey,
    winner: &Pubkey,
    request_id: RequestId,
    random_word: RandomWord,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::Fulfill { request_id, random_word }.pack();
    let (raffle, _) = find_raffle_address(program_id);

    let accounts = vec![
        AccountMeta::new_readonly(*oracle, true),
        AccountMeta::new(raffle, false),
        AccountMeta::new(*winner, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create check_eligibility instruction
pub fn check_eligibility(program_id: &Pubkey) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::CheckEligibility {}.pack();
    let (raffle, _) = find_raffle_address(program_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(raffle, false)],
        data,
    })
}
