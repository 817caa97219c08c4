use crate::raffle_error::RaffleError;
use crate::raffle_instruction::RaffleInstruction;
use crate::raffle_state::Round;
use crate::utils::{self, RAFFLE_SEED};
use crate::vrf::{LoggedRequestOracle, RandomWord};

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    bpf_loader_upgradeable,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack},
    pubkey::Pubkey,
    system_instruction,
    system_program,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeRaffle {
                entrance_fee,
                interval,
                oracle,
            } => {
                msg!("Instruction: Initialize Raffle");
                Self::process_initialize_raffle(accounts, entrance_fee, interval, oracle, program_id)
            }
            RaffleInstruction::Enter { payment } => {
                msg!("Instruction: Enter");
                Self::process_enter(accounts, payment, program_id)
            }
            RaffleInstruction::RequestClose {} => {
                msg!("Instruction: Request Close");
                Self::process_request_close(accounts, program_id)
            }
            RaffleInstruction::Fulfill {
                request_id,
                random_word,
            } => {
                msg!("Instruction: Fulfill");
                Self::process_fulfill(accounts, request_id, random_word, program_id)
            }
            RaffleInstruction::CheckEligibility {} => {
                msg!("Instruction: Check Eligibility");
                Self::process_check_eligibility(accounts, program_id)
            }
        }
    }

    /// Creates the raffle PDA and opens the first round
    fn process_initialize_raffle(
        accounts: &[AccountInfo],
        entrance_fee: u64,
        interval: i64,
        oracle: Pubkey,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let program_data_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            msg!("Authority must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_upgrade_authority(program_data_info, authority_info.key, program_id)?;

        let (expected_raffle_pubkey, bump_seed) = utils::find_raffle_address(program_id);
        if *raffle_info.key != expected_raffle_pubkey {
            msg!("Invalid raffle account address");
            return Err(RaffleError::InvalidRaffleAccount.into());
        }

        let clock = Clock::get()?;
        let round = Round::new(entrance_fee, interval, oracle, bump_seed, clock.unix_timestamp)?;

        if raffle_info.owner != program_id {
            let rent = Rent::get()?;
            let rent_lamports = rent.minimum_balance(Round::LEN);
            let bump = [bump_seed];
            let raffle_seeds: &[&[u8]] = &[RAFFLE_SEED, &bump];

            if raffle_info.lamports() == 0 {
                msg!("Creating raffle account");
                invoke_signed(
                    &system_instruction::create_account(
                        authority_info.key,
                        raffle_info.key,
                        rent_lamports,
                        Round::LEN as u64,
                        program_id,
                    ),
                    &[authority_info.clone(), raffle_info.clone(), system_program_info.clone()],
                    &[raffle_seeds],
                )?;
            } else {
                // Anyone can send lamports to the PDA, so create_account would fail
                msg!("Raffle address already holds {} lamports, claiming it", raffle_info.lamports());
                let shortfall = rent_lamports.saturating_sub(raffle_info.lamports());
                if shortfall > 0 {
                    invoke(
                        &system_instruction::transfer(authority_info.key, raffle_info.key, shortfall),
                        &[authority_info.clone(), raffle_info.clone(), system_program_info.clone()],
                    )?;
                }
                invoke_signed(
                    &system_instruction::allocate(raffle_info.key, Round::LEN as u64),
                    &[raffle_info.clone(), system_program_info.clone()],
                    &[raffle_seeds],
                )?;
                invoke_signed(
                    &system_instruction::assign(raffle_info.key, program_id),
                    &[raffle_info.clone(), system_program_info.clone()],
                    &[raffle_seeds],
                )?;
            }
        } else if Round::unpack_unchecked(&raffle_info.data.borrow())?.is_initialized() {
            msg!("Raffle account is already initialized");
            return Err(RaffleError::AlreadyInitialized.into());
        }

        Round::pack(round, &mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle initialized: EntranceFee={}, Interval={}s, Oracle={}, OpenedAt={}",
            entrance_fee,
            interval,
            oracle,
            clock.unix_timestamp
        );
        Ok(())
    }

    fn process_enter(accounts: &[AccountInfo], payment: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let participant_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !participant_info.is_signer {
            msg!("Participant must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if *system_program_info.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }

        let mut round = Self::load_round(raffle_info, program_id)?;
        let event = round.enter(*participant_info.key, payment)?;

        invoke(
            &system_instruction::transfer(participant_info.key, raffle_info.key, payment),
            &[
                participant_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        Round::pack(round, &mut raffle_info.data.borrow_mut())?;
        event.emit()?;
        Ok(())
    }

    fn process_request_close(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        // Any signer may close an eligible round
        if !caller_info.is_signer {
            msg!("Caller must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut round = Self::load_round(raffle_info, program_id)?;
        let clock = Clock::get()?;

        let oracle_key = *round.oracle();
        let mut oracle = LoggedRequestOracle::new(raffle_info.key, &oracle_key, clock.slot);
        let event = round.request_close(clock.unix_timestamp, &mut oracle)?;

        Round::pack(round, &mut raffle_info.data.borrow_mut())?;
        event.emit()?;
        Ok(())
    }

    fn process_fulfill(
        accounts: &[AccountInfo],
        request_id: u64,
        random_word: RandomWord,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let oracle_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        if !oracle_info.is_signer {
            msg!("Oracle must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut round = Self::load_round(raffle_info, program_id)?;
        if round.oracle() != oracle_info.key {
            msg!("Signer {} is not the raffle oracle", oracle_info.key);
            return Err(RaffleError::UnauthorizedOracle.into());
        }

        let clock = Clock::get()?;
        let rent = Rent::get()?;

        let event = round.fulfill(request_id, &random_word, clock.unix_timestamp, |winner, payout| {
            if winner != winner_info.key {
                msg!("Winner account {} does not match drawn winner {}", winner_info.key, winner);
                return Err(RaffleError::WinnerAccountMismatch);
            }
            Self::transfer_pot(raffle_info, winner_info, payout, &rent)
        })?;

        Round::pack(round, &mut raffle_info.data.borrow_mut())?;
        event.emit()?;
        Ok(())
    }

    fn process_check_eligibility(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let round = Self::load_round(raffle_info, program_id)?;
        let clock = Clock::get()?;

        let eligible = round.is_close_eligible(clock.unix_timestamp);
        msg!(
            "Close eligible: {} (players={}, pot={}, opened at {})",
            eligible,
            round.number_of_players(),
            round.pot(),
            round.last_opened_at()
        );
        set_return_data(&[eligible as u8]);
        Ok(())
    }

    /// Only the upgrade authority recorded in the program's `ProgramData` may initialize
    fn check_upgrade_authority(
        program_data_info: &AccountInfo,
        authority: &Pubkey,
        program_id: &Pubkey,
    ) -> ProgramResult {
        if *program_data_info.key != utils::find_program_data_address(program_id)
            || *program_data_info.owner != bpf_loader_upgradeable::id()
        {
            msg!("Invalid program data account");
            return Err(ProgramError::InvalidAccountData);
        }

        match utils::upgrade_authority(&program_data_info.data.borrow())? {
            Some(upgrade_authority) if upgrade_authority == *authority => Ok(()),
            _ => {
                msg!("{} is not the upgrade authority of this program", authority);
                Err(RaffleError::UnauthorizedInitializer.into())
            }
        }
    }

    /// Loads an initialized round from the raffle PDA
    fn load_round(raffle_info: &AccountInfo, program_id: &Pubkey) -> Result<Round, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }

        let round = Round::unpack_unchecked(&raffle_info.data.borrow())?;
        if !round.is_initialized() {
            return Err(RaffleError::NotInitialized.into());
        }

        let expected = Pubkey::create_program_address(&[RAFFLE_SEED, &[round.bump()]], program_id)
            .map_err(|_| RaffleError::InvalidRaffleAccount)?;
        if *raffle_info.key != expected {
            msg!("Invalid raffle account address");
            return Err(RaffleError::InvalidRaffleAccount.into());
        }

        Ok(round)
    }

    /// Moves `payout` lamports from the program-owned raffle account to the winner
    fn transfer_pot(
        raffle_info: &AccountInfo,
        winner_info: &AccountInfo,
        payout: u64,
        rent: &Rent,
    ) -> Result<(), RaffleError> {
        if !winner_info.is_writable {
            msg!("Winner account {} is not writable", winner_info.key);
            return Err(RaffleError::PayoutFailed);
        }

        let spendable = utils::spendable_lamports(rent, raffle_info.lamports(), raffle_info.data_len());
        if spendable < payout {
            msg!("Raffle holds {} spendable lamports, cannot pay {}", spendable, payout);
            return Err(RaffleError::PayoutFailed);
        }

        let raffle_lamports = raffle_info
            .lamports()
            .checked_sub(payout)
            .ok_or(RaffleError::PayoutFailed)?;
        let winner_lamports = winner_info
            .lamports()
            .checked_add(payout)
            .ok_or(RaffleError::PayoutFailed)?;
        // The runtime rejects a below-reserve balance on an account that was closed
        if !rent.is_exempt(winner_lamports, winner_info.data_len()) {
            msg!(
                "Winner account {} would hold {} lamports, below its rent reserve",
                winner_info.key,
                winner_lamports
            );
            return Err(RaffleError::PayoutFailed);
        }

        let mut raffle_balance = raffle_info.try_borrow_mut_lamports().map_err(|_| RaffleError::PayoutFailed)?;
        let mut winner_balance = winner_info.try_borrow_mut_lamports().map_err(|_| RaffleError::PayoutFailed)?;
        **raffle_balance = raffle_lamports;
        **winner_balance = winner_lamports;

        msg!(
            "Paid {} lamports ({} SOL) to {}",
            payout,
            utils::lamports_to_sol(payout),
            winner_info.key
        );
        Ok(())
    }
}
