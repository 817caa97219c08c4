// Raffle Program - Utility Functions
use arrayref::{array_ref, array_refs};
use solana_program::{bpf_loader_upgradeable, program_error::ProgramError, pubkey::Pubkey, rent::Rent};

/// Seed of the raffle PDA
pub const RAFFLE_SEED: &[u8] = b"raffle";

/// Leading bytes of an upgradeable loader `ProgramData` account:
/// enum tag (u32), deployment slot (u64), optional upgrade authority
pub const PROGRAM_DATA_HEADER_LEN: usize = 4 + 8 + 1 + 32;

const PROGRAM_DATA_TAG: u32 = 3;

/// Find the program derived address of the raffle
pub fn find_raffle_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED], program_id)
}

/// Address of the `ProgramData` account holding this program's upgrade authority
pub fn find_program_data_address(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[program_id.as_ref()], &bpf_loader_upgradeable::id()).0
}

/// Reads the upgrade authority from `ProgramData` account data.
/// `None` means the program was made immutable.
pub fn upgrade_authority(data: &[u8]) -> Result<Option<Pubkey>, ProgramError> {
    if data.len() < PROGRAM_DATA_HEADER_LEN {
        return Err(ProgramError::InvalidAccountData);
    }
    let header = array_ref![data, 0, PROGRAM_DATA_HEADER_LEN];
    let (tag, _slot, has_authority, authority) = array_refs![header, 4, 8, 1, 32];

    if u32::from_le_bytes(*tag) != PROGRAM_DATA_TAG {
        return Err(ProgramError::InvalidAccountData);
    }
    match has_authority[0] {
        0 => Ok(None),
        1 => Ok(Some(Pubkey::new_from_array(*authority))),
        _ => Err(ProgramError::InvalidAccountData),
    }
}

/// Lamports of `balance` above the rent-exempt reserve for `data_len` bytes
pub fn spendable_lamports(rent: &Rent, balance: u64, data_len: usize) -> u64 {
    balance.saturating_sub(rent.minimum_balance(data_len))
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program_data_header(authority: Option<&Pubkey>) -> Vec<u8> {
        let mut data = Vec::with_capacity(PROGRAM_DATA_HEADER_LEN);
        data.extend_from_slice(&PROGRAM_DATA_TAG.to_le_bytes());
        data.extend_from_slice(&42u64.to_le_bytes());
        match authority {
            Some(key) => {
                data.push(1);
                data.extend_from_slice(key.as_ref());
            }
            None => data.extend_from_slice(&[0u8; 33]),
        }
        data
    }

    #[test]
    fn spendable_excludes_rent_reserve() {
        let rent = Rent::default();
        let reserve = rent.minimum_balance(100);

        assert_eq!(spendable_lamports(&rent, reserve + 5, 100), 5);
        assert_eq!(spendable_lamports(&rent, reserve, 100), 0);
        assert_eq!(spendable_lamports(&rent, reserve / 2, 100), 0);
    }

    #[test]
    fn raffle_address_is_stable() {
        let program_id = Pubkey::new_unique();
        assert_eq!(find_raffle_address(&program_id), find_raffle_address(&program_id));
    }

    #[test]
    fn reads_upgrade_authority() {
        let authority = Pubkey::new_unique();
        let mut data = program_data_header(Some(&authority));
        // Program bytes follow the header
        data.extend_from_slice(&[0xAA; 16]);

        assert_eq!(upgrade_authority(&data), Ok(Some(authority)));
        assert_eq!(upgrade_authority(&program_data_header(None)), Ok(None));
    }

    #[test]
    fn rejects_malformed_program_data() {
        let authority = Pubkey::new_unique();

        let mut wrong_tag = program_data_header(Some(&authority));
        wrong_tag[0] = 2;
        assert_eq!(upgrade_authority(&wrong_tag), Err(ProgramError::InvalidAccountData));

        let mut bad_flag = program_data_header(Some(&authority));
        bad_flag[12] = 9;
        assert_eq!(upgrade_authority(&bad_flag), Err(ProgramError::InvalidAccountData));

        let truncated = &program_data_header(Some(&authority))[..20];
        assert_eq!(upgrade_authority(truncated), Err(ProgramError::InvalidAccountData));
    }
}
