// Randomness oracle integration for the raffle program
use crate::raffle_error::RaffleError;
use crate::raffle_state::RequestId;
use solana_program::{clock::Slot, hash::hashv, msg, pubkey::Pubkey};

/// A 256-bit random value delivered by the oracle, little-endian
pub type RandomWord = [u8; 32];

const REQUEST_DOMAIN: &[u8] = b"randomness-request";

/// The outbound half of the oracle protocol.
///
/// `request` hands the closing round to the oracle and returns the
/// identifier its callback must carry.
pub trait RandomnessOracle {
    fn request(&mut self, round_number: u64) -> Result<RequestId, RaffleError>;
}

/// Oracle adapter for an off-chain VRF service that watches program logs.
///
/// The request id is bound to the raffle, the oracle key, the round and the
/// slot the request was made in.
pub struct LoggedRequestOracle<'a> {
    raffle: &'a Pubkey,
    oracle: &'a Pubkey,
    slot: Slot,
}

impl<'a> LoggedRequestOracle<'a> {
    pub fn new(raffle: &'a Pubkey, oracle: &'a Pubkey, slot: Slot) -> Self {
        Self { raffle, oracle, slot }
    }
}

impl RandomnessOracle for LoggedRequestOracle<'_> {
    fn request(&mut self, round_number: u64) -> Result<RequestId, RaffleError> {
        let request_id = derive_request_id(self.raffle, self.oracle, round_number, self.slot);
        msg!(
            "Randomness requested from oracle {}: raffle={}, round={}, request_id={}",
            self.oracle,
            self.raffle,
            round_number,
            request_id
        );
        Ok(request_id)
    }
}

/// Derive the correlation id of a randomness request
pub fn derive_request_id(raffle: &Pubkey, oracle: &Pubkey, round_number: u64, slot: Slot) -> RequestId {
    let hash = hashv(&[
        REQUEST_DOMAIN,
        raffle.as_ref(),
        oracle.as_ref(),
        &round_number.to_le_bytes(),
        &slot.to_le_bytes(),
    ]);
    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(&hash.as_ref()[..8]);
    RequestId::from_le_bytes(id_bytes)
}

/// Winning ledger slot: the full 256-bit word reduced modulo `player_count`.
///
/// Returns `None` for an empty ledger.
pub fn winner_index(random_word: &RandomWord, player_count: usize) -> Option<usize> {
    if player_count == 0 {
        return None;
    }

    let modulus = player_count as u128;
    let remainder = random_word
        .iter()
        .rev()
        .fold(0u128, |acc, byte| ((acc << 8) | *byte as u128) % modulus);

    Some(remainder as usize)
}

/// Little-endian word holding `value`, convenient for oracles and tests
pub fn random_word_from_u64(value: u64) -> RandomWord {
    let mut word = [0u8; 32];
    word[..8].copy_from_slice(&value.to_le_bytes());
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winner_index_matches_small_values() {
        assert_eq!(winner_index(&random_word_from_u64(42), 1), Some(0));
        assert_eq!(winner_index(&random_word_from_u64(7), 4), Some(3));
        assert_eq!(winner_index(&random_word_from_u64(8), 4), Some(0));
        assert_eq!(winner_index(&random_word_from_u64(u64::MAX), 10), Some((u64::MAX % 10) as usize));
    }

    #[test]
    fn winner_index_uses_high_bytes() {
        // 2^64 mod 3 == 1
        let mut word = [0u8; 32];
        word[8] = 1;
        assert_eq!(winner_index(&word, 3), Some(1));

        // 2^255 mod 7 == 2^(255 mod 3) == 1
        let mut word = [0u8; 32];
        word[31] = 0x80;
        assert_eq!(winner_index(&word, 7), Some(1));

        assert_eq!(winner_index(&[0xff; 32], 1), Some(0));
    }

    #[test]
    fn winner_index_of_empty_ledger() {
        assert_eq!(winner_index(&random_word_from_u64(42), 0), None);
    }

    #[test]
    fn request_ids_differ_per_round() {
        let raffle = Pubkey::new_unique();
        let oracle = Pubkey::new_unique();
        let first = derive_request_id(&raffle, &oracle, 0, 100);

        assert_eq!(first, derive_request_id(&raffle, &oracle, 0, 100));
        assert_ne!(first, derive_request_id(&raffle, &oracle, 1, 100));
        assert_ne!(first, derive_request_id(&raffle, &oracle, 0, 101));
        assert_ne!(first, derive_request_id(&raffle, &Pubkey::new_unique(), 0, 100));
    }

    #[test]
    fn logged_oracle_returns_derived_id() {
        let raffle = Pubkey::new_unique();
        let oracle = Pubkey::new_unique();
        let mut adapter = LoggedRequestOracle::new(&raffle, &oracle, 9);

        assert_eq!(adapter.request(3), Ok(derive_request_id(&raffle, &oracle, 3, 9)));
    }
}
