use crate::raffle_error::RaffleError;
use solana_program::{
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};
use arrayref::{array_ref, array_refs, mut_array_refs, array_mut_ref};
use std::convert::TryFrom;

/// Number of ledger slots reserved in the raffle account
pub const MAX_PLAYERS: usize = 128;

const PLAYERS_SPACE: usize = 32 * MAX_PLAYERS;

/// Correlation identifier of a randomness request
pub type RequestId = u64;

/// Phase of the current round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries and eligibility queries
    Open,
    /// Entry closed, waiting for exactly one randomness callback
    Closing,
}

impl TryFrom<u8> for RaffleState {
    type Error = &'static str;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(RaffleState::Open),
            1 => Ok(RaffleState::Closing),
            _ => Err("Invalid raffle state"),
        }
    }
}

impl From<RaffleState> for u8 {
    fn from(state: RaffleState) -> Self {
        match state {
            RaffleState::Open => 0,
            RaffleState::Closing => 1,
        }
    }
}

/// The raffle aggregate, stored in the raffle PDA.
///
/// Fields are only reachable through the accessors below; mutation goes
/// through the round operations in `raffle_round`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub(crate) is_initialized: bool,
    pub(crate) state: RaffleState,
    pub(crate) bump: u8,
    /// Minimum payment in lamports, fixed at initialization
    pub(crate) entrance_fee: u64,
    /// Minimum seconds between two round opens
    pub(crate) interval: i64,
    pub(crate) last_opened_at: UnixTimestamp,
    /// Set iff `state == Closing`
    pub(crate) pending_request_id: Option<RequestId>,
    /// Lamports held for the current round
    pub(crate) pot: u64,
    /// Completed rounds so far
    pub(crate) round_number: u64,
    pub(crate) recent_payout: u64,
    /// Zero key until the first draw
    pub(crate) recent_winner: Pubkey,
    /// Authority allowed to deliver randomness
    pub(crate) oracle: Pubkey,
    pub(crate) players: Vec<Pubkey>,
}

impl Round {
    /// Builds a freshly opened round.
    pub fn new(
        entrance_fee: u64,
        interval: i64,
        oracle: Pubkey,
        bump: u8,
        now: UnixTimestamp,
    ) -> Result<Self, RaffleError> {
        if entrance_fee == 0 || interval <= 0 {
            return Err(RaffleError::InvalidConfig);
        }

        Ok(Round {
            is_initialized: true,
            state: RaffleState::Open,
            bump,
            entrance_fee,
            interval,
            last_opened_at: now,
            pending_request_id: None,
            pot: 0,
            round_number: 0,
            recent_payout: 0,
            recent_winner: Pubkey::default(),
            oracle,
            players: Vec::new(),
        })
    }

    pub fn state(&self) -> RaffleState {
        self.state
    }

    pub fn entrance_fee(&self) -> u64 {
        self.entrance_fee
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// Participant holding ledger slot `index`
    pub fn player(&self, index: usize) -> Result<&Pubkey, RaffleError> {
        self.players.get(index).ok_or(RaffleError::IndexOutOfRange)
    }

    pub fn players(&self) -> &[Pubkey] {
        &self.players
    }

    pub fn number_of_players(&self) -> usize {
        self.players.len()
    }

    pub fn recent_winner(&self) -> &Pubkey {
        &self.recent_winner
    }

    pub fn recent_payout(&self) -> u64 {
        self.recent_payout
    }

    pub fn last_opened_at(&self) -> UnixTimestamp {
        self.last_opened_at
    }

    pub fn pending_request_id(&self) -> Option<RequestId> {
        self.pending_request_id
    }

    pub fn pot(&self) -> u64 {
        self.pot
    }

    pub fn round_number(&self) -> u64 {
        self.round_number
    }

    pub fn oracle(&self) -> &Pubkey {
        &self.oracle
    }

    pub fn bump(&self) -> u8 {
        self.bump
    }
}

impl Sealed for Round {}

impl IsInitialized for Round {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for Round {
    const LEN: usize = 1 + 1 + 1 + 8 + 8 + 8 + 1 + 8 + 8 + 8 + 8 + 32 + 32 + 4 + PLAYERS_SPACE;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Round::LEN];
        let (
            is_initialized,
            state,
            bump,
            entrance_fee,
            interval,
            last_opened_at,
            has_pending,
            pending_request_id,
            pot,
            round_number,
            recent_payout,
            recent_winner,
            oracle,
            player_count,
            players,
        ) = array_refs![src, 1, 1, 1, 8, 8, 8, 1, 8, 8, 8, 8, 32, 32, 4, PLAYERS_SPACE];

        let state = RaffleState::try_from(state[0]).map_err(|_| ProgramError::InvalidAccountData)?;

        let player_count = u32::from_le_bytes(*player_count) as usize;
        if player_count > MAX_PLAYERS {
            return Err(ProgramError::InvalidAccountData);
        }
        let players = players
            .chunks_exact(32)
            .take(player_count)
            .map(|slot| Pubkey::new_from_array(*array_ref![slot, 0, 32]))
            .collect();

        let pending_request_id = match has_pending[0] {
            0 => None,
            1 => Some(u64::from_le_bytes(*pending_request_id)),
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(Round {
            is_initialized: is_initialized[0] != 0,
            state,
            bump: bump[0],
            entrance_fee: u64::from_le_bytes(*entrance_fee),
            interval: i64::from_le_bytes(*interval),
            last_opened_at: UnixTimestamp::from_le_bytes(*last_opened_at),
            pending_request_id,
            pot: u64::from_le_bytes(*pot),
            round_number: u64::from_le_bytes(*round_number),
            recent_payout: u64::from_le_bytes(*recent_payout),
            recent_winner: Pubkey::new_from_array(*recent_winner),
            oracle: Pubkey::new_from_array(*oracle),
            players,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Round::LEN];
        let (
            is_initialized_dst,
            state_dst,
            bump_dst,
            entrance_fee_dst,
            interval_dst,
            last_opened_at_dst,
            has_pending_dst,
            pending_request_id_dst,
            pot_dst,
            round_number_dst,
            recent_payout_dst,
            recent_winner_dst,
            oracle_dst,
            player_count_dst,
            players_dst,
        ) = mut_array_refs![dst, 1, 1, 1, 8, 8, 8, 1, 8, 8, 8, 8, 32, 32, 4, PLAYERS_SPACE];

        is_initialized_dst[0] = self.is_initialized as u8;
        state_dst[0] = self.state.into();
        bump_dst[0] = self.bump;
        *entrance_fee_dst = self.entrance_fee.to_le_bytes();
        *interval_dst = self.interval.to_le_bytes();
        *last_opened_at_dst = self.last_opened_at.to_le_bytes();
        match self.pending_request_id {
            Some(request_id) => {
                has_pending_dst[0] = 1;
                *pending_request_id_dst = request_id.to_le_bytes();
            }
            None => {
                has_pending_dst[0] = 0;
                *pending_request_id_dst = [0u8; 8];
            }
        }
        *pot_dst = self.pot.to_le_bytes();
        *round_number_dst = self.round_number.to_le_bytes();
        *recent_payout_dst = self.recent_payout.to_le_bytes();
        recent_winner_dst.copy_from_slice(self.recent_winner.as_ref());
        oracle_dst.copy_from_slice(self.oracle.as_ref());
        *player_count_dst = (self.players.len() as u32).to_le_bytes();

        // Stale slots from the previous round are zeroed
        players_dst.fill(0);
        for (slot, player) in players_dst.chunks_exact_mut(32).zip(self.players.iter()) {
            slot.copy_from_slice(player.as_ref());
        }
    }
}
