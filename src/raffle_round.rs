// Round lifecycle: OPEN -> CLOSING -> OPEN
use crate::raffle_error::RaffleError;
use crate::raffle_event::RaffleEvent;
use crate::raffle_state::{RaffleState, RequestId, Round, MAX_PLAYERS};
use crate::vrf::{self, RandomWord, RandomnessOracle};

use solana_program::{clock::UnixTimestamp, msg, pubkey::Pubkey};

impl Round {
    /// Admit `participant` into the current round for `payment` lamports.
    ///
    /// Overpayment stays in the pot.
    pub fn enter(&mut self, participant: Pubkey, payment: u64) -> Result<RaffleEvent, RaffleError> {
        if payment < self.entrance_fee {
            msg!("Payment of {} lamports is below the entrance fee of {}", payment, self.entrance_fee);
            return Err(RaffleError::InsufficientPayment);
        }
        if self.state != RaffleState::Open {
            msg!("Round is not open for entries");
            return Err(RaffleError::RoundNotOpen);
        }
        if self.players.len() >= MAX_PLAYERS {
            msg!("Entry ledger is full ({} players)", MAX_PLAYERS);
            return Err(RaffleError::LedgerFull);
        }

        let pot = self.pot.checked_add(payment).ok_or(RaffleError::AmountOverflow)?;

        self.pot = pot;
        self.players.push(participant);

        Ok(RaffleEvent::EntryAccepted {
            participant,
            ledger_size: self.players.len() as u32,
        })
    }

    /// Whether an automation trigger may close the round at `now`
    pub fn is_close_eligible(&self, now: UnixTimestamp) -> bool {
        let is_open = self.state == RaffleState::Open;
        let time_passed = now.saturating_sub(self.last_opened_at) >= self.interval;
        let has_players = !self.players.is_empty();
        let has_balance = self.pot > 0;

        is_open && time_passed && has_players && has_balance
    }

    /// Close entry and hand the round to the oracle.
    pub fn request_close(
        &mut self,
        now: UnixTimestamp,
        oracle: &mut dyn RandomnessOracle,
    ) -> Result<RaffleEvent, RaffleError> {
        if !self.is_close_eligible(now) {
            msg!(
                "Close not eligible: pot={}, players={}, state={:?}",
                self.pot,
                self.players.len(),
                self.state
            );
            return Err(RaffleError::CloseNotEligible);
        }

        let request_id = oracle.request(self.round_number)?;
        self.register_request(request_id);

        Ok(RaffleEvent::ClosingRequested { request_id })
    }

    fn register_request(&mut self, request_id: RequestId) {
        self.state = RaffleState::Closing;
        self.pending_request_id = Some(request_id);
    }

    /// Check that `request_id` is the one outstanding request.
    pub fn validate(&self, request_id: RequestId) -> Result<(), RaffleError> {
        match (self.state, self.pending_request_id) {
            (RaffleState::Closing, Some(pending)) if pending == request_id => Ok(()),
            _ => {
                msg!("No outstanding randomness request with id {}", request_id);
                Err(RaffleError::UnknownRequest)
            }
        }
    }

    /// Draw the winner from `random_word`, pay the pot and reopen.
    ///
    /// `pay` performs the transfer of the pot to the winner. The round is
    /// staged on a copy and only committed once `pay` succeeded, so any
    /// failure leaves `self` untouched.
    pub fn fulfill<F>(
        &mut self,
        request_id: RequestId,
        random_word: &RandomWord,
        now: UnixTimestamp,
        pay: F,
    ) -> Result<RaffleEvent, RaffleError>
    where
        F: FnOnce(&Pubkey, u64) -> Result<(), RaffleError>,
    {
        self.validate(request_id)?;

        let index = vrf::winner_index(random_word, self.players.len()).ok_or(RaffleError::IndexOutOfRange)?;
        let winner = *self.player(index)?;
        let payout = self.pot;
        msg!("Random winner index: {} of {}", index, self.players.len());

        let mut next = self.clone();
        next.recent_winner = winner;
        next.recent_payout = payout;
        next.players.clear();
        next.pot = 0;
        next.last_opened_at = now;
        next.pending_request_id = None;
        next.state = RaffleState::Open;
        next.round_number = next.round_number.checked_add(1).ok_or(RaffleError::AmountOverflow)?;

        pay(&winner, payout)?;

        *self = next;
        Ok(RaffleEvent::WinnerPicked {
            winner,
            payout,
            round_number: self.round_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vrf::random_word_from_u64;

    struct FixedOracle {
        next_id: RequestId,
        requests: Vec<u64>,
    }

    impl FixedOracle {
        fn new(next_id: RequestId) -> Self {
            Self { next_id, requests: Vec::new() }
        }
    }

    impl RandomnessOracle for FixedOracle {
        fn request(&mut self, round_number: u64) -> Result<RequestId, RaffleError> {
            self.requests.push(round_number);
            let id = self.next_id;
            self.next_id += 1;
            Ok(id)
        }
    }

    fn open_round(entrance_fee: u64, interval: i64) -> Round {
        Round::new(entrance_fee, interval, Pubkey::new_unique(), 255, 1_000).unwrap()
    }

    fn closing_round(players: &[Pubkey], entrance_fee: u64) -> (Round, RequestId) {
        let mut round = open_round(entrance_fee, 30);
        for player in players {
            round.enter(*player, entrance_fee).unwrap();
        }
        let mut oracle = FixedOracle::new(11);
        round.request_close(1_030, &mut oracle).unwrap();
        (round, 11)
    }

    fn no_payout(_: &Pubkey, _: u64) -> Result<(), RaffleError> {
        Ok(())
    }

    #[test]
    fn enter_appends_in_arrival_order() {
        let mut round = open_round(10, 30);
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();

        assert_eq!(
            round.enter(a, 10),
            Ok(RaffleEvent::EntryAccepted { participant: a, ledger_size: 1 })
        );
        round.enter(b, 10).unwrap();
        round.enter(a, 10).unwrap();

        assert_eq!(round.players(), &[a, b, a]);
        assert_eq!(round.pot(), 30);
        assert_eq!(round.player(2), Ok(&a));
        assert_eq!(round.player(3), Err(RaffleError::IndexOutOfRange));
    }

    #[test]
    fn enter_keeps_overpayment() {
        let mut round = open_round(10, 30);
        round.enter(Pubkey::new_unique(), 25).unwrap();
        assert_eq!(round.pot(), 25);
    }

    #[test]
    fn enter_rejects_underpayment() {
        let mut round = open_round(10, 30);
        for payment in [0, 1, 9] {
            assert_eq!(round.enter(Pubkey::new_unique(), payment), Err(RaffleError::InsufficientPayment));
        }
        assert_eq!(round.number_of_players(), 0);
        assert_eq!(round.pot(), 0);
    }

    #[test]
    fn enter_rejected_while_closing() {
        let (mut round, _) = closing_round(&[Pubkey::new_unique()], 10);

        assert_eq!(round.enter(Pubkey::new_unique(), 10), Err(RaffleError::RoundNotOpen));
        assert_eq!(round.enter(Pubkey::new_unique(), 1), Err(RaffleError::InsufficientPayment));
        assert_eq!(round.number_of_players(), 1);
        assert_eq!(round.pot(), 10);
    }

    #[test]
    fn enter_rejected_when_ledger_full() {
        let mut round = open_round(1, 30);
        for _ in 0..MAX_PLAYERS {
            round.enter(Pubkey::new_unique(), 1).unwrap();
        }
        assert_eq!(round.enter(Pubkey::new_unique(), 1), Err(RaffleError::LedgerFull));
        assert_eq!(round.number_of_players(), MAX_PLAYERS);
    }

    #[test]
    fn enter_rejects_pot_overflow() {
        let mut round = open_round(1, 30);
        round.enter(Pubkey::new_unique(), u64::MAX).unwrap();
        assert_eq!(round.enter(Pubkey::new_unique(), 1), Err(RaffleError::AmountOverflow));
        assert_eq!(round.number_of_players(), 1);
    }

    #[test]
    fn not_eligible_without_players() {
        let round = open_round(10, 30);
        assert!(!round.is_close_eligible(1_000));
        assert!(!round.is_close_eligible(1_030));
        assert!(!round.is_close_eligible(i64::MAX));
    }

    #[test]
    fn eligible_once_interval_elapsed() {
        let mut round = open_round(10, 30);
        round.enter(Pubkey::new_unique(), 10).unwrap();

        assert!(!round.is_close_eligible(1_000));
        assert!(!round.is_close_eligible(1_029));
        assert!(round.is_close_eligible(1_030));
        assert!(round.is_close_eligible(5_000));
    }

    #[test]
    fn not_eligible_while_closing() {
        let (round, _) = closing_round(&[Pubkey::new_unique()], 10);
        assert!(!round.is_close_eligible(9_999));
    }

    #[test]
    fn request_close_requires_eligibility() {
        let mut oracle = FixedOracle::new(1);

        let mut empty = open_round(10, 30);
        assert_eq!(empty.request_close(2_000, &mut oracle), Err(RaffleError::CloseNotEligible));

        let mut early = open_round(10, 30);
        early.enter(Pubkey::new_unique(), 10).unwrap();
        assert_eq!(early.request_close(1_010, &mut oracle), Err(RaffleError::CloseNotEligible));
        assert_eq!(early.state(), RaffleState::Open);
        assert_eq!(early.pending_request_id(), None);
        assert!(oracle.requests.is_empty());
    }

    #[test]
    fn request_close_transitions_exactly_once() {
        let mut round = open_round(10, 30);
        round.enter(Pubkey::new_unique(), 10).unwrap();
        let mut oracle = FixedOracle::new(5);

        assert_eq!(
            round.request_close(1_030, &mut oracle),
            Ok(RaffleEvent::ClosingRequested { request_id: 5 })
        );
        assert_eq!(round.state(), RaffleState::Closing);
        assert_eq!(round.pending_request_id(), Some(5));

        assert_eq!(round.request_close(1_031, &mut oracle), Err(RaffleError::CloseNotEligible));
        assert_eq!(round.pending_request_id(), Some(5));
        assert_eq!(oracle.requests, vec![0]);
    }

    #[test]
    fn validate_rejects_unknown_and_stale_ids() {
        let open = open_round(10, 30);
        assert_eq!(open.validate(0), Err(RaffleError::UnknownRequest));

        let (round, request_id) = closing_round(&[Pubkey::new_unique()], 10);
        assert_eq!(round.validate(request_id), Ok(()));
        assert_eq!(round.validate(request_id + 1), Err(RaffleError::UnknownRequest));
    }

    #[test]
    fn fulfill_single_player_round() {
        let a = Pubkey::new_unique();
        let mut round = open_round(1, 1);
        round.enter(a, 1).unwrap();
        let mut oracle = FixedOracle::new(77);
        round.request_close(1_001, &mut oracle).unwrap();

        let mut paid = None;
        let event = round
            .fulfill(77, &random_word_from_u64(42), 1_005, |winner, amount| {
                paid = Some((*winner, amount));
                Ok(())
            })
            .unwrap();

        assert_eq!(event, RaffleEvent::WinnerPicked { winner: a, payout: 1, round_number: 1 });
        assert_eq!(paid, Some((a, 1)));
        assert_eq!(*round.recent_winner(), a);
        assert_eq!(round.number_of_players(), 0);
        assert_eq!(round.pot(), 0);
        assert_eq!(round.state(), RaffleState::Open);
        assert_eq!(round.pending_request_id(), None);
        assert_eq!(round.last_opened_at(), 1_005);
    }

    #[test]
    fn fulfill_picks_slot_by_modulus() {
        let players: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        let (mut round, request_id) = closing_round(&players, 10);

        let event = round.fulfill(request_id, &random_word_from_u64(7), 1_040, no_payout).unwrap();

        assert_eq!(
            event,
            RaffleEvent::WinnerPicked { winner: players[3], payout: 40, round_number: 1 }
        );
        assert_eq!(round.recent_payout(), 40);
        assert_eq!(round.number_of_players(), 0);
        assert_eq!(round.state(), RaffleState::Open);
    }

    #[test]
    fn fulfill_with_wrong_id_changes_nothing() {
        let players = [Pubkey::new_unique(), Pubkey::new_unique()];
        let (mut round, request_id) = closing_round(&players, 10);
        let before = round.clone();

        assert_eq!(
            round.fulfill(request_id.wrapping_add(1), &random_word_from_u64(1), 1_040, no_payout),
            Err(RaffleError::UnknownRequest)
        );
        assert_eq!(round, before);
    }

    #[test]
    fn fulfill_while_open_is_rejected() {
        let mut round = open_round(10, 30);
        round.enter(Pubkey::new_unique(), 10).unwrap();
        let before = round.clone();

        assert_eq!(
            round.fulfill(0, &random_word_from_u64(1), 1_040, no_payout),
            Err(RaffleError::UnknownRequest)
        );
        assert_eq!(round, before);
    }

    #[test]
    fn fulfill_twice_succeeds_once() {
        let (mut round, request_id) = closing_round(&[Pubkey::new_unique()], 10);
        let word = random_word_from_u64(3);

        assert!(round.fulfill(request_id, &word, 1_040, no_payout).is_ok());
        assert_eq!(
            round.fulfill(request_id, &word, 1_041, no_payout),
            Err(RaffleError::UnknownRequest)
        );
        assert_eq!(round.round_number(), 1);
    }

    #[test]
    fn failed_payout_rolls_back() {
        let players = [Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique()];
        let (mut round, request_id) = closing_round(&players, 10);
        let before = round.clone();

        assert_eq!(
            round.fulfill(request_id, &random_word_from_u64(2), 1_040, |_, _| Err(RaffleError::PayoutFailed)),
            Err(RaffleError::PayoutFailed)
        );
        assert_eq!(round, before);
        assert_eq!(round.state(), RaffleState::Closing);
        assert_eq!(round.pending_request_id(), Some(request_id));

        // delivery can be retried with the same request
        assert!(round.fulfill(request_id, &random_word_from_u64(2), 1_050, no_payout).is_ok());
        assert_eq!(*round.recent_winner(), players[2]);
    }

    #[test]
    fn next_round_reopens_with_fresh_timer() {
        let (mut round, request_id) = closing_round(&[Pubkey::new_unique()], 10);
        round.fulfill(request_id, &random_word_from_u64(0), 2_000, no_payout).unwrap();

        round.enter(Pubkey::new_unique(), 10).unwrap();
        assert!(!round.is_close_eligible(2_029));
        assert!(round.is_close_eligible(2_030));

        let mut oracle = FixedOracle::new(90);
        round.request_close(2_030, &mut oracle).unwrap();
        assert_eq!(oracle.requests, vec![1]);
        assert_eq!(round.pending_request_id(), Some(90));
    }
}
