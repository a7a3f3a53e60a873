//! Draw offers
//!
//! Tracks whether the opponent has an offer open and when we last offered,
//! and produces the matching outbound requests.

use tracing::debug;

use crate::protocol::{DrawOfferInfo, GameRequest};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawOffers {
    opponent_offer_open: bool,
    our_last_offer_ply: Option<usize>,
    min_plies_between_offers: usize,
}

impl DrawOffers {
    pub fn new(min_plies_between_offers: usize) -> Self {
        Self {
            opponent_offer_open: false,
            our_last_offer_ply: None,
            min_plies_between_offers,
        }
    }

    /// Load the server's view of the offers
    pub fn set(&mut self, info: DrawOfferInfo) {
        self.opponent_offer_open = info.unconfirmed;
        self.our_last_offer_ply = info.last_offer_ply;
    }

    pub fn is_opponent_offer_open(&self) -> bool {
        self.opponent_offer_open
    }

    pub fn our_last_offer_ply(&self) -> Option<usize> {
        self.our_last_offer_ply
    }

    pub fn on_opponent_extended_offer(&mut self) {
        debug!("Opponent offered a draw");
        self.opponent_offer_open = true;
    }

    pub fn on_opponent_declined_offer(&mut self) {
        debug!("Opponent declined our draw offer");
    }

    /// Whether we may offer at `ply`
    pub fn can_offer(&self, ply: usize) -> bool {
        !self.opponent_offer_open
            && self
                .our_last_offer_ply
                .map_or(true, |last| ply >= last + self.min_plies_between_offers)
    }

    /// Offer a draw at `ply`, if allowed
    pub fn offer(&mut self, ply: usize) -> Option<GameRequest> {
        if !self.can_offer(ply) {
            return None;
        }
        self.our_last_offer_ply = Some(ply);
        Some(GameRequest::OfferDraw)
    }

    /// Accept the opponent's open offer
    pub fn accept(&mut self) -> Option<GameRequest> {
        self.opponent_offer_open
            .then(|| {
                self.opponent_offer_open = false;
                GameRequest::AcceptDraw
            })
    }

    /// Decline the opponent's open offer
    pub fn decline(&mut self) -> Option<GameRequest> {
        self.opponent_offer_open
            .then(|| {
                self.opponent_offer_open = false;
                GameRequest::DeclineDraw
            })
    }

    /// A ply was played; our own move implicitly declines an open offer
    pub fn on_move_played(&mut self, by_opponent: bool) {
        if !by_opponent {
            self.opponent_offer_open = false;
        }
    }

    pub fn reset(&mut self) {
        self.opponent_offer_open = false;
        self.our_last_offer_ply = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_spacing() {
        let mut offers = DrawOffers::new(2);
        assert_eq!(offers.offer(4), Some(GameRequest::OfferDraw));
        assert_eq!(offers.offer(5), None);
        assert_eq!(offers.offer(6), Some(GameRequest::OfferDraw));
    }

    #[test]
    fn test_answering_opponent_offer() {
        let mut offers = DrawOffers::new(2);
        assert_eq!(offers.accept(), None);

        offers.on_opponent_extended_offer();
        assert!(!offers.can_offer(10));
        assert_eq!(offers.decline(), Some(GameRequest::DeclineDraw));
        assert!(!offers.is_opponent_offer_open());

        offers.on_opponent_extended_offer();
        offers.on_move_played(false);
        assert!(!offers.is_opponent_offer_open());
    }

    #[test]
    fn test_set_from_server() {
        let mut offers = DrawOffers::new(2);
        offers.set(DrawOfferInfo {
            unconfirmed: true,
            last_offer_ply: Some(3),
        });
        assert!(offers.is_opponent_offer_open());
        assert_eq!(offers.our_last_offer_ply(), Some(3));
    }
}
