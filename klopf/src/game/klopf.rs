//! The klopf escalation sub-protocol.
//!
//! A klopf interrupts normal play to raise the stakes of losing the current
//! round. Every other alive player must either go along (mitgehen) or fold
//! for an immediate one-life cost. Losing a round while participating in an
//! active klopf costs `1 + level` lives.

use std::collections::HashMap;

use super::entities::PlayerId;
use super::errors::GameError;

/// Round-scoped klopf bookkeeping. `last_klopper` is the one field that
/// survives round boundaries; it is cleared only when a new game starts.
#[derive(Clone, Debug, Default)]
pub struct KlopfState {
    pub active: bool,
    pub initiator: Option<PlayerId>,
    pub level: u8,
    /// The initiator plus everyone who answered mitgehen.
    pub participants: Vec<PlayerId>,
    /// Recorded answers: true = mitgehen, false = fold.
    pub responses: HashMap<PlayerId, bool>,
    /// A player may never initiate two klopfs in direct succession.
    pub last_klopper: Option<PlayerId>,
}

impl KlopfState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new round. Keeps `last_klopper`.
    pub fn reset(&mut self) {
        self.active = false;
        self.initiator = None;
        self.level = 0;
        self.participants.clear();
        self.responses.clear();
    }

    /// Reset for a new game: clears everything including `last_klopper`.
    pub fn reset_for_new_game(&mut self) {
        self.reset();
        self.last_klopper = None;
    }

    /// Initiate a klopf or counter-klopf.
    pub fn initiate(&mut self, player_id: &PlayerId) -> Result<(), GameError> {
        if self.last_klopper.as_ref() == Some(player_id) {
            return Err(GameError::CannotKlopfTwice);
        }
        self.active = true;
        self.initiator = Some(player_id.clone());
        self.level += 1;
        self.responses.clear();
        self.participants.clear();
        self.participants.push(player_id.clone());
        self.last_klopper = Some(player_id.clone());
        Ok(())
    }

    /// Record a player's answer. A life-constrained player (`must_mitgehen`)
    /// cannot fold.
    pub fn respond(
        &mut self,
        player_id: &PlayerId,
        mitgehen: bool,
        must_mitgehen: bool,
    ) -> Result<(), GameError> {
        if !self.active {
            return Err(GameError::NotInKlopf);
        }
        if self.responses.contains_key(player_id) {
            return Err(GameError::AlreadyResponded);
        }
        if must_mitgehen && !mitgehen {
            return Err(GameError::MustMitgehen);
        }
        self.responses.insert(player_id.clone(), mitgehen);
        if mitgehen {
            self.participants.push(player_id.clone());
        }
        Ok(())
    }

    /// True once every alive player except the initiator has answered.
    pub fn all_responded(&self, alive_ids: &[PlayerId]) -> bool {
        alive_ids
            .iter()
            .filter(|id| self.initiator.as_ref() != Some(id))
            .all(|id| self.responses.contains_key(id))
    }

    /// Life penalty for losing the round while this klopf is active.
    pub fn penalty(&self) -> u8 {
        1 + self.level
    }

    pub fn is_participant(&self, player_id: &PlayerId) -> bool {
        self.participants.iter().any(|id| id == player_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_initiate_sets_state() {
        let mut klopf = KlopfState::new();
        klopf.initiate(&"p1".to_string()).unwrap();
        assert!(klopf.active);
        assert_eq!(klopf.level, 1);
        assert_eq!(klopf.initiator.as_deref(), Some("p1"));
        assert_eq!(klopf.participants, ids(&["p1"]));
        assert_eq!(klopf.last_klopper.as_deref(), Some("p1"));
    }

    #[test]
    fn test_cannot_klopf_twice_in_a_row() {
        let mut klopf = KlopfState::new();
        klopf.initiate(&"p1".to_string()).unwrap();
        assert_eq!(
            klopf.initiate(&"p1".to_string()),
            Err(GameError::CannotKlopfTwice)
        );
        // A different player may counter, after which p1 is free again.
        klopf.initiate(&"p2".to_string()).unwrap();
        klopf.initiate(&"p1".to_string()).unwrap();
        assert_eq!(klopf.level, 3);
    }

    #[test]
    fn test_last_klopper_survives_round_reset() {
        let mut klopf = KlopfState::new();
        klopf.initiate(&"p1".to_string()).unwrap();
        klopf.reset();
        assert_eq!(
            klopf.initiate(&"p1".to_string()),
            Err(GameError::CannotKlopfTwice)
        );
        klopf.reset_for_new_game();
        klopf.initiate(&"p1".to_string()).unwrap();
        assert_eq!(klopf.level, 1);
    }

    #[test]
    fn test_respond_requires_active_klopf() {
        let mut klopf = KlopfState::new();
        assert_eq!(
            klopf.respond(&"p2".to_string(), true, false),
            Err(GameError::NotInKlopf)
        );
    }

    #[test]
    fn test_respond_once_only() {
        let mut klopf = KlopfState::new();
        klopf.initiate(&"p1".to_string()).unwrap();
        klopf.respond(&"p2".to_string(), false, false).unwrap();
        assert_eq!(
            klopf.respond(&"p2".to_string(), true, false),
            Err(GameError::AlreadyResponded)
        );
    }

    #[test]
    fn test_must_mitgehen_cannot_fold() {
        let mut klopf = KlopfState::new();
        klopf.initiate(&"p1".to_string()).unwrap();
        assert_eq!(
            klopf.respond(&"p2".to_string(), false, true),
            Err(GameError::MustMitgehen)
        );
        klopf.respond(&"p2".to_string(), true, true).unwrap();
        assert!(klopf.is_participant(&"p2".to_string()));
    }

    #[test]
    fn test_fold_is_not_a_participant() {
        let mut klopf = KlopfState::new();
        klopf.initiate(&"p1".to_string()).unwrap();
        klopf.respond(&"p2".to_string(), false, false).unwrap();
        assert!(!klopf.is_participant(&"p2".to_string()));
    }

    #[test]
    fn test_all_responded_ignores_initiator_and_dead() {
        let mut klopf = KlopfState::new();
        klopf.initiate(&"p1".to_string()).unwrap();
        // p3 is dead and absent from the alive list; only p2 must answer.
        assert!(!klopf.all_responded(&ids(&["p1", "p2"])));
        klopf.respond(&"p2".to_string(), true, false).unwrap();
        assert!(klopf.all_responded(&ids(&["p1", "p2"])));
    }

    #[test]
    fn test_penalty_is_one_plus_level() {
        let mut klopf = KlopfState::new();
        assert_eq!(klopf.penalty(), 1);
        klopf.initiate(&"p1".to_string()).unwrap();
        assert_eq!(klopf.penalty(), 2);
        klopf.initiate(&"p2".to_string()).unwrap();
        assert_eq!(klopf.penalty(), 3);
    }
}
