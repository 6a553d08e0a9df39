use serenity::model::id::UserId;
use std::collections::HashSet;

/// Votación en curso para saltar la canción actual.
///
/// Un ballot sólo es válido para la instancia de track con la que se abrió;
/// cualquier transición de track lo invalida.
#[derive(Debug, Default)]
pub struct Ballot {
    instance: Option<u64>,
    voters: HashSet<UserId>,
}

/// Resultado de un voto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// El usuario ya había votado por este track; nada cambia
    AlreadyVoted { votes: usize, required: usize },
    /// Voto contado, todavía no se alcanza el mínimo
    Counted { votes: usize, required: usize },
    /// Se alcanzó el mínimo y el track fue saltado
    Skipped { votes: usize, required: usize },
}

impl VoteOutcome {
    /// `true` sólo si el voto provocó el salto
    pub fn voted(&self) -> bool {
        matches!(self, VoteOutcome::Skipped { .. })
    }

    pub fn votes(&self) -> usize {
        match *self {
            VoteOutcome::AlreadyVoted { votes, .. }
            | VoteOutcome::Counted { votes, .. }
            | VoteOutcome::Skipped { votes, .. } => votes,
        }
    }

    pub fn required(&self) -> usize {
        match *self {
            VoteOutcome::AlreadyVoted { required, .. }
            | VoteOutcome::Counted { required, .. }
            | VoteOutcome::Skipped { required, .. } => required,
        }
    }
}

/// Votos necesarios para `members` usuarios no-bot en el canal.
///
/// `threshold` es la fracción configurada por el servidor; valores fuera de
/// (0, 1] vuelven a la mayoría simple. Nunca devuelve menos de 1.
pub fn required_votes(members: usize, threshold: f64) -> usize {
    let threshold = if threshold.is_finite() && threshold > 0.0 && threshold <= 1.0 {
        threshold
    } else {
        0.5
    };
    ((members as f64 * threshold).ceil() as usize).max(1)
}

impl Ballot {
    /// Registra el voto de `voter` sobre la instancia `instance`
    pub fn cast(&mut self, instance: u64, voter: UserId, required: usize) -> VoteOutcome {
        if self.instance != Some(instance) {
            self.voters.clear();
            self.instance = Some(instance);
        }

        if !self.voters.insert(voter) {
            return VoteOutcome::AlreadyVoted { votes: self.voters.len(), required };
        }

        let votes = self.voters.len();
        if votes >= required {
            VoteOutcome::Skipped { votes, required }
        } else {
            VoteOutcome::Counted { votes, required }
        }
    }

    pub fn clear(&mut self) {
        self.voters.clear();
        self.instance = None;
    }

    /// Votos vigentes para la instancia dada
    pub fn votes_for(&self, instance: u64) -> usize {
        if self.instance == Some(instance) {
            self.voters.len()
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_is_majority_rounded_up() {
        assert_eq!(required_votes(5, 0.5), 3);
        assert_eq!(required_votes(4, 0.5), 2);
        assert_eq!(required_votes(1, 0.5), 1);
        assert_eq!(required_votes(0, 0.5), 1);
        assert_eq!(required_votes(10, 0.75), 8);
        assert_eq!(required_votes(5, f64::NAN), 3);
        assert_eq!(required_votes(5, 3.0), 3);
    }

    #[test]
    fn test_duplicate_vote_is_idempotent() {
        let mut ballot = Ballot::default();
        let alice = UserId::new(1);

        assert_eq!(ballot.cast(7, alice, 3), VoteOutcome::Counted { votes: 1, required: 3 });
        assert_eq!(ballot.cast(7, alice, 3), VoteOutcome::AlreadyVoted { votes: 1, required: 3 });
        assert_eq!(ballot.votes_for(7), 1);
    }

    #[test]
    fn test_ballot_resets_on_new_instance() {
        let mut ballot = Ballot::default();
        ballot.cast(1, UserId::new(1), 3);
        ballot.cast(1, UserId::new(2), 3);

        let outcome = ballot.cast(2, UserId::new(3), 3);
        assert_eq!(outcome, VoteOutcome::Counted { votes: 1, required: 3 });
        assert_eq!(ballot.votes_for(1), 0);
    }

    #[test]
    fn test_threshold_reached() {
        let mut ballot = Ballot::default();
        ballot.cast(1, UserId::new(1), 2);
        let outcome = ballot.cast(1, UserId::new(2), 2);
        assert!(outcome.voted());
        assert_eq!(outcome.votes(), 2);
        assert_eq!(outcome.required(), 2);
    }
}
