use serenity::model::id::UserId;
use std::collections::{HashMap, HashSet};

/// Acciones que un usuario sin privilegios puede someter a votación
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteAction {
    Pause,
    Resume,
    Skip,
    Shuffle,
    Stop,
}

impl VoteAction {
    pub fn label(&self) -> &'static str {
        match self {
            VoteAction::Pause => "pausar",
            VoteAction::Resume => "reanudar",
            VoteAction::Skip => "saltar",
            VoteAction::Shuffle => "mezclar",
            VoteAction::Stop => "detener",
        }
    }
}

/// Votos pendientes de una sesión.
///
/// Solo la máquina de estados de la sesión limpia votos: al arrancar una
/// pista nueva y al ejecutarse la acción votada.
#[derive(Debug, Default)]
pub struct VoteLedger {
    votes: HashMap<VoteAction, HashSet<UserId>>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un voto (idempotente) y devuelve el total actual
    pub fn record(&mut self, action: VoteAction, voter: UserId) -> usize {
        let voters = self.votes.entry(action).or_default();
        voters.insert(voter);
        voters.len()
    }

    pub fn count(&self, action: VoteAction) -> usize {
        self.votes.get(&action).map_or(0, HashSet::len)
    }

    pub fn has_voted(&self, action: VoteAction, voter: UserId) -> bool {
        self.votes
            .get(&action)
            .is_some_and(|voters| voters.contains(&voter))
    }

    pub fn clear(&mut self, action: VoteAction) {
        self.votes.remove(&action);
    }

    pub fn clear_all(&mut self) {
        self.votes.clear();
    }

    /// Quita todos los votos de un usuario (p. ej. al convertirse en DJ)
    pub fn retract(&mut self, voter: UserId) {
        for voters in self.votes.values_mut() {
            voters.remove(&voter);
        }
        self.votes.retain(|_, voters| !voters.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

/// Votos necesarios para ejecutar `action` con `occupants` usuarios en el
/// canal: `ceil((occupants - 1) / 2.5)`.
///
/// `occupants` excluye solo a este bot; otros bots del canal sí cuentan.
/// Con 6 humanos y el bot en el canal hacen falta 2 votos.
///
/// Detener con exactamente 3 ocupantes siempre exige 2 votos.
pub fn required_votes(action: VoteAction, occupants: usize) -> usize {
    if action == VoteAction::Stop && occupants == 3 {
        return 2;
    }

    // (n - 1) / 2.5 == 2 * (n - 1) / 5
    (2 * occupants.saturating_sub(1)).div_ceil(5)
}
