use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serenity::model::id::UserId;
use std::time::Duration;
use tokio::time::Instant;

/// Cooldown por usuario entre comandos
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_used: DashMap<UserId, Instant>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra el uso si el cooldown ya pasó; si no, devuelve el tiempo restante
    pub fn check(&self, user: UserId, cooldown: Duration) -> Result<(), Duration> {
        let now = Instant::now();
        match self.last_used.entry(user) {
            Entry::Occupied(mut entry) => {
                let elapsed = now.saturating_duration_since(*entry.get());
                if elapsed < cooldown {
                    return Err(cooldown - elapsed);
                }
                entry.insert(now);
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
            }
        }
        Ok(())
    }

    /// Olvida usuarios cuyo último comando es más viejo que `max_age`
    pub fn prune(&self, max_age: Duration) {
        let now = Instant::now();
        self.last_used
            .retain(|_, used| now.saturating_duration_since(*used) < max_age);
    }

    pub fn len(&self) -> usize {
        self.last_used.len()
    }
}
