use rand::seq::SliceRandom;
use std::{collections::VecDeque, time::Duration};
use tracing::debug;

use crate::audio::track::Track;
use crate::error::{SessionError, SessionResult};

/// Cola FIFO de pistas pendientes de una sesión.
///
/// Nunca contiene la pista que está sonando.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega una pista al final
    pub fn enqueue(&mut self, track: Track) {
        debug!("➕ Agregado a la cola: {}", track.title());
        self.items.push_back(track);
    }

    /// Agrega una pista al inicio (loop de canción, pista atascada)
    pub fn enqueue_front(&mut self, track: Track) {
        debug!("⏮️ Reinsertado al inicio: {}", track.title());
        self.items.push_front(track);
    }

    /// Saca la siguiente pista (FIFO)
    pub fn pop_front(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Elimina la pista en la posición indicada (base 1)
    pub fn remove_at(&mut self, position: usize) -> SessionResult<Track> {
        if position == 0 || position > self.items.len() {
            return Err(SessionError::OutOfRange {
                value: position as i64,
                min: 1,
                max: self.items.len() as i64,
            });
        }

        let removed = self
            .items
            .remove(position - 1)
            .ok_or(SessionError::EmptyQueue)?;
        debug!("❌ Pista eliminada en posición {}", position);
        Ok(removed)
    }

    /// Permutación uniforme de las pistas pendientes
    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
    }

    /// Vacía la cola y devuelve cuántas pistas había
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().map(Track::duration).sum()
    }

    pub fn to_vec(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }
}

/// Una página del listado de la cola
#[derive(Debug, Clone)]
pub struct QueuePage {
    /// Pares (posición base 1, pista)
    pub items: Vec<(usize, Track)>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl QueuePage {
    /// Obtiene una página específica de un listado de pistas
    pub fn of(tracks: &[Track], page: usize, items_per_page: usize) -> Self {
        let items_per_page = items_per_page.max(1);
        let total_items = tracks.len();
        let total_pages = total_items.div_ceil(items_per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * items_per_page;

        let items = tracks
            .iter()
            .enumerate()
            .skip(start)
            .take(items_per_page)
            .map(|(index, track)| (index + 1, track.clone()))
            .collect();

        Self {
            items,
            current_page,
            total_pages,
            total_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::sample_track;
    use pretty_assertions::assert_eq;

    fn titles(queue: &TrackQueue) -> Vec<String> {
        queue.iter().map(|t| t.title().to_string()).collect()
    }

    fn queue_of(names: &[&str]) -> TrackQueue {
        let mut queue = TrackQueue::new();
        for name in names {
            queue.enqueue(sample_track(name, 1000, 1));
        }
        queue
    }

    #[test]
    fn keeps_insertion_order() {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert_eq!(titles(&queue), vec!["a", "b", "c"]);
        assert_eq!(queue.pop_front().unwrap().title(), "a");
        assert_eq!(titles(&queue), vec!["b", "c"]);
    }

    #[test]
    fn enqueue_front_goes_first() {
        let mut queue = queue_of(&["a", "b"]);
        queue.enqueue_front(sample_track("z", 1000, 2));
        assert_eq!(titles(&queue), vec!["z", "a", "b"]);
    }

    #[test]
    fn remove_at_rejects_zero_and_past_end() {
        let mut queue = queue_of(&["a", "b"]);

        assert!(matches!(
            queue.remove_at(0),
            Err(SessionError::OutOfRange { value: 0, min: 1, max: 2 })
        ));
        assert!(matches!(queue.remove_at(3), Err(SessionError::OutOfRange { .. })));
        assert_eq!(queue.len(), 2);

        let removed = queue.remove_at(2).unwrap();
        assert_eq!(removed.title(), "b");
        assert_eq!(titles(&queue), vec!["a"]);
    }

    #[test]
    fn remove_from_empty_queue_is_out_of_range() {
        let mut queue = TrackQueue::new();
        assert!(matches!(queue.remove_at(1), Err(SessionError::OutOfRange { .. })));
    }

    #[test]
    fn shuffle_keeps_same_tracks() {
        let mut queue = queue_of(&["a", "b", "c", "d", "e"]);
        queue.shuffle();

        let mut shuffled = titles(&queue);
        shuffled.sort();
        assert_eq!(shuffled, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn total_duration_sums_pending_tracks() {
        let mut queue = TrackQueue::new();
        queue.enqueue(sample_track("a", 1000, 1));
        queue.enqueue(sample_track("b", 2500, 1));
        assert_eq!(queue.total_duration(), Duration::from_millis(3500));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn pages_are_one_based_and_clamped() {
        let queue = queue_of(&["a", "b", "c", "d", "e"]);
        let tracks = queue.to_vec();

        let page = QueuePage::of(&tracks, 2, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(
            page.items.iter().map(|(pos, t)| (*pos, t.title())).collect::<Vec<_>>(),
            vec![(3, "c"), (4, "d")]
        );

        let last = QueuePage::of(&tracks, 99, 2);
        assert_eq!(last.current_page, 3);
        assert_eq!(last.items.len(), 1);

        let empty = QueuePage::of(&[], 1, 10);
        assert_eq!(empty.total_pages, 1);
        assert!(empty.items.is_empty());
    }
}
