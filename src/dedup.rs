//! Trip-wide duplicate prevention
//!
//! A [`DedupRegistry`] is created for every engine run and shared by all day
//! tasks. Landmark names are owned by exactly one day; restaurant place ids
//! may be claimed once per trip. [`ClaimOrder`] makes concurrent day tasks
//! take their turn in day order so repeated runs pick the same venues.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

static STOPWORDS: &[&str] = &["the", "a", "an", "of", "at", "in", "on", "for", "with", "and", "&"];

/// Canonical form used for landmark identity
///
/// Lowercases, drops apostrophes, turns hyphens into spaces and removes
/// articles and short connective words.
#[must_use]
pub fn normalize_landmark_name(name: &str) -> String {
    name.to_lowercase()
        .replace(['\'', '\u{2019}'], "")
        .replace('-', " ")
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric() && c != '&'))
        .filter(|word| !word.is_empty() && !STOPWORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default)]
struct RegistryState {
    landmarks: HashMap<String, u32>,
    restaurants: HashSet<String>,
}

/// Point-in-time copy of the registry contents
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistrySnapshot {
    pub landmarks: BTreeMap<String, u32>,
    pub restaurants: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct DedupRegistry {
    state: Mutex<RegistryState>,
}

impl DedupRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a landmark name for `day`. Succeeds when the name is free or
    /// already owned by the same day.
    pub fn claim_landmark(&self, name: &str, day: u32) -> bool {
        let key = normalize_landmark_name(name);
        if key.is_empty() {
            return false;
        }
        let mut state = self.state.lock();
        let owner = *state.landmarks.entry(key).or_insert(day);
        if owner != day {
            debug!(name, day, owner, "landmark already scheduled on another day");
        }
        owner == day
    }

    /// Release a landmark previously claimed by `day`
    pub fn release_landmark(&self, name: &str, day: u32) {
        let key = normalize_landmark_name(name);
        let mut state = self.state.lock();
        if state.landmarks.get(&key) == Some(&day) {
            state.landmarks.remove(&key);
        }
    }

    #[must_use]
    pub fn landmark_owner(&self, name: &str) -> Option<u32> {
        self.state
            .lock()
            .landmarks
            .get(&normalize_landmark_name(name))
            .copied()
    }

    /// Taken by any day other than `day`
    #[must_use]
    pub fn is_landmark_taken(&self, name: &str, day: u32) -> bool {
        self.landmark_owner(name).is_some_and(|owner| owner != day)
    }

    /// Atomic test-and-insert of a restaurant place id
    pub fn claim_restaurant(&self, place_id: &str) -> bool {
        if place_id.is_empty() {
            return false;
        }
        let inserted = self.state.lock().restaurants.insert(place_id.to_string());
        if !inserted {
            debug!(place_id, "restaurant already used in this trip");
        }
        inserted
    }

    #[must_use]
    pub fn is_restaurant_used(&self, place_id: &str) -> bool {
        self.state.lock().restaurants.contains(place_id)
    }

    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.lock();
        RegistrySnapshot {
            landmarks: state
                .landmarks
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            restaurants: state.restaurants.iter().cloned().collect(),
        }
    }
}

/// Turnstile handing out one [`ClaimTicket`] per day
pub struct ClaimOrder;

impl ClaimOrder {
    /// Tickets for days `1..=days`, in day order
    #[must_use]
    pub fn tickets(days: u32) -> Vec<ClaimTicket> {
        let count = days as usize;
        let released = Arc::new(watch::Sender::new(vec![false; count]));
        (0..count)
            .map(|index| ClaimTicket {
                index,
                released: Arc::clone(&released),
            })
            .collect()
    }
}

/// Permission to claim for one day. Dropping the ticket hands the turn on,
/// including when the owning task fails or is aborted.
pub struct ClaimTicket {
    index: usize,
    released: Arc<watch::Sender<Vec<bool>>>,
}

impl ClaimTicket {
    #[must_use]
    pub fn day(&self) -> u32 {
        u32::try_from(self.index + 1).unwrap_or(u32::MAX)
    }

    /// Resolves once every earlier day's ticket is released
    pub async fn wait_turn(&self) {
        let index = self.index;
        let mut receiver = self.released.subscribe();
        // The sender lives in this ticket, so the channel cannot close here.
        let _ = receiver
            .wait_for(|flags| flags[..index].iter().all(|done| *done))
            .await;
    }

    pub fn release(self) {}
}

impl Drop for ClaimTicket {
    fn drop(&mut self) {
        let index = self.index;
        self.released.send_modify(|flags| flags[index] = true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case("The Museum of Modern Art", "museum modern art")]
    #[case("Ripley's Believe It or Not!", "ripleys believe it or not")]
    #[case("Kennedy Space Center - Visitor Complex", "kennedy space center visitor complex")]
    #[case("Arts & Crafts Market", "arts crafts market")]
    #[case("  LAKE   EOLA ", "lake eola")]
    fn test_normalize_landmark_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_landmark_name(input), expected);
    }

    #[test]
    fn test_landmark_claims_are_per_day() {
        let registry = DedupRegistry::new();
        assert!(registry.claim_landmark("The Louvre", 1));
        assert!(registry.claim_landmark("louvre", 1));
        assert!(!registry.claim_landmark("Louvre", 2));
        assert!(registry.is_landmark_taken("LOUVRE", 2));
        assert_eq!(registry.landmark_owner("the louvre"), Some(1));

        registry.release_landmark("Louvre", 2);
        assert_eq!(registry.landmark_owner("louvre"), Some(1));
        registry.release_landmark("Louvre", 1);
        assert!(registry.claim_landmark("Louvre", 2));
    }

    #[test]
    fn test_restaurant_claims_are_exclusive() {
        let registry = DedupRegistry::new();
        assert!(registry.claim_restaurant("place-1"));
        assert!(!registry.claim_restaurant("place-1"));
        assert!(!registry.claim_restaurant(""));
        assert!(registry.is_restaurant_used("place-1"));
        assert_eq!(registry.snapshot().restaurants.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_restaurant_claims_have_one_winner() {
        let registry = Arc::new(DedupRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.claim_restaurant("shared") }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_tickets_take_turns_in_day_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut tickets = ClaimOrder::tickets(3);
        let mut handles = Vec::new();

        // Spawn in reverse so the later days are ready first.
        while let Some(ticket) = tickets.pop() {
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                ticket.wait_turn().await;
                order.lock().push(ticket.day());
                tokio::time::sleep(Duration::from_millis(5)).await;
                ticket.release();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_dropped_ticket_unblocks_later_days() {
        let mut tickets = ClaimOrder::tickets(2);
        let second = tickets.pop().unwrap();
        let first = tickets.pop().unwrap();

        let waiter = tokio::spawn(async move {
            second.wait_turn().await;
            second.day()
        });
        drop(first);

        let day = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(day, 2);
    }
}
