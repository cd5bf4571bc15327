use crate::core::{CacheEntry, CacheSnapshot, Storage};
use chrono::NaiveDate;

/// Reads the prebuilt price snapshot. Every failure reads as "no cache".
pub struct StaticCacheStore<S: Storage> {
    storage: S,
    location: String,
}

impl<S: Storage> StaticCacheStore<S> {
    pub fn new(storage: S, location: impl Into<String>) -> Self {
        Self {
            storage,
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Loads a fresh snapshot; never reuses one from an earlier call.
    pub async fn load(&self) -> Option<CacheSnapshot> {
        let bytes = match self.storage.read_file(&self.location).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("⚠️ Cache snapshot unreadable at {}: {}", self.location, e);
                return None;
            }
        };

        match serde_json::from_slice::<CacheSnapshot>(&bytes) {
            Ok(snapshot) => {
                tracing::debug!(
                    "Loaded cache snapshot generated at {} with {} entries",
                    snapshot.generated_at,
                    snapshot.entries.len()
                );
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!("⚠️ Cache snapshot at {} is malformed: {}", self.location, e);
                None
            }
        }
    }
}

/// First entry whose destination matches case-insensitively.
///
/// The stay dates are accepted but not compared: a cached stay
/// for other dates is still served for the destination.
pub fn find_entry<'a>(
    snapshot: &'a CacheSnapshot,
    destination: &str,
    _checkin: NaiveDate,
    _checkout: NaiveDate,
) -> Option<&'a CacheEntry> {
    let wanted = destination.trim().to_lowercase();
    snapshot
        .entries
        .iter()
        .find(|entry| entry.destination.trim().to_lowercase() == wanted)
}
