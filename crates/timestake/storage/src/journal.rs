use chrono::{DateTime, Utc};
use timestake_types::DomainEvent;
use uuid::Uuid;

use crate::model::{JournalEntry, JournalIntegrity};
use crate::StorageResult;

/// BLAKE3 over the canonical JSON of an entry's fields and its predecessor's hash.
pub fn compute_entry_hash(
    sequence: u64,
    event_id: &Uuid,
    recorded_at: &DateTime<Utc>,
    event: &DomainEvent,
    previous_hash: Option<&str>,
) -> StorageResult<String> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "event_id": event_id,
        "recorded_at": recorded_at,
        "event": event,
    });
    let serialized = serde_json::to_vec(&serializable)?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}

/// Build the next entry of a chain whose head is `previous`.
pub(crate) fn chain_entry(
    previous: Option<&JournalEntry>,
    recorded_at: DateTime<Utc>,
    event: DomainEvent,
) -> StorageResult<JournalEntry> {
    let sequence = previous.map(|e| e.sequence).unwrap_or(0) + 1;
    let previous_hash = previous.map(|e| e.hash.clone());
    let event_id = Uuid::new_v4();
    let hash = compute_entry_hash(
        sequence,
        &event_id,
        &recorded_at,
        &event,
        previous_hash.as_deref(),
    )?;
    Ok(JournalEntry {
        sequence,
        event_id,
        recorded_at,
        event,
        previous_hash,
        hash,
    })
}

/// Recompute every hash and link of a journal given in sequence order.
pub fn verify_chain(entries: &[JournalEntry]) -> StorageResult<JournalIntegrity> {
    let mut verified = 0u64;
    let mut first_broken = None;
    let mut previous: Option<&JournalEntry> = None;

    for entry in entries {
        let expected_sequence = previous.map(|e| e.sequence).unwrap_or(0) + 1;
        let expected_link = previous.map(|e| e.hash.as_str());
        let recomputed = compute_entry_hash(
            entry.sequence,
            &entry.event_id,
            &entry.recorded_at,
            &entry.event,
            entry.previous_hash.as_deref(),
        )?;

        let intact = entry.sequence == expected_sequence
            && entry.previous_hash.as_deref() == expected_link
            && entry.hash == recomputed;
        if intact {
            verified += 1;
        } else if first_broken.is_none() {
            first_broken = Some(entry.sequence);
        }
        previous = Some(entry);
    }

    Ok(JournalIntegrity {
        total_entries: entries.len() as u64,
        verified_entries: verified,
        first_broken_sequence: first_broken,
    })
}
