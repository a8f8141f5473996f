use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use jobfeed_db::jobs::models::JobSyncState;
use jobfeed_db::sync::models::SyncCursor;

use super::error::CursorMismatch;
use crate::bullhorn::models::WindowEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Create,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpsert {
    pub external_id: String,
    pub kind: UpsertKind,
    /// Modification time the listing reported for this id.
    pub modified_at: Option<DateTime<Utc>>,
}

/// Window ids that need fetching, in window order.
///
/// Unknown ids are created. Known ids are updated only when upstream reports a
/// modification time that differs from the stored one.
pub fn plan_upserts(
    window: &[WindowEntry],
    local: &HashMap<&str, &JobSyncState>,
) -> Vec<PlannedUpsert> {
    window
        .iter()
        .filter_map(|entry| {
            let kind = match local.get(entry.external_id.as_str()) {
                None => UpsertKind::Create,
                Some(state) => match entry.modified_at {
                    Some(modified) if state.upstream_modified_at != Some(modified) => {
                        UpsertKind::Update
                    }
                    _ => return None,
                },
            };
            Some(PlannedUpsert {
                external_id: entry.external_id.clone(),
                kind,
                modified_at: entry.modified_at,
            })
        })
        .collect()
}

/// Local ids absent from the window, ascending byte-wise.
pub fn deletion_candidates<'a, I>(local: I, window: &[WindowEntry]) -> Vec<String>
where
    I: IntoIterator<Item = &'a JobSyncState>,
{
    let window_ids: HashSet<&str> = window.iter().map(|e| e.external_id.as_str()).collect();
    let mut candidates: Vec<String> = local
        .into_iter()
        .filter(|state| !window_ids.contains(state.external_id.as_str()))
        .map(|state| state.external_id.clone())
        .collect();
    candidates.sort_unstable();
    candidates.dedup();
    candidates
}

/// SHA-256 over the sorted window ids, hex encoded. Independent of upstream order.
pub fn window_fingerprint(window: &[WindowEntry]) -> String {
    let mut ids: Vec<&str> = window.iter().map(|e| e.external_id.as_str()).collect();
    ids.sort_unstable();

    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

pub fn check_cursor(
    cursor: &SyncCursor,
    generation: i64,
    window_fingerprint: &str,
) -> Result<(), CursorMismatch> {
    if cursor.generation == generation && cursor.window_fingerprint == window_fingerprint {
        Ok(())
    } else {
        Err(CursorMismatch {
            cursor_generation: cursor.generation,
            generation,
            window_fingerprint: window_fingerprint.to_string(),
        })
    }
}

/// How the deletion phase of a run begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepStart {
    /// Continue a sweep left unfinished by an earlier run over the same window.
    Resume(SyncCursor),
    /// Start over against a freshly computed diff under a new generation.
    Fresh(SyncCursor),
}

impl SweepStart {
    pub fn into_cursor(self) -> SyncCursor {
        match self {
            Self::Resume(cursor) | Self::Fresh(cursor) => cursor,
        }
    }

    pub fn is_resume(&self) -> bool {
        matches!(self, Self::Resume(_))
    }
}

/// Decide whether a stored cursor can be resumed against the current window.
pub fn start_sweep(
    stored_cursor: Option<&str>,
    last_generation: i64,
    window_fingerprint: &str,
) -> SweepStart {
    let fresh = || SweepStart::Fresh(SyncCursor::new(last_generation + 1, window_fingerprint));

    let Some(raw) = stored_cursor else {
        return fresh();
    };

    let cursor = match SyncCursor::decode(raw) {
        Ok(cursor) => cursor,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable sweep cursor, starting a fresh sweep");
            return fresh();
        }
    };

    match check_cursor(&cursor, last_generation, window_fingerprint) {
        Ok(()) => SweepStart::Resume(cursor),
        Err(mismatch) => {
            tracing::debug!(%mismatch, "discarding stale sweep cursor");
            fresh()
        }
    }
}

/// The next slice of `candidates` to delete: strictly after `after`, at most `cap` ids.
pub fn next_batch<'a>(candidates: &'a [String], after: Option<&str>, cap: usize) -> &'a [String] {
    let start = match after {
        Some(key) => candidates.partition_point(|id| id.as_str() <= key),
        None => 0,
    };
    let end = start.saturating_add(cap).min(candidates.len());
    &candidates[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(ms).single()
    }

    fn state(id: &str, modified_ms: i64) -> JobSyncState {
        JobSyncState {
            external_id: id.to_string(),
            upstream_modified_at: at(modified_ms),
            content_hash: format!("hash-{id}"),
        }
    }

    fn index(states: &[JobSyncState]) -> HashMap<&str, &JobSyncState> {
        states.iter().map(|s| (s.external_id.as_str(), s)).collect()
    }

    #[test]
    fn plans_creates_and_changed_updates_in_window_order() {
        let local = vec![state("10", 1000), state("11", 1000), state("12", 1000)];
        let window = vec![
            WindowEntry::new("13", at(1000)),
            WindowEntry::new("12", at(2000)),
            WindowEntry::new("11", at(1000)),
            WindowEntry::new("10", None),
        ];

        let plan = plan_upserts(&window, &index(&local));
        assert_eq!(
            plan,
            vec![
                PlannedUpsert {
                    external_id: "13".into(),
                    kind: UpsertKind::Create,
                    modified_at: at(1000),
                },
                PlannedUpsert {
                    external_id: "12".into(),
                    kind: UpsertKind::Update,
                    modified_at: at(2000),
                },
            ]
        );
    }

    #[test]
    fn unchanged_window_plans_nothing() {
        let local = vec![state("1", 5), state("2", 6)];
        let window = vec![WindowEntry::new("2", at(6)), WindowEntry::new("1", at(5))];
        assert!(plan_upserts(&window, &index(&local)).is_empty());
    }

    #[test]
    fn deletion_candidates_are_local_minus_window_sorted() {
        let local = vec![state("9", 0), state("10", 0), state("2", 0), state("30", 0)];
        let window = vec![WindowEntry::new("30", None), WindowEntry::new("31", None)];

        // byte-wise order, not numeric
        assert_eq!(deletion_candidates(&local, &window), vec!["10", "2", "9"]);
    }

    #[test]
    fn fingerprint_ignores_window_order() {
        let a = vec![WindowEntry::new("1", None), WindowEntry::new("2", at(4))];
        let b = vec![WindowEntry::new("2", None), WindowEntry::new("1", None)];
        let c = vec![WindowEntry::new("1", None), WindowEntry::new("3", None)];

        assert_eq!(window_fingerprint(&a), window_fingerprint(&b));
        assert_ne!(window_fingerprint(&a), window_fingerprint(&c));
        assert_eq!(window_fingerprint(&a).len(), 64);
    }

    #[test]
    fn next_batch_resumes_after_key() {
        let candidates: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();

        assert_eq!(next_batch(&candidates, None, 2), &["a", "b"]);
        assert_eq!(next_batch(&candidates, Some("b"), 2), &["c", "d"]);
        assert_eq!(next_batch(&candidates, Some("bb"), 10), &["c", "d", "e"]);
        assert!(next_batch(&candidates, Some("e"), 2).is_empty());
    }

    #[test]
    fn missing_cursor_starts_next_generation() {
        let start = start_sweep(None, 4, "fp");
        assert!(!start.is_resume());
        let cursor = start.into_cursor();
        assert_eq!(cursor.generation, 5);
        assert_eq!(cursor.window_fingerprint, "fp");
        assert!(cursor.last_key.is_none());
    }

    #[test]
    fn matching_cursor_resumes() {
        let mut cursor = SyncCursor::new(7, "fp");
        cursor.advance("0500".into(), 500);
        let raw = cursor.encode().unwrap();

        let start = start_sweep(Some(&raw), 7, "fp");
        assert_eq!(start, SweepStart::Resume(cursor));
    }

    #[test]
    fn cursor_for_another_window_is_discarded() {
        let mut cursor = SyncCursor::new(7, "old-window");
        cursor.advance("0500".into(), 500);
        let raw = cursor.encode().unwrap();

        let start = start_sweep(Some(&raw), 7, "new-window");
        assert_eq!(start, SweepStart::Fresh(SyncCursor::new(8, "new-window")));
    }

    #[test]
    fn cursor_from_another_generation_is_rejected() {
        let cursor = SyncCursor::new(3, "fp");
        let mismatch = check_cursor(&cursor, 4, "fp").unwrap_err();
        assert_eq!(mismatch.cursor_generation, 3);
        assert_eq!(mismatch.generation, 4);

        assert!(!start_sweep(Some(&cursor.encode().unwrap()), 4, "fp").is_resume());
    }

    #[test]
    fn garbage_cursor_starts_fresh() {
        assert!(!start_sweep(Some("not json"), 1, "fp").is_resume());
    }
}
