//! Merging client-side favorites and recently viewed lists into the server copy.
//!
//! Anonymous visitors keep both lists in browser storage. On login the client
//! posts them and the server unions them with what it already has.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One listing reference with the time it was favorited or viewed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Stamped {
    pub equipment_id: Uuid,
    #[serde(alias = "added_at", alias = "viewed_at")]
    pub at: DateTime<Utc>,
}

impl Stamped {
    #[must_use]
    pub fn new(equipment_id: Uuid, at: DateTime<Utc>) -> Self {
        Self { equipment_id, at }
    }
}

/// Union both lists by listing id keeping the later timestamp, newest first.
///
/// Entries whose listing is not in `existing` are dropped and at most `limit`
/// entries are returned. Ties on the timestamp order by id so the result is
/// stable.
#[must_use]
pub fn merge_by_latest(
    server: &[Stamped],
    client: &[Stamped],
    existing: &HashSet<Uuid>,
    limit: Option<usize>,
) -> Vec<Stamped> {
    let mut latest: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
    for entry in server.iter().chain(client) {
        if !existing.contains(&entry.equipment_id) {
            continue;
        }
        latest
            .entry(entry.equipment_id)
            .and_modify(|at| *at = (*at).max(entry.at))
            .or_insert(entry.at);
    }

    let mut merged: Vec<Stamped> = latest
        .into_iter()
        .map(|(equipment_id, at)| Stamped { equipment_id, at })
        .collect();
    merged.sort_by(|a, b| b.at.cmp(&a.at).then_with(|| a.equipment_id.cmp(&b.equipment_id)));
    if let Some(limit) = limit {
        merged.truncate(limit);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_union_keeps_latest_timestamp() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let existing = HashSet::from([a, b, c]);
        let server = [Stamped::new(a, at(10)), Stamped::new(b, at(5))];
        let client = [Stamped::new(a, at(2)), Stamped::new(b, at(20)), Stamped::new(c, at(1))];

        let merged = merge_by_latest(&server, &client, &existing, None);
        assert_eq!(
            merged,
            vec![Stamped::new(b, at(20)), Stamped::new(a, at(10)), Stamped::new(c, at(1))]
        );
    }

    #[test]
    fn test_missing_listings_are_dropped() {
        let (a, gone) = (Uuid::new_v4(), Uuid::new_v4());
        let existing = HashSet::from([a]);
        let merged = merge_by_latest(
            &[Stamped::new(a, at(1))],
            &[Stamped::new(gone, at(50))],
            &existing,
            None,
        );
        assert_eq!(merged, vec![Stamped::new(a, at(1))]);
    }

    #[test]
    fn test_limit_keeps_newest() {
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let existing: HashSet<Uuid> = ids.iter().copied().collect();
        let client: Vec<Stamped> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| Stamped::new(*id, at(i64::try_from(i).unwrap())))
            .collect();

        let merged = merge_by_latest(&[], &client, &existing, Some(3));
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].equipment_id, ids[4]);
        assert_eq!(merged[2].equipment_id, ids[2]);
    }

    #[test]
    fn test_client_field_aliases() {
        let favorite: Stamped = serde_json::from_value(serde_json::json!({
            "equipment_id": "6f1c1a3e-4a0b-4e59-9a52-3f4b2f7f4a10",
            "added_at": "2025-06-01T09:00:00Z"
        }))
        .unwrap();
        assert_eq!(favorite.at, at(0));

        let viewed: Stamped = serde_json::from_value(serde_json::json!({
            "equipment_id": "6f1c1a3e-4a0b-4e59-9a52-3f4b2f7f4a10",
            "viewed_at": "2025-06-01T09:30:00Z"
        }))
        .unwrap();
        assert_eq!(viewed.at, at(30));
    }
}
