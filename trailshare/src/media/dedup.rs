//! Duplicate detection for listing images.
//!
//! Two images are duplicates when their bytes hash the same, or when their
//! original file names reduce to the same signature. The signature catches
//! the usual re-upload noise: `tent.jpg`, `tent (1).jpg`, `tent-compressed.webp`
//! and `1718000000000-tent.png` all reduce to `tent`. Size is deliberately not
//! compared since a format conversion changes it anyway.

use std::cmp::Ordering;

use uuid::Uuid;

use super::{ImageFormat, dash_separated, file_stem};
use crate::entities::equipment_image;

/// Markers appended by converters, optimizers and "save a copy"
const NOISE_SUFFIXES: [&str; 8] = [
    "converted",
    "compressed",
    "resized",
    "optimized",
    "scaled",
    "webp",
    "min",
    "copy",
];

/// Names browsers, phones and cameras give every upload; once their counters
/// are gone they say nothing about the content
const GENERIC_STEMS: [&str; 12] = [
    "image", "img", "photo", "picture", "file", "blob", "dsc", "dscn", "dcim", "pxl", "mvimg",
    "screenshot",
];

const MIN_TIMESTAMP_DIGITS: usize = 8;

/// Trailing counters and timestamps: `-2`, `_1234`, `-1718000000000`
fn is_counter(part: &str) -> bool {
    !part.is_empty() && part.chars().all(|c| c.is_ascii_digit())
}

fn is_timestamp(part: &str) -> bool {
    part.len() >= MIN_TIMESTAMP_DIGITS && part.chars().all(|c| c.is_ascii_digit())
}

/// Normalized stem of an uploaded file name. An empty signature never matches.
#[must_use]
pub fn signature(file_name: &str) -> String {
    let mut stem = dash_separated(file_stem(file_name));

    // Peel noise off the end until nothing changes: `tent-copy-2` → `tent`
    while let Some((head, tail)) = stem.rsplit_once('-') {
        if NOISE_SUFFIXES.contains(&tail) || is_counter(tail) {
            let keep = head.len();
            stem.truncate(keep);
        } else {
            break;
        }
    }

    if let Some((head, tail)) = stem.split_once('-')
        && is_timestamp(head)
    {
        stem = tail.to_string();
    }

    if GENERIC_STEMS.contains(&stem.as_str()) {
        stem.clear();
    }
    stem
}

/// Outcome of de-duplicating one listing's images
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupePlan {
    pub kept: Vec<Uuid>,
    pub removed: Vec<Uuid>,
    /// Image to mark primary afterwards, when the current primary is removed or missing
    pub new_primary: Option<Uuid>,
}

/// Primary first, then preferred format, then oldest; id breaks remaining ties
fn keeper_order(a: &equipment_image::Model, b: &equipment_image::Model) -> Ordering {
    let rank = |image: &equipment_image::Model| {
        ImageFormat::from_content_type(&image.content_type).map_or(u8::MAX, ImageFormat::preference)
    };
    b.is_primary
        .cmp(&a.is_primary)
        .then_with(|| rank(a).cmp(&rank(b)))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn is_duplicate(a: &equipment_image::Model, b: &equipment_image::Model) -> bool {
    a.content_hash == b.content_hash || (!a.signature.is_empty() && a.signature == b.signature)
}

/// Group duplicates and pick one image to keep from each group.
///
/// Matching is transitive: if A matches B by hash and B matches C by
/// signature, all three form one group.
#[must_use]
pub fn plan_dedupe(images: &[equipment_image::Model]) -> DedupePlan {
    let mut parent: Vec<usize> = (0..images.len()).collect();
    for i in 0..images.len() {
        for j in (i + 1)..images.len() {
            if is_duplicate(&images[i], &images[j]) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    let mut groups: Vec<Vec<&equipment_image::Model>> = Vec::new();
    let mut group_of_root: Vec<Option<usize>> = vec![None; images.len()];
    for (i, image) in images.iter().enumerate() {
        let root = find(&mut parent, i);
        let index = *group_of_root[root].get_or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[index].push(image);
    }

    let mut plan = DedupePlan::default();
    let mut keepers = Vec::new();
    for mut group in groups {
        group.sort_by(|a, b| keeper_order(a, b));
        let (keeper, rest) = group.split_at(1);
        keepers.push(keeper[0]);
        plan.removed.extend(rest.iter().map(|image| image.id));
    }

    if !keepers.iter().any(|image| image.is_primary) {
        plan.new_primary = keepers.iter().copied().min_by(|a, b| keeper_order(a, b)).map(|image| image.id);
    }
    plan.kept = keepers.into_iter().map(|image| image.id).collect();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn image(name: &str, hash: &str, content_type: &str, minutes: i64, primary: bool) -> equipment_image::Model {
        let created_at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes);
        equipment_image::Model {
            id: Uuid::new_v4(),
            equipment_id: Uuid::nil(),
            storage_key: format!("equipment/x/{name}"),
            url: format!("/files/equipment/x/{name}"),
            file_name: name.to_string(),
            content_type: content_type.to_string(),
            size_bytes: 100,
            content_hash: hash.to_string(),
            signature: signature(name),
            is_primary: primary,
            created_at,
        }
    }

    #[test]
    fn test_signature_strips_noise() {
        for name in [
            "tent.jpg",
            "Tent (1).jpg",
            "tent copy.png",
            "tent-compressed.webp",
            "tent_webp.jpg",
            "tent-min.jpg",
            "tent-resized-2.png",
            "1718000000000-tent.png",
            "tent_3.jpeg",
            "uploads/tent-converted.gif",
        ] {
            assert_eq!(signature(name), "tent", "{name}");
        }
    }

    #[test]
    fn test_signature_keeps_meaningful_parts() {
        assert_eq!(signature("Two Person Tent.jpg"), "two-person-tent");
        assert_eq!(signature("2024 trip.jpg"), "2024-trip");
    }

    #[test]
    fn test_signature_strips_counters_of_any_length() {
        for name in ["tent_1234.jpg", "tent-20240601.jpg", "tent-1718000000000.jpg", "tent-2024-06-01.png"] {
            assert_eq!(signature(name), "tent", "{name}");
        }
        // Digits that are not a trailing counter stay
        assert_eq!(signature("tent-2p.jpg"), "tent-2p");
        assert_eq!(signature("1234.jpg"), "1234");
    }

    #[test]
    fn test_signature_empty_for_generic_or_blank_names() {
        assert_eq!(signature("IMG_1234.jpg"), "");
        assert_eq!(signature("DSC_0001.JPG"), "");
        assert_eq!(signature("PXL_20240601_123456.jpg"), "");
        assert_eq!(signature(""), "");
        assert_eq!(signature("image.jpg"), "");
        assert_eq!(signature("image (2).png"), "");
        assert_eq!(signature("___.png"), "");
    }

    #[test]
    fn test_hash_match_groups_different_names() {
        let a = image("a.jpg", "h1", "image/jpeg", 0, true);
        let b = image("b.png", "h1", "image/png", 1, false);
        let plan = plan_dedupe(&[a.clone(), b.clone()]);
        assert_eq!(plan.kept, vec![a.id]);
        assert_eq!(plan.removed, vec![b.id]);
        assert_eq!(plan.new_primary, None);
    }

    #[test]
    fn test_keeper_prefers_primary_then_format_then_age() {
        let png = image("tent.png", "h1", "image/png", 0, false);
        let webp = image("tent-converted.webp", "h2", "image/webp", 5, false);
        let jpeg = image("tent (1).jpg", "h3", "image/jpeg", 1, false);
        let plan = plan_dedupe(&[png.clone(), webp.clone(), jpeg.clone()]);
        assert_eq!(plan.kept, vec![webp.id]);
        assert_eq!(plan.removed.len(), 2);
        // Nothing was primary, so the keeper is promoted
        assert_eq!(plan.new_primary, Some(webp.id));

        let primary_png = image("tent.png", "h1", "image/png", 0, true);
        let plan = plan_dedupe(&[primary_png.clone(), webp.clone()]);
        assert_eq!(plan.kept, vec![primary_png.id]);
        assert_eq!(plan.new_primary, None);
    }

    #[test]
    fn test_oldest_wins_among_equals() {
        let newer = image("stove-1.jpg", "h1", "image/jpeg", 10, false);
        let older = image("stove.jpg", "h2", "image/jpeg", 0, false);
        let plan = plan_dedupe(&[newer.clone(), older.clone()]);
        assert_eq!(plan.kept, vec![older.id]);
        assert_eq!(plan.removed, vec![newer.id]);
    }

    #[test]
    fn test_generic_names_never_match_by_signature() {
        let a = image("image.jpg", "h1", "image/jpeg", 0, true);
        let b = image("image.jpg", "h2", "image/jpeg", 1, false);
        let plan = plan_dedupe(&[a.clone(), b.clone()]);
        assert_eq!(plan.kept, vec![a.id, b.id]);
        assert!(plan.removed.is_empty());
    }

    #[test]
    fn test_matching_is_transitive() {
        let a = image("tent.jpg", "h1", "image/jpeg", 0, true);
        let b = image("other.jpg", "h1", "image/jpeg", 1, false);
        let c = image("other-compressed.webp", "h9", "image/webp", 2, false);
        let plan = plan_dedupe(&[a.clone(), b, c]);
        assert_eq!(plan.kept, vec![a.id]);
        assert_eq!(plan.removed.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(plan_dedupe(&[]), DedupePlan::default());
    }
}
