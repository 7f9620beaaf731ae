//! Ordering engine: pure transforms over a playlist's entry sequence.
//!
//! Every function takes the current entries by reference and returns a new
//! `Vec`, so a snapshot captured before the call stays valid. Results are
//! always renumbered so `order` reads `0..N-1`.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde_json::Value;

use crate::playlist::TrackEntry;
use crate::track_model;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderingError {
    #[error("index {index} is out of range for a playlist of {len} entries")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Column used for the display projection. Only `Order` matches the
/// persisted sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    #[default]
    Order,
    Type,
    Artist,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Rewrites every `order` field to match list position.
pub fn renumber(mut entries: Vec<TrackEntry>) -> Vec<TrackEntry> {
    for (position, entry) in entries.iter_mut().enumerate() {
        entry.order = position;
    }
    entries
}

/// Whether `order` values read exactly `0..N-1` in list order.
pub fn is_contiguous(entries: &[TrackEntry]) -> bool {
    entries
        .iter()
        .enumerate()
        .all(|(position, entry)| entry.order == position)
}

/// Normalizes `new_items` and appends them after the current entries.
/// Duplicates are allowed.
pub fn append(entries: &[TrackEntry], new_items: &[Value]) -> Vec<TrackEntry> {
    append_entries(entries, track_model::normalize_all(new_items))
}

/// Same as [`append`] for payloads that are already entries.
pub fn append_entries(entries: &[TrackEntry], new_entries: Vec<TrackEntry>) -> Vec<TrackEntry> {
    let mut next = entries.to_vec();
    next.extend(new_entries);
    renumber(next)
}

/// Inserts normalized `new_items` at drop gap `gap` (`0..=len`).
pub fn insert_at(
    entries: &[TrackEntry],
    new_items: &[Value],
    gap: usize,
) -> Result<Vec<TrackEntry>, OrderingError> {
    if gap > entries.len() {
        return Err(OrderingError::IndexOutOfRange {
            index: gap,
            len: entries.len(),
        });
    }
    let mut next = entries.to_vec();
    next.splice(gap..gap, track_model::normalize_all(new_items));
    Ok(renumber(next))
}

/// Drops entries whose `order` is listed; survivors keep their relative order.
pub fn remove_by_order(entries: &[TrackEntry], orders: &BTreeSet<usize>) -> Vec<TrackEntry> {
    let survivors = entries
        .iter()
        .filter(|entry| !orders.contains(&entry.order))
        .cloned()
        .collect();
    renumber(survivors)
}

/// Moves the entry at list index `from` so it lands at index `to`.
///
/// `to == len` places the entry last. Indices are list positions, not
/// `order` values.
pub fn move_entry(
    entries: &[TrackEntry],
    from: usize,
    to: usize,
) -> Result<Vec<TrackEntry>, OrderingError> {
    let permutation = move_permutation(entries.len(), from, to)?;
    Ok(apply_permutation(entries, &permutation))
}

/// Moves several rows to drop gap `gap`, keeping their relative order.
pub fn move_entries(
    entries: &[TrackEntry],
    indices: &[usize],
    gap: usize,
) -> Result<Vec<TrackEntry>, OrderingError> {
    let permutation = multi_move_permutation(entries.len(), indices, gap)?;
    Ok(apply_permutation(entries, &permutation))
}

/// `result[new_position] = old_position` for a single move.
pub(crate) fn move_permutation(
    len: usize,
    from: usize,
    to: usize,
) -> Result<Vec<usize>, OrderingError> {
    if from >= len {
        return Err(OrderingError::IndexOutOfRange { index: from, len });
    }
    if to > len {
        return Err(OrderingError::IndexOutOfRange { index: to, len });
    }
    let mut positions: Vec<usize> = (0..len).collect();
    let moved = positions.remove(from);
    let insert_at = to.min(positions.len());
    positions.insert(insert_at, moved);
    Ok(positions)
}

/// `result[new_position] = old_position` for a multi-row move to a gap.
pub(crate) fn multi_move_permutation(
    len: usize,
    indices: &[usize],
    gap: usize,
) -> Result<Vec<usize>, OrderingError> {
    if let Some(&index) = indices.iter().find(|&&index| index >= len) {
        return Err(OrderingError::IndexOutOfRange { index, len });
    }
    if gap > len {
        return Err(OrderingError::IndexOutOfRange { index: gap, len });
    }

    let moving: BTreeSet<usize> = indices.iter().copied().collect();
    let insert_at = gap - moving.range(..gap).count();
    let mut positions: Vec<usize> = (0..len).filter(|index| !moving.contains(index)).collect();
    positions.splice(insert_at..insert_at, moving.iter().copied());
    Ok(positions)
}

fn apply_permutation(entries: &[TrackEntry], permutation: &[usize]) -> Vec<TrackEntry> {
    renumber(
        permutation
            .iter()
            .map(|&old_position| entries[old_position].clone())
            .collect(),
    )
}

/// `order` values of every entry matching `predicate`.
pub fn orders_matching<F>(entries: &[TrackEntry], predicate: F) -> BTreeSet<usize>
where
    F: Fn(&TrackEntry) -> bool,
{
    entries
        .iter()
        .filter(|entry| predicate(entry))
        .map(|entry| entry.order)
        .collect()
}

pub fn orders_by_album(entries: &[TrackEntry], album: &str) -> BTreeSet<usize> {
    orders_matching(entries, |entry| entry.album() == Some(album))
}

pub fn orders_by_artist(entries: &[TrackEntry], artist: &str) -> BTreeSet<usize> {
    orders_matching(entries, |entry| entry.display_artist() == Some(artist))
}

/// Display projection. Never touches `order`; ties fall back to it.
pub fn sorted_view(
    entries: &[TrackEntry],
    column: SortColumn,
    direction: SortDirection,
) -> Vec<&TrackEntry> {
    let mut view: Vec<&TrackEntry> = entries.iter().collect();
    view.sort_by(|a, b| {
        let primary = compare_by_column(a, b, column);
        let primary = match direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };
        primary.then(a.order.cmp(&b.order))
    });
    view
}

fn compare_by_column(a: &TrackEntry, b: &TrackEntry, column: SortColumn) -> Ordering {
    match column {
        SortColumn::Order => a.order.cmp(&b.order),
        SortColumn::Type => a.entry_type.as_str().cmp(b.entry_type.as_str()),
        SortColumn::Artist => sort_key(a.display_artist()).cmp(&sort_key(b.display_artist())),
        SortColumn::Title => sort_key(a.title()).cmp(&sort_key(b.title())),
    }
}

fn sort_key(value: Option<&str>) -> String {
    value.unwrap_or_default().to_lowercase()
}

/// Keeps rows whose title, artist, album or source tag contains `text`,
/// case-insensitively. An empty filter keeps everything.
pub fn filtered_view<'a>(view: Vec<&'a TrackEntry>, text: &str) -> Vec<&'a TrackEntry> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return view;
    }
    view.into_iter()
        .filter(|entry| {
            [entry.title(), entry.artist(), entry.album()]
                .into_iter()
                .flatten()
                .chain(std::iter::once(entry.entry_type.as_str()))
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;
    use serde_json::json;

    use super::{
        append, filtered_view, insert_at, is_contiguous, move_entries, move_entry,
        orders_by_album, remove_by_order, renumber, sorted_view, OrderingError, SortColumn,
        SortDirection,
    };
    use crate::playlist::{EntryType, TrackDetails, TrackEntry};

    fn entry(title: &str) -> TrackEntry {
        TrackEntry {
            details: TrackDetails {
                title: Some(title.to_string()),
                ..TrackDetails::default()
            },
            ..TrackEntry::default()
        }
    }

    fn playlist(titles: &[&str]) -> Vec<TrackEntry> {
        renumber(titles.iter().map(|title| entry(title)).collect())
    }

    fn titles(entries: &[TrackEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|entry| entry.title().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_move_last_entry_to_front() {
        let entries = playlist(&["A", "B", "C"]);
        let moved = move_entry(&entries, 2, 0).expect("in range");

        assert_eq!(titles(&moved), vec!["C", "A", "B"]);
        assert_eq!(
            moved.iter().map(|entry| entry.order).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(titles(&entries), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_move_to_len_places_entry_last() {
        let entries = playlist(&["A", "B", "C"]);
        let moved = move_entry(&entries, 0, 3).expect("in range");
        assert_eq!(titles(&moved), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_move_out_of_range_is_rejected() {
        let entries = playlist(&["A", "B"]);
        assert_eq!(
            move_entry(&entries, 2, 0),
            Err(OrderingError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            move_entry(&entries, 0, 3),
            Err(OrderingError::IndexOutOfRange { index: 3, len: 2 })
        );
    }

    #[test]
    fn test_remove_by_order_renumbers_survivors() {
        let entries = playlist(&["A", "B", "C"]);
        let remaining = remove_by_order(&entries, &BTreeSet::from([1]));

        assert_eq!(titles(&remaining), vec!["A", "C"]);
        assert_eq!(remaining[1].order, 1);
    }

    #[test]
    fn test_append_to_empty_playlist_assigns_orders() {
        let appended = append(
            &[],
            &[json!({ "id": 5, "title": "X" }), json!({ "id": 6, "title": "Y" })],
        );

        assert_eq!(titles(&appended), vec!["X", "Y"]);
        assert_eq!(appended[0].order, 0);
        assert_eq!(appended[1].order, 1);
        assert_eq!(appended[0].details.id, Some(5));
    }

    #[test]
    fn test_append_keeps_duplicates() {
        let entries = append(&[], &[json!({ "id": 5, "title": "X" })]);
        let twice = append(&entries, &[json!({ "id": 5, "title": "X" })]);
        assert_eq!(titles(&twice), vec!["X", "X"]);
    }

    #[test]
    fn test_insert_at_gap() {
        let entries = playlist(&["A", "B"]);
        let inserted = insert_at(&entries, &[json!({ "title": "N" })], 1).expect("in range");
        assert_eq!(titles(&inserted), vec!["A", "N", "B"]);
        assert!(insert_at(&entries, &[], 3).is_err());
    }

    #[test]
    fn test_move_entries_keeps_relative_order_of_moved_rows() {
        let entries = playlist(&["A", "B", "C", "D", "E"]);
        let moved = move_entries(&entries, &[3, 1], 5).expect("in range");
        assert_eq!(titles(&moved), vec!["A", "C", "E", "B", "D"]);

        let to_front = move_entries(&entries, &[4, 2], 0).expect("in range");
        assert_eq!(titles(&to_front), vec!["C", "E", "A", "B", "D"]);

        let into_middle = move_entries(&entries, &[0, 4], 2).expect("in range");
        assert_eq!(titles(&into_middle), vec!["B", "A", "E", "C", "D"]);
    }

    #[test]
    fn test_sorted_view_never_changes_order_field() {
        let mut entries = playlist(&["b", "C", "a"]);
        entries[0].entry_type = EntryType::Lastfm;
        entries[2].entry_type = EntryType::MusicFile;

        let by_title = sorted_view(&entries, SortColumn::Title, SortDirection::Ascending);
        assert_eq!(
            by_title.iter().map(|entry| entry.order).collect::<Vec<_>>(),
            vec![2, 0, 1]
        );

        let by_title_desc = sorted_view(&entries, SortColumn::Title, SortDirection::Descending);
        assert_eq!(
            by_title_desc.iter().map(|entry| entry.order).collect::<Vec<_>>(),
            vec![1, 0, 2]
        );

        let by_type = sorted_view(&entries, SortColumn::Type, SortDirection::Ascending);
        assert_eq!(by_type[0].entry_type, EntryType::Lastfm);
        assert!(is_contiguous(&entries));
    }

    #[test]
    fn test_filtered_view_matches_source_tag_and_fields() {
        let mut entries = playlist(&["Alpha", "Beta"]);
        entries[1].entry_type = EntryType::Lastfm;
        let view = sorted_view(&entries, SortColumn::Order, SortDirection::Ascending);

        let matched = filtered_view(view.clone(), "LASTFM");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].title(), Some("Beta"));
        assert_eq!(filtered_view(view, "  ").len(), 2);
    }

    #[test]
    fn test_orders_by_album_matches_exactly() {
        let mut entries = playlist(&["A", "B", "C"]);
        entries[0].details.album = Some("One".to_string());
        entries[2].details.album = Some("One".to_string());
        assert_eq!(orders_by_album(&entries, "One"), BTreeSet::from([0, 2]));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Append(usize),
        Remove(Vec<usize>),
        Move(usize, usize),
        MoveMany(Vec<usize>, usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1usize..4).prop_map(Op::Append),
            prop::collection::vec(0usize..12, 0..4).prop_map(Op::Remove),
            (0usize..12, 0usize..13).prop_map(|(from, to)| Op::Move(from, to)),
            (prop::collection::vec(0usize..12, 1..4), 0usize..13)
                .prop_map(|(indices, gap)| Op::MoveMany(indices, gap)),
        ]
    }

    proptest! {
        #[test]
        fn prop_orders_stay_contiguous(ops in prop::collection::vec(op_strategy(), 0..24)) {
            let mut entries: Vec<TrackEntry> = Vec::new();
            let mut next_title = 0usize;
            for op in ops {
                let len = entries.len();
                entries = match op {
                    Op::Append(count) => {
                        let items: Vec<_> = (0..count)
                            .map(|offset| json!({ "title": format!("t{}", next_title + offset) }))
                            .collect();
                        next_title += count;
                        append(&entries, &items)
                    }
                    Op::Remove(orders) => remove_by_order(&entries, &orders.into_iter().collect()),
                    Op::Move(from, to) if from < len && to <= len => {
                        move_entry(&entries, from, to).expect("validated")
                    }
                    Op::MoveMany(indices, gap)
                        if gap <= len && indices.iter().all(|index| *index < len) =>
                    {
                        move_entries(&entries, &indices, gap).expect("validated")
                    }
                    _ => entries,
                };
                prop_assert!(is_contiguous(&entries));
            }
        }

        #[test]
        fn prop_remove_preserves_survivor_order(
            count in 0usize..16,
            removed in prop::collection::btree_set(0usize..16, 0..8),
        ) {
            let entries = renumber((0..count).map(|index| entry(&format!("t{index}"))).collect());
            let expected: Vec<String> = (0..count)
                .filter(|index| !removed.contains(index))
                .map(|index| format!("t{index}"))
                .collect();
            prop_assert_eq!(titles(&remove_by_order(&entries, &removed)), expected);
        }
    }
}
