//! # Sequence Diff Engine
//!
//! Computes an edit script turning one ordered list into another.
//!
//! ## Overview
//!
//! Elements present in both lists are matched by equality (the n-th
//! occurrence on one side pairs with the n-th occurrence on the other). The
//! longest run of matched elements that already appear in the right relative
//! order stays put. With move detection enabled every other matched element is
//! relocated with [`ListOperation::Move`]/[`ListOperation::MoveRange`] instead
//! of being removed and re-added, which lets the engine keep its decoded
//! resources for it.
//!
//! Operations are emitted in the order they must be applied:
//!
//! 1. removals, highest index first, contiguous runs coalesced
//! 2. moves, in target order, contiguous blocks coalesced
//! 3. insertions, lowest index first, contiguous runs coalesced
//!
//! ## Index semantics
//!
//! Every index refers to the list as it is right before that operation.
//! `Move { from, to }` removes the element at `from` and re-inserts it at the
//! slot that was `to` before the removal, so a forward move lands at `to - 1`.
//! `MoveRange` does the same for `count` elements.
//!
//! ## Usage
//!
//! ```
//! use core_playback::diff::{apply_operations, difference_of};
//!
//! let original = vec!['a', 'b', 'c', 'd'];
//! let updated = vec!['d', 'a', 'b', 'x'];
//!
//! let operations = difference_of(&original, &updated, true);
//! let mut list = original.clone();
//! apply_operations(&mut list, &operations).unwrap();
//! assert_eq!(list, updated);
//! ```

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// One edit of an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ListOperation<T> {
    Remove { index: usize },
    /// Removes `start..end`.
    RemoveRange { start: usize, end: usize },
    Add { item: T, index: usize },
    AddAll { items: Vec<T>, index: usize },
    Move { from: usize, to: usize },
    MoveRange { from: usize, to: usize, count: usize },
}

impl<T> ListOperation<T> {
    /// Final index of the first moved element, for move operations.
    ///
    /// Engines with "move to index" primitives want this rather than the
    /// pre-removal slot.
    pub fn move_destination(&self) -> Option<usize> {
        match self {
            ListOperation::Move { from, to } => Some(if to > from { to - 1 } else { *to }),
            ListOperation::MoveRange { from, to, count } => {
                Some(if to > from { to - count } else { *to })
            }
            _ => None,
        }
    }
}

impl<T: Clone> ListOperation<T> {
    /// Apply this operation in place.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::DiffMismatch`] if an index does not fit
    /// `list`. The list is left untouched in that case.
    pub fn apply(&self, list: &mut Vec<T>) -> Result<()> {
        let len = list.len();
        match self {
            ListOperation::Remove { index } => {
                check(*index < len, || format!("remove at {} from {} items", index, len))?;
                list.remove(*index);
            }
            ListOperation::RemoveRange { start, end } => {
                check(start <= end && *end <= len, || {
                    format!("remove {}..{} from {} items", start, end, len)
                })?;
                list.drain(*start..*end);
            }
            ListOperation::Add { item, index } => {
                check(*index <= len, || format!("insert at {} into {} items", index, len))?;
                list.insert(*index, item.clone());
            }
            ListOperation::AddAll { items, index } => {
                check(*index <= len, || format!("insert at {} into {} items", index, len))?;
                list.splice(*index..*index, items.iter().cloned());
            }
            ListOperation::Move { from, to } => {
                check(*from < len && *to <= len, || {
                    format!("move {} -> {} within {} items", from, to, len)
                })?;
                let item = list.remove(*from);
                let destination = if to > from { to - 1 } else { *to };
                list.insert(destination, item);
            }
            ListOperation::MoveRange { from, to, count } => {
                let block_end = from.saturating_add(*count);
                let lands_inside = *to > *from && *to < block_end;
                check(
                    *count > 0 && block_end <= len && *to <= len && !lands_inside,
                    || format!("move {} items {} -> {} within {} items", count, from, to, len),
                )?;
                let block: Vec<T> = list.drain(*from..block_end).collect();
                let destination = if *to >= block_end { to - count } else { *to };
                list.splice(destination..destination, block);
            }
        }
        Ok(())
    }
}

fn check(condition: bool, describe: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(PlaybackError::DiffMismatch(describe()))
    }
}

/// Apply `operations` in order.
pub fn apply_operations<T: Clone>(
    list: &mut Vec<T>,
    operations: &[ListOperation<T>],
) -> Result<()> {
    for operation in operations {
        operation.apply(list)?;
    }
    Ok(())
}

/// Compute the operations that turn `original` into `updated`.
///
/// With `detect_moves` disabled, matched elements outside the stable run are
/// removed and re-added instead of moved.
pub fn difference_of<T>(original: &[T], updated: &[T], detect_moves: bool) -> Vec<ListOperation<T>>
where
    T: Clone + Eq + Hash,
{
    let mut operations = Vec::new();

    // Pair occurrences
    let mut occurrences: HashMap<&T, VecDeque<usize>> = HashMap::new();
    for (index, item) in original.iter().enumerate() {
        occurrences.entry(item).or_default().push_back(index);
    }

    let mut source_of: Vec<Option<usize>> = vec![None; updated.len()];
    let mut target_of: Vec<Option<usize>> = vec![None; original.len()];
    for (target, item) in updated.iter().enumerate() {
        if let Some(source) = occurrences.get_mut(item).and_then(VecDeque::pop_front) {
            source_of[target] = Some(source);
            target_of[source] = Some(target);
        }
    }

    // Matched elements already in relative order stay where they are
    let matched: Vec<(usize, usize)> = source_of
        .iter()
        .enumerate()
        .filter_map(|(target, source)| source.map(|source| (target, source)))
        .collect();
    let sources: Vec<usize> = matched.iter().map(|&(_, source)| source).collect();

    let mut stable = vec![false; updated.len()];
    for position in longest_increasing_subsequence(&sources) {
        stable[matched[position].0] = true;
    }

    let present: Vec<bool> = source_of
        .iter()
        .zip(&stable)
        .map(|(source, &stable)| source.is_some() && (stable || detect_moves))
        .collect();

    // Removals, back to front
    let removed: Vec<usize> = (0..original.len())
        .filter(|&source| target_of[source].map_or(true, |target| !present[target]))
        .collect();
    for (start, end) in contiguous_runs(&removed).into_iter().rev() {
        operations.push(if end - start == 1 {
            ListOperation::Remove { index: start }
        } else {
            ListOperation::RemoveRange { start, end }
        });
    }

    // Survivors, identified by their target index
    let mut working: Vec<usize> = (0..original.len())
        .filter_map(|source| target_of[source].filter(|&target| present[target]))
        .collect();

    if detect_moves {
        push_moves(&mut working, &stable, &mut operations);
    }

    // Insertions, front to back
    let mut target = 0;
    while target < updated.len() {
        if present[target] {
            target += 1;
            continue;
        }
        let start = target;
        while target < updated.len() && !present[target] {
            target += 1;
        }
        operations.push(if target - start == 1 {
            ListOperation::Add {
                item: updated[start].clone(),
                index: start,
            }
        } else {
            ListOperation::AddAll {
                items: updated[start..target].to_vec(),
                index: start,
            }
        });
    }

    operations
}

/// Sort `working` (target indices) with the fewest relocations, keeping every
/// `stable` element in place.
fn push_moves<T>(
    working: &mut Vec<usize>,
    stable: &[bool],
    operations: &mut Vec<ListOperation<T>>,
) {
    let mut order = working.clone();
    order.sort_unstable();

    let mut placed: Vec<bool> = stable.to_vec();
    let mut rank = 0;
    while rank < order.len() {
        let target = order[rank];
        if placed[target] {
            rank += 1;
            continue;
        }

        let Some(from) = working.iter().position(|&t| t == target) else {
            rank += 1;
            continue;
        };

        // Everything ranked lower is placed, so the slot right after the
        // previous rank is where this element belongs.
        let to = match rank.checked_sub(1) {
            Some(previous) => working
                .iter()
                .position(|&t| t == order[previous])
                .map_or(0, |position| position + 1),
            None => 0,
        };

        let mut count = 1;
        while rank + count < order.len() {
            let next = order[rank + count];
            if placed[next] || working.get(from + count) != Some(&next) {
                break;
            }
            count += 1;
        }

        if to != from {
            let block: Vec<usize> = working.drain(from..from + count).collect();
            let destination = if to > from { to - count } else { to };
            working.splice(destination..destination, block);

            operations.push(if count == 1 {
                ListOperation::Move { from, to }
            } else {
                ListOperation::MoveRange { from, to, count }
            });
        }

        for offset in 0..count {
            placed[order[rank + offset]] = true;
        }
        rank += count;
    }
}

/// Positions (into `sequence`) of one longest strictly increasing subsequence.
fn longest_increasing_subsequence(sequence: &[usize]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; sequence.len()];

    for (position, &value) in sequence.iter().enumerate() {
        let slot = tails.partition_point(|&tail| sequence[tail] < value);
        if slot > 0 {
            previous[position] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(position);
        } else {
            tails[slot] = position;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        result.push(position);
        cursor = previous[position];
    }
    result.reverse();
    result
}

/// Group sorted indices into half-open `(start, end)` runs.
fn contiguous_runs(indices: &[usize]) -> Vec<(usize, usize)> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for &index in indices {
        match runs.last_mut() {
            Some((_, end)) if *end == index => *end += 1,
            _ => runs.push((index, index + 1)),
        }
    }
    runs
}
