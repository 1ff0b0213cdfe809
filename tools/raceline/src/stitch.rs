//! Greedy polyline stitching
//!
//! Lanelet maps split a lane boundary over many ways, listed in no particular
//! order and direction. The stitcher grows one polyline from the first way by
//! repeatedly attaching any unused way that shares an endpoint with the
//! current tail (or, failing that, the current head), reversing it as needed.
//!
//! Ways that never connect are appended at the end. Those jumps are reported
//! as [`ForcedJoin`]s instead of being hidden in the output.

use raceline_common::{Error, Result};

/// A jump between two unconnected segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedJoin {
    /// Index in the stitched polyline of the first node after the jump
    pub position: usize,
    /// Input index of the appended sequence
    pub sequence: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StitchedPolyline<T> {
    pub node_ids: Vec<T>,
    pub forced_joins: Vec<ForcedJoin>,
}

impl<T> StitchedPolyline<T> {
    pub fn is_contiguous(&self) -> bool {
        self.forced_joins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.node_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }
}

/// Stitch node-id sequences into a single ordered polyline.
///
/// Sequences with fewer than two nodes carry no direction and are ignored.
/// Deterministic for a given input order.
pub fn stitch<T: Clone + PartialEq>(sequences: &[Vec<T>]) -> Result<StitchedPolyline<T>> {
    let usable: Vec<(usize, &Vec<T>)> = sequences
        .iter()
        .enumerate()
        .filter(|(_, seq)| seq.len() >= 2)
        .collect();

    let Some((_, seed)) = usable.first() else {
        return Err(Error::insufficient(
            "polyline stitching (no usable sequences)",
            2,
            sequences.iter().map(Vec::len).max().unwrap_or(0),
        ));
    };

    let mut chained: Vec<T> = seed.to_vec();
    let mut used = vec![false; usable.len()];
    used[0] = true;

    loop {
        if extend_tail(&mut chained, &usable, &mut used) {
            continue;
        }
        if extend_head(&mut chained, &usable, &mut used) {
            continue;
        }
        break;
    }

    // Leftovers, best effort
    let mut jump_starts = Vec::new();
    for (i, (input_index, seq)) in usable.iter().enumerate() {
        if used[i] {
            continue;
        }
        let last = chained.last().cloned();
        if last.as_ref() == seq.first() {
            chained.extend(seq[1..].iter().cloned());
        } else if last.as_ref() == seq.last() {
            chained.extend(seq[..seq.len() - 1].iter().rev().cloned());
        } else {
            jump_starts.push((chained.len(), *input_index));
            chained.extend(seq.iter().cloned());
        }
    }

    let (node_ids, new_index) = dedup_adjacent(chained);
    let forced_joins = jump_starts
        .into_iter()
        .map(|(pos, sequence)| ForcedJoin {
            position: new_index[pos],
            sequence,
        })
        .collect();

    Ok(StitchedPolyline {
        node_ids,
        forced_joins,
    })
}

fn extend_tail<T: Clone + PartialEq>(
    chained: &mut Vec<T>,
    sequences: &[(usize, &Vec<T>)],
    used: &mut [bool],
) -> bool {
    let Some(last) = chained.last().cloned() else {
        return false;
    };
    for (i, (_, seq)) in sequences.iter().enumerate() {
        if used[i] {
            continue;
        }
        if seq[0] == last {
            chained.extend(seq[1..].iter().cloned());
        } else if seq[seq.len() - 1] == last {
            chained.extend(seq[..seq.len() - 1].iter().rev().cloned());
        } else {
            continue;
        }
        used[i] = true;
        return true;
    }
    false
}

fn extend_head<T: Clone + PartialEq>(
    chained: &mut Vec<T>,
    sequences: &[(usize, &Vec<T>)],
    used: &mut [bool],
) -> bool {
    let Some(head) = chained.first().cloned() else {
        return false;
    };
    for (i, (_, seq)) in sequences.iter().enumerate() {
        if used[i] {
            continue;
        }
        let mut prefixed: Vec<T> = if seq[seq.len() - 1] == head {
            seq[..seq.len() - 1].to_vec()
        } else if seq[0] == head {
            seq[1..].iter().rev().cloned().collect()
        } else {
            continue;
        };
        prefixed.append(chained);
        *chained = prefixed;
        used[i] = true;
        return true;
    }
    false
}

/// Collapse consecutive duplicates. Also returns, for every input index, the
/// index of the kept element it collapsed into.
fn dedup_adjacent<T: PartialEq>(items: Vec<T>) -> (Vec<T>, Vec<usize>) {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    let mut new_index = Vec::with_capacity(items.len());
    for item in items {
        if out.last() != Some(&item) {
            out.push(item);
        }
        new_index.push(out.len() - 1);
    }
    (out, new_index)
}
