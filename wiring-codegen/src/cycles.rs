//! Deterministic cycle detection over an adjacency map.
//!
//! Used for members of one container and for containers of a whole project.
//! Nodes and neighbour lists are walked in sorted order; each back edge found
//! by the depth-first search yields one cycle. Cycles are deduplicated by
//! their smallest rotation and returned sorted by their `->`-joined form.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    OnStack,
    Done,
}

struct Frame<'a, N> {
    neighbors: Vec<&'a N>,
    next: usize,
}

/// Returns every distinct cycle as a closed walk `[n0, n1, .., n0]`.
///
/// Nodes that only appear as edge targets take part in the walk as well.
pub fn find_cycles<N>(adjacency: &BTreeMap<N, Vec<N>>) -> Vec<Vec<N>>
where
    N: Ord + Clone + Display,
{
    let mut nodes: BTreeSet<&N> = adjacency.keys().collect();
    nodes.extend(adjacency.values().flatten());

    let mut state: BTreeMap<&N, VisitState> = BTreeMap::new();
    let mut stack: Vec<&N> = Vec::new();
    let mut position: BTreeMap<&N, usize> = BTreeMap::new();
    let mut seen: BTreeSet<Vec<N>> = BTreeSet::new();
    let mut cycles: Vec<Vec<N>> = Vec::new();

    for &start in &nodes {
        if state.contains_key(start) {
            continue;
        }
        let mut frames = vec![enter(start, adjacency, &mut state, &mut stack, &mut position)];
        while let Some(frame) = frames.last_mut() {
            if frame.next < frame.neighbors.len() {
                let next = frame.neighbors[frame.next];
                frame.next += 1;
                match state.get(next) {
                    None => {
                        frames.push(enter(next, adjacency, &mut state, &mut stack, &mut position));
                    }
                    Some(VisitState::OnStack) => {
                        let mut cycle: Vec<N> =
                            stack[position[next]..].iter().map(|&v| v.clone()).collect();
                        cycle.push(next.clone());
                        if seen.insert(canonical_rotation(&cycle[..cycle.len() - 1])) {
                            tracing::trace!(cycle = %join(&cycle), "found dependency cycle");
                            cycles.push(cycle);
                        }
                    }
                    Some(VisitState::Done) => {}
                }
            } else {
                frames.pop();
                if let Some(node) = stack.pop() {
                    position.remove(node);
                    state.insert(node, VisitState::Done);
                }
            }
        }
    }
    cycles.sort_by_cached_key(|cycle| join(cycle));
    cycles
}

fn enter<'a, N: Ord>(
    node: &'a N,
    adjacency: &'a BTreeMap<N, Vec<N>>,
    state: &mut BTreeMap<&'a N, VisitState>,
    stack: &mut Vec<&'a N>,
    position: &mut BTreeMap<&'a N, usize>,
) -> Frame<'a, N> {
    state.insert(node, VisitState::OnStack);
    position.insert(node, stack.len());
    stack.push(node);
    let mut neighbors: Vec<&N> = adjacency.get(node).into_iter().flatten().collect();
    neighbors.sort();
    neighbors.dedup();
    Frame { neighbors, next: 0 }
}

/// Rotates a cycle core (without the closing node) to its smallest rotation.
pub fn canonical_rotation<N: Ord + Clone>(core: &[N]) -> Vec<N> {
    let mut best = 0;
    for candidate in 1..core.len() {
        for offset in 0..core.len() {
            let lhs = &core[(candidate + offset) % core.len()];
            let rhs = &core[(best + offset) % core.len()];
            if lhs != rhs {
                if lhs < rhs {
                    best = candidate;
                }
                break;
            }
        }
    }
    core[best..].iter().chain(&core[..best]).cloned().collect()
}

/// `a -> b -> a` form of a cycle.
pub fn join<N: Display>(cycle: &[N]) -> String {
    cycle
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
