// Bounded grid search: breadth-first flood and expanding cube shells.
//
// Two primitives cover every spatial scan in the core:
//
// - `bounded_bfs` walks a neighbourhood table outward from an origin,
//   admitting positions through a caller predicate, and stops when the
//   frontier empties, the collected set reaches its cap, or the visit budget
//   runs out. Positions can be admitted as *connectors* (traversed but not
//   collected), which is how leaves bridge the branches of a tree.
// - `ShellScan` enumerates the cube shell at Chebyshev radius r around a
//   centre, nearest first, so "scan radius 1..N, one shell per tick" and
//   "nearest container within 16" share one implementation.
//
// Both are pure functions of their inputs: no world access here, only
// closures supplied by the classifier, gathering engine, survival scans and
// construction site prep.
//
// See also: `classify.rs` for the vein/tree flood fill built on
// `bounded_bfs`, `gather.rs` for incremental shell searching.
//
// **Critical constraint: determinism.** Expansion order follows the fixed
// neighbour tables in `types.rs`; shells sort by (distance², coordinate).
// The visited set is an `FxHashSet` (no random seed) that is never iterated.

use crate::types::VoxelCoord;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

/// How `bounded_bfs` treats a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admit {
    /// Collect it and expand from it.
    Collect,
    /// Expand from it without collecting it.
    Connect,
    /// Neither.
    Reject,
}

#[derive(Clone, Copy, Debug)]
pub struct BfsLimits {
    /// Stop once this many positions are collected.
    pub cap: usize,
    /// Stop after this many positions have been examined.
    pub visit_budget: usize,
}

/// Breadth-first expansion from `origin` over `neighbors`. The origin is
/// examined like any other position. Returns collected positions in
/// discovery order, never more than `limits.cap`.
pub fn bounded_bfs<F>(
    origin: VoxelCoord,
    neighbors: &[(i32, i32, i32)],
    limits: BfsLimits,
    mut admit: F,
) -> Vec<VoxelCoord>
where
    F: FnMut(VoxelCoord) -> Admit,
{
    let mut collected = Vec::new();
    if limits.cap == 0 {
        return collected;
    }
    let mut visited = FxHashSet::default();
    let mut frontier = VecDeque::new();
    visited.insert(origin);
    frontier.push_back(origin);
    let mut examined = 0usize;

    while let Some(pos) = frontier.pop_front() {
        if examined >= limits.visit_budget {
            break;
        }
        examined += 1;
        match admit(pos) {
            Admit::Reject => continue,
            Admit::Collect => {
                collected.push(pos);
                if collected.len() >= limits.cap {
                    break;
                }
            }
            Admit::Connect => {}
        }
        for &(dx, dy, dz) in neighbors {
            let next = pos.offset(dx, dy, dz);
            if visited.insert(next) {
                frontier.push_back(next);
            }
        }
    }
    collected
}

/// Enumerates cube shells around a centre.
#[derive(Clone, Copy, Debug)]
pub struct ShellScan {
    pub center: VoxelCoord,
    pub max_radius: u32,
}

impl ShellScan {
    pub fn new(center: VoxelCoord, max_radius: u32) -> Self {
        Self { center, max_radius }
    }

    /// Positions at Chebyshev distance exactly `radius`, nearest (Euclidean)
    /// first. Radius 0 is the centre alone. Empty beyond `max_radius`.
    pub fn shell(&self, radius: u32) -> Vec<VoxelCoord> {
        if radius > self.max_radius {
            return Vec::new();
        }
        let r = radius as i32;
        let mut out = Vec::new();
        for dy in -r..=r {
            for dz in -r..=r {
                let on_face = dy.abs() == r || dz.abs() == r;
                if on_face {
                    for dx in -r..=r {
                        out.push(self.center.offset(dx, dy, dz));
                    }
                } else {
                    out.push(self.center.offset(-r, dy, dz));
                    if r != 0 {
                        out.push(self.center.offset(r, dy, dz));
                    }
                }
            }
        }
        let c = self.center;
        out.sort_by_key(|p| (p.distance_squared(c), *p));
        out
    }

    /// First position, scanning shells outward, that satisfies `pred`.
    pub fn nearest(&self, mut pred: impl FnMut(VoxelCoord) -> bool) -> Option<VoxelCoord> {
        (0..=self.max_radius).find_map(|r| self.shell(r).into_iter().find(|&p| pred(p)))
    }

    /// Every position within `max_radius` that satisfies `pred`, nearest
    /// shell first.
    pub fn collect(&self, mut pred: impl FnMut(VoxelCoord) -> bool) -> Vec<VoxelCoord> {
        (0..=self.max_radius)
            .flat_map(|r| self.shell(r))
            .filter(|&p| pred(p))
            .collect()
    }
}
