//! Bounded, cycle-guarded walk up the hierarchy graph.

use hashbrown::HashMap;
use std::sync::Arc;

use crate::error::DataIntegrityWarning;
use crate::hierarchy::HierarchyGraph;
use crate::models::{AdminLevel, Boundary, ElementId, HierarchyEdge, LevelRole};
use crate::policy::{compare_paths, FallbackPolicy, PathRank};

/// A state or country collected on the way up
#[derive(Debug, Clone, PartialEq)]
pub struct Ancestor {
    pub id: ElementId,
    /// Name denormalized on the edge, used when the boundary is not loaded
    pub name: Option<String>,
}

impl Ancestor {
    pub fn from_boundary(boundary: &Boundary) -> Self {
        Self {
            id: boundary.id,
            name: boundary.name.clone(),
        }
    }
}

/// First state and first country met along one ascent path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AscentPath {
    pub state: Option<Ancestor>,
    pub country: Option<Ancestor>,
    /// Country entered through a containment edge whose child is a boundary
    pub country_derived: bool,
}

impl AscentPath {
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.country.is_none()
    }
}

/// Best path from one ascent plus the integrity problems met on the way
#[derive(Debug, Default)]
pub struct AscentOutcome {
    pub best: Option<AscentPath>,
    pub paths_explored: usize,
    pub warnings: Vec<DataIntegrityWarning>,
}

/// One upward step
#[derive(Debug, Clone)]
pub struct Hop {
    to: ElementId,
    level: AdminLevel,
    name: Option<String>,
    from_boundary_containment: bool,
}

impl Hop {
    fn from_edge(edge: &HierarchyEdge) -> Self {
        Self {
            to: edge.parent,
            level: edge.parent_level,
            name: edge.parent_name.clone(),
            from_boundary_containment: edge.is_derived() && edge.child_level.is_some(),
        }
    }

    /// Virtual containment step from a query point
    pub fn to_boundary(boundary: &Boundary) -> Self {
        Self {
            to: boundary.id,
            level: boundary.level,
            name: boundary.name.clone(),
            from_boundary_containment: false,
        }
    }
}

#[derive(Clone)]
struct Walk {
    visited: Vec<ElementId>,
    path: AscentPath,
}

pub struct Ascent<'a> {
    graph: &'a HierarchyGraph,
    boundaries: &'a HashMap<ElementId, Arc<Boundary>>,
    policy: &'a FallbackPolicy,
}

impl<'a> Ascent<'a> {
    pub fn new(
        graph: &'a HierarchyGraph,
        boundaries: &'a HashMap<ElementId, Arc<Boundary>>,
        policy: &'a FallbackPolicy,
    ) -> Self {
        Self {
            graph,
            boundaries,
            policy,
        }
    }

    /// Ascend from an element present in the graph
    pub fn from_element(&self, anchor: ElementId) -> AscentOutcome {
        let hops = self.upward(anchor).collect();
        self.run(anchor, hops)
    }

    /// Ascend from an anchor that is not a graph node, through the given first hops
    pub fn from_hops(&self, anchor: ElementId, hops: Vec<Hop>) -> AscentOutcome {
        self.run(anchor, hops)
    }

    fn upward(&self, node: ElementId) -> impl Iterator<Item = Hop> + '_ {
        self.graph
            .parents_of(node)
            .filter(|e| e.parent != e.child && !e.is_inverted())
            .map(Hop::from_edge)
    }

    /// Depth-first over every upward path. Each path carries its own visited
    /// list; revisiting a node ends that path with a `CyclicEdge` warning.
    ///
    /// Hops to a state or country are explored before unlabeled ones. Paths
    /// that find neither do not count against `max_ascent_paths`. Running out
    /// of paths or steps with hops still pending is reported as
    /// `AscentBudgetExhausted`.
    fn run(&self, anchor: ElementId, hops: Vec<Hop>) -> AscentOutcome {
        let max_depth = self.policy.max_ascent_depth;
        let max_paths = self.policy.max_ascent_paths;
        let step_budget = max_depth.saturating_mul(max_paths).max(1);

        let mut outcome = AscentOutcome::default();
        let mut paths: Vec<AscentPath> = Vec::new();
        let mut dead_ends = 0usize;
        let mut steps = 0usize;

        let start = Walk {
            visited: vec![anchor],
            path: AscentPath::default(),
        };
        let mut stack: Vec<(Hop, Walk)> = Vec::new();
        push_hops(&mut stack, hops, &start);

        while let Some((hop, mut walk)) = stack.pop() {
            if paths.len() >= max_paths || steps >= step_budget {
                outcome
                    .warnings
                    .push(DataIntegrityWarning::AscentBudgetExhausted {
                        start: anchor,
                        pending: stack.len() + 1,
                    });
                break;
            }
            steps += 1;

            let current = walk.visited.last().copied().unwrap_or(anchor);
            if walk.visited.contains(&hop.to) {
                push_unique(
                    &mut outcome.warnings,
                    DataIntegrityWarning::CyclicEdge {
                        from: current,
                        to: hop.to,
                    },
                );
                finish(walk.path, &mut paths, &mut dead_ends);
                continue;
            }
            if walk.visited.len() > max_depth {
                push_unique(
                    &mut outcome.warnings,
                    DataIntegrityWarning::AscentDepthExceeded {
                        start: anchor,
                        depth: max_depth,
                    },
                );
                finish(walk.path, &mut paths, &mut dead_ends);
                continue;
            }

            walk.visited.push(hop.to);
            match hop.level.role() {
                Some(LevelRole::State) if walk.path.state.is_none() => {
                    walk.path.state = Some(Ancestor {
                        id: hop.to,
                        name: hop.name.clone(),
                    });
                }
                Some(LevelRole::Country) if walk.path.country.is_none() => {
                    walk.path.country = Some(Ancestor {
                        id: hop.to,
                        name: hop.name.clone(),
                    });
                    walk.path.country_derived = hop.from_boundary_containment;
                }
                _ => {}
            }

            // Nothing above a country is of interest
            if walk.path.country.is_some() {
                finish(walk.path, &mut paths, &mut dead_ends);
                continue;
            }

            let parents: Vec<Hop> = self.upward(hop.to).collect();
            if parents.is_empty() {
                finish(walk.path, &mut paths, &mut dead_ends);
                continue;
            }
            push_hops(&mut stack, parents, &walk);
        }

        outcome.paths_explored = paths.len() + dead_ends;
        outcome.best = if paths.is_empty() {
            (dead_ends > 0).then(AscentPath::default)
        } else {
            paths
                .into_iter()
                .map(|path| (self.rank(&path), path))
                .min_by(|(a, _), (b, _)| compare_paths(a, b))
                .map(|(_, path)| path)
        };
        outcome
    }

    fn rank(&self, path: &AscentPath) -> PathRank {
        let area = |a: &Option<Ancestor>| {
            a.as_ref()
                .and_then(|a| self.boundaries.get(&a.id))
                .and_then(|b| b.bbox_area())
        };
        PathRank {
            has_country: path.country.is_some(),
            has_state: path.state.is_some(),
            state_area: area(&path.state),
            country_derived: path.country_derived,
            country_area: area(&path.country),
            tiebreak: (
                path.state.as_ref().map(|a| a.id),
                path.country.as_ref().map(|a| a.id),
            ),
        }
    }
}

/// Queue hops so that state and country hops pop first, keeping edge order otherwise
fn push_hops(stack: &mut Vec<(Hop, Walk)>, mut hops: Vec<Hop>, walk: &Walk) {
    hops.sort_by_key(|hop| hop.level.role().is_none());
    for hop in hops.into_iter().rev() {
        stack.push((hop, walk.clone()));
    }
}

fn finish(path: AscentPath, paths: &mut Vec<AscentPath>, dead_ends: &mut usize) {
    if path.is_empty() {
        *dead_ends += 1;
    } else {
        paths.push(path);
    }
}

fn push_unique(warnings: &mut Vec<DataIntegrityWarning>, warning: DataIntegrityWarning) {
    if !warnings.contains(&warning) {
        warnings.push(warning);
    }
}
