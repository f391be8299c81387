use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::consts::{EPSILON, OUTLIER_ERROR_FLOOR};
use crate::error::{Result, StitchError};
use crate::pipeline::config::GlobalOptimizationParameters;
use crate::view::ViewId;

use super::problem::{GlobalOptimizer, GlobalProblem, GlobalSolution, LinkError};

/// Weighted iterative relaxation over the link graph.
///
/// Views joined by a constraint group form one node and keep their initial
/// offsets to each other. Each free node is repeatedly moved to the
/// correlation-weighted mean of the positions its links imply until no node
/// moves by more than the tolerance. Connected components without a fixed
/// view get their first node pinned.
///
/// With outlier removal enabled the worst link is dropped and the system
/// re-solved while
/// `max_error > relative_error_threshold * mean_error` (and above
/// `OUTLIER_ERROR_FLOOR`)
/// or `mean_error > absolute_error_threshold`.
#[derive(Clone, Debug, Default)]
pub struct RelaxationSolver;

impl RelaxationSolver {
    pub fn new() -> Self {
        Self
    }
}

struct Node {
    members: Vec<ViewId>,
    fixed: bool,
}

struct Link {
    a: usize,
    b: usize,
    /// Required `position[b] - position[a]`.
    offset: Vec<f64>,
    weight: f64,
    source: (ViewId, ViewId),
}

struct Graph {
    nodes: Vec<Node>,
    node_of: HashMap<ViewId, usize>,
    /// Offset of each view from the position of its node.
    member_offset: HashMap<ViewId, Vec<f64>>,
    start: Vec<Vec<f64>>,
}

impl Graph {
    fn build(problem: &GlobalProblem) -> Self {
        let ndim = problem.model.dimensions();
        let fixed: HashSet<ViewId> = problem.fixed.iter().copied().collect();

        let mut node_of: HashMap<ViewId, usize> = HashMap::new();
        let mut nodes: Vec<Node> = Vec::new();

        for group in &problem.groups {
            let members: Vec<ViewId> = group
                .iter()
                .copied()
                .filter(|v| !node_of.contains_key(v))
                .collect();
            if members.is_empty() {
                continue;
            }
            for v in &members {
                node_of.insert(*v, nodes.len());
            }
            let is_fixed = members.iter().any(|v| fixed.contains(v));
            nodes.push(Node {
                members,
                fixed: is_fixed,
            });
        }
        for v in problem.views() {
            if !node_of.contains_key(&v) {
                node_of.insert(v, nodes.len());
                nodes.push(Node {
                    members: vec![v],
                    fixed: fixed.contains(&v),
                });
            }
        }

        let mut member_offset = HashMap::new();
        let mut start = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let origin = problem
                .initial
                .get(&node.members[0])
                .cloned()
                .unwrap_or_else(|| vec![0.0; ndim]);
            for v in &node.members {
                let t = problem.initial.get(v).cloned().unwrap_or_else(|| vec![0.0; ndim]);
                member_offset.insert(*v, sub(&t, &origin));
            }
            start.push(origin);
        }

        Self {
            nodes,
            node_of,
            member_offset,
            start,
        }
    }

    fn links(&self, problem: &GlobalProblem) -> Vec<Link> {
        let mut links = Vec::new();
        for pair in &problem.pairs {
            let (Some(&a), Some(&b)) = (self.node_of.get(&pair.view_a), self.node_of.get(&pair.view_b))
            else {
                continue;
            };
            if a == b {
                debug!(a = %pair.view_a, b = %pair.view_b, "Ignoring link inside one constraint group");
                continue;
            }
            let off_a = &self.member_offset[&pair.view_a];
            let off_b = &self.member_offset[&pair.view_b];
            let offset: Vec<f64> = (0..pair.shift.len())
                .map(|d| pair.shift[d] + off_a[d] - off_b[d])
                .collect();
            links.push(Link {
                a,
                b,
                offset,
                weight: pair.correlation.max(EPSILON),
                source: (pair.view_a, pair.view_b),
            });
        }
        links
    }

    /// Nodes held in place: fixed ones plus the first node of every
    /// connected component that has no fixed node.
    fn anchored(&self, links: &[Link]) -> Vec<bool> {
        let n = self.nodes.len();
        let mut parent: Vec<usize> = (0..n).collect();
        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        for link in links {
            let ra = find(&mut parent, link.a);
            let rb = find(&mut parent, link.b);
            if ra != rb {
                parent[ra.max(rb)] = ra.min(rb);
            }
        }

        let mut anchored: Vec<bool> = self.nodes.iter().map(|node| node.fixed).collect();
        let mut component_has_anchor: HashSet<usize> = HashSet::new();
        for i in 0..n {
            if anchored[i] {
                let root = find(&mut parent, i);
                component_has_anchor.insert(root);
            }
        }
        for i in 0..n {
            let root = find(&mut parent, i);
            if component_has_anchor.insert(root) {
                debug!(view = %self.nodes[i].members[0], "Pinning component without a fixed view");
                anchored[i] = true;
            }
        }
        anchored
    }
}

fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn relax(
    start: &[Vec<f64>],
    anchored: &[bool],
    links: &[Link],
    max_iterations: usize,
    tolerance: f64,
) -> (Vec<Vec<f64>>, usize) {
    let mut positions = start.to_vec();
    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); positions.len()];
    for (i, link) in links.iter().enumerate() {
        incident[link.a].push(i);
        incident[link.b].push(i);
    }

    let mut iterations = 0;
    while iterations < max_iterations {
        iterations += 1;
        let mut max_move: f64 = 0.0;

        for node in 0..positions.len() {
            if anchored[node] || incident[node].is_empty() {
                continue;
            }
            let ndim = positions[node].len();
            let mut target = vec![0.0; ndim];
            let mut total = 0.0;
            for &l in &incident[node] {
                let link = &links[l];
                for d in 0..ndim {
                    let implied = if link.b == node {
                        positions[link.a][d] + link.offset[d]
                    } else {
                        positions[link.b][d] - link.offset[d]
                    };
                    target[d] += link.weight * implied;
                }
                total += link.weight;
            }
            for t in target.iter_mut() {
                *t /= total;
            }
            max_move = max_move.max(norm(&sub(&target, &positions[node])));
            positions[node] = target;
        }

        if max_move <= tolerance {
            break;
        }
    }
    (positions, iterations)
}

fn link_errors(links: &[Link], positions: &[Vec<f64>]) -> Vec<f64> {
    links
        .iter()
        .map(|link| {
            let actual = sub(&positions[link.b], &positions[link.a]);
            norm(&sub(&actual, &link.offset))
        })
        .collect()
}

fn exceeds_thresholds(mean: f64, max: f64, params: &GlobalOptimizationParameters) -> bool {
    let relative = max > params.relative_error_threshold * mean && max > OUTLIER_ERROR_FLOOR;
    relative || mean > params.absolute_error_threshold
}

impl GlobalOptimizer for RelaxationSolver {
    fn optimize(&self, problem: &GlobalProblem) -> Result<GlobalSolution> {
        let params = &problem.params;
        if params.max_iterations == 0 {
            return Err(StitchError::Solver("max_iterations must be positive".into()));
        }

        let graph = Graph::build(problem);
        let mut links = graph.links(problem);
        let mut removed: Vec<LinkError> = Vec::new();

        let (positions, errors, iterations) = loop {
            let anchored = graph.anchored(&links);
            let (positions, iterations) = relax(
                &graph.start,
                &anchored,
                &links,
                params.max_iterations,
                params.tolerance,
            );
            let errors = link_errors(&links, &positions);

            if !params.remove_outliers || links.is_empty() {
                break (positions, errors, iterations);
            }

            let mean = errors.iter().sum::<f64>() / errors.len() as f64;
            let (worst, max) = errors
                .iter()
                .copied()
                .enumerate()
                .fold((0, 0.0), |best, (i, e)| if e > best.1 { (i, e) } else { best });

            if !exceeds_thresholds(mean, max, params) {
                break (positions, errors, iterations);
            }

            let link = links.remove(worst);
            warn!(
                a = %link.source.0,
                b = %link.source.1,
                error = max,
                mean_error = mean,
                "Removing inconsistent link"
            );
            removed.push(LinkError {
                view_a: link.source.0,
                view_b: link.source.1,
                error: max,
            });
        };

        let mut translations = BTreeMap::new();
        for (i, node) in graph.nodes.iter().enumerate() {
            for v in &node.members {
                let offset = &graph.member_offset[v];
                let t: Vec<f64> = positions[i].iter().zip(offset).map(|(p, o)| p + o).collect();
                translations.insert(*v, t);
            }
        }

        let solution = GlobalSolution {
            translations,
            links: links
                .iter()
                .zip(&errors)
                .map(|(link, &error)| LinkError {
                    view_a: link.source.0,
                    view_b: link.source.1,
                    error,
                })
                .collect(),
            removed,
            iterations,
        };

        info!(
            views = solution.translations.len(),
            links = solution.links.len(),
            removed = solution.removed.len(),
            mean_error = solution.mean_error(),
            max_error = solution.max_error(),
            iterations,
            "Global optimisation complete"
        );
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::PairwiseResult;
    use crate::solver::TransformModel;

    fn link(a: u32, b: u32, shift: [f64; 2]) -> PairwiseResult {
        PairwiseResult {
            view_a: ViewId::new(0, a),
            view_b: ViewId::new(0, b),
            shift: shift.to_vec(),
            correlation: 0.9,
        }
    }

    #[test]
    fn small_errors_never_trip_the_relative_threshold() {
        let params = GlobalOptimizationParameters::default();
        // max is 9 x mean but below the floor
        assert!(!exceeds_thresholds(0.1, 0.9, &params));
        assert!(exceeds_thresholds(0.1, 1.0, &params));
        assert!(exceeds_thresholds(4.0, 4.5, &params));
        assert!(!exceeds_thresholds(1.0, 2.0, &params));
    }

    #[test]
    fn unfixed_component_is_pinned_at_first_view() {
        let initial: BTreeMap<ViewId, Vec<f64>> = (0..2)
            .map(|s| (ViewId::new(0, s), vec![5.0 * s as f64, 1.0]))
            .collect();
        let problem = GlobalProblem::new(
            TransformModel::Translation2D,
            vec![link(0, 1, [10.0, 0.0])],
            vec![],
            vec![],
            initial,
            GlobalOptimizationParameters::default(),
        )
        .unwrap();

        let solution = RelaxationSolver::new().optimize(&problem).unwrap();
        assert_eq!(solution.translations[&ViewId::new(0, 0)], vec![0.0, 1.0]);
        let t1 = &solution.translations[&ViewId::new(0, 1)];
        assert!((t1[0] - 10.0).abs() < 1e-3);
        assert!((t1[1] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn links_inside_a_constraint_group_are_ignored() {
        let initial: BTreeMap<ViewId, Vec<f64>> = (0..2)
            .map(|s| (ViewId::new(0, s), vec![0.0, 0.0]))
            .collect();
        let problem = GlobalProblem::new(
            TransformModel::Translation2D,
            vec![link(0, 1, [10.0, 0.0])],
            vec![],
            vec![vec![ViewId::new(0, 0), ViewId::new(0, 1)]],
            initial,
            GlobalOptimizationParameters::default(),
        )
        .unwrap();

        let solution = RelaxationSolver::new().optimize(&problem).unwrap();
        assert!(solution.links.is_empty());
        assert_eq!(solution.translations[&ViewId::new(0, 1)], vec![0.0, 0.0]);
    }
}
