//! Weighted adjacency shared by the modularity optimizers.

use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap};

/// Internal graph representation for weighted operations.
#[derive(Debug, Clone)]
pub(crate) struct WeightedGraph {
    pub(crate) n: usize,
    /// Adjacency: node -> [(neighbor, weight)], parallel edges merged, no self entries.
    pub(crate) adj: Vec<Vec<(usize, f64)>>,
    /// Self-loop weight per node (internal weight of an aggregated community).
    pub(crate) self_loops: Vec<f64>,
    /// Weighted degree; a self-loop of weight w contributes 2w.
    pub(crate) degrees: Vec<f64>,
    /// Sum of degrees (2m in the modularity formula).
    pub(crate) total_weight: f64,
}

impl WeightedGraph {
    pub(crate) fn from_petgraph<N>(graph: &UnGraph<N, f32>) -> Self {
        let edges: Vec<(usize, usize, f64)> = graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index(), f64::from(*e.weight())))
            .collect();
        Self::from_edges(graph.node_count(), &edges, vec![0.0; graph.node_count()])
    }

    pub(crate) fn from_edges(n: usize, edges: &[(usize, usize, f64)], mut self_loops: Vec<f64>) -> Self {
        let mut merged: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for &(i, j, w) in edges {
            if i == j {
                self_loops[i] += w;
                continue;
            }
            let key = if i < j { (i, j) } else { (j, i) };
            *merged.entry(key).or_insert(0.0) += w;
        }

        let mut adj = vec![Vec::new(); n];
        let mut degrees = vec![0.0; n];
        for (&(i, j), &w) in &merged {
            adj[i].push((j, w));
            adj[j].push((i, w));
            degrees[i] += w;
            degrees[j] += w;
        }
        // Key order fixes the summation order of degrees and keeps every row sorted.
        for (i, &sl) in self_loops.iter().enumerate() {
            degrees[i] += 2.0 * sl;
        }
        let total_weight = degrees.iter().sum();

        Self {
            n,
            adj,
            self_loops,
            degrees,
            total_weight,
        }
    }

    /// Contract every community of `membership` (ids `0..n_comms`) into one node.
    pub(crate) fn aggregate(&self, membership: &[usize], n_comms: usize) -> WeightedGraph {
        let mut self_loops = vec![0.0; n_comms];
        let mut edges = Vec::new();
        for i in 0..self.n {
            let ci = membership[i];
            self_loops[ci] += self.self_loops[i];
            for &(j, w) in &self.adj[i] {
                if j <= i {
                    continue;
                }
                let cj = membership[j];
                if ci == cj {
                    self_loops[ci] += w;
                } else {
                    edges.push((ci, cj, w));
                }
            }
        }
        WeightedGraph::from_edges(n_comms, &edges, self_loops)
    }

    /// Modularity of `membership` at resolution `gamma`.
    ///
    /// `Q = Σ_c [ in_c / m - γ (tot_c / 2m)² ]`
    pub(crate) fn modularity(&self, membership: &[usize], gamma: f64) -> f64 {
        if self.total_weight == 0.0 {
            return 0.0;
        }
        let m = self.total_weight / 2.0;
        let n_comms = membership.iter().copied().max().map_or(0, |c| c + 1);
        let mut internal = vec![0.0; n_comms];
        let mut totals = vec![0.0; n_comms];
        for i in 0..self.n {
            let ci = membership[i];
            totals[ci] += self.degrees[i];
            internal[ci] += self.self_loops[i];
            for &(j, w) in &self.adj[i] {
                if j > i && membership[j] == ci {
                    internal[ci] += w;
                }
            }
        }
        internal
            .iter()
            .zip(&totals)
            .map(|(&l, &t)| l / m - gamma * (t / self.total_weight).powi(2))
            .sum()
    }
}

/// Greedy node mover with reusable scratch buffers.
///
/// Gain of moving node `i` (already removed from its community) into community `c`:
///
/// ```text
/// ΔQ(c) = k_i,in(c) / m - γ · Σ_tot(c) · k_i / (2m²)
/// ```
pub(crate) struct LocalMover {
    totals: Vec<f64>,
    neighbor_weight: Vec<f64>,
    seen: Vec<bool>,
    touched: Vec<usize>,
    m: f64,
    resolution: f64,
}

impl LocalMover {
    /// `membership` ids must be `< wg.n`.
    pub(crate) fn new(wg: &WeightedGraph, membership: &[usize], resolution: f64) -> Self {
        let mut totals = vec![0.0; wg.n];
        for (i, &c) in membership.iter().enumerate() {
            totals[c] += wg.degrees[i];
        }
        Self {
            totals,
            neighbor_weight: vec![0.0; wg.n],
            seen: vec![false; wg.n],
            touched: Vec::new(),
            m: wg.total_weight / 2.0,
            resolution,
        }
    }

    fn gain(&self, community: usize, ki: f64) -> f64 {
        self.neighbor_weight[community] / self.m
            - self.resolution * self.totals[community] * ki / (2.0 * self.m * self.m)
    }

    /// Move `node` to the neighboring community with the best gain.
    ///
    /// Staying put wins ties. Returns true if the node changed community.
    pub(crate) fn move_node(&mut self, wg: &WeightedGraph, membership: &mut [usize], node: usize) -> bool {
        if self.m == 0.0 {
            return false;
        }
        let current = membership[node];
        let ki = wg.degrees[node];

        for &(neighbor, w) in &wg.adj[node] {
            let c = membership[neighbor];
            if !self.seen[c] {
                self.seen[c] = true;
                self.touched.push(c);
            }
            self.neighbor_weight[c] += w;
        }

        self.totals[current] -= ki;
        let mut best = current;
        let mut best_gain = self.gain(current, ki);
        for &c in &self.touched {
            let gain = self.gain(c, ki);
            if gain > best_gain + 1e-12 {
                best_gain = gain;
                best = c;
            }
        }
        self.totals[best] += ki;
        membership[node] = best;

        for &c in &self.touched {
            self.seen[c] = false;
            self.neighbor_weight[c] = 0.0;
        }
        self.touched.clear();

        best != current
    }
}

/// Split every community of `membership` into its connected components.
///
/// Returns the refined assignment (ids in order of first appearance) and its size.
pub(crate) fn split_disconnected(wg: &WeightedGraph, membership: &[usize]) -> (Vec<usize>, usize) {
    const UNSET: usize = usize::MAX;
    let mut refined = vec![UNSET; wg.n];
    let mut next = 0;
    let mut stack = Vec::new();
    for start in 0..wg.n {
        if refined[start] != UNSET {
            continue;
        }
        refined[start] = next;
        stack.push(start);
        while let Some(node) = stack.pop() {
            for &(neighbor, _) in &wg.adj[node] {
                if refined[neighbor] == UNSET && membership[neighbor] == membership[node] {
                    refined[neighbor] = next;
                    stack.push(neighbor);
                }
            }
        }
        next += 1;
    }
    (refined, next)
}

/// Renumber community ids to `0..k` in order of first appearance.
pub(crate) fn renumber(assignment: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    let labels = assignment
        .iter()
        .map(|&c| {
            let next = mapping.len();
            *mapping.entry(c).or_insert(next)
        })
        .collect();
    (labels, mapping.len())
}
