//! Minimum s-t cut via Dinic's max-flow algorithm.
//!
//! Both the level-graph search and the augmenting walk are iterative, so
//! long paths through a pixel grid cannot overflow the stack.

use std::collections::VecDeque;

/// Residual capacities at or below this count as saturated.
const EPS: f64 = 1e-9;

/// A flow network over `n` nodes plus a source and a sink.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    /// Edge `e` and `e ^ 1` are each other's reverse.
    to: Vec<usize>,
    cap: Vec<f64>,
    adj: Vec<Vec<usize>>,
    source: usize,
    sink: usize,
}

impl FlowGraph {
    /// A graph with `nodes` inner nodes, numbered `0..nodes`.
    pub fn new(nodes: usize) -> Self {
        Self {
            to: Vec::new(),
            cap: Vec::new(),
            adj: vec![Vec::new(); nodes + 2],
            source: nodes,
            sink: nodes + 1,
        }
    }

    /// Add terminal capacities: `from_source` is paid if `node` ends on
    /// the sink side, `to_sink` if it ends on the source side.
    pub fn add_terminal(&mut self, node: usize, from_source: f64, to_sink: f64) {
        // Only the difference affects the cut.
        let common = from_source.min(to_sink);
        if from_source - common > 0.0 {
            self.add_edge(self.source, node, from_source - common, 0.0);
        }
        if to_sink - common > 0.0 {
            self.add_edge(node, self.sink, to_sink - common, 0.0);
        }
    }

    /// Add an edge from `u` to `v` with the given capacity in each
    /// direction.
    pub fn add_edge(&mut self, u: usize, v: usize, forward: f64, backward: f64) {
        self.adj[u].push(self.to.len());
        self.to.push(v);
        self.cap.push(forward);
        self.adj[v].push(self.to.len());
        self.to.push(u);
        self.cap.push(backward);
    }

    /// Run max-flow and return, per inner node, whether it lies on the
    /// source side of the minimum cut.
    pub fn min_cut(mut self) -> Vec<bool> {
        let n = self.adj.len();
        let mut level = vec![usize::MAX; n];
        while self.build_levels(&mut level) {
            self.blocking_flow(&mut level);
        }
        let reachable = self.reachable_from_source();
        reachable[..self.source].to_vec()
    }

    fn build_levels(&self, level: &mut [usize]) -> bool {
        level.fill(usize::MAX);
        level[self.source] = 0;
        let mut queue = VecDeque::from([self.source]);
        while let Some(v) = queue.pop_front() {
            for &e in &self.adj[v] {
                let w = self.to[e];
                if self.cap[e] > EPS && level[w] == usize::MAX {
                    level[w] = level[v] + 1;
                    queue.push_back(w);
                }
            }
        }
        level[self.sink] != usize::MAX
    }

    fn blocking_flow(&mut self, level: &mut [usize]) {
        let mut next_arc = vec![0usize; self.adj.len()];
        let mut path: Vec<usize> = Vec::new();
        let mut v = self.source;
        loop {
            if v == self.sink {
                let (bottleneck, at) = path
                    .iter()
                    .enumerate()
                    .map(|(i, &e)| (self.cap[e], i))
                    .min_by(|a, b| a.0.total_cmp(&b.0))
                    .unwrap_or((0.0, 0));
                for &e in &path {
                    self.cap[e] -= bottleneck;
                    self.cap[e ^ 1] += bottleneck;
                }
                path.truncate(at);
                v = path.last().map_or(self.source, |&e| self.to[e]);
                continue;
            }

            let mut advanced = false;
            while next_arc[v] < self.adj[v].len() {
                let e = self.adj[v][next_arc[v]];
                let w = self.to[e];
                if self.cap[e] > EPS && level[w] == level[v] + 1 {
                    path.push(e);
                    v = w;
                    advanced = true;
                    break;
                }
                next_arc[v] += 1;
            }

            if !advanced {
                if v == self.source {
                    return;
                }
                // Dead end: remove it from the level graph and retreat.
                level[v] = usize::MAX;
                if let Some(e) = path.pop() {
                    v = self.to[e ^ 1];
                    next_arc[v] += 1;
                }
            }
        }
    }

    fn reachable_from_source(&self) -> Vec<bool> {
        let mut seen = vec![false; self.adj.len()];
        seen[self.source] = true;
        let mut queue = VecDeque::from([self.source]);
        while let Some(v) = queue.pop_front() {
            for &e in &self.adj[v] {
                let w = self.to[e];
                if self.cap[e] > EPS && !seen[w] {
                    seen[w] = true;
                    queue.push_back(w);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_preference_decides_isolated_nodes() {
        let mut g = FlowGraph::new(2);
        g.add_terminal(0, 5.0, 1.0);
        g.add_terminal(1, 1.0, 5.0);
        assert_eq!(g.min_cut(), vec![true, false]);
    }

    #[test]
    fn strong_link_pulls_weak_node_along() {
        let mut g = FlowGraph::new(2);
        g.add_terminal(0, 10.0, 0.0);
        g.add_terminal(1, 0.0, 1.0);
        g.add_edge(0, 1, 100.0, 100.0);
        assert_eq!(g.min_cut(), vec![true, true]);
    }

    #[test]
    fn weak_link_is_cut() {
        let mut g = FlowGraph::new(2);
        g.add_terminal(0, 10.0, 0.0);
        g.add_terminal(1, 0.0, 10.0);
        g.add_edge(0, 1, 1.0, 1.0);
        assert_eq!(g.min_cut(), vec![true, false]);
    }

    #[test]
    fn long_chain_does_not_overflow() {
        let n = 200_000;
        let mut g = FlowGraph::new(n);
        g.add_terminal(0, 1.0, 0.0);
        g.add_terminal(n - 1, 0.0, 1.0);
        for i in 0..n - 1 {
            g.add_edge(i, i + 1, 2.0, 2.0);
        }
        let side = g.min_cut();
        // The source edge saturates first, leaving every node on the sink side.
        assert_eq!(side.iter().filter(|&&s| s).count(), 0);
    }

    #[test]
    fn directed_edge_cut_is_cheapest_labelling() {
        // Cheapest labelling is (source, sink) at 2 + 2 + 0.5.
        let mut g = FlowGraph::new(2);
        g.add_terminal(0, 4.0, 2.0);
        g.add_terminal(1, 2.0, 3.0);
        g.add_edge(0, 1, 0.5, 0.0);
        let side = g.min_cut();
        assert_eq!(side, vec![true, false]);
    }
}
