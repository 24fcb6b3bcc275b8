use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Growth limits for a single regression tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

/// CART regression tree with squared-error splits. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grows a tree on the rows of `x` listed in `samples`. Repeated indices
    /// count as repeated rows (bootstrap draws).
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        samples: &[usize],
        params: &TreeParams,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(&x, &y, samples.to_vec(), 0, params);
        tree
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    fn grow(
        &mut self,
        x: &ArrayView2<'_, f64>,
        y: &ArrayView1<'_, f64>,
        samples: Vec<usize>,
        depth: usize,
        params: &TreeParams,
    ) -> usize {
        let value = samples.iter().map(|&i| y[i]).sum::<f64>() / samples.len() as f64;
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value });

        let depth_left = params.max_depth.map_or(true, |max| depth < max);
        if !depth_left || samples.len() < params.min_samples_split.max(2) {
            return id;
        }
        let Some(split) = best_split(x, y, &samples, params.min_samples_leaf.max(1)) else {
            return id;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| x[[i, split.feature]] <= split.threshold);
        if left.is_empty() || right.is_empty() {
            return id;
        }

        let left_id = self.grow(x, y, left, depth + 1, params);
        let right_id = self.grow(x, y, right, depth + 1, params);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        id
    }
}

/// Maximises sum_l^2/n_l + sum_r^2/n_r, which minimises the children's
/// total squared error.
fn best_split(
    x: &ArrayView2<'_, f64>,
    y: &ArrayView1<'_, f64>,
    samples: &[usize],
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = samples.len();
    let total: f64 = samples.iter().map(|&i| y[i]).sum();
    let parent_score = total * total / n as f64;
    let tolerance = 1e-12 * parent_score.abs().max(1.0);

    let mut best: Option<SplitCandidate> = None;
    let mut order: Vec<usize> = samples.to_vec();

    for feature in 0..x.ncols() {
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let mut left_sum = 0.0;
        for pos in 1..n {
            left_sum += y[order[pos - 1]];
            let lo = x[[order[pos - 1], feature]];
            let hi = x[[order[pos], feature]];
            if lo >= hi || pos < min_leaf || n - pos < min_leaf {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / pos as f64 + right_sum * right_sum / (n - pos) as f64;
            let beats = match &best {
                Some(b) => score > b.score,
                None => score > parent_score + tolerance,
            };
            if beats {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }
    best
}
