//! Regression tree ensembles.
//!
//! Trees are stored structure-of-arrays: one flat array per node attribute,
//! indexed by node id with the root at 0. The forest adds a base score to the
//! sum of leaf values and then applies the objective's output transform.

/// Output transform applied to the raw margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTransform {
    Identity,
    Sigmoid,
    Exp,
}

impl OutputTransform {
    pub fn apply(self, margin: f32) -> f32 {
        match self {
            OutputTransform::Identity => margin,
            OutputTransform::Sigmoid => 1.0 / (1.0 + (-margin).exp()),
            OutputTransform::Exp => margin.exp(),
        }
    }
}

/// A single regression tree with numerical splits.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    split_indices: Box<[u32]>,
    /// Split threshold for internal nodes, leaf value for leaves.
    values: Box<[f32]>,
    left_children: Box<[u32]>,
    right_children: Box<[u32]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
}

impl RegressionTree {
    /// Build a tree from parallel per-node arrays.
    ///
    /// All arrays must have the same length and child indices must point inside
    /// the tree; the XGBoost converter validates both before calling this.
    pub fn new(
        split_indices: Vec<u32>,
        values: Vec<f32>,
        left_children: Vec<u32>,
        right_children: Vec<u32>,
        default_left: Vec<bool>,
        is_leaf: Vec<bool>,
    ) -> Self {
        debug_assert_eq!(split_indices.len(), values.len());
        debug_assert_eq!(split_indices.len(), left_children.len());
        debug_assert_eq!(split_indices.len(), right_children.len());
        debug_assert_eq!(split_indices.len(), default_left.len());
        debug_assert_eq!(split_indices.len(), is_leaf.len());

        Self {
            split_indices: split_indices.into_boxed_slice(),
            values: values.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            default_left: default_left.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
        }
    }

    /// A tree consisting of a single leaf.
    pub fn leaf(value: f32) -> Self {
        Self::new(vec![0], vec![value], vec![0], vec![0], vec![false], vec![true])
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Largest feature index used by any split, if the tree has splits.
    pub fn max_split_index(&self) -> Option<u32> {
        self.split_indices
            .iter()
            .zip(self.is_leaf.iter())
            .filter(|(_, leaf)| !**leaf)
            .map(|(idx, _)| *idx)
            .max()
    }

    /// Walk from the root to a leaf and return its value.
    ///
    /// `x < threshold` goes left; NaN or out-of-range features follow the
    /// node's default direction.
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        let mut idx = 0usize;
        while !self.is_leaf[idx] {
            let fvalue = features
                .get(self.split_indices[idx] as usize)
                .copied()
                .unwrap_or(f32::NAN);
            let go_left = if fvalue.is_nan() {
                self.default_left[idx]
            } else {
                fvalue < self.values[idx]
            };
            idx = if go_left {
                self.left_children[idx] as usize
            } else {
                self.right_children[idx] as usize
            };
        }
        self.values[idx]
    }
}

/// Additive tree ensemble for single-output regression.
#[derive(Debug, Clone)]
pub struct Forest {
    trees: Vec<RegressionTree>,
    /// Base score in margin space.
    base_score: f32,
    transform: OutputTransform,
}

impl Forest {
    pub fn new(base_score: f32, transform: OutputTransform) -> Self {
        Self {
            trees: Vec::new(),
            base_score,
            transform,
        }
    }

    pub fn push_tree(&mut self, tree: RegressionTree) {
        self.trees.push(tree);
    }

    pub fn with_trees(mut self, trees: impl IntoIterator<Item = RegressionTree>) -> Self {
        self.trees.extend(trees);
        self
    }

    #[inline]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn base_score(&self) -> f32 {
        self.base_score
    }

    #[inline]
    pub fn transform(&self) -> OutputTransform {
        self.transform
    }

    pub fn max_split_index(&self) -> Option<u32> {
        self.trees.iter().filter_map(RegressionTree::max_split_index).max()
    }

    /// Predict a single row.
    pub fn predict_row(&self, features: &[f32]) -> f64 {
        let margin = self
            .trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.predict_row(features));
        f64::from(self.transform.apply(margin))
    }
}
