//! XGBoost native JSON model loading.
//!
//! Only the parts of the schema needed for single-target regression with
//! numerical splits are modelled. XGBoost writes most scalar parameters as
//! strings (`"num_nodes": "7"`, `"base_score": "5E-1"`, and since 2.1
//! `"base_score": "[5E-1]"`), so those go through a lenient number parser.

use serde::Deserialize;

use crate::models::tree::{Forest, OutputTransform, RegressionTree};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("unsupported booster '{0}': only gbtree models are supported")]
    UnsupportedBooster(String),
    #[error("unsupported objective '{0}'")]
    UnsupportedObjective(String),
    #[error("multi-output models are not supported (num_class={num_class}, num_target={num_target})")]
    MultiOutput { num_class: u32, num_target: u32 },
    #[error("invalid numeric parameter {name}: '{value}'")]
    InvalidParam { name: &'static str, value: String },
    #[error("tree {0} has no nodes")]
    EmptyTree(usize),
    #[error("tree {tree}: array '{array}' has {len} entries, expected {num_nodes}")]
    ArrayLength {
        tree: usize,
        array: &'static str,
        len: usize,
        num_nodes: usize,
    },
    #[error("tree {tree}: node {node} references child {child} but tree has {num_nodes} nodes")]
    InvalidNodeIndex {
        tree: usize,
        node: usize,
        child: i64,
        num_nodes: usize,
    },
    #[error("tree {tree}: node {node} splits on negative feature index {index}")]
    NegativeFeatureIndex { tree: usize, node: usize, index: i64 },
    #[error("tree {tree}: node {node} uses a categorical split")]
    CategoricalSplit { tree: usize, node: usize },
    #[error("model splits on feature {index} but only {available} features exist")]
    FeatureOutOfRange { index: u32, available: usize },
}

/// A number XGBoost may have written as a JSON number or as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LenientNumber {
    Number(f64),
    Text(String),
}

impl LenientNumber {
    fn to_f64(&self, name: &'static str) -> Result<f64, ModelError> {
        match self {
            LenientNumber::Number(n) => Ok(*n),
            LenientNumber::Text(s) => s
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .trim()
                .parse()
                .map_err(|_| ModelError::InvalidParam {
                    name,
                    value: s.clone(),
                }),
        }
    }
}

/// Booleans are `0`/`1` in XGBoost 1.x and may be `true`/`false` elsewhere.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum LenientBool {
    Bool(bool),
    Int(i64),
}

impl LenientBool {
    fn get(self) -> bool {
        match self {
            LenientBool::Bool(b) => b,
            LenientBool::Int(i) => i != 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct XgbModel {
    pub learner: Learner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Learner {
    pub gradient_booster: GradientBooster,
    pub learner_model_param: LearnerModelParam,
    pub objective: Objective,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearnerModelParam {
    pub base_score: LenientNumber,
    #[serde(default)]
    pub num_class: Option<LenientNumber>,
    #[serde(default)]
    pub num_target: Option<LenientNumber>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Objective {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GradientBooster {
    pub name: String,
    #[serde(default)]
    pub model: Option<ModelTrees>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTrees {
    pub trees: Vec<Tree>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub tree_param: TreeParam,
    pub left_children: Vec<i64>,
    pub right_children: Vec<i64>,
    pub split_indices: Vec<i64>,
    pub split_conditions: Vec<f32>,
    pub default_left: Vec<LenientBool>,
    #[serde(default)]
    pub split_type: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeParam {
    pub num_nodes: LenientNumber,
}

fn transform_for(objective: &str) -> Result<OutputTransform, ModelError> {
    match objective {
        "reg:squarederror" | "reg:linear" | "reg:absoluteerror" | "reg:quantileerror"
        | "reg:pseudohubererror" => Ok(OutputTransform::Identity),
        "reg:logistic" | "binary:logistic" => Ok(OutputTransform::Sigmoid),
        "reg:gamma" | "reg:tweedie" | "count:poisson" => Ok(OutputTransform::Exp),
        other => Err(ModelError::UnsupportedObjective(other.to_string())),
    }
}

/// `base_score` is stored in output space; the forest sums in margin space.
fn base_margin(base_score: f32, transform: OutputTransform) -> f32 {
    match transform {
        OutputTransform::Identity => base_score,
        OutputTransform::Sigmoid => {
            let p = base_score.clamp(1e-7, 1.0 - 1e-7);
            (p / (1.0 - p)).ln()
        }
        OutputTransform::Exp => base_score.max(1e-7).ln(),
    }
}

impl XgbModel {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Convert to a native forest, rejecting anything the facade cannot evaluate.
    pub fn to_forest(&self, num_features: usize) -> Result<Forest, ModelError> {
        let learner = &self.learner;
        if learner.gradient_booster.name != "gbtree" {
            return Err(ModelError::UnsupportedBooster(
                learner.gradient_booster.name.clone(),
            ));
        }

        let params = &learner.learner_model_param;
        let num_class = optional_count(params.num_class.as_ref(), "num_class")?;
        let num_target = optional_count(params.num_target.as_ref(), "num_target")?;
        if num_class > 1 || num_target > 1 {
            return Err(ModelError::MultiOutput {
                num_class,
                num_target,
            });
        }

        let transform = transform_for(&learner.objective.name)?;
        let base_score = params.base_score.to_f64("base_score")? as f32;
        let mut forest = Forest::new(base_margin(base_score, transform), transform);

        let trees = learner
            .gradient_booster
            .model
            .as_ref()
            .map(|m| m.trees.as_slice())
            .unwrap_or_default();
        for (tree_idx, tree) in trees.iter().enumerate() {
            forest.push_tree(convert_tree(tree, tree_idx)?);
        }

        if let Some(index) = forest.max_split_index() {
            if index as usize >= num_features {
                return Err(ModelError::FeatureOutOfRange {
                    index,
                    available: num_features,
                });
            }
        }

        Ok(forest)
    }
}

fn optional_count(value: Option<&LenientNumber>, name: &'static str) -> Result<u32, ModelError> {
    match value {
        Some(v) => Ok(v.to_f64(name)?.max(0.0) as u32),
        None => Ok(0),
    }
}

fn convert_tree(tree: &Tree, tree_idx: usize) -> Result<RegressionTree, ModelError> {
    let num_nodes = tree.tree_param.num_nodes.to_f64("num_nodes")? as usize;
    if num_nodes == 0 {
        return Err(ModelError::EmptyTree(tree_idx));
    }

    let lengths = [
        ("left_children", tree.left_children.len()),
        ("right_children", tree.right_children.len()),
        ("split_indices", tree.split_indices.len()),
        ("split_conditions", tree.split_conditions.len()),
        ("default_left", tree.default_left.len()),
    ];
    for (array, len) in lengths {
        if len != num_nodes {
            return Err(ModelError::ArrayLength {
                tree: tree_idx,
                array,
                len,
                num_nodes,
            });
        }
    }

    let child_index = |node: usize, child: i64| -> Result<u32, ModelError> {
        // Children always follow their parent; anything else could cycle.
        if child <= node as i64 || child as usize >= num_nodes {
            return Err(ModelError::InvalidNodeIndex {
                tree: tree_idx,
                node,
                child,
                num_nodes,
            });
        }
        Ok(child as u32)
    };

    let mut split_indices = Vec::with_capacity(num_nodes);
    let mut left = Vec::with_capacity(num_nodes);
    let mut right = Vec::with_capacity(num_nodes);
    let mut default_left = Vec::with_capacity(num_nodes);
    let mut is_leaf = Vec::with_capacity(num_nodes);

    for node in 0..num_nodes {
        // XGBoost marks leaves with a left child of -1; the leaf value lives in
        // `split_conditions`.
        if tree.left_children[node] == -1 {
            split_indices.push(0);
            left.push(0);
            right.push(0);
            default_left.push(false);
            is_leaf.push(true);
            continue;
        }

        if tree.split_type.get(node).copied().unwrap_or(0) != 0 {
            return Err(ModelError::CategoricalSplit {
                tree: tree_idx,
                node,
            });
        }

        left.push(child_index(node, tree.left_children[node])?);
        right.push(child_index(node, tree.right_children[node])?);
        let feature = tree.split_indices[node];
        if feature < 0 {
            return Err(ModelError::NegativeFeatureIndex {
                tree: tree_idx,
                node,
                index: feature,
            });
        }
        split_indices.push(feature as u32);
        default_left.push(tree.default_left[node].get());
        is_leaf.push(false);
    }

    Ok(RegressionTree::new(
        split_indices,
        tree.split_conditions.clone(),
        left,
        right,
        default_left,
        is_leaf,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn load_fixture(name: &str) -> XgbModel {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/bundle")
            .join(name);
        let json = std::fs::read_to_string(&path).expect("read fixture model");
        XgbModel::from_json_str(&json).expect("parse fixture model")
    }

    fn stump_json(objective: &str, base_score: &str, split_index: i64) -> String {
        format!(
            r#"{{
              "learner": {{
                "gradient_booster": {{
                  "name": "gbtree",
                  "model": {{ "trees": [{{
                    "tree_param": {{ "num_nodes": "3" }},
                    "left_children": [1, -1, -1],
                    "right_children": [2, -1, -1],
                    "split_indices": [{split_index}, 0, 0],
                    "split_conditions": [0.5, -1.0, 1.0],
                    "default_left": [1, 0, 0],
                    "split_type": [0, 0, 0]
                  }}] }}
                }},
                "learner_model_param": {{ "base_score": {base_score}, "num_class": "0", "num_target": "1" }},
                "objective": {{ "name": "{objective}" }}
              }},
              "version": [2, 0, 3]
            }}"#
        )
    }

    #[test]
    fn converts_fixture_primary_model() {
        let forest = load_fixture("xgboost_model.json").to_forest(3).unwrap();
        assert_eq!(forest.num_trees(), 2);
        assert_eq!(forest.base_score(), 0.5);
        // Syrian Arab Rep. -> Germany, Government: [1, 3, 0].
        let y = forest.predict_row(&[1.0, 3.0, 0.0]);
        assert!((y - 0.75).abs() < 1e-6, "got {y}");
    }

    #[test]
    fn base_score_accepts_bracketed_strings() {
        let model = XgbModel::from_json_str(&stump_json("reg:squarederror", "\"[2.5E-1]\"", 0)).unwrap();
        let forest = model.to_forest(3).unwrap();
        assert_eq!(forest.base_score(), 0.25);
        assert!((forest.predict_row(&[0.0, 0.0, 0.0]) - (-0.75)).abs() < 1e-6);
        assert!((forest.predict_row(&[f32::NAN, 0.0, 0.0]) - (-0.75)).abs() < 1e-6);
        assert!((forest.predict_row(&[1.0, 0.0, 0.0]) - 1.25).abs() < 1e-6);
    }

    #[test]
    fn logistic_base_score_is_converted_to_margin() {
        let model = XgbModel::from_json_str(&stump_json("reg:logistic", "0.5", 0)).unwrap();
        let forest = model.to_forest(3).unwrap();
        assert!(forest.base_score().abs() < 1e-6);
        assert_eq!(forest.transform(), OutputTransform::Sigmoid);
    }

    #[test]
    fn rejects_unknown_objective() {
        let model = XgbModel::from_json_str(&stump_json("rank:pairwise", "0.5", 0)).unwrap();
        assert!(matches!(
            model.to_forest(3),
            Err(ModelError::UnsupportedObjective(name)) if name == "rank:pairwise"
        ));
    }

    #[test]
    fn rejects_splits_beyond_feature_vector() {
        let model = XgbModel::from_json_str(&stump_json("reg:squarederror", "0.5", 3)).unwrap();
        assert!(matches!(
            model.to_forest(3),
            Err(ModelError::FeatureOutOfRange { index: 3, available: 3 })
        ));
    }

    #[test]
    fn rejects_dangling_child_index() {
        let json = stump_json("reg:squarederror", "0.5", 0).replace("[2, -1, -1]", "[7, -1, -1]");
        let model = XgbModel::from_json_str(&json).unwrap();
        assert!(matches!(
            model.to_forest(3),
            Err(ModelError::InvalidNodeIndex { child: 7, .. })
        ));
    }

    #[test]
    fn rejects_child_pointing_back_to_its_parent() {
        let json = stump_json("reg:squarederror", "0.5", 0).replace("[1, -1, -1]", "[0, -1, -1]");
        let model = XgbModel::from_json_str(&json).unwrap();
        assert!(matches!(
            model.to_forest(3),
            Err(ModelError::InvalidNodeIndex { node: 0, child: 0, .. })
        ));
    }

    #[test]
    fn rejects_negative_split_feature() {
        let model = XgbModel::from_json_str(&stump_json("reg:squarederror", "0.5", -1)).unwrap();
        assert!(matches!(
            model.to_forest(3),
            Err(ModelError::NegativeFeatureIndex { index: -1, .. })
        ));
    }

    #[test]
    fn rejects_gblinear() {
        let json = stump_json("reg:squarederror", "0.5", 0).replace("\"gbtree\"", "\"gblinear\"");
        let model = XgbModel::from_json_str(&json).unwrap();
        assert!(matches!(model.to_forest(3), Err(ModelError::UnsupportedBooster(_))));
    }
}
