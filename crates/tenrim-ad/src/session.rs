//! Evaluation phase for deferred graphs.

use crate::error::{GraphError, GraphResult};
use crate::graph::{Expr, Graph, Node, NodeId, Operation};
use scirs2_core::ndarray::{concatenate, ArrayViewD, Slice};
use scirs2_core::ndarray_ext::{ArrayD, Axis, Ix2, IxDyn};
use std::collections::HashMap;
use tenrim_core::TtScalar;
use tracing::debug;

/// Evaluates graph expressions, memoizing every computed node
///
/// A session borrows its graph, so no node can be appended while values are
/// being computed. Values computed by one `run` are reused by the next.
pub struct Session<'g, T> {
    graph: &'g Graph<T>,
    cache: HashMap<NodeId, ArrayD<T>>,
}

impl<'g, T: TtScalar> Session<'g, T> {
    /// Create a session with an empty cache
    pub fn new(graph: &'g Graph<T>) -> Self {
        Self {
            graph,
            cache: HashMap::new(),
        }
    }

    /// The graph this session evaluates
    pub fn graph(&self) -> &'g Graph<T> {
        self.graph
    }

    /// Evaluate `outputs`, computing each required node once in id order
    pub fn run(&mut self, outputs: &[Expr]) -> GraphResult<Vec<ArrayD<T>>> {
        let graph = self.graph;
        let nodes = graph.nodes();
        let Some(last) = outputs.iter().map(|e| e.id().0).max() else {
            return Ok(Vec::new());
        };
        if last >= nodes.len() {
            return Err(GraphError::UnknownNode(NodeId(last)));
        }

        let mut needed = vec![false; last + 1];
        for output in outputs {
            needed[output.id().0] = true;
        }
        for i in (0..=last).rev() {
            if needed[i] && !self.cache.contains_key(&NodeId(i)) {
                for parent in nodes[i].operation.inputs() {
                    needed[parent.0] = true;
                }
            }
        }

        let mut computed = 0usize;
        for i in 0..=last {
            let id = NodeId(i);
            if needed[i] && !self.cache.contains_key(&id) {
                let value = self.evaluate(&nodes[i])?;
                self.cache.insert(id, value);
                computed += 1;
            }
        }
        debug!(computed, cached = self.cache.len(), "session run");

        outputs
            .iter()
            .map(|e| {
                self.cache
                    .get(&e.id())
                    .cloned()
                    .ok_or(GraphError::UnknownNode(e.id()))
            })
            .collect()
    }

    /// Evaluate a single-element expression
    pub fn scalar(&mut self, expr: Expr) -> GraphResult<T> {
        let value = self
            .run(&[expr])?
            .pop()
            .ok_or(GraphError::UnknownNode(expr.id()))?;
        if value.len() != 1 {
            return Err(GraphError::NotScalar(value.shape().to_vec()));
        }
        value
            .iter()
            .next()
            .copied()
            .ok_or_else(|| GraphError::NotScalar(value.shape().to_vec()))
    }

    fn input(&self, id: NodeId) -> GraphResult<&ArrayD<T>> {
        self.cache.get(&id).ok_or_else(|| {
            GraphError::Evaluation(format!("{} evaluated before its input", id))
        })
    }

    fn evaluate(&self, node: &Node<T>) -> GraphResult<ArrayD<T>> {
        let value = match &node.operation {
            Operation::Variable | Operation::Constant => node
                .value
                .clone()
                .ok_or_else(|| GraphError::Evaluation("Leaf without a value".to_string()))?,
            Operation::Add { lhs, rhs } => self.input(*lhs)? + self.input(*rhs)?,
            Operation::Sub { lhs, rhs } => self.input(*lhs)? - self.input(*rhs)?,
            Operation::Mul { lhs, rhs } => self.input(*lhs)? * self.input(*rhs)?,
            Operation::Neg { input } => self.input(*input)?.mapv(|v| -v),
            Operation::Scale { input, factor } => self.input(*input)? * *factor,
            Operation::Sum { input } => ArrayD::from_elem(IxDyn(&[]), self.input(*input)?.sum()),
            Operation::Broadcast { input } => {
                let source = self.input(*input)?;
                let element = source.iter().next().copied().ok_or_else(|| {
                    GraphError::Evaluation("Broadcast of an empty tensor".to_string())
                })?;
                ArrayD::from_elem(IxDyn(&node.shape), element)
            }
            Operation::Reshape { input } => {
                let source = self.input(*input)?;
                ArrayD::from_shape_vec(IxDyn(&node.shape), source.iter().cloned().collect())
                    .map_err(|_| GraphError::Reshape {
                        from: source.shape().to_vec(),
                        to: node.shape.clone(),
                    })?
            }
            Operation::Permute { input, axes } => self
                .input(*input)?
                .view()
                .permuted_axes(IxDyn(axes))
                .as_standard_layout()
                .into_owned(),
            Operation::MatMul { lhs, rhs } => {
                let a = self
                    .input(*lhs)?
                    .view()
                    .into_dimensionality::<Ix2>()
                    .map_err(|e| GraphError::Evaluation(e.to_string()))?;
                let b = self
                    .input(*rhs)?
                    .view()
                    .into_dimensionality::<Ix2>()
                    .map_err(|e| GraphError::Evaluation(e.to_string()))?;
                a.dot(&b).into_dyn()
            }
            Operation::Concat { inputs, axis } => {
                let views = inputs
                    .iter()
                    .map(|id| self.input(*id).map(|a| a.view()))
                    .collect::<GraphResult<Vec<ArrayViewD<'_, T>>>>()?;
                concatenate(Axis(*axis), &views)
                    .map_err(|e| GraphError::Evaluation(e.to_string()))?
            }
            Operation::Slice {
                input,
                axis,
                start,
                end,
            } => self
                .input(*input)?
                .slice_axis(Axis(*axis), Slice::from(*start..*end))
                .to_owned(),
            Operation::Pad {
                input,
                axis,
                before,
                ..
            } => {
                let source = self.input(*input)?;
                let mut padded = ArrayD::zeros(IxDyn(&node.shape));
                let len = source.shape()[*axis];
                padded
                    .slice_axis_mut(Axis(*axis), Slice::from(*before..*before + len))
                    .assign(source);
                padded
            }
        };

        if value.shape() != node.shape.as_slice() {
            return Err(GraphError::Evaluation(format!(
                "Computed shape {:?} differs from inferred shape {:?}",
                value.shape(),
                node.shape
            )));
        }
        Ok(value)
    }
}
