//! Deferred computation graph.
//!
//! Building an expression only appends a node and infers its shape; nothing is
//! evaluated until a [`Session`](crate::Session) runs it. Because values are
//! deferred, the backward pass can be expressed with the same graph
//! operations, which makes gradients of gradients available for free.
//!
//! # Invariants
//!
//! - Node ids increase monotonically, so id order is a topological order.
//! - Nodes are immutable once appended.
//! - Only leaves (variables and constants) carry values.
//!
//! # Example
//!
//! ```
//! use tenrim_ad::{Graph, Session};
//! use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
//!
//! let graph = Graph::<f64>::new();
//! let x = graph.variable(ArrayD::from_elem(IxDyn(&[3]), 2.0));
//! let y = graph.mul(x, x).unwrap();
//! let loss = graph.sum(y).unwrap();
//!
//! let grads = graph.gradients(loss, &[x]).unwrap();
//! let mut session = Session::new(&graph);
//! let values = session.run(&[loss, grads[0]]).unwrap();
//! assert_eq!(values[0].sum(), 12.0);
//! assert!(values[1].iter().all(|&g| g == 4.0));
//! ```

use crate::error::{GraphError, GraphResult};
use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
use std::cell::RefCell;
use std::fmt;
use tenrim_core::TtScalar;

/// Unique identifier for a node in the computation graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Opaque handle to a graph expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Expr {
    id: NodeId,
}

impl Expr {
    pub(crate) fn from_id(id: NodeId) -> Self {
        Self { id }
    }

    /// Get the node ID
    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// Operation type in the computation graph
#[derive(Debug, Clone, PartialEq)]
pub enum Operation<T> {
    /// Trainable leaf
    Variable,
    /// Non-trainable leaf
    Constant,
    /// Addition: z = x + y
    Add { lhs: NodeId, rhs: NodeId },
    /// Subtraction: z = x - y
    Sub { lhs: NodeId, rhs: NodeId },
    /// Multiplication: z = x * y (element-wise)
    Mul { lhs: NodeId, rhs: NodeId },
    /// Negation: z = -x
    Neg { input: NodeId },
    /// Multiplication by a fixed scalar: z = c * x
    Scale { input: NodeId, factor: T },
    /// Full reduction to a 0-way tensor
    Sum { input: NodeId },
    /// Single-element tensor repeated to a target shape
    Broadcast { input: NodeId },
    /// Row-major reshape
    Reshape { input: NodeId },
    /// Axis permutation
    Permute { input: NodeId, axes: Vec<usize> },
    /// Matrix multiplication: z = x @ y
    MatMul { lhs: NodeId, rhs: NodeId },
    /// Concatenation along one axis
    Concat { inputs: Vec<NodeId>, axis: usize },
    /// Contiguous range along one axis
    Slice {
        input: NodeId,
        axis: usize,
        start: usize,
        end: usize,
    },
    /// Zero padding along one axis
    Pad {
        input: NodeId,
        axis: usize,
        before: usize,
        after: usize,
    },
}

impl<T> Operation<T> {
    /// Parent nodes (inputs to this operation)
    pub fn inputs(&self) -> Vec<NodeId> {
        match self {
            Operation::Variable | Operation::Constant => Vec::new(),
            Operation::Add { lhs, rhs }
            | Operation::Sub { lhs, rhs }
            | Operation::Mul { lhs, rhs }
            | Operation::MatMul { lhs, rhs } => vec![*lhs, *rhs],
            Operation::Neg { input }
            | Operation::Scale { input, .. }
            | Operation::Sum { input }
            | Operation::Broadcast { input }
            | Operation::Reshape { input }
            | Operation::Permute { input, .. }
            | Operation::Slice { input, .. }
            | Operation::Pad { input, .. } => vec![*input],
            Operation::Concat { inputs, .. } => inputs.clone(),
        }
    }
}

/// Node in the computation graph
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    pub(crate) operation: Operation<T>,
    pub(crate) shape: Vec<usize>,
    /// Present on leaves only
    pub(crate) value: Option<ArrayD<T>>,
    pub(crate) scope: String,
}

/// Append-only expression graph
///
/// Construction goes through `&self`; the graph is meant to be built from a
/// single thread.
pub struct Graph<T> {
    nodes: RefCell<Vec<Node<T>>>,
    scopes: RefCell<Vec<String>>,
}

/// Guard returned by [`Graph::name_scope`]; the scope ends when it drops
pub struct NameScope<'g, T> {
    graph: &'g Graph<T>,
}

impl<T> Drop for NameScope<'_, T> {
    fn drop(&mut self) {
        self.graph.scopes.borrow_mut().pop();
    }
}

impl<T: TtScalar> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TtScalar> Graph<T> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(Vec::new()),
            scopes: RefCell::new(Vec::new()),
        }
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Whether no node has been appended yet
    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Open a name scope; nodes created while the guard lives are labelled
    /// with the `/`-joined scope path
    pub fn name_scope(&self, name: &str) -> NameScope<'_, T> {
        self.scopes.borrow_mut().push(name.to_string());
        NameScope { graph: self }
    }

    /// Scope path of the node behind `expr`
    pub fn scope_of(&self, expr: Expr) -> GraphResult<String> {
        self.with_node(expr.id, |node| node.scope.clone())
    }

    /// Static shape of `expr`
    pub fn shape(&self, expr: Expr) -> GraphResult<Vec<usize>> {
        self.with_node(expr.id, |node| node.shape.clone())
    }

    /// Operation that produced `expr`
    pub fn operation(&self, expr: Expr) -> GraphResult<Operation<T>> {
        self.with_node(expr.id, |node| node.operation.clone())
    }

    /// Whether `expr` is a trainable leaf
    pub fn is_variable(&self, expr: Expr) -> GraphResult<bool> {
        self.with_node(expr.id, |node| matches!(node.operation, Operation::Variable))
    }

    pub(crate) fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&Node<T>) -> R) -> GraphResult<R> {
        let nodes = self.nodes.borrow();
        nodes.get(id.0).map(f).ok_or(GraphError::UnknownNode(id))
    }

    pub(crate) fn nodes(&self) -> std::cell::Ref<'_, Vec<Node<T>>> {
        self.nodes.borrow()
    }

    fn push(&self, operation: Operation<T>, shape: Vec<usize>, value: Option<ArrayD<T>>) -> Expr {
        let scope = self.scopes.borrow().join("/");
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(Node {
            operation,
            shape,
            value,
            scope,
        });
        Expr { id }
    }

    // ===== Leaves =====

    /// Trainable leaf holding `value`
    pub fn variable(&self, value: ArrayD<T>) -> Expr {
        let shape = value.shape().to_vec();
        self.push(Operation::Variable, shape, Some(value))
    }

    /// Non-trainable leaf holding `value`
    pub fn constant(&self, value: ArrayD<T>) -> Expr {
        let shape = value.shape().to_vec();
        self.push(Operation::Constant, shape, Some(value))
    }

    /// Zero constant of the given shape
    pub fn zeros(&self, shape: &[usize]) -> Expr {
        self.constant(ArrayD::zeros(IxDyn(shape)))
    }

    /// Constant of ones with the given shape
    pub fn ones(&self, shape: &[usize]) -> Expr {
        self.constant(ArrayD::ones(IxDyn(shape)))
    }

    /// 0-way constant
    pub fn scalar(&self, value: T) -> Expr {
        self.constant(ArrayD::from_elem(IxDyn(&[]), value))
    }

    // ===== Element-wise =====

    /// Addition: z = x + y
    pub fn add(&self, lhs: Expr, rhs: Expr) -> GraphResult<Expr> {
        let shape = self.same_shape("add", lhs, rhs)?;
        Ok(self.push(
            Operation::Add {
                lhs: lhs.id,
                rhs: rhs.id,
            },
            shape,
            None,
        ))
    }

    /// Subtraction: z = x - y
    pub fn sub(&self, lhs: Expr, rhs: Expr) -> GraphResult<Expr> {
        let shape = self.same_shape("sub", lhs, rhs)?;
        Ok(self.push(
            Operation::Sub {
                lhs: lhs.id,
                rhs: rhs.id,
            },
            shape,
            None,
        ))
    }

    /// Element-wise multiplication: z = x * y
    pub fn mul(&self, lhs: Expr, rhs: Expr) -> GraphResult<Expr> {
        let shape = self.same_shape("mul", lhs, rhs)?;
        Ok(self.push(
            Operation::Mul {
                lhs: lhs.id,
                rhs: rhs.id,
            },
            shape,
            None,
        ))
    }

    /// Negation: z = -x
    pub fn neg(&self, input: Expr) -> GraphResult<Expr> {
        let shape = self.shape(input)?;
        Ok(self.push(Operation::Neg { input: input.id }, shape, None))
    }

    /// Multiplication by a fixed scalar
    pub fn scale(&self, input: Expr, factor: T) -> GraphResult<Expr> {
        let shape = self.shape(input)?;
        Ok(self.push(
            Operation::Scale {
                input: input.id,
                factor,
            },
            shape,
            None,
        ))
    }

    /// Sum of all entries, as a 0-way tensor
    pub fn sum(&self, input: Expr) -> GraphResult<Expr> {
        self.shape(input)?;
        Ok(self.push(Operation::Sum { input: input.id }, Vec::new(), None))
    }

    /// Repeat a single-element tensor to `shape`
    pub fn broadcast(&self, input: Expr, shape: &[usize]) -> GraphResult<Expr> {
        let input_shape = self.shape(input)?;
        if numel(&input_shape) != 1 {
            return Err(GraphError::ShapeMismatch(format!(
                "Only single-element tensors broadcast, got {:?}",
                input_shape
            )));
        }
        Ok(self.push(
            Operation::Broadcast { input: input.id },
            shape.to_vec(),
            None,
        ))
    }

    /// Multiply `input` by the single-element tensor `scalar`
    pub fn scalar_mul(&self, scalar: Expr, input: Expr) -> GraphResult<Expr> {
        let shape = self.shape(input)?;
        let repeated = self.broadcast(scalar, &shape)?;
        self.mul(repeated, input)
    }

    /// Sum of several same-shaped expressions
    pub fn add_n(&self, terms: &[Expr]) -> GraphResult<Expr> {
        let (first, rest) = terms.split_first().ok_or_else(|| {
            GraphError::ShapeMismatch("add_n needs at least one term".to_string())
        })?;
        rest.iter().try_fold(*first, |acc, &term| self.add(acc, term))
    }

    /// Flat inner product of two same-shaped expressions, as a 0-way tensor
    pub fn dot(&self, lhs: Expr, rhs: Expr) -> GraphResult<Expr> {
        let product = self.mul(lhs, rhs)?;
        self.sum(product)
    }

    // ===== Layout =====

    /// Row-major reshape
    pub fn reshape(&self, input: Expr, shape: &[usize]) -> GraphResult<Expr> {
        let from = self.shape(input)?;
        if numel(&from) != numel(shape) {
            return Err(GraphError::Reshape {
                from,
                to: shape.to_vec(),
            });
        }
        Ok(self.push(
            Operation::Reshape { input: input.id },
            shape.to_vec(),
            None,
        ))
    }

    /// Permute axes: output axis `k` is input axis `axes[k]`
    pub fn permute(&self, input: Expr, axes: &[usize]) -> GraphResult<Expr> {
        let input_shape = self.shape(input)?;
        let mut seen = vec![false; input_shape.len()];
        if axes.len() != input_shape.len() {
            return Err(GraphError::InvalidPermutation(axes.to_vec()));
        }
        for &axis in axes {
            if axis >= seen.len() || seen[axis] {
                return Err(GraphError::InvalidPermutation(axes.to_vec()));
            }
            seen[axis] = true;
        }
        let shape = axes.iter().map(|&a| input_shape[a]).collect();
        Ok(self.push(
            Operation::Permute {
                input: input.id,
                axes: axes.to_vec(),
            },
            shape,
            None,
        ))
    }

    /// Matrix transpose
    pub fn transpose(&self, input: Expr) -> GraphResult<Expr> {
        let shape = self.shape(input)?;
        if shape.len() != 2 {
            return Err(GraphError::ShapeMismatch(format!(
                "Transpose expects a matrix, got shape {:?}",
                shape
            )));
        }
        self.permute(input, &[1, 0])
    }

    /// Matrix multiplication: z = x @ y
    pub fn matmul(&self, lhs: Expr, rhs: Expr) -> GraphResult<Expr> {
        let a = self.shape(lhs)?;
        let b = self.shape(rhs)?;
        if a.len() != 2 || b.len() != 2 || a[1] != b[0] {
            return Err(GraphError::ShapeMismatch(format!(
                "Cannot multiply {:?} by {:?}",
                a, b
            )));
        }
        Ok(self.push(
            Operation::MatMul {
                lhs: lhs.id,
                rhs: rhs.id,
            },
            vec![a[0], b[1]],
            None,
        ))
    }

    /// Concatenate along `axis`; all other extents must agree
    pub fn concat(&self, inputs: &[Expr], axis: usize) -> GraphResult<Expr> {
        let first = inputs.first().ok_or_else(|| {
            GraphError::ShapeMismatch("concat needs at least one input".to_string())
        })?;
        let mut shape = self.shape(*first)?;
        if axis >= shape.len() {
            return Err(GraphError::InvalidAxis {
                axis,
                ndim: shape.len(),
            });
        }

        for input in &inputs[1..] {
            let other = self.shape(*input)?;
            let compatible = other.len() == shape.len()
                && other
                    .iter()
                    .zip(&shape)
                    .enumerate()
                    .all(|(k, (a, b))| k == axis || a == b);
            if !compatible {
                return Err(GraphError::ShapeMismatch(format!(
                    "Cannot concatenate {:?} with {:?} along axis {}",
                    shape, other, axis
                )));
            }
            shape[axis] += other[axis];
        }

        Ok(self.push(
            Operation::Concat {
                inputs: inputs.iter().map(|e| e.id).collect(),
                axis,
            },
            shape,
            None,
        ))
    }

    /// Entries `start..end` along `axis`
    pub fn slice(&self, input: Expr, axis: usize, start: usize, end: usize) -> GraphResult<Expr> {
        let mut shape = self.shape(input)?;
        let dim = *shape.get(axis).ok_or(GraphError::InvalidAxis {
            axis,
            ndim: shape.len(),
        })?;
        if start > end || end > dim {
            return Err(GraphError::InvalidSlice(format!(
                "{}..{} out of bounds for axis {} of length {}",
                start, end, axis, dim
            )));
        }
        shape[axis] = end - start;
        Ok(self.push(
            Operation::Slice {
                input: input.id,
                axis,
                start,
                end,
            },
            shape,
            None,
        ))
    }

    /// Zero padding with `before` and `after` entries along `axis`
    pub fn pad(&self, input: Expr, axis: usize, before: usize, after: usize) -> GraphResult<Expr> {
        let mut shape = self.shape(input)?;
        let ndim = shape.len();
        let dim = shape
            .get_mut(axis)
            .ok_or(GraphError::InvalidAxis { axis, ndim })?;
        *dim += before + after;
        Ok(self.push(
            Operation::Pad {
                input: input.id,
                axis,
                before,
                after,
            },
            shape,
            None,
        ))
    }

    fn same_shape(&self, op: &str, lhs: Expr, rhs: Expr) -> GraphResult<Vec<usize>> {
        let a = self.shape(lhs)?;
        let b = self.shape(rhs)?;
        if a != b {
            return Err(GraphError::ShapeMismatch(format!(
                "{}: {:?} vs {:?}",
                op, a, b
            )));
        }
        Ok(a)
    }
}

/// Number of elements of a shape (1 for the 0-way shape)
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}
