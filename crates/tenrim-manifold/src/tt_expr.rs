//! Tensor Trains whose cores are graph expressions
//!
//! A [`TtExpr`] has the same chain structure as a
//! [`TensorTrain`](tenrim_core::TensorTrain) but its cores are [`Expr`]
//! handles, so every function written against it is differentiable with
//! respect to the cores. Core shapes are static and validated with the same
//! rules as concrete TTs.

use crate::error::{ManifoldError, ManifoldResult};
use std::fmt;
use tenrim_ad::{Expr, Graph, Session};
use tenrim_core::{tt_ranks_of, validate_core_shapes, TensorTrain, TtScalar};

/// TT with cores living in a [`Graph`]
#[derive(Clone)]
pub struct TtExpr<'g, T> {
    graph: &'g Graph<T>,
    cores: Vec<Expr>,
    shapes: Vec<Vec<usize>>,
}

impl<T> fmt::Debug for TtExpr<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtExpr")
            .field("cores", &self.cores)
            .field("shapes", &self.shapes)
            .finish()
    }
}

impl<'g, T: TtScalar> TtExpr<'g, T> {
    /// Embed a concrete TT as constant cores
    pub fn constant(graph: &'g Graph<T>, tt: &TensorTrain<T>) -> Self {
        let cores = tt
            .cores()
            .iter()
            .map(|core| graph.constant(core.clone()))
            .collect();
        Self {
            graph,
            cores,
            shapes: tt.core_shapes(),
        }
    }

    /// Build a TT from core expressions, validating the chain structure
    pub fn from_cores(graph: &'g Graph<T>, cores: Vec<Expr>) -> ManifoldResult<Self> {
        let shapes = cores
            .iter()
            .map(|core| graph.shape(*core))
            .collect::<Result<Vec<_>, _>>()?;
        validate_core_shapes(&shapes)?;
        Ok(Self {
            graph,
            cores,
            shapes,
        })
    }

    /// Graph the cores live in
    pub fn graph(&self) -> &'g Graph<T> {
        self.graph
    }

    /// Core expressions in chain order
    pub fn cores(&self) -> &[Expr] {
        &self.cores
    }

    /// Core `k`
    pub fn core(&self, k: usize) -> Expr {
        self.cores[k]
    }

    /// Static shape of core `k`
    pub fn core_shape(&self, k: usize) -> &[usize] {
        &self.shapes[k]
    }

    /// Static shapes of all cores
    pub fn core_shapes(&self) -> &[Vec<usize>] {
        &self.shapes
    }

    /// Number of TT-cores
    pub fn ndims(&self) -> usize {
        self.cores.len()
    }

    /// Whether the cores are 4-way (TT-matrix)
    pub fn is_tt_matrix(&self) -> bool {
        self.shapes[0].len() == 4
    }

    /// TT-ranks including the boundary ranks
    pub fn tt_ranks(&self) -> Vec<usize> {
        tt_ranks_of(&self.shapes)
    }

    /// Mode sizes per core: `[n]` for tensors, `[n, m]` for TT-matrices
    pub fn raw_shape(&self) -> Vec<Vec<usize>> {
        self.shapes
            .iter()
            .map(|s| s[1..s.len() - 1].to_vec())
            .collect()
    }

    /// Merged mode size of every core
    pub fn mode_sizes(&self) -> Vec<usize> {
        self.raw_shape()
            .iter()
            .map(|m| m.iter().product())
            .collect()
    }

    /// Evaluate all cores into a concrete TT
    pub fn evaluate(&self, session: &mut Session<'g, T>) -> ManifoldResult<TensorTrain<T>> {
        let cores = session.run(&self.cores)?;
        Ok(TensorTrain::new(cores)?)
    }

    /// Fail unless `other` lives in the same graph
    pub(crate) fn ensure_same_graph(&self, other: &TtExpr<'g, T>) -> ManifoldResult<()> {
        if std::ptr::eq(self.graph, other.graph) {
            Ok(())
        } else {
            Err(ManifoldError::IncompatibleShapes(
                "TT expressions belong to different graphs".to_string(),
            ))
        }
    }
}
