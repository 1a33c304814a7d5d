//! Dataflow graph consumed by the lowering passes.
//!
//! A `Fusion` owns every value and expression in two arenas; everything
//! else refers to nodes by `ValId` / `ExprId`. Identity is index identity:
//! two tensors with identical domains are still different values.

pub mod parallel;

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

pub use parallel::{ParallelType, ParallelTypeBitmap};

// ─── Identities ───────────────────────────────────────────────────

/// Index of a value in its `Fusion`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValId(pub u32);

/// Index of an expression in its `Fusion`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(pub u32);

impl ValId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ─── Iteration domains ────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterType {
    Iteration,
    Reduction,
    Broadcast,
}

/// One axis of a tensor's iteration space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IterDomain {
    pub iter_type: IterType,
    /// `None` means the axis is executed serially.
    pub parallel_type: Option<ParallelType>,
}

impl IterDomain {
    pub fn new(iter_type: IterType, parallel_type: Option<ParallelType>) -> Self {
        Self {
            iter_type,
            parallel_type,
        }
    }

    pub fn iteration() -> Self {
        Self::new(IterType::Iteration, None)
    }

    pub fn reduction() -> Self {
        Self::new(IterType::Reduction, None)
    }

    pub fn broadcast() -> Self {
        Self::new(IterType::Broadcast, None)
    }

    /// Bind this axis to a block or thread index.
    pub fn parallelize(mut self, pt: ParallelType) -> Self {
        self.parallel_type = Some(pt);
        self
    }

    pub fn is_thread(&self) -> bool {
        self.parallel_type.is_some()
    }

    pub fn is_reduction(&self) -> bool {
        self.iter_type == IterType::Reduction
    }

    pub fn is_broadcast(&self) -> bool {
        self.iter_type == IterType::Broadcast
    }
}

impl fmt::Display for IterDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.iter_type {
            IterType::Iteration => "i",
            IterType::Reduction => "r",
            IterType::Broadcast => "b",
        };
        match self.parallel_type {
            Some(pt) => write!(f, "{}@{}", tag, pt.short_name()),
            None => f.write_str(tag),
        }
    }
}

/// Ordered iteration axes of a tensor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TensorDomain {
    pub axes: Vec<IterDomain>,
}

impl TensorDomain {
    pub fn new(axes: Vec<IterDomain>) -> Self {
        Self { axes }
    }

    pub fn iter(&self) -> impl Iterator<Item = &IterDomain> {
        self.axes.iter()
    }
}

impl fmt::Display for TensorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axes: Vec<String> = self.axes.iter().map(|a| a.to_string()).collect();
        write!(f, "[{}]", axes.join(", "))
    }
}

// ─── Values and expressions ───────────────────────────────────────

/// Scalar element type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Bool,
    Int,
    Float,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => write!(f, "bool"),
            DataType::Int => write!(f, "i64"),
            DataType::Float => write!(f, "f32"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValKind {
    Tensor(TensorDomain),
    Scalar(DataType),
}

#[derive(Clone, Debug)]
pub struct Val {
    pub name: String,
    pub kind: ValKind,
}

impl Val {
    pub fn domain(&self) -> Option<&TensorDomain> {
        match &self.kind {
            ValKind::Tensor(domain) => Some(domain),
            ValKind::Scalar(_) => None,
        }
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self.kind, ValKind::Tensor(_))
    }
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub op: String,
    pub inputs: Vec<ValId>,
    pub outputs: Vec<ValId>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("expression {expr} is part of a dependency cycle")]
    Cycle { expr: ExprId },
    #[error("value {val} does not belong to this fusion")]
    UnknownValue { val: ValId },
}

// ─── Fusion ───────────────────────────────────────────────────────

/// An arena-owned dataflow graph.
#[derive(Clone, Debug, Default)]
pub struct Fusion {
    pub name: String,
    vals: Vec<Val>,
    exprs: Vec<Expr>,
    definitions: Vec<Option<ExprId>>,
    inputs: Vec<ValId>,
    outputs: Vec<ValId>,
}

impl Fusion {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn add_val(&mut self, name: &str, kind: ValKind) -> ValId {
        let id = ValId(self.vals.len() as u32);
        self.vals.push(Val {
            name: name.to_string(),
            kind,
        });
        self.definitions.push(None);
        id
    }

    pub fn add_tensor(&mut self, name: &str, axes: Vec<IterDomain>) -> ValId {
        self.add_val(name, ValKind::Tensor(TensorDomain::new(axes)))
    }

    pub fn add_scalar(&mut self, name: &str, dtype: DataType) -> ValId {
        self.add_val(name, ValKind::Scalar(dtype))
    }

    pub fn add_input(&mut self, val: ValId) -> Result<(), GraphError> {
        self.check_val(val)?;
        self.inputs.push(val);
        Ok(())
    }

    pub fn add_output(&mut self, val: ValId) -> Result<(), GraphError> {
        self.check_val(val)?;
        self.outputs.push(val);
        Ok(())
    }

    /// Append an expression. Each output that has no definition yet gets
    /// this expression as its definition; a second definer is kept in the
    /// expression list but does not replace the first.
    pub fn add_expr(
        &mut self,
        op: &str,
        inputs: Vec<ValId>,
        outputs: Vec<ValId>,
    ) -> Result<ExprId, GraphError> {
        for &v in inputs.iter().chain(outputs.iter()) {
            self.check_val(v)?;
        }
        let id = ExprId(self.exprs.len() as u32);
        for &out in &outputs {
            let slot = &mut self.definitions[out.index()];
            if slot.is_none() {
                *slot = Some(id);
            }
        }
        self.exprs.push(Expr {
            op: op.to_string(),
            inputs,
            outputs,
        });
        Ok(id)
    }

    fn check_val(&self, val: ValId) -> Result<(), GraphError> {
        if val.index() < self.vals.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownValue { val })
        }
    }

    pub fn inputs(&self) -> &[ValId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValId] {
        &self.outputs
    }

    pub fn val(&self, id: ValId) -> &Val {
        &self.vals[id.index()]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn definition(&self, val: ValId) -> Option<ExprId> {
        self.definitions[val.index()]
    }

    pub fn is_tensor(&self, val: ValId) -> bool {
        self.val(val).is_tensor()
    }

    /// All value ids in creation order.
    pub fn vals(&self) -> impl Iterator<Item = ValId> + '_ {
        (0..self.vals.len() as u32).map(ValId)
    }

    pub fn num_vals(&self) -> usize {
        self.vals.len()
    }

    pub fn num_exprs(&self) -> usize {
        self.exprs.len()
    }

    /// Every expression in definition order: producers before consumers,
    /// otherwise in insertion order.
    pub fn exprs(&self) -> Result<Vec<ExprId>, GraphError> {
        let mut graph: DiGraph<ExprId, ()> = DiGraph::with_capacity(self.exprs.len(), 0);
        let nodes: Vec<NodeIndex> = (0..self.exprs.len() as u32)
            .map(|i| graph.add_node(ExprId(i)))
            .collect();
        for (consumer, expr) in self.exprs.iter().enumerate() {
            for &inp in &expr.inputs {
                if let Some(producer) = self.definition(inp) {
                    graph.add_edge(nodes[producer.index()], nodes[consumer], ());
                }
            }
        }

        // Kahn's algorithm with a min-heap keeps ties in insertion order.
        let mut indegree: Vec<usize> = nodes
            .iter()
            .map(|&n| graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = indegree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();
        let mut order = Vec::with_capacity(nodes.len());
        while let Some(Reverse(i)) = ready.pop() {
            order.push(ExprId(i as u32));
            for succ in graph.neighbors_directed(nodes[i], Direction::Outgoing) {
                let s = succ.index();
                indegree[s] -= 1;
                if indegree[s] == 0 {
                    ready.push(Reverse(s));
                }
            }
        }
        if order.len() < nodes.len() {
            // Everything left waits on a cycle; name the first stuck node.
            if let Some(stuck) = indegree.iter().position(|&d| d > 0) {
                return Err(GraphError::Cycle {
                    expr: graph[nodes[stuck]],
                });
            }
        }
        Ok(order)
    }
}
