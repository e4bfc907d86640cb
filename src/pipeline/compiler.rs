use super::compiled_plan::{CompiledPlan, PlanStats};
use super::error::{PipelineError, PipelineResult};
use super::executor::NodeSlot;
use super::id::NodeId;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Validates a pipeline graph and compiles it into an execution plan
pub struct PipelineCompiler;

impl PipelineCompiler {
    /// Compile a pipeline graph into an execution plan.
    ///
    /// All structural errors are reported here, before any trace is read:
    /// empty graphs, dangling or self parent references, wrong parent counts,
    /// returned nodes without an output type, graphs with nothing to return
    /// and cycles.
    ///
    /// # Arguments
    /// * `nodes` - All nodes in the graph, indexed by `NodeId`
    ///
    /// # Returns
    /// A `CompiledPlan` with a stable topological order, the fetch margin and
    /// the scalar/array partition of returned nodes
    pub fn compile(nodes: &[NodeSlot]) -> PipelineResult<CompiledPlan> {
        let start_time = std::time::Instant::now();

        let n = nodes.len();
        if n == 0 {
            return Err(PipelineError::EmptyPipeline);
        }

        Self::validate_nodes(nodes)?;

        // Build adjacency lists (forward and backward)
        let (fwd_adj, bwd_adj) = Self::build_adjacency(nodes);

        let order = Self::topological_sort(nodes, &fwd_adj)?;

        let output_nodes: Vec<usize> = (0..n).filter(|&i| nodes[i].return_output).collect();
        if output_nodes.is_empty() {
            return Err(PipelineError::NoOutputs);
        }

        let (scalar_outputs, array_outputs): (Vec<usize>, Vec<usize>) =
            output_nodes.iter().partition(|&&i| {
                nodes[i]
                    .node
                    .output_type()
                    .is_some_and(|t| t.is_scalar())
            });

        let margin = nodes
            .iter()
            .map(|slot| slot.node.trace_margin())
            .max()
            .unwrap_or(0);

        // Backward reachability from returned nodes
        let needed = Self::backward_reachability(&output_nodes, &bwd_adj, n);
        let unused_nodes: Vec<usize> = (0..n).filter(|&i| !needed[i]).collect();

        let stats = PlanStats {
            total_nodes: n,
            output_nodes: output_nodes.len(),
            root_nodes: nodes.iter().filter(|slot| slot.parents.is_empty()).count(),
            depth: Self::depth(nodes, &order),
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        Ok(CompiledPlan {
            order,
            margin,
            output_nodes,
            scalar_outputs,
            array_outputs,
            unused_nodes,
            stats,
        })
    }

    /// Per-node checks that need no graph traversal
    fn validate_nodes(nodes: &[NodeSlot]) -> PipelineResult<()> {
        let n = nodes.len();
        for (idx, slot) in nodes.iter().enumerate() {
            let id = NodeId::from_index(idx);

            for &parent in &slot.parents {
                if parent == id {
                    return Err(PipelineError::SelfParent(id));
                }
                if parent.index() >= n {
                    return Err(PipelineError::DanglingParent { node: id, parent });
                }
            }

            if let Some(expected) = slot.node.expected_parents() {
                if expected != slot.parents.len() {
                    return Err(PipelineError::ParentCount {
                        node: id,
                        name: slot.node.name().to_string(),
                        expected,
                        actual: slot.parents.len(),
                    });
                }
            }

            if slot.return_output && slot.node.output_type().is_none() {
                return Err(PipelineError::MissingOutputType {
                    node: id,
                    name: slot.node.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Build forward (parent -> child) and backward (child -> parent) adjacency lists
    fn build_adjacency(nodes: &[NodeSlot]) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
        let n = nodes.len();
        let mut fwd_adj = vec![Vec::new(); n];
        let mut bwd_adj = vec![Vec::new(); n];

        for (child, slot) in nodes.iter().enumerate() {
            for parent in &slot.parents {
                fwd_adj[parent.index()].push(child);
                bwd_adj[child].push(parent.index());
            }
        }

        (fwd_adj, bwd_adj)
    }

    /// Kahn's algorithm, always taking the lowest ready index so an already
    /// valid list order comes out unchanged
    fn topological_sort(nodes: &[NodeSlot], fwd_adj: &[Vec<usize>]) -> PipelineResult<Vec<usize>> {
        let n = nodes.len();
        let mut in_degree: Vec<usize> = nodes.iter().map(|slot| slot.parents.len()).collect();

        let mut ready: BinaryHeap<Reverse<usize>> =
            (0..n).filter(|&i| in_degree[i] == 0).map(Reverse).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &child in &fwd_adj[node] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.push(Reverse(child));
                }
            }
        }

        if order.len() != n {
            let stuck = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| format!("{} ({:?})", nodes[i].node.name(), NodeId::from_index(i)))
                .collect();
            return Err(PipelineError::CycleDetected(stuck));
        }

        Ok(order)
    }

    /// Perform backward reachability analysis from returned nodes using DFS
    fn backward_reachability(outputs: &[usize], bwd_adj: &[Vec<usize>], n: usize) -> Vec<bool> {
        let mut reachable = vec![false; n];
        let mut stack = Vec::new();

        for &out in outputs {
            reachable[out] = true;
            stack.push(out);
        }

        while let Some(node) = stack.pop() {
            for &parent in &bwd_adj[node] {
                if !reachable[parent] {
                    reachable[parent] = true;
                    stack.push(parent);
                }
            }
        }

        reachable
    }

    /// Longest parent chain, walking nodes in topological order
    fn depth(nodes: &[NodeSlot], order: &[usize]) -> usize {
        let mut level = vec![0usize; nodes.len()];
        for &idx in order {
            level[idx] = 1 + nodes[idx]
                .parents
                .iter()
                .map(|p| level[p.index()])
                .max()
                .unwrap_or(0);
        }
        level.into_iter().max().unwrap_or(0)
    }
}
