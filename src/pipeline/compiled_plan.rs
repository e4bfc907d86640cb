/// Compiled execution plan for a peak pipeline graph.
/// Every node is evaluated for every chunk, in `order`.
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    /// Node indices in topological order (stable: ties keep list order)
    pub order: Vec<usize>,

    /// Trace margin used for every chunk fetch (max over all nodes)
    pub margin: usize,

    /// Nodes whose output is returned, in pipeline order
    pub output_nodes: Vec<usize>,

    /// Output nodes producing one scalar per peak
    pub scalar_outputs: Vec<usize>,

    /// Output nodes producing an array per peak
    pub array_outputs: Vec<usize>,

    /// Nodes that neither return output nor feed a node that does
    pub unused_nodes: Vec<usize>,

    /// Compilation statistics
    pub stats: PlanStats,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default)]
pub struct PlanStats {
    /// Total number of nodes in the graph
    pub total_nodes: usize,

    /// Number of nodes returning output
    pub output_nodes: usize,

    /// Number of nodes without parents
    pub root_nodes: usize,

    /// Longest parent chain, counted in nodes
    pub depth: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl CompiledPlan {
    /// Check if the plan has any nodes to run
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether the run can hand back a single squeezed array
    pub fn is_single_output(&self) -> bool {
        self.output_nodes.len() == 1
    }
}
