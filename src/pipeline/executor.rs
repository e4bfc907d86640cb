//! Pipeline graph and chunk executor.
//!
//! `run_peak_pipeline` drives one run:
//! 1. Validate the peak stream and compile the graph.
//! 2. Cut the recording into chunks and hand them to the worker pool.
//! 3. Per chunk: fetch margin-widened traces, select the chunk's peaks, run
//!    every node in plan order, keep the outputs of returned nodes.
//! 4. Concatenate per-chunk outputs in chunk order.

use crate::config::JobConfig;
use crate::pipeline::chunking::{divide_recording, fetch_widened_traces, peak_range, ChunkRange};
use crate::pipeline::compiled_plan::CompiledPlan;
use crate::pipeline::compiler::PipelineCompiler;
use crate::pipeline::context::{ChunkContext, NodeOutput};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::NodeId;
use crate::pipeline::node::{AnyNode, BuiltinNode, NodePlugin};
use crate::pipeline::node_config::{NodeConfig, NodeSpec, PipelineSpec};
use crate::pipeline::worker::run_chunks;
use crate::recording::{RecordingInfo, TraceSource};
use crate::types::{first_unsorted_peak, Peak};
use ndarray::{concatenate, Axis};

/// A slot holding a node and its wiring.
#[derive(Debug)]
pub struct NodeSlot {
    pub node: AnyNode,
    /// Parents in declaration order; their outputs reach `compute` in this order.
    pub parents: Vec<NodeId>,
    /// Whether this node's output is part of the run result.
    pub return_output: bool,
}

impl NodeSlot {
    pub fn new(node: AnyNode, parents: Vec<NodeId>, return_output: bool) -> Self {
        Self {
            node,
            parents,
            return_output,
        }
    }
}

/// A peak pipeline graph bound to one recording's metadata.
#[derive(Debug)]
pub struct Pipeline {
    nodes: Vec<NodeSlot>,
    info: RecordingInfo,
}

impl Pipeline {
    pub fn new(info: RecordingInfo) -> Self {
        Self {
            nodes: Vec::new(),
            info,
        }
    }

    // ── Graph building ──

    /// Add a node to the pipeline. Returns its NodeId.
    ///
    /// Parent references are checked when the pipeline is compiled.
    pub fn add_node(&mut self, node: AnyNode, parents: &[NodeId], return_output: bool) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes
            .push(NodeSlot::new(node, parents.to_vec(), return_output));
        id
    }

    /// Build a built-in node against this pipeline's recording and add it.
    pub fn add_builtin(
        &mut self,
        config: &NodeConfig,
        parents: &[NodeId],
        return_output: bool,
    ) -> PipelineResult<NodeId> {
        let node = BuiltinNode::from_config(config, &self.info)?;
        Ok(self.add_node(AnyNode::Builtin(node), parents, return_output))
    }

    pub fn add_plugin(
        &mut self,
        plugin: Box<dyn NodePlugin>,
        parents: &[NodeId],
        return_output: bool,
    ) -> NodeId {
        self.add_node(AnyNode::Plugin(plugin), parents, return_output)
    }

    pub fn nodes(&self) -> &[NodeSlot] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSlot> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn info(&self) -> &RecordingInfo {
        &self.info
    }

    /// Validate the graph and compute the execution plan.
    pub fn compile(&self) -> PipelineResult<CompiledPlan> {
        PipelineCompiler::compile(&self.nodes)
    }

    /// Serializable description, or `None` if the graph holds plugins.
    pub fn to_spec(&self) -> Option<PipelineSpec> {
        let nodes = self
            .nodes
            .iter()
            .map(|slot| {
                Some(NodeSpec {
                    config: slot.node.config()?,
                    parents: slot.parents.iter().map(|p| p.index()).collect(),
                    return_output: slot.return_output,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(PipelineSpec { nodes })
    }

    /// Independent copy of the whole graph for a worker thread.
    pub fn duplicate(&self) -> PipelineResult<Pipeline> {
        let nodes = self
            .nodes
            .iter()
            .map(|slot| {
                Ok(NodeSlot::new(
                    slot.node.duplicate(&self.info)?,
                    slot.parents.clone(),
                    slot.return_output,
                ))
            })
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(Pipeline {
            nodes,
            info: self.info.clone(),
        })
    }

    /// Run every node on one chunk and return the outputs of the plan's
    /// output nodes, in plan order.
    fn evaluate_chunk(&self, plan: &CompiledPlan, ctx: &ChunkContext) -> PipelineResult<Vec<NodeOutput>> {
        let mut results: Vec<Option<NodeOutput>> = (0..self.nodes.len()).map(|_| None).collect();

        for &idx in &plan.order {
            let slot = &self.nodes[idx];
            let fail = |source: PipelineError| PipelineError::ChunkFailed {
                node: NodeId::from_index(idx),
                name: slot.node.name().to_string(),
                chunk: ctx.chunk,
                source: Box::new(source),
            };

            let output = {
                let parents = slot
                    .parents
                    .iter()
                    .map(|p| {
                        results[p.index()].as_ref().ok_or_else(|| {
                            PipelineError::Compute(format!("parent {:?} has no output", p))
                        })
                    })
                    .collect::<PipelineResult<Vec<&NodeOutput>>>()
                    .map_err(fail)?;
                slot.node.compute(ctx, &parents).map_err(fail)?
            };

            check_output_shape(slot, &output, ctx.num_peaks()).map_err(fail)?;
            results[idx] = Some(output);
        }

        plan.output_nodes
            .iter()
            .map(|&idx| {
                results[idx]
                    .take()
                    .ok_or_else(|| PipelineError::Compute(format!("output node {} was not evaluated", idx)))
            })
            .collect()
    }
}

fn check_output_shape(slot: &NodeSlot, output: &NodeOutput, num_peaks: usize) -> PipelineResult<()> {
    let (name, ok, expected) = match slot.node.output_type() {
        Some(t) => (t.name.clone(), t.accepts(num_peaks, output.shape()), t.to_string()),
        None => (
            slot.node.name().to_string(),
            output.shape().first() == Some(&num_peaks),
            "(n_peaks, ...)".to_string(),
        ),
    };
    if ok {
        Ok(())
    } else {
        Err(PipelineError::OutputShape {
            name,
            expected: format!("{} with n_peaks = {}", expected, num_peaks),
            actual: output.shape().to_vec(),
        })
    }
}

/// One returned node's concatenated output.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedOutput {
    pub node: NodeId,
    /// Output type name, e.g. `abs_amplitude`
    pub name: String,
    pub data: NodeOutput,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    /// The single returned node's array (squeeze requested)
    Squeezed(NodeOutput),
    /// One entry per returned node, in pipeline order
    Outputs(Vec<NamedOutput>),
}

impl PipelineOutput {
    /// Number of arrays in the result.
    pub fn len(&self) -> usize {
        match self {
            PipelineOutput::Squeezed(_) => 1,
            PipelineOutput::Outputs(outputs) => outputs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn squeezed(&self) -> Option<&NodeOutput> {
        match self {
            PipelineOutput::Squeezed(data) => Some(data),
            PipelineOutput::Outputs(_) => None,
        }
    }

    /// Output of a returned node (not available once squeezed).
    pub fn get(&self, node: NodeId) -> Option<&NodeOutput> {
        match self {
            PipelineOutput::Squeezed(_) => None,
            PipelineOutput::Outputs(outputs) => {
                outputs.iter().find(|o| o.node == node).map(|o| &o.data)
            }
        }
    }

    /// Arrays in pipeline order.
    pub fn into_arrays(self) -> Vec<NodeOutput> {
        match self {
            PipelineOutput::Squeezed(data) => vec![data],
            PipelineOutput::Outputs(outputs) => outputs.into_iter().map(|o| o.data).collect(),
        }
    }
}

fn validate_peaks(peaks: &[Peak], info: &RecordingInfo) -> PipelineResult<()> {
    if let Some(index) = first_unsorted_peak(peaks) {
        return Err(PipelineError::UnsortedPeaks { index });
    }
    for (index, peak) in peaks.iter().enumerate() {
        if peak.channel_index >= info.num_channels {
            return Err(PipelineError::PeakChannelOutOfRange {
                index,
                channel: peak.channel_index,
                num_channels: info.num_channels,
            });
        }
    }
    if let Some(last) = peaks.last() {
        if last.sample_index >= info.num_samples {
            return Err(PipelineError::PeakOutOfRange {
                index: peaks.len() - 1,
                sample: last.sample_index,
                num_samples: info.num_samples,
            });
        }
    }
    Ok(())
}

/// Nodes bake channel counts, window lengths and neighborhoods in at build
/// time, so the recording must match the one the pipeline was built for.
fn check_recording_matches(built_for: &RecordingInfo, info: &RecordingInfo) -> PipelineResult<()> {
    if built_for.num_channels != info.num_channels {
        return Err(PipelineError::InvalidConfig(format!(
            "num_channels mismatch: pipeline built for {}, recording has {}",
            built_for.num_channels, info.num_channels
        )));
    }
    if built_for.sampling_frequency != info.sampling_frequency {
        return Err(PipelineError::InvalidConfig(format!(
            "sampling_frequency mismatch: pipeline built for {} Hz, recording has {} Hz",
            built_for.sampling_frequency, info.sampling_frequency
        )));
    }
    if built_for.channel_locations != info.channel_locations {
        return Err(PipelineError::InvalidConfig(
            "channel_locations differ from the recording the pipeline was built for".to_string(),
        ));
    }
    Ok(())
}

/// Fetch, select and evaluate one chunk. `None` when the chunk has no peaks.
fn process_chunk(
    recording: &dyn TraceSource,
    peaks: &[Peak],
    pipeline: &Pipeline,
    plan: &CompiledPlan,
    chunk: &ChunkRange,
    always: bool,
) -> PipelineResult<Option<Vec<NodeOutput>>> {
    let chunk_peaks = &peaks[peak_range(peaks, chunk)];
    if chunk_peaks.is_empty() && !always {
        return Ok(None);
    }

    let traces = fetch_widened_traces(recording, chunk, plan.margin)?;
    let ctx = ChunkContext {
        traces: traces.view(),
        peaks: chunk_peaks,
        chunk: *chunk,
        margin: plan.margin,
        info: pipeline.info(),
    };
    tracing::debug!("Chunk {}: {} peaks", chunk, chunk_peaks.len());
    pipeline.evaluate_chunk(plan, &ctx).map(Some)
}

/// Run a peak pipeline over a recording.
///
/// Output `k` of the result holds one row per input peak, in input order,
/// for the `k`-th returned node. With `squeeze_output` and exactly one
/// returned node, that node's array is returned on its own.
pub fn run_peak_pipeline(
    recording: &dyn TraceSource,
    peaks: &[Peak],
    pipeline: &Pipeline,
    job: &JobConfig,
    squeeze_output: bool,
) -> PipelineResult<PipelineOutput> {
    let info = recording.info();
    if info.num_samples == 0 {
        return Err(PipelineError::EmptyRecording);
    }
    check_recording_matches(pipeline.info(), &info)?;
    validate_peaks(peaks, &info)?;

    let plan = pipeline.compile()?;
    tracing::info!(
        "Pipeline compiled: {} nodes, {} outputs ({} scalar, {} array), margin {} samples, depth {} ({} us)",
        plan.stats.total_nodes,
        plan.stats.output_nodes,
        plan.scalar_outputs.len(),
        plan.array_outputs.len(),
        plan.margin,
        plan.stats.depth,
        plan.stats.compile_time_us,
    );
    for &idx in &plan.unused_nodes {
        tracing::warn!(
            "Node '{}' (idx {}) feeds no returned output; it is still evaluated",
            pipeline.nodes[idx].node.name(),
            idx
        );
    }

    let chunk_size = job.chunk_size(info.sampling_frequency);
    if chunk_size < plan.margin {
        tracing::warn!(
            "Chunk size {} is smaller than the trace margin {}; reads will overlap heavily",
            chunk_size,
            plan.margin
        );
    }
    let chunks = divide_recording(info.num_samples, chunk_size);
    let num_workers = job.resolved_n_jobs().min(chunks.len()).max(1);

    tracing::info!(
        "Running peak pipeline: {} peaks, {} chunks of {} samples, {} worker(s)",
        peaks.len(),
        chunks.len(),
        chunk_size,
        num_workers
    );

    let per_chunk: Vec<Vec<NodeOutput>> = if peaks.is_empty() {
        // Evaluate one empty chunk so every output gets its trailing shape
        tracing::warn!("No peaks given; outputs will be empty");
        process_chunk(recording, peaks, pipeline, &plan, &chunks[0], true)?
            .into_iter()
            .collect()
    } else {
        let states = (0..num_workers)
            .map(|_| pipeline.duplicate())
            .collect::<PipelineResult<Vec<_>>>()?;
        run_chunks(&chunks, states, job.progress_bar, |worker, chunk| {
            process_chunk(recording, peaks, worker, &plan, chunk, false)
        })?
        .into_iter()
        .flatten()
        .collect()
    };

    let mut outputs = Vec::with_capacity(plan.output_nodes.len());
    for (k, &idx) in plan.output_nodes.iter().enumerate() {
        let slot = &pipeline.nodes[idx];
        let name = slot
            .node
            .output_type()
            .map(|t| t.name)
            .unwrap_or_else(|| slot.node.name().to_string());

        let views: Vec<_> = per_chunk.iter().map(|chunk| chunk[k].view()).collect();
        let data = concatenate(Axis(0), &views).map_err(|e| PipelineError::OutputShape {
            name: name.clone(),
            expected: format!("matching trailing shapes across chunks ({})", e),
            actual: views.first().map(|v| v.shape().to_vec()).unwrap_or_default(),
        })?;

        if data.shape().first() != Some(&peaks.len()) {
            return Err(PipelineError::OutputShape {
                name,
                expected: format!("{} rows", peaks.len()),
                actual: data.shape().to_vec(),
            });
        }

        outputs.push(NamedOutput {
            node: NodeId::from_index(idx),
            name,
            data,
        });
    }

    tracing::info!(
        "Peak pipeline finished: {} output(s) for {} peaks",
        outputs.len(),
        peaks.len()
    );

    if squeeze_output && outputs.len() == 1 {
        if let Some(only) = outputs.pop() {
            return Ok(PipelineOutput::Squeezed(only.data));
        }
    }
    Ok(PipelineOutput::Outputs(outputs))
}
