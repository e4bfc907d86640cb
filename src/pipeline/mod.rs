//! Chunked peak pipeline.
//!
//! A directed acyclic graph of feature nodes is evaluated over a recording
//! chunk by chunk. Every node sees the chunk's peaks, a trace window widened
//! by the pipeline margin, and the outputs of its parents for the same chunk.
//!
//! # Architecture
//!
//! ```text
//! [ExtractDenseWaveforms] ──► [WaveformDenoiser] ──► [WaveformRms]
//!                        └──► [WaveformRms]
//! [PeakAmplitude]
//! ```
//!
//! # Design
//!
//! - **Enum dispatch on hot path**: `BuiltinNode` enum for all built-in nodes,
//!   `NodePlugin` trait objects for user nodes.
//! - **Validated up front**: `PipelineCompiler` rejects cycles, dangling
//!   parents and missing outputs before any trace is read.
//! - **Per-worker graphs**: each worker thread gets its own copy of the graph,
//!   built-ins are rebuilt from their serializable `NodeConfig`.
//! - **Order-independent results**: chunk outputs are stored by chunk index
//!   and concatenated once all chunks are done.

pub mod chunking;
pub mod compiled_plan;
pub mod compiler;
pub mod context;
pub mod error;
pub mod executor;
pub mod id;
pub mod node;
pub mod node_config;
pub mod node_type;
pub mod nodes;
pub mod worker;

pub use chunking::{divide_recording, fetch_widened_traces, ChunkRange};
pub use compiled_plan::{CompiledPlan, PlanStats};
pub use compiler::PipelineCompiler;
pub use context::{ChunkContext, ElementShape, NodeOutput, OutputType};
pub use error::{PipelineError, PipelineResult};
pub use executor::{run_peak_pipeline, NamedOutput, NodeSlot, Pipeline, PipelineOutput};
pub use id::NodeId;
pub use node::{AnyNode, BuiltinNode, NodePlugin};
pub use node_config::{NodeConfig, NodeSpec, PipelineSpec};
pub use node_type::NodeType;
pub use worker::run_chunks;
