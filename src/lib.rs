//! tracecrit - Critical-path analysis for Jaeger-style distributed traces
//!
//! This library reconstructs trace trees from flat Jaeger span lists,
//! repairs clock-skew containment violations, extracts the critical path
//! through each trace, and aggregates per-operation timing metrics across
//! many traces into percentile tables and flame-graph folded-stack output.

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod critical_path;
pub mod error;
pub mod folded_stack;
pub mod graph_builder;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod sanitizer;
