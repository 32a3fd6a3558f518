//! Resolved analysis configuration, built from CLI arguments (spec §6).

use crate::graph_builder::RootTraceMode;
use std::path::PathBuf;

/// Everything the pipeline needs to process a batch of trace files.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub trace_dir: Option<PathBuf>,
    pub file: Option<PathBuf>,
    pub service: String,
    pub operation: String,
    pub root_trace_mode: RootTraceMode,
    pub output_dir: PathBuf,
    pub percentiles: Vec<u8>,
    pub max_operations: usize,
    pub max_traces: usize,
    pub workers: usize,
}

impl AnalysisConfig {
    /// Resolve the set of trace files to process: either the single
    /// `--file`, or every `.json` file directly under `--trace-dir`.
    pub fn resolve_trace_files(&self) -> std::io::Result<Vec<PathBuf>> {
        if let Some(file) = &self.file {
            return Ok(vec![file.clone()]);
        }
        let dir = self.trace_dir.as_ref().expect("clap group guarantees one of file/trace_dir");
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_trace_files_prefers_explicit_file() {
        let config = AnalysisConfig {
            trace_dir: None,
            file: Some(PathBuf::from("/tmp/one.json")),
            service: "S1".to_string(),
            operation: "O1".to_string(),
            root_trace_mode: RootTraceMode::Strict,
            output_dir: PathBuf::from("/tmp/out"),
            percentiles: vec![50, 95, 99],
            max_operations: 20,
            max_traces: 20,
            workers: 4,
        };
        let files = config.resolve_trace_files().unwrap();
        assert_eq!(files, vec![PathBuf::from("/tmp/one.json")]);
    }
}
