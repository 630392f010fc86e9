#![allow(dead_code)]

use std::sync::Arc;

use jobdag::dag::{JobDefinition, PipelineRun, RunMetadata};
use jobdag::exec::StepExecutor;
use jobdag::{execute_pipeline, ExecutionOptions};

pub use jobdag_test_utils::{init_tracing, with_timeout};

/// Build the graph for `jobs` and execute it with `executor`.
pub async fn run_pipeline(
    jobs: Vec<JobDefinition>,
    options: ExecutionOptions,
    executor: Arc<dyn StepExecutor>,
) -> PipelineRun {
    let graph = jobdag_test_utils::builders::graph(jobs);
    let metadata = RunMetadata {
        pipeline: "test".to_string(),
        ..RunMetadata::default()
    };

    with_timeout(execute_pipeline(graph, metadata, options, executor))
        .await
        .expect("pipeline execution failed")
}
