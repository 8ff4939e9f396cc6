//! Process command - run one session through the pipeline in the
//! foreground.

use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use crate::status::{JobKey, JobState, StatusTracker};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Process a single session and report progress on the terminal.
pub async fn run_process(resource: &str, owner: &str, settings: Settings) -> Result<()> {
    let tracker = StatusTracker::new();
    let pipeline = Arc::new(Pipeline::new(settings, tracker.clone())?);

    let key = JobKey::new(owner, resource);
    if !tracker.start(&key).await {
        anyhow::bail!("Session {} is already processing", resource);
    }

    Output::info(&format!("Processing session {}", resource));
    let pb = Output::progress_bar("Starting");

    // Mirror the tracker onto the progress bar while the job runs.
    let poll_tracker = tracker.clone();
    let poll_key = key.clone();
    let poll_pb = pb.clone();
    let poller = tokio::spawn(async move {
        loop {
            let status = poll_tracker.get(&poll_key).await;
            poll_pb.set_position(status.progress as u64);
            poll_pb.set_message(status.message);
            if matches!(status.state, JobState::Completed | JobState::Error) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    });

    let result = pipeline.run_job(&key).await;
    let _ = poller.await;
    pb.finish_and_clear();

    match result {
        Ok(()) => {
            let status = tracker.get(&key).await;
            Output::success(&status.message);
            Output::kv(
                "Outputs",
                &pipeline
                    .store()
                    .root()
                    .join(resource)
                    .display()
                    .to_string(),
            );
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Processing failed: {}", e));
            Err(e.into())
        }
    }
}
