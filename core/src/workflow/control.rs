// core/src/workflow/control.rs

//! Flow signals returned by step handlers, and the outcome of a full run.

/// Returned by every handler to say whether the pipeline goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  /// Run the remaining handlers of this step and the following steps.
  Continue,
  /// Halt the pipeline right here. Nothing after this handler runs.
  Stop,
}

/// How a pipeline run ended when no handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
  /// Every step that was not skipped ran to the end.
  Completed,
  /// A handler returned [`StepControl::Stop`].
  Stopped,
}
