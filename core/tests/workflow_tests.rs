// tests/workflow_tests.rs
mod common;
use common::setup_tracing;
use marketplace::workflow::{ContextData, Pipeline, PipelineOutcome, StepControl, StepDef, Workflows};
use marketplace::{MarketError, PipelineError};
use serial_test::serial;

#[derive(Clone, Debug, Default)]
struct TraceCtx {
  steps_executed: Vec<String>,
  stop_at: Option<String>,
  skip_audit: bool,
}

fn recording_pipeline(steps: Vec<StepDef<TraceCtx>>) -> Pipeline<TraceCtx, MarketError> {
  let names: Vec<String> = steps.iter().map(|s| s.name.clone()).collect();
  let mut pipeline = Pipeline::<TraceCtx, MarketError>::new("trace", steps);
  for name in names {
    let step = name.clone();
    pipeline.on_step(&name, move |ctx: ContextData<TraceCtx>| {
      let step = step.clone();
      async move {
        let stop = ctx.update(|data| {
          data.steps_executed.push(step.clone());
          data.stop_at.as_deref() == Some(step.as_str())
        });
        Ok::<_, MarketError>(if stop { StepControl::Stop } else { StepControl::Continue })
      }
    });
  }
  pipeline
}

#[tokio::test]
#[serial]
async fn test_steps_run_in_declared_order() {
  setup_tracing();
  let pipeline = recording_pipeline(vec![
    StepDef::required("validate"),
    StepDef::required("persist"),
    StepDef::optional("publish"),
  ]);
  let ctx = ContextData::new(TraceCtx::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineOutcome::Completed);
  assert_eq!(ctx.read().steps_executed, vec!["validate", "persist", "publish"]);
}

#[tokio::test]
#[serial]
async fn test_stop_halts_remaining_steps() {
  setup_tracing();
  let pipeline = recording_pipeline(vec![
    StepDef::required("validate"),
    StepDef::required("persist"),
    StepDef::required("publish"),
  ]);
  let ctx = ContextData::new(TraceCtx {
    stop_at: Some("persist".to_string()),
    ..TraceCtx::default()
  });
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineOutcome::Stopped);
  assert_eq!(ctx.read().steps_executed, vec!["validate", "persist"]);
}

#[tokio::test]
#[serial]
async fn test_skip_condition_and_missing_optional_handlers() {
  setup_tracing();
  let mut pipeline = Pipeline::<TraceCtx, MarketError>::new(
    "trace",
    vec![
      StepDef::required("validate"),
      StepDef::optional("unhandled"),
      StepDef::optional("audit").skip_if(|ctx: &ContextData<TraceCtx>| ctx.read().skip_audit),
    ],
  );
  for name in ["validate", "audit"] {
    pipeline.on_step(name, move |ctx: ContextData<TraceCtx>| async move {
      ctx.update(|data| data.steps_executed.push(name.to_string()));
      Ok::<_, MarketError>(StepControl::Continue)
    });
  }

  let ctx = ContextData::new(TraceCtx {
    skip_audit: true,
    ..TraceCtx::default()
  });
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineOutcome::Completed);
  assert_eq!(ctx.read().steps_executed, vec!["validate"]);
  assert_eq!(pipeline.step_names(), vec!["validate", "unhandled", "audit"]);

  let ctx = ContextData::new(TraceCtx::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().steps_executed, vec!["validate", "audit"]);
}

#[tokio::test]
#[serial]
async fn test_required_step_without_handler_fails() {
  setup_tracing();
  let pipeline = Pipeline::<TraceCtx, MarketError>::new("bare", vec![StepDef::required("missing")]);
  let result = pipeline.run(ContextData::new(TraceCtx::default())).await;
  assert!(matches!(
    result,
    Err(MarketError::Workflow {
      source: PipelineError::HandlerMissing { step_name }
    }) if step_name == "missing"
  ));
}

#[tokio::test]
#[serial]
async fn test_hooks_wrap_the_main_handler_and_errors_propagate() {
  setup_tracing();
  let mut pipeline = recording_pipeline(vec![StepDef::required("persist"), StepDef::required("publish")]);
  pipeline.before_step("persist", |ctx: ContextData<TraceCtx>| async move {
    ctx.update(|data| data.steps_executed.push("before:persist".to_string()));
    Ok::<_, MarketError>(StepControl::Continue)
  });
  pipeline.after_step("persist", |_ctx: ContextData<TraceCtx>| async move {
    Err::<StepControl, _>(MarketError::validation("rejected after persist"))
  });

  let ctx = ContextData::new(TraceCtx::default());
  let result = pipeline.run(ctx.clone()).await;
  assert!(matches!(result, Err(MarketError::Validation(msg)) if msg == "rejected after persist"));
  assert_eq!(ctx.read().steps_executed, vec!["before:persist", "persist"]);
}

#[tokio::test]
#[serial]
async fn test_registry_dispatches_by_context_type() {
  setup_tracing();
  let workflows = Workflows::<MarketError>::new();
  assert!(!workflows.is_registered::<TraceCtx>());

  let missing = workflows.run(ContextData::new(TraceCtx::default())).await;
  assert!(matches!(
    missing,
    Err(MarketError::Workflow {
      source: PipelineError::NotRegistered { .. }
    })
  ));

  workflows.register(recording_pipeline(vec![StepDef::required("validate")]));
  assert_eq!(workflows.registered_names(), vec!["trace".to_string()]);

  let ctx = ContextData::new(TraceCtx::default());
  assert_eq!(workflows.run(ctx.clone()).await.unwrap(), PipelineOutcome::Completed);
  assert_eq!(ctx.read().steps_executed, vec!["validate"]);
}
