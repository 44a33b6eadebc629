//! End-to-end engine behaviour through [`Runtime`]: laziness, scope
//! shadowing across concurrent runs, value folding and live registry edits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aoi::script::{
    standard_library, BoxFuture, Call, Callable, Context, FunctionRegistry, MessageEvent, Runtime,
    ScriptAction, Value, MAX_NESTING,
};
use aoi::{Result, ScriptError};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Counts how often it is invoked; returns the new count.
#[derive(Default)]
struct Counter {
    hits: AtomicUsize,
}

impl Callable for Counter {
    fn call<'a>(&'a self, _ctx: &'a mut Context, _call: &'a Call) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let n = self.hits.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Value::Int(n as i64))
        })
    }
}

fn five<'a>(_ctx: &'a mut Context, _call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async { Ok(Value::Int(5)) })
}

fn root_who<'a>(_ctx: &'a mut Context, _call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async { Ok(Value::Str("root".into())) })
}

fn child_who<'a>(_ctx: &'a mut Context, _call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async { Ok(Value::Str("child".into())) })
}

/// Shadows `$who` in the current run, then yields to other tasks.
fn shadow<'a>(ctx: &'a mut Context, _call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.define_fn("$who", child_who);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(Value::Undefined)
    })
}

fn pause<'a>(_ctx: &'a mut Context, _call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(Value::Undefined)
    })
}

/// Evaluates only its first argument.
fn first<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move { ctx.argument(call, 0).await })
}

/// Evaluates its only argument twice.
fn twice<'a>(ctx: &'a mut Context, call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        ctx.check_args(call, 1)?;
        let a = ctx.evaluate_argument(&call.args[0]).await?;
        let b = ctx.evaluate_argument(&call.args[0]).await?;
        Ok(Value::List(vec![a, b]))
    })
}

fn failing<'a>(_ctx: &'a mut Context, _call: &'a Call) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async {
        Err(ScriptError::callable(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gateway closed",
        )))
    })
}

fn runtime_with(counter: Arc<Counter>) -> Runtime {
    let mut registry = standard_library();
    registry
        .register("$five", five)
        .register("$who", root_who)
        .register("$shadow", shadow)
        .register("$pause", pause)
        .register("$first", first)
        .register("$twice", twice)
        .register("$failing", failing)
        .register_callable("$count", counter);
    Runtime::new(registry)
}

fn runtime() -> Runtime {
    runtime_with(Arc::new(Counter::default()))
}

// ── Laziness ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unevaluated_argument_has_no_side_effects() {
    let counter = Arc::new(Counter::default());
    let rt = runtime_with(Arc::clone(&counter));

    let v = rt.run_input("$first[a;$count]", "lazy").await.unwrap();
    assert_eq!(v, Value::Str("a".into()));
    assert_eq!(counter.hits.load(Ordering::SeqCst), 0);

    rt.run_input("$if[1 == 1;ok;$count]", "lazy").await.unwrap();
    assert_eq!(counter.hits.load(Ordering::SeqCst), 0);

    rt.run_input("$if[1 == 2;ok;$count]", "lazy").await.unwrap();
    assert_eq!(counter.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn argument_can_be_evaluated_repeatedly() {
    let counter = Arc::new(Counter::default());
    let rt = runtime_with(Arc::clone(&counter));
    let v = rt.run_input("$twice[$count]", "lazy").await.unwrap();
    assert_eq!(v, Value::List(vec![Value::Int(1), Value::Int(2)]));
    assert_eq!(counter.hits.load(Ordering::SeqCst), 2);
}

// ── Folding ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn lone_call_keeps_its_type() {
    let rt = runtime();
    assert_eq!(rt.run_input("$five", "fold").await.unwrap(), Value::Int(5));
    assert_eq!(
        rt.run_input("$first[$five]", "fold").await.unwrap(),
        Value::Int(5)
    );
}

#[tokio::test]
async fn mixed_sequence_concatenates() {
    let rt = runtime();
    assert_eq!(
        rt.run_input("x$five", "fold").await.unwrap(),
        Value::Str("x5".into())
    );
    assert_eq!(
        rt.run_input("$first[x$five]", "fold").await.unwrap(),
        Value::Str("x5".into())
    );
}

#[tokio::test]
async fn call_free_script_is_its_text() {
    let rt = runtime();
    assert_eq!(
        rt.run_input("  just some words  ", "plain").await.unwrap(),
        Value::Str("just some words".into())
    );
}

// ── Scopes ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn shadowing_is_private_to_one_run() {
    let rt = runtime();
    let (a, b) = tokio::join!(
        rt.run_input("$shadow$who", "a"),
        rt.run_input("$pause$who", "b"),
    );
    assert_eq!(a.unwrap(), Value::Str("child".into()));
    assert_eq!(b.unwrap(), Value::Str("root".into()));
    // The root definition is untouched afterwards.
    assert_eq!(
        rt.run_input("$who", "c").await.unwrap(),
        Value::Str("root".into())
    );
}

#[tokio::test]
async fn runs_on_separate_tasks_do_not_share_variables() {
    let rt = Arc::new(runtime());
    let mut handles = Vec::new();
    for i in 0..8 {
        let rt = Arc::clone(&rt);
        handles.push(tokio::spawn(async move {
            let script = format!("$let[n;{i}]$pause$get[n]");
            rt.run_input(&script, "task").await
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let value = handle.await.unwrap().unwrap();
        assert_eq!(value, Value::Str(i.to_string()));
    }
}

#[tokio::test]
async fn root_edits_are_seen_by_runs_in_progress() {
    let rt = runtime();
    let (result, ()) = tokio::join!(rt.run_input("$pause$late", "live"), async {
        rt.add_function("$late", five);
    });
    assert_eq!(result.unwrap(), Value::Str("5".into()));

    assert!(rt.remove_function("$LATE"));
    assert!(matches!(
        rt.run_input("$late", "live").await,
        Err(ScriptError::UnknownIdentifier(_))
    ));
}

#[tokio::test]
async fn registry_overrides_replace_library_functions() {
    let mut registry = standard_library();
    let mut plugin = FunctionRegistry::new();
    plugin.register("$toUpperCase", five);
    registry.extend(plugin);
    let rt = Runtime::new(registry);
    assert_eq!(
        rt.run_input("$toUpperCase[abc]", "plugin").await.unwrap(),
        Value::Int(5)
    );
}

// ── Control and errors ────────────────────────────────────────────────────────

#[tokio::test]
async fn stop_keeps_what_was_produced() {
    let rt = runtime();
    assert_eq!(
        rt.run_input("one $stop two $count", "stop").await.unwrap(),
        Value::Str("one".into())
    );
}

#[tokio::test]
async fn only_if_queues_reply_and_stops() {
    let rt = runtime();
    let mut ctx = rt
        .prepare_context("guard")
        .with_event(MessageEvent::new("!ban").from_user("mallory"));
    let v = rt
        .run_with(
            &mut ctx,
            "$onlyIf[$username == admin;not allowed, $username;true]banned",
        )
        .await
        .unwrap();
    assert_eq!(v, Value::Undefined);
    assert_eq!(
        ctx.take_actions(),
        vec![ScriptAction::Reply("not allowed, mallory".into())]
    );
}

#[tokio::test]
async fn callable_errors_propagate_unchanged() {
    let rt = runtime();
    let err = rt.run_input("before $failing after", "err").await.unwrap_err();
    assert!(matches!(err, ScriptError::Callable(_)));
    assert_eq!(err.to_string(), "gateway closed");
    assert!(!err.is_internal());
}

#[tokio::test]
async fn syntax_errors_carry_position() {
    let rt = runtime();
    let err = rt.run_input("ok\n  $if[1 == 1;yes", "syntax").await.unwrap_err();
    assert_eq!(err.position(), Some((2, 3)));
    assert_eq!(err.to_string(), "2:3: Expected ']', got none");
}

// ── Nesting ───────────────────────────────────────────────────────────────────

fn nested_get(levels: usize) -> String {
    format!("{}x{}", "$get[".repeat(levels), "]".repeat(levels))
}

#[tokio::test]
async fn nesting_within_the_limit_runs() {
    let rt = runtime();
    assert_eq!(
        rt.run_input(&nested_get(MAX_NESTING - 1), "deep").await.unwrap(),
        Value::Undefined
    );
    assert_eq!(
        rt.run_input(&nested_get(MAX_NESTING), "deep").await.unwrap(),
        Value::Undefined
    );
}

#[tokio::test]
async fn deep_nesting_is_an_error_not_a_crash() {
    let rt = runtime();
    for levels in [MAX_NESTING + 1, 400, 2000] {
        let err = rt.run_input(&nested_get(levels), "deep").await.unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { .. }), "{levels}: {err:?}");
    }
    // The runtime is still usable afterwards.
    assert_eq!(rt.run_input("$five", "after").await.unwrap(), Value::Int(5));
}
