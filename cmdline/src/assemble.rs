//! Command assembly: orders a tool's arguments and bound inputs, renders
//! them concurrently, and joins the results into one command line.

use futures::future::{BoxFuture, join_all};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::core::expression::{Context, RuntimeContext};
use crate::core::fragment::Fragment;
use crate::core::render::{Engine, Rendered, Target};
use crate::core::validation::Validation;
use crate::core::value::JobValue;
use crate::tool::ToolDescription;

/// Triggers cancellation for every [`CancelToken`] cloned from the pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Create a linked handle and token.
pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_, token) = cancellation();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Pends forever if the handle is dropped first.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Result of assembling one invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Assembled {
    pub command_line: String,
    /// Non-null fragments in command-line order, redirections last.
    pub fragments: Vec<Fragment>,
    pub validation: Validation,
    /// True when cancellation dropped at least one in-flight render.
    pub cancelled: bool,
}

/// Tie-breaker within one position: arguments by index, then inputs by id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey<'t> {
    Argument(usize),
    Input(&'t str),
}

/// Render `tool` against `job` and join the pieces.
#[instrument(skip_all, fields(tool = tool.id.as_deref().unwrap_or("<anonymous>")))]
pub async fn assemble(
    tool: &ToolDescription,
    job: &JobValue,
    engine: &Engine<'_>,
    runtime: RuntimeContext,
    cancel: &CancelToken,
) -> Assembled {
    let job = with_defaults(tool, job);
    let context = Context::new(job.clone(), runtime);

    let mut entries: Vec<(i64, SortKey<'_>, Target<'_>)> = tool
        .arguments
        .iter()
        .enumerate()
        .map(|(i, argument)| {
            (
                argument.position,
                SortKey::Argument(i),
                Target::Argument(&argument.descriptor),
            )
        })
        .collect();
    entries.extend(tool.inputs.iter().filter_map(|input| {
        input.position.map(|position| {
            (
                position,
                SortKey::Input(input.descriptor.id.as_str()),
                Target::Input(&input.descriptor),
            )
        })
    }));
    entries.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
    entries.extend(
        [tool.stdin.as_ref(), tool.stdout.as_ref()]
            .into_iter()
            .flatten()
            .map(|stream| {
                (
                    i64::MAX,
                    SortKey::Argument(usize::MAX),
                    Target::Stream(stream),
                )
            }),
    );
    debug!(entries = entries.len(), "dispatching");

    let renders = entries
        .iter()
        .map(|(_, _, target)| guarded(engine.render(*target, &job, None, &context), cancel));
    let outcomes = join_all(renders).await;

    let mut assembled = Assembled::default();
    let mut words: Vec<String> = tool.base_command.clone();
    for outcome in outcomes {
        let Some(rendered) = outcome else {
            assembled.cancelled = true;
            continue;
        };
        assembled.validation.merge(rendered.validation);
        let Some(fragment) = rendered.fragment else {
            continue;
        };
        if !fragment.is_empty() {
            words.push(fragment.text.trim().to_string());
        }
        assembled.fragments.push(fragment);
    }
    assembled.command_line = words.join(" ");

    if assembled.cancelled {
        warn!("render cancelled");
    } else {
        info!(
            errors = assembled.validation.errors.len(),
            warnings = assembled.validation.warnings.len(),
            "assembled command line"
        );
    }
    assembled
}

async fn guarded(render: BoxFuture<'_, Rendered>, cancel: &CancelToken) -> Option<Rendered> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        rendered = render => Some(rendered),
    }
}

/// Fill absent or null job entries from declared defaults.
fn with_defaults(tool: &ToolDescription, job: &JobValue) -> JobValue {
    let mut entries = match job {
        JobValue::Mapping(entries) => entries.clone(),
        _ => Default::default(),
    };
    for input in &tool.inputs {
        let Some(default) = &input.default else {
            continue;
        };
        let id = &input.descriptor.id;
        if entries.get(id).is_none_or(JobValue::is_null) {
            entries.insert(id.clone(), default.clone());
        }
    }
    JobValue::Mapping(entries)
}
