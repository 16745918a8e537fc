//! `chorus script` command implementation.
//!
//! Drives a [`CommentSession`] against in-memory storage from a JSON script:
//!
//! ```json
//! {
//!   "comments": [],
//!   "steps": [
//!     {"op": "add", "draft": {"content": "Looks off"}},
//!     {"op": "reply", "parentId": "@0", "draft": {"content": "Fixed"}},
//!     {"op": "resolve", "id": "@0"}
//!   ]
//! }
//! ```
//!
//! `@N` stands for the comment id produced by step `N` (zero-based).

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chorus_comments::{Comment, CommentDraft, CommentPatch, CommentState, ReactionType};
use chorus_config::Config;
use chorus_events::{CommentEvent, EventKind};
use chorus_mentions::Extractor;
use chorus_session::{CommentSession, SessionOptions};
use chorus_storage::{LoadScope, MockStorage};
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::error::CliError;
use crate::output::{Output, write_json};

/// Arguments for the script command.
#[derive(Args)]
pub(crate) struct ScriptArgs {
    /// Script file (JSON). Use `-` for stdin.
    file: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Script {
    /// Comments already in storage before the first step.
    #[serde(default)]
    comments: Vec<Comment>,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum Step {
    Add {
        draft: CommentDraft,
    },
    Reply {
        parent_id: String,
        draft: CommentDraft,
    },
    Update {
        id: String,
        patch: CommentPatch,
    },
    Delete {
        id: String,
    },
    React {
        id: String,
        #[serde(rename = "type")]
        reaction: ReactionType,
    },
    Resolve {
        id: String,
    },
    Reopen {
        id: String,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Reply { .. } => "reply",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::React { .. } => "react",
            Self::Resolve { .. } => "resolve",
            Self::Reopen { .. } => "reopen",
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    state: &'a CommentState,
    events: Vec<CommentEvent>,
    unresolved: usize,
}

impl ScriptArgs {
    /// Execute the script command.
    ///
    /// Failed steps are reported and skipped; later steps still run.
    ///
    /// # Errors
    ///
    /// Returns an error if the script can't be read or parsed, or if loading
    /// the seeded comments fails.
    pub(crate) fn execute(self, config: &Config) -> Result<(), CliError> {
        let output = Output::new();
        let script: Script = serde_json::from_str(&super::read_input(&self.file)?)?;
        let step_count = script.steps.len();

        let storage = Arc::new(MockStorage::new().with_comments(script.comments));
        let options = SessionOptions {
            max_length: config.comments.max_length,
            extractor: Extractor::new().with_node_type(&config.mentions.node_type),
        };
        let mut session =
            CommentSession::new(storage, config.user.to_user()).with_options(options);

        let rt = super::runtime()?;
        rt.block_on(session.load(&LoadScope::all()))?;

        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriptions: Vec<_> = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let events = Arc::clone(&events);
                session.emitter().on(kind, move |event| {
                    events
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(event.clone());
                    Ok(())
                })
            })
            .collect();

        let produced = rt.block_on(run(&mut session, script.steps, &output));
        for subscription in subscriptions {
            subscription.unsubscribe();
        }

        let failed = produced.iter().filter(|id| id.is_none()).count();
        if failed == 0 {
            output.success(&format!("Ran {step_count} step(s)"));
        } else {
            output.warning(&format!("Ran {step_count} step(s), {failed} failed"));
        }

        let events = std::mem::take(&mut *events.lock().unwrap_or_else(PoisonError::into_inner));
        write_json(&Report {
            state: session.state(),
            events,
            unresolved: session.unresolved_count(),
        })?;
        Ok(())
    }
}

/// Apply steps in order. Returns the comment id each step touched, `None`
/// for steps that failed.
async fn run(
    session: &mut CommentSession,
    steps: Vec<Step>,
    output: &Output,
) -> Vec<Option<String>> {
    let mut produced = Vec::with_capacity(steps.len());
    for (index, step) in steps.into_iter().enumerate() {
        let name = step.name();
        match apply(session, step, &produced).await {
            Ok(id) => produced.push(Some(id)),
            Err(err) => {
                output.warning(&format!("Step {index} ({name}) failed: {err}"));
                produced.push(None);
            }
        }
    }
    produced
}

async fn apply(
    session: &mut CommentSession,
    step: Step,
    produced: &[Option<String>],
) -> Result<String, CliError> {
    let id = match step {
        Step::Add { draft } => session.add_comment(draft).await?.id,
        Step::Reply { parent_id, draft } => {
            let parent_id = resolve_ref(&parent_id, produced)?;
            session.reply(parent_id, draft).await?.id
        }
        Step::Update { id, patch } => {
            let id = resolve_ref(&id, produced)?;
            session.update_comment(id, patch).await?.id
        }
        Step::Delete { id } => {
            let id = resolve_ref(&id, produced)?;
            session.delete_comment(id).await?;
            id.to_owned()
        }
        Step::React { id, reaction } => {
            let id = resolve_ref(&id, produced)?;
            session.toggle_reaction(id, reaction).await?;
            id.to_owned()
        }
        Step::Resolve { id } => {
            let id = resolve_ref(&id, produced)?;
            session.resolve_thread(id).await?;
            id.to_owned()
        }
        Step::Reopen { id } => {
            let id = resolve_ref(&id, produced)?;
            session.reopen_thread(id).await?;
            id.to_owned()
        }
    };
    Ok(id)
}

/// Turn `@N` into the id produced by step `N`. Other values pass through.
fn resolve_ref<'a>(raw: &'a str, produced: &'a [Option<String>]) -> Result<&'a str, CliError> {
    let Some(index) = raw.strip_prefix('@') else {
        return Ok(raw);
    };
    let index: usize = index
        .parse()
        .map_err(|_| CliError::Validation(format!("invalid step reference: {raw}")))?;
    match produced.get(index) {
        Some(Some(id)) => Ok(id),
        Some(None) => Err(CliError::Validation(format!(
            "step {index} failed and produced no comment"
        ))),
        None => Err(CliError::Validation(format!(
            "step reference {raw} points at a later step"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use chorus_comments::User;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn session(seed: Vec<Comment>) -> CommentSession {
        let storage = Arc::new(MockStorage::new().with_comments(seed));
        CommentSession::new(storage, User::new("u1", "Ada"))
    }

    fn steps(value: serde_json::Value) -> Vec<Step> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resolve_ref_passes_plain_ids_through() {
        assert_eq!(resolve_ref("c1", &[]).unwrap(), "c1");
    }

    #[test]
    fn test_resolve_ref_looks_up_earlier_steps() {
        let produced = vec![Some("c1".to_owned()), None];

        assert_eq!(resolve_ref("@0", &produced).unwrap(), "c1");
        assert!(resolve_ref("@1", &produced).is_err());
        assert!(resolve_ref("@2", &produced).is_err());
        assert!(resolve_ref("@x", &produced).is_err());
    }

    #[test]
    fn test_parse_script() {
        let script: Script = serde_json::from_value(json!({
            "steps": [
                {"op": "add", "draft": {"content": "hi", "sourceId": "doc-1"}},
                {"op": "reply", "parentId": "@0", "draft": {"content": "yo"}},
                {"op": "react", "id": "@0", "type": "approve"},
                {"op": "update", "id": "@1", "patch": {"content": "hey"}}
            ]
        }))
        .unwrap();

        assert!(script.comments.is_empty());
        let names: Vec<&str> = script.steps.iter().map(Step::name).collect();
        assert_eq!(names, vec!["add", "reply", "react", "update"]);
    }

    #[test]
    fn test_parse_rejects_unknown_op() {
        let result: Result<Script, _> =
            serde_json::from_value(json!({"steps": [{"op": "pin", "id": "c1"}]}));

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_threads_references_between_steps() {
        let mut session = session(Vec::new());
        let steps = steps(json!([
            {"op": "add", "draft": {"content": "Looks off"}},
            {"op": "reply", "parentId": "@0", "draft": {"content": "Fixed"}},
            {"op": "resolve", "id": "@0"}
        ]));

        let produced = run(&mut session, steps, &Output::new()).await;

        assert!(produced.iter().all(Option::is_some));
        assert_eq!(produced[2], produced[0]);
        let reply = session.find(produced[1].as_deref().unwrap()).unwrap();
        assert_eq!(reply.parent_id, produced[0]);
        assert_eq!(session.unresolved_count(), 0);
    }

    #[tokio::test]
    async fn test_run_continues_after_failed_step() {
        let seed = Comment::new("c1", "seed", User::new("u2", "Grace"));
        let mut session = session(vec![seed]);
        session.load(&LoadScope::all()).await.unwrap();
        let steps = steps(json!([
            {"op": "add", "draft": {"content": "   "}},
            {"op": "reply", "parentId": "@0", "draft": {"content": "orphan"}},
            {"op": "delete", "id": "c1"}
        ]));

        let produced = run(&mut session, steps, &Output::new()).await;

        assert_eq!(produced, vec![None, None, Some("c1".to_owned())]);
        assert!(session.comments().is_empty());
    }
}
