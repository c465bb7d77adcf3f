//! Sequences several argument obtain loops into one composite result.

use std::collections::HashMap;

use super::argument::{Argument, ArgumentSpec, CancelReason, ObtainOutcome, ObtainResult};
use super::registry::Registry;
use super::types::ArgumentValue;
use super::CommandCtxt;
use crate::adapter::{InboundMessage, SentMessage};

#[derive(Debug)]
pub enum CollectorOutcome {
    Complete(HashMap<String, ArgumentValue>),
    Cancelled(CancelReason),
}

/// Result of a whole collection run, with prompts and answers accumulated
/// across every argument attempted.
#[derive(Debug)]
pub struct CollectorResult {
    pub outcome: CollectorOutcome,
    pub prompts: Vec<SentMessage>,
    pub answers: Vec<InboundMessage>,
}

/// Obtains an ordered list of arguments from a provided value set, prompting
/// interactively for whatever is missing or invalid.
pub struct ArgumentCollector {
    pub args: Vec<Argument>,
    pub prompt_limit: Option<u32>,
}

impl ArgumentCollector {
    /// Builds the collector, enforcing the ordering invariants: required
    /// arguments may not follow optional ones, and only the last argument
    /// may be infinite. Violations are configuration errors and panic.
    pub fn new(specs: Vec<ArgumentSpec>, prompt_limit: Option<u32>, registry: &Registry) -> Self {
        assert!(!specs.is_empty(), "collector arguments must not be empty");

        let mut args = Vec::with_capacity(specs.len());
        let mut has_infinite = false;
        let mut has_optional = false;
        for spec in specs {
            assert!(!has_infinite, "no other argument may come after an infinite argument");
            if spec.default.is_some() {
                has_optional = true;
            } else {
                assert!(
                    !has_optional,
                    "required arguments may not come after optional arguments"
                );
            }
            let arg = Argument::from_spec(spec, registry);
            has_infinite |= arg.infinite;
            args.push(arg);
        }

        ArgumentCollector { args, prompt_limit }
    }

    /// Runs every argument in order against the provided values. Holds the
    /// (author, channel) reentrancy guard for the duration of the call; the
    /// guard is released on every exit path, including errors.
    pub async fn obtain(&self, cx: &CommandCtxt<'_>, provided: &[String]) -> anyhow::Result<CollectorResult> {
        let author = cx.invocation.message.author.id;
        let channel = cx.invocation.message.channel_id;
        let _guard = cx.herald.dispatcher.awaiting.acquire(author, channel);

        let mut values = HashMap::new();
        let mut prompts = Vec::new();
        let mut answers = Vec::new();

        for (i, arg) in self.args.iter().enumerate() {
            let result: ObtainResult = if arg.infinite {
                let rest = &provided[i.min(provided.len())..];
                arg.obtain_many(cx, rest, self.prompt_limit).await?
            } else {
                arg.obtain(cx, provided.get(i).map(String::as_str), self.prompt_limit)
                    .await?
            };

            prompts.extend(result.prompts);
            answers.extend(result.answers);

            match result.outcome {
                ObtainOutcome::Collected(value) => {
                    values.insert(arg.key.clone(), value);
                },
                ObtainOutcome::Cancelled(reason) => {
                    return Ok(CollectorResult {
                        outcome: CollectorOutcome::Cancelled(reason),
                        prompts,
                        answers,
                    });
                },
            }
        }

        Ok(CollectorResult {
            outcome: CollectorOutcome::Complete(values),
            prompts,
            answers,
        })
    }
}
