//! A single argument specification and its interactive obtain loops.
//!
//! [`Argument::obtain`] drives the scalar prompt/validate/retry dialogue;
//! [`Argument::obtain_many`] is the variadic variant consuming provided
//! values positionally before prompting. Both suspend on
//! [`ChatAdapter::await_reply`](crate::adapter::ChatAdapter::await_reply) and
//! report cancellation as data, never as an error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use herald_common::util::escape_markdown;

use super::registry::Registry;
use super::types::{ArgumentKind, ArgumentValue, Validation};
use super::CommandCtxt;
use crate::adapter::{ChatAdapter, InboundMessage, SentMessage};
use crate::invocation::Invocation;

/// Reply that aborts the collection.
pub const CANCEL_KEYWORD: &str = "cancel";
/// Reply that finishes an infinite argument with whatever was collected.
pub const FINISH_KEYWORD: &str = "finish";

const DEFAULT_WAIT: Duration = Duration::from_secs(30);

/// Longest invalid entry echoed back before being elided.
const MAX_ECHO_LEN: usize = 1850;

pub type CustomValidator = Arc<dyn Fn(&str, &Argument) -> Validation + Send + Sync>;
pub type CustomParser = Arc<dyn Fn(&str, &Argument) -> anyhow::Result<ArgumentValue> + Send + Sync>;
pub type CustomEmptyChecker = Arc<dyn Fn(&str, &Argument) -> bool + Send + Sync>;

/// Default for an optional argument: a literal value, or a function of the
/// invocation resolved at obtain time.
#[derive(Clone)]
pub enum ArgumentDefault {
    Value(ArgumentValue),
    Dynamic(Arc<dyn Fn(&Invocation) -> ArgumentValue + Send + Sync>),
}

impl ArgumentDefault {
    fn resolve(&self, invocation: &Invocation) -> ArgumentValue {
        match self {
            ArgumentDefault::Value(v) => v.clone(),
            ArgumentDefault::Dynamic(f) => f(invocation),
        }
    }
}

impl fmt::Debug for ArgumentDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentDefault::Value(v) => f.debug_tuple("Value").field(v).finish(),
            ArgumentDefault::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Declarative description of one command argument.
pub struct ArgumentSpec {
    pub key: String,
    pub label: Option<String>,
    pub prompt: String,
    /// Overrides every validation rejection message.
    pub error: Option<String>,
    /// Type id; may join several ids with `|` to form a union.
    pub kind: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<ArgumentDefault>,
    pub one_of: Option<Vec<String>>,
    pub infinite: bool,
    pub validator: Option<CustomValidator>,
    pub parser: Option<CustomParser>,
    pub empty_checker: Option<CustomEmptyChecker>,
    /// Reply wait window in seconds; `0` disables the timeout, absent means
    /// 30 seconds.
    pub wait: Option<u64>,
}

impl ArgumentSpec {
    pub fn new(key: impl Into<String>, kind: impl Into<String>, prompt: impl Into<String>) -> Self {
        ArgumentSpec {
            key: key.into(),
            label: None,
            prompt: prompt.into(),
            error: None,
            kind: Some(kind.into()),
            min: None,
            max: None,
            default: None,
            one_of: None,
            infinite: false,
            validator: None,
            parser: None,
            empty_checker: None,
            wait: None,
        }
    }

    /// A spec with no type id; requires both a custom validator and parser.
    pub fn custom(key: impl Into<String>, prompt: impl Into<String>) -> Self {
        let mut spec = Self::new(key, "", prompt);
        spec.kind = None;
        spec
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: ArgumentValue) -> Self {
        self.default = Some(ArgumentDefault::Value(value));
        self
    }

    #[must_use]
    pub fn default_with(mut self, f: impl Fn(&Invocation) -> ArgumentValue + Send + Sync + 'static) -> Self {
        self.default = Some(ArgumentDefault::Dynamic(Arc::new(f)));
        self
    }

    #[must_use]
    pub fn one_of(mut self, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.one_of = Some(options.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn infinite(mut self) -> Self {
        self.infinite = true;
        self
    }

    #[must_use]
    pub fn validator(mut self, f: impl Fn(&str, &Argument) -> Validation + Send + Sync + 'static) -> Self {
        self.validator = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn parser(
        mut self,
        f: impl Fn(&str, &Argument) -> anyhow::Result<ArgumentValue> + Send + Sync + 'static,
    ) -> Self {
        self.parser = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn empty_checker(mut self, f: impl Fn(&str, &Argument) -> bool + Send + Sync + 'static) -> Self {
        self.empty_checker = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn wait(mut self, seconds: u64) -> Self {
        self.wait = Some(seconds);
        self
    }
}

/// Why a collection ended without producing a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The user replied with the cancel keyword.
    User,
    /// No reply arrived within the wait window.
    Time,
    /// Too many invalid attempts.
    PromptLimit,
}

impl CancelReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CancelReason::User => "user",
            CancelReason::Time => "time",
            CancelReason::PromptLimit => "promptLimit",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum ObtainOutcome {
    Collected(ArgumentValue),
    Cancelled(CancelReason),
}

/// Result of one argument's obtain loop, with the full prompt/answer history.
#[derive(Debug)]
pub struct ObtainResult {
    pub outcome: ObtainOutcome,
    pub prompts: Vec<SentMessage>,
    pub answers: Vec<InboundMessage>,
}

impl ObtainResult {
    fn collected(value: ArgumentValue, prompts: Vec<SentMessage>, answers: Vec<InboundMessage>) -> Self {
        ObtainResult {
            outcome: ObtainOutcome::Collected(value),
            prompts,
            answers,
        }
    }

    fn cancelled(reason: CancelReason, prompts: Vec<SentMessage>, answers: Vec<InboundMessage>) -> Self {
        ObtainResult {
            outcome: ObtainOutcome::Cancelled(reason),
            prompts,
            answers,
        }
    }
}

/// An argument spec resolved against the registry, ready to obtain values.
pub struct Argument {
    pub key: String,
    pub label: String,
    pub prompt: String,
    pub error: Option<String>,
    pub kind: Option<Arc<dyn ArgumentKind>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<ArgumentDefault>,
    pub one_of: Option<Vec<String>>,
    pub infinite: bool,
    validator: Option<CustomValidator>,
    parser: Option<CustomParser>,
    empty_checker: Option<CustomEmptyChecker>,
    /// `None` disables the timeout.
    pub wait: Option<Duration>,
}

impl Argument {
    /// Builds an argument from its spec, resolving the type id. Malformed
    /// specs are programmer errors and panic.
    pub fn from_spec(spec: ArgumentSpec, registry: &Registry) -> Self {
        assert!(!spec.key.is_empty(), "argument key must not be empty");
        assert!(!spec.prompt.is_empty(), "argument prompt must not be empty");
        if spec.kind.is_none() {
            assert!(
                spec.validator.is_some() && spec.parser.is_some(),
                "argument {:?} must have both a validator and a parser since it has no type",
                spec.key
            );
        }

        let kind = spec.kind.as_deref().map(|id| registry.resolve_kind(id));
        let one_of = spec
            .one_of
            .map(|options| options.into_iter().map(|o| o.to_lowercase()).collect());

        Argument {
            label: spec.label.unwrap_or_else(|| spec.key.clone()),
            key: spec.key,
            prompt: spec.prompt,
            error: spec.error,
            kind,
            min: spec.min,
            max: spec.max,
            default: spec.default,
            one_of,
            infinite: spec.infinite,
            validator: spec.validator,
            parser: spec.parser,
            empty_checker: spec.empty_checker,
            wait: match spec.wait {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => Some(DEFAULT_WAIT),
            },
        }
    }

    /// Obtains a scalar value: resolves the default when the provided value
    /// is empty, otherwise validates and reprompts until the value is
    /// accepted, cancelled or the prompt limit is hit.
    pub async fn obtain(
        &self,
        cx: &CommandCtxt<'_>,
        provided: Option<&str>,
        prompt_limit: Option<u32>,
    ) -> anyhow::Result<ObtainResult> {
        let mut val = provided.map(str::to_owned);
        let mut empty = self.is_empty(val.as_deref().unwrap_or(""));
        if empty {
            if let Some(default) = &self.default {
                let value = default.resolve(cx.invocation);
                return Ok(ObtainResult::collected(value, Vec::new(), Vec::new()));
            }
        }

        let mut prompts = Vec::new();
        let mut answers = Vec::new();
        let mut valid = match (&val, empty) {
            (Some(v), false) => self.validate(v, cx).await,
            _ => Validation::Invalid,
        };

        while !valid.is_valid() {
            if let Some(limit) = prompt_limit {
                if prompts.len() as u32 >= limit {
                    return Ok(ObtainResult::cancelled(CancelReason::PromptLimit, prompts, answers));
                }
            }

            let body = if empty {
                self.prompt.clone()
            } else if let Validation::Reject(msg) = &valid {
                msg.clone()
            } else {
                format!("You provided an invalid {}. Please try again.", self.label)
            };
            let prompt = cx.reply(&format!("{body}\n{}", self.cancel_note(false))).await?;
            prompts.push(prompt);

            let author = cx.invocation.message.author.id;
            let channel = cx.invocation.message.channel_id;
            let Some(answer) = cx.herald.adapter.await_reply(author, channel, self.wait).await else {
                return Ok(ObtainResult::cancelled(CancelReason::Time, prompts, answers));
            };
            val = Some(answer.content.clone());
            answers.push(answer);

            let candidate = val.as_deref().unwrap_or("");
            if candidate.eq_ignore_ascii_case(CANCEL_KEYWORD) {
                return Ok(ObtainResult::cancelled(CancelReason::User, prompts, answers));
            }

            empty = self.is_empty(candidate);
            valid = self.validate(candidate, cx).await;
        }

        let value = self.parse(val.as_deref().unwrap_or(""), cx).await?;
        Ok(ObtainResult::collected(value, prompts, answers))
    }

    /// Obtains a sequence of values for an infinite argument: consumes
    /// `provided` positionally, then prompts until the finish keyword, a
    /// cancellation or the per-slot prompt limit.
    pub async fn obtain_many(
        &self,
        cx: &CommandCtxt<'_>,
        provided: &[String],
        prompt_limit: Option<u32>,
    ) -> anyhow::Result<ObtainResult> {
        if provided.is_empty() {
            if let Some(default) = &self.default {
                let value = default.resolve(cx.invocation);
                return Ok(ObtainResult::collected(value, Vec::new(), Vec::new()));
            }
        }

        let author = cx.invocation.message.author.id;
        let channel = cx.invocation.message.channel_id;

        let mut results = Vec::new();
        let mut prompts = Vec::new();
        let mut answers = Vec::new();
        let mut current = 0usize;

        loop {
            let mut val = provided.get(current).filter(|v| !v.is_empty()).cloned();
            let mut valid = match &val {
                Some(v) => self.validate(v, cx).await,
                None => Validation::Invalid,
            };
            let mut attempts = 0u32;

            while !valid.is_valid() {
                attempts += 1;
                if let Some(limit) = prompt_limit {
                    if attempts > limit {
                        return Ok(ObtainResult::cancelled(CancelReason::PromptLimit, prompts, answers));
                    }
                }

                if let Some(v) = &val {
                    let body = if let Validation::Reject(msg) = &valid {
                        msg.clone()
                    } else {
                        let escaped = escape_markdown(v);
                        let shown = if escaped.chars().count() < MAX_ECHO_LEN {
                            escaped
                        } else {
                            "[too long to show]".to_owned()
                        };
                        format!("You provided an invalid {}, \"{shown}\". Please try again.", self.label)
                    };
                    let prompt = cx.reply(&format!("{body}\n{}", self.cancel_note(true))).await?;
                    prompts.push(prompt);
                } else if results.is_empty() {
                    let prompt = cx
                        .reply(&format!("{}\n{}", self.prompt, self.cancel_note(true)))
                        .await?;
                    prompts.push(prompt);
                }

                let Some(answer) = cx.herald.adapter.await_reply(author, channel, self.wait).await else {
                    return Ok(ObtainResult::cancelled(CancelReason::Time, prompts, answers));
                };
                val = Some(answer.content.clone());
                answers.push(answer);
                let candidate = val.as_deref().unwrap_or("");

                if candidate.eq_ignore_ascii_case(FINISH_KEYWORD) {
                    if !results.is_empty() {
                        return Ok(ObtainResult::collected(ArgumentValue::Many(results), prompts, answers));
                    }
                    if let Some(default) = &self.default {
                        let value = default.resolve(cx.invocation);
                        return Ok(ObtainResult::collected(value, prompts, answers));
                    }
                    return Ok(ObtainResult::cancelled(CancelReason::User, prompts, answers));
                }
                if candidate.eq_ignore_ascii_case(CANCEL_KEYWORD) {
                    return Ok(ObtainResult::cancelled(CancelReason::User, prompts, answers));
                }

                valid = self.validate(candidate, cx).await;
            }

            let value = self.parse(val.as_deref().unwrap_or(""), cx).await?;
            results.push(value);

            if !provided.is_empty() {
                current += 1;
                if current == provided.len() {
                    return Ok(ObtainResult::collected(ArgumentValue::Many(results), prompts, answers));
                }
            }
        }
    }

    async fn validate(&self, val: &str, cx: &CommandCtxt<'_>) -> Validation {
        let result = if let Some(validator) = &self.validator {
            validator(val, self)
        } else if let Some(kind) = &self.kind {
            kind.validate(val, cx, self).await
        } else {
            Validation::Invalid
        };
        match result {
            Validation::Valid => Validation::Valid,
            other => match &self.error {
                Some(error) => Validation::Reject(error.clone()),
                None => other,
            },
        }
    }

    async fn parse(&self, val: &str, cx: &CommandCtxt<'_>) -> anyhow::Result<ArgumentValue> {
        if let Some(parser) = &self.parser {
            return parser(val, self);
        }
        match &self.kind {
            Some(kind) => kind.parse(val, cx, self).await,
            None => anyhow::bail!("argument {:?} has neither a parser nor a type", self.key),
        }
    }

    fn is_empty(&self, val: &str) -> bool {
        if let Some(checker) = &self.empty_checker {
            return checker(val, self);
        }
        match &self.kind {
            Some(kind) => kind.is_empty(val, self),
            None => val.is_empty(),
        }
    }

    fn cancel_note(&self, infinite: bool) -> String {
        let mut note = if infinite {
            format!(
                "Respond with `{CANCEL_KEYWORD}` to cancel the command, or `{FINISH_KEYWORD}` to finish entry up to this point."
            )
        } else {
            format!("Respond with `{CANCEL_KEYWORD}` to cancel the command.")
        };
        if let Some(wait) = self.wait {
            note.push_str(&format!(
                " The command will automatically be cancelled in {} seconds.",
                wait.as_secs()
            ));
        }
        note
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandCtxt;
    use crate::herald::Herald;
    use crate::invocation::Invocation;
    use crate::test_util::{herald, message, MockAdapter};

    fn invocation() -> Invocation {
        Invocation::new(message(1, 10, 20, None, ""), None, String::new(), None)
    }

    fn string_arg(herald: &Herald) -> Argument {
        Argument::from_spec(ArgumentSpec::new("word", "string", "What word?"), &herald.registry)
    }

    fn integer_arg(herald: &Herald) -> Argument {
        Argument::from_spec(ArgumentSpec::new("count", "integer", "How many?"), &herald.registry)
    }

    #[tokio::test]
    async fn empty_with_default_never_prompts() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = Argument::from_spec(
            ArgumentSpec::new("word", "string", "What word?").default_value(ArgumentValue::Text("fallback".into())),
            &client.registry,
        );

        let result = arg.obtain(&cx, Some(""), None).await.unwrap();
        assert!(
            matches!(result.outcome, ObtainOutcome::Collected(ArgumentValue::Text(ref t)) if t == "fallback")
        );
        assert!(result.prompts.is_empty());
        assert!(result.answers.is_empty());
        assert!(adapter.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dynamic_default_gets_the_invocation() {
        let adapter = MockAdapter::new();
        let client = herald(adapter);
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = Argument::from_spec(
            ArgumentSpec::new("who", "string", "Who?")
                .default_with(|inv| ArgumentValue::Integer(inv.message.author.id as i64)),
            &client.registry,
        );

        let result = arg.obtain(&cx, None, None).await.unwrap();
        assert!(matches!(result.outcome, ObtainOutcome::Collected(ArgumentValue::Integer(10))));
    }

    #[tokio::test]
    async fn rejects_then_accepts_with_full_history() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = integer_arg(&client);

        adapter.queue_reply("still wrong");
        adapter.queue_reply("42");
        let result = arg.obtain(&cx, Some("not a number"), None).await.unwrap();

        assert!(matches!(result.outcome, ObtainOutcome::Collected(ArgumentValue::Integer(42))));
        assert_eq!(result.prompts.len(), 2);
        assert_eq!(result.answers.len(), 2);
        let contents = adapter.sent_contents();
        assert!(contents[0].contains("You provided an invalid count"));
        assert!(contents[0].contains("Respond with `cancel`"));
    }

    #[tokio::test]
    async fn no_reply_is_a_time_cancellation() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = Argument::from_spec(
            ArgumentSpec::new("what", "string", "What?").wait(1),
            &client.registry,
        );

        adapter.queue_timeout();
        let result = arg.obtain(&cx, Some(""), None).await.unwrap();

        assert!(matches!(result.outcome, ObtainOutcome::Cancelled(CancelReason::Time)));
        assert_eq!(result.prompts.len(), 1);
        assert!(result.answers.is_empty());
        assert!(adapter.sent_contents()[0].contains("What?"));
    }

    #[tokio::test]
    async fn cancel_keyword_is_case_insensitive() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = integer_arg(&client);

        adapter.queue_reply("CaNcEl");
        let result = arg.obtain(&cx, Some("junk"), None).await.unwrap();
        assert!(matches!(result.outcome, ObtainOutcome::Cancelled(CancelReason::User)));
    }

    #[tokio::test]
    async fn prompt_limit_cancels_after_too_many_attempts() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = integer_arg(&client);

        adapter.queue_reply("nope");
        adapter.queue_reply("still nope");
        let result = arg.obtain(&cx, Some("bad"), Some(2)).await.unwrap();

        assert!(matches!(result.outcome, ObtainOutcome::Cancelled(CancelReason::PromptLimit)));
        assert_eq!(result.prompts.len(), 2);
    }

    #[tokio::test]
    async fn zero_prompt_limit_cancels_without_prompting() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = string_arg(&client);

        let result = arg.obtain(&cx, None, Some(0)).await.unwrap();
        assert!(matches!(result.outcome, ObtainOutcome::Cancelled(CancelReason::PromptLimit)));
        assert!(result.prompts.is_empty());
    }

    #[tokio::test]
    async fn error_override_replaces_rejection_message() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = Argument::from_spec(
            ArgumentSpec::new("count", "integer", "How many?").error("Numbers only, please."),
            &client.registry,
        );

        adapter.queue_reply("3");
        let result = arg.obtain(&cx, Some("x"), None).await.unwrap();
        assert!(matches!(result.outcome, ObtainOutcome::Collected(ArgumentValue::Integer(3))));
        assert!(adapter.sent_contents()[0].contains("Numbers only, please."));
    }

    #[tokio::test]
    async fn custom_validator_and_parser_take_precedence() {
        let adapter = MockAdapter::new();
        let client = herald(adapter);
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = Argument::from_spec(
            ArgumentSpec::custom("shout", "Say something loud.")
                .validator(|val, _| {
                    if val.chars().all(|c| c.is_uppercase() || c.is_whitespace()) {
                        Validation::Valid
                    } else {
                        Validation::Reject("Use upper case.".into())
                    }
                })
                .parser(|val, _| Ok(ArgumentValue::Text(val.to_lowercase()))),
            &client.registry,
        );

        let result = arg.obtain(&cx, Some("LOUD"), None).await.unwrap();
        assert!(matches!(result.outcome, ObtainOutcome::Collected(ArgumentValue::Text(ref t)) if t == "loud"));
    }

    #[tokio::test]
    async fn infinite_finish_returns_collected_values() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = Argument::from_spec(
            ArgumentSpec::new("numbers", "integer", "Give me numbers.").infinite(),
            &client.registry,
        );

        adapter.queue_reply("1");
        adapter.queue_reply("2");
        adapter.queue_reply("FINISH");
        let result = arg.obtain_many(&cx, &[], None).await.unwrap();

        match result.outcome {
            ObtainOutcome::Collected(ArgumentValue::Many(values)) => {
                assert_eq!(values, vec![ArgumentValue::Integer(1), ArgumentValue::Integer(2)]);
            },
            other => panic!("expected collected values, got {other:?}"),
        }
        // only the initial prompt goes out; later slots just wait for input
        assert_eq!(result.prompts.len(), 1);
        assert!(adapter.sent_contents()[0].contains("`finish`"));
    }

    #[tokio::test]
    async fn infinite_finish_with_nothing_collected_is_user_cancellation() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = Argument::from_spec(
            ArgumentSpec::new("numbers", "integer", "Give me numbers.").infinite(),
            &client.registry,
        );

        adapter.queue_reply("finish");
        let result = arg.obtain_many(&cx, &[], None).await.unwrap();
        assert!(matches!(result.outcome, ObtainOutcome::Cancelled(CancelReason::User)));
    }

    #[tokio::test]
    async fn infinite_cancel_discards_partial_results() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = Argument::from_spec(
            ArgumentSpec::new("numbers", "integer", "Give me numbers.").infinite(),
            &client.registry,
        );

        adapter.queue_reply("5");
        adapter.queue_reply("cancel");
        let result = arg.obtain_many(&cx, &[], None).await.unwrap();
        assert!(matches!(result.outcome, ObtainOutcome::Cancelled(CancelReason::User)));
    }

    #[tokio::test]
    async fn infinite_consumes_provided_values_without_prompting() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = Argument::from_spec(
            ArgumentSpec::new("numbers", "integer", "Give me numbers.").infinite(),
            &client.registry,
        );

        let provided = vec!["3".to_owned(), "4".to_owned()];
        let result = arg.obtain_many(&cx, &provided, None).await.unwrap();
        match result.outcome {
            ObtainOutcome::Collected(ArgumentValue::Many(values)) => {
                assert_eq!(values, vec![ArgumentValue::Integer(3), ArgumentValue::Integer(4)]);
            },
            other => panic!("expected collected values, got {other:?}"),
        }
        assert!(result.prompts.is_empty());
        assert!(adapter.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn infinite_reprompts_invalid_provided_value() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = Argument::from_spec(
            ArgumentSpec::new("numbers", "integer", "Give me numbers.").infinite(),
            &client.registry,
        );

        adapter.queue_reply("7");
        let provided = vec!["seven".to_owned()];
        let result = arg.obtain_many(&cx, &provided, None).await.unwrap();
        match result.outcome {
            ObtainOutcome::Collected(ArgumentValue::Many(values)) => {
                assert_eq!(values, vec![ArgumentValue::Integer(7)]);
            },
            other => panic!("expected collected values, got {other:?}"),
        }
        assert!(adapter.sent_contents()[0].contains("You provided an invalid numbers, \"seven\""));
    }

    #[tokio::test]
    async fn infinite_prompt_limit_is_per_slot() {
        let adapter = MockAdapter::new();
        let client = herald(adapter.clone());
        let inv = invocation();
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let arg = Argument::from_spec(
            ArgumentSpec::new("numbers", "integer", "Give me numbers.").infinite(),
            &client.registry,
        );

        adapter.queue_reply("junk");
        let result = arg.obtain_many(&cx, &[], Some(1)).await.unwrap();
        assert!(matches!(result.outcome, ObtainOutcome::Cancelled(CancelReason::PromptLimit)));
    }
}
