//! Argument type strategies.
//!
//! Every argument type implements [`ArgumentKind`]: emptiness, validation and
//! parsing for one type id. Custom kinds are registered on the
//! [`Registry`](crate::command::registry::Registry); ids containing `|` are
//! synthesised into a [`UnionKind`] that accepts whichever member validates
//! first.

use std::sync::Arc;

use async_trait::async_trait;

use super::argument::Argument;
use super::CommandCtxt;

/// A parsed argument value as handed to command handlers.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgumentValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Canonical name of a resolved command.
    Command(String),
    /// Id of a resolved command group.
    Group(String),
    /// Accumulated values of an infinite argument.
    Many(Vec<ArgumentValue>),
}

impl ArgumentValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgumentValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ArgumentValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ArgumentValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            ArgumentValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_many(&self) -> Option<&[ArgumentValue]> {
        match self {
            ArgumentValue::Many(v) => Some(v),
            _ => None,
        }
    }
}

/// Outcome of validating a candidate value.
#[derive(Clone, Debug, PartialEq)]
pub enum Validation {
    Valid,
    /// Invalid with the generic retry message.
    Invalid,
    /// Invalid with a specific message shown in the reprompt.
    Reject(String),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

#[async_trait]
pub trait ArgumentKind: Send + Sync {
    fn id(&self) -> &str;

    async fn validate(&self, val: &str, cx: &CommandCtxt<'_>, arg: &Argument) -> Validation;

    async fn parse(&self, val: &str, cx: &CommandCtxt<'_>, arg: &Argument) -> anyhow::Result<ArgumentValue>;

    fn is_empty(&self, val: &str, _arg: &Argument) -> bool {
        val.is_empty()
    }
}

fn one_of_rejection(options: &[String]) -> Validation {
    let list = options.iter().map(|o| format!("`{o}`")).collect::<Vec<_>>().join(", ");
    Validation::Reject(format!("Please enter one of the following options: {list}."))
}

pub struct StringKind;

#[async_trait]
impl ArgumentKind for StringKind {
    fn id(&self) -> &str {
        "string"
    }

    async fn validate(&self, val: &str, _cx: &CommandCtxt<'_>, arg: &Argument) -> Validation {
        if let Some(one_of) = &arg.one_of {
            if !one_of.iter().any(|o| o.eq_ignore_ascii_case(val)) {
                return one_of_rejection(one_of);
            }
        }
        let length = val.chars().count() as f64;
        if let Some(min) = arg.min {
            if length < min {
                return Validation::Reject(format!(
                    "Please keep the {} above or exactly {min} characters.",
                    arg.label
                ));
            }
        }
        if let Some(max) = arg.max {
            if length > max {
                return Validation::Reject(format!(
                    "Please keep the {} below or exactly {max} characters.",
                    arg.label
                ));
            }
        }
        Validation::Valid
    }

    async fn parse(&self, val: &str, _cx: &CommandCtxt<'_>, _arg: &Argument) -> anyhow::Result<ArgumentValue> {
        Ok(ArgumentValue::Text(val.to_owned()))
    }
}

pub struct IntegerKind;

#[async_trait]
impl ArgumentKind for IntegerKind {
    fn id(&self) -> &str {
        "integer"
    }

    async fn validate(&self, val: &str, _cx: &CommandCtxt<'_>, arg: &Argument) -> Validation {
        let Ok(int) = val.trim().parse::<i64>() else {
            return Validation::Invalid;
        };
        if let Some(one_of) = &arg.one_of {
            if !one_of.iter().any(|o| o == &int.to_string()) {
                return one_of_rejection(one_of);
            }
        }
        if let Some(min) = arg.min {
            if (int as f64) < min {
                return Validation::Reject(format!("Please enter a number above or exactly {min}."));
            }
        }
        if let Some(max) = arg.max {
            if (int as f64) > max {
                return Validation::Reject(format!("Please enter a number below or exactly {max}."));
            }
        }
        Validation::Valid
    }

    async fn parse(&self, val: &str, _cx: &CommandCtxt<'_>, _arg: &Argument) -> anyhow::Result<ArgumentValue> {
        Ok(ArgumentValue::Integer(val.trim().parse()?))
    }
}

pub struct FloatKind;

#[async_trait]
impl ArgumentKind for FloatKind {
    fn id(&self) -> &str {
        "float"
    }

    async fn validate(&self, val: &str, _cx: &CommandCtxt<'_>, arg: &Argument) -> Validation {
        let Ok(float) = val.trim().parse::<f64>() else {
            return Validation::Invalid;
        };
        if let Some(one_of) = &arg.one_of {
            if !one_of.iter().any(|o| o.parse::<f64>().is_ok_and(|v| v == float)) {
                return one_of_rejection(one_of);
            }
        }
        if let Some(min) = arg.min {
            if float < min {
                return Validation::Reject(format!("Please enter a number above or exactly {min}."));
            }
        }
        if let Some(max) = arg.max {
            if float > max {
                return Validation::Reject(format!("Please enter a number below or exactly {max}."));
            }
        }
        Validation::Valid
    }

    async fn parse(&self, val: &str, _cx: &CommandCtxt<'_>, _arg: &Argument) -> anyhow::Result<ArgumentValue> {
        Ok(ArgumentValue::Float(val.trim().parse()?))
    }
}

const TRUTHY: &[&str] = &["true", "t", "yes", "y", "on", "enable", "enabled", "1", "+"];
const FALSY: &[&str] = &["false", "f", "no", "n", "off", "disable", "disabled", "0", "-"];

pub struct BooleanKind;

#[async_trait]
impl ArgumentKind for BooleanKind {
    fn id(&self) -> &str {
        "boolean"
    }

    async fn validate(&self, val: &str, _cx: &CommandCtxt<'_>, _arg: &Argument) -> Validation {
        let lc = val.to_lowercase();
        if TRUTHY.contains(&lc.as_str()) || FALSY.contains(&lc.as_str()) {
            Validation::Valid
        } else {
            Validation::Invalid
        }
    }

    async fn parse(&self, val: &str, _cx: &CommandCtxt<'_>, _arg: &Argument) -> anyhow::Result<ArgumentValue> {
        let lc = val.to_lowercase();
        if TRUTHY.contains(&lc.as_str()) {
            Ok(ArgumentValue::Boolean(true))
        } else if FALSY.contains(&lc.as_str()) {
            Ok(ArgumentValue::Boolean(false))
        } else {
            anyhow::bail!("unknown boolean value {val:?}")
        }
    }
}

/// Resolves a registered command by name, alias or `group:member` pair.
pub struct CommandKind;

#[async_trait]
impl ArgumentKind for CommandKind {
    fn id(&self) -> &str {
        "command"
    }

    async fn validate(&self, val: &str, cx: &CommandCtxt<'_>, _arg: &Argument) -> Validation {
        let matches = cx.herald.registry.find_commands(Some(val), false);
        match matches.len() {
            0 => Validation::Invalid,
            1 => Validation::Valid,
            _ => Validation::Reject("Multiple commands found. Please be more specific.".to_owned()),
        }
    }

    async fn parse(&self, val: &str, cx: &CommandCtxt<'_>, _arg: &Argument) -> anyhow::Result<ArgumentValue> {
        let matches = cx.herald.registry.find_commands(Some(val), false);
        anyhow::ensure!(matches.len() == 1, "command {val:?} did not resolve uniquely");
        Ok(ArgumentValue::Command(matches[0].spec.name.clone()))
    }
}

/// Resolves a registered command group by id or display name.
pub struct GroupKind;

#[async_trait]
impl ArgumentKind for GroupKind {
    fn id(&self) -> &str {
        "group"
    }

    async fn validate(&self, val: &str, cx: &CommandCtxt<'_>, _arg: &Argument) -> Validation {
        let matches = cx.herald.registry.find_groups(Some(val), false);
        match matches.len() {
            0 => Validation::Invalid,
            1 => Validation::Valid,
            _ => Validation::Reject("Multiple groups found. Please be more specific.".to_owned()),
        }
    }

    async fn parse(&self, val: &str, cx: &CommandCtxt<'_>, _arg: &Argument) -> anyhow::Result<ArgumentValue> {
        let matches = cx.herald.registry.find_groups(Some(val), false);
        anyhow::ensure!(matches.len() == 1, "group {val:?} did not resolve uniquely");
        Ok(ArgumentValue::Group(matches[0].id.clone()))
    }
}

/// Composite of several kinds; the first member whose validator accepts the
/// value wins, and its parser is used.
pub struct UnionKind {
    id: String,
    members: Vec<Arc<dyn ArgumentKind>>,
}

impl UnionKind {
    pub fn new(id: String, members: Vec<Arc<dyn ArgumentKind>>) -> Self {
        assert!(members.len() > 1, "a union type needs at least two members");
        UnionKind { id, members }
    }
}

#[async_trait]
impl ArgumentKind for UnionKind {
    fn id(&self) -> &str {
        &self.id
    }

    async fn validate(&self, val: &str, cx: &CommandCtxt<'_>, arg: &Argument) -> Validation {
        let mut rejections = Vec::new();
        for member in &self.members {
            match member.validate(val, cx, arg).await {
                Validation::Valid => return Validation::Valid,
                Validation::Reject(msg) => rejections.push(msg),
                Validation::Invalid => {},
            }
        }
        if rejections.is_empty() {
            Validation::Invalid
        } else {
            Validation::Reject(rejections.join("\n"))
        }
    }

    async fn parse(&self, val: &str, cx: &CommandCtxt<'_>, arg: &Argument) -> anyhow::Result<ArgumentValue> {
        for member in &self.members {
            if member.validate(val, cx, arg).await.is_valid() {
                return member.parse(val, cx, arg).await;
            }
        }
        anyhow::bail!("no member of type {} accepted {val:?}", self.id)
    }

    fn is_empty(&self, val: &str, arg: &Argument) -> bool {
        self.members.iter().all(|m| m.is_empty(val, arg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::argument::{Argument, ArgumentSpec};
    use crate::command::{CommandCtxt, CommandSpec};
    use crate::invocation::Invocation;
    use crate::test_util::{herald, message, CountingHandler, MockAdapter};

    fn arg(client: &crate::herald::Herald, spec: ArgumentSpec) -> Argument {
        Argument::from_spec(spec, &client.registry)
    }

    #[tokio::test]
    async fn string_bounds_and_options() {
        let client = herald(MockAdapter::new());
        let inv = Invocation::new(message(1, 10, 20, None, ""), None, String::new(), None);
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let kind = StringKind;

        let bounded = arg(&client, ArgumentSpec::new("s", "string", "?").min(2.0).max(4.0));
        assert!(matches!(kind.validate("ab", &cx, &bounded).await, Validation::Valid));
        assert!(matches!(kind.validate("a", &cx, &bounded).await, Validation::Reject(_)));
        assert!(matches!(kind.validate("abcde", &cx, &bounded).await, Validation::Reject(_)));

        let choice = arg(&client, ArgumentSpec::new("s", "string", "?").one_of(["red", "blue"]));
        assert!(matches!(kind.validate("RED", &cx, &choice).await, Validation::Valid));
        let Validation::Reject(msg) = kind.validate("green", &cx, &choice).await else {
            panic!("expected rejection");
        };
        assert!(msg.contains("`red`"));
    }

    #[tokio::test]
    async fn integer_rejects_out_of_range_with_message() {
        let client = herald(MockAdapter::new());
        let inv = Invocation::new(message(1, 10, 20, None, ""), None, String::new(), None);
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let kind = IntegerKind;
        let bounded = arg(&client, ArgumentSpec::new("n", "integer", "?").min(1.0).max(10.0));

        assert!(matches!(kind.validate("5", &cx, &bounded).await, Validation::Valid));
        assert!(matches!(kind.validate("0", &cx, &bounded).await, Validation::Reject(_)));
        assert!(matches!(kind.validate("11", &cx, &bounded).await, Validation::Reject(_)));
        assert!(matches!(kind.validate("five", &cx, &bounded).await, Validation::Invalid));
        assert_eq!(
            kind.parse("7", &cx, &bounded).await.unwrap(),
            ArgumentValue::Integer(7)
        );
    }

    #[tokio::test]
    async fn boolean_accepts_the_usual_spellings() {
        let client = herald(MockAdapter::new());
        let inv = Invocation::new(message(1, 10, 20, None, ""), None, String::new(), None);
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let kind = BooleanKind;
        let spec = arg(&client, ArgumentSpec::new("b", "boolean", "?"));

        for yes in ["yes", "TRUE", "on", "+"] {
            assert!(matches!(kind.validate(yes, &cx, &spec).await, Validation::Valid), "{yes}");
            assert_eq!(kind.parse(yes, &cx, &spec).await.unwrap(), ArgumentValue::Boolean(true));
        }
        assert_eq!(kind.parse("off", &cx, &spec).await.unwrap(), ArgumentValue::Boolean(false));
        assert!(matches!(kind.validate("maybe", &cx, &spec).await, Validation::Invalid));
    }

    #[tokio::test]
    async fn command_kind_resolves_unambiguous_names() {
        let client = herald(MockAdapter::new());
        client
            .registry
            .register_command(CommandSpec::new("play", "util", "play", "x"), Box::new(CountingHandler::new().0));
        client.registry.register_command(
            CommandSpec::new("playlist", "util", "playlist", "x"),
            Box::new(CountingHandler::new().0),
        );
        let inv = Invocation::new(message(1, 10, 20, None, ""), None, String::new(), None);
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let kind = CommandKind;
        let spec = arg(&client, ArgumentSpec::new("c", "command", "?"));

        assert!(matches!(kind.validate("play", &cx, &spec).await, Validation::Valid));
        assert!(matches!(kind.validate("nothing", &cx, &spec).await, Validation::Invalid));
        assert!(matches!(kind.validate("pla", &cx, &spec).await, Validation::Reject(_)));
        assert_eq!(
            kind.parse("playlist", &cx, &spec).await.unwrap(),
            ArgumentValue::Command("playlist".into())
        );
    }

    #[tokio::test]
    async fn union_tries_members_in_order() {
        let client = herald(MockAdapter::new());
        let inv = Invocation::new(message(1, 10, 20, None, ""), None, String::new(), None);
        let cx = CommandCtxt {
            herald: &client,
            invocation: &inv,
        };
        let union = client.registry.resolve_kind("integer|string");
        let spec = arg(&client, ArgumentSpec::new("v", "integer|string", "?"));

        assert_eq!(
            union.parse("12", &cx, &spec).await.unwrap(),
            ArgumentValue::Integer(12)
        );
        assert_eq!(
            union.parse("twelve", &cx, &spec).await.unwrap(),
            ArgumentValue::Text("twelve".into())
        );
        assert!(matches!(union.validate("anything", &cx, &spec).await, Validation::Valid));
    }
}
