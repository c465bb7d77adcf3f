//! The `util` group: ping, prefix, help and the unknown-command handler.

use std::time::Duration;

use async_trait::async_trait;

use crate::adapter::{Capability, ChatAdapter, SentMessage};
use crate::command::argument::ArgumentSpec;
use crate::command::types::ArgumentValue;
use crate::command::{CommandArgs, CommandCtxt, CommandHandler, CommandSpec};
use crate::errors::friendly;

pub fn ping_command() -> (CommandSpec, Box<dyn CommandHandler>) {
    let spec = CommandSpec::new("ping", "util", "ping", "Checks the bot's response time.")
        .throttling(5, Duration::from_secs(10));
    (spec, Box::new(PingHandler))
}

struct PingHandler;

#[async_trait]
impl CommandHandler for PingHandler {
    async fn run(&self, cx: &CommandCtxt<'_>, _args: &CommandArgs) -> anyhow::Result<Option<Vec<SentMessage>>> {
        let sent = cx.reply("Pinging...").await?;
        let edited = cx.herald.adapter.edit_message(sent.channel_id, sent.id, "Pong!").await?;
        Ok(Some(vec![edited]))
    }
}

pub fn prefix_command() -> (CommandSpec, Box<dyn CommandHandler>) {
    let spec = CommandSpec::new("prefix", "util", "prefix", "Shows or sets the command prefix.")
        .format("[prefix/\"default\"/\"none\"]")
        .details(
            "If no prefix is provided, the current prefix will be shown. \
             If the prefix is \"default\", the prefix will be reset to the bot's default prefix. \
             If the prefix is \"none\", the prefix will be removed entirely, \
             only allowing mentioned commands.",
        )
        .examples(["prefix", "prefix -", "prefix omg!", "prefix default", "prefix none"])
        .args(vec![
            ArgumentSpec::new("prefix", "string", "What would you like to set the bot's prefix to?")
                .max(15.0)
                .default_value(ArgumentValue::Text(String::new())),
        ]);
    (spec, Box::new(PrefixHandler))
}

struct PrefixHandler;

#[async_trait]
impl CommandHandler for PrefixHandler {
    async fn run(&self, cx: &CommandCtxt<'_>, args: &CommandArgs) -> anyhow::Result<Option<Vec<SentMessage>>> {
        let raw = args.text("prefix").unwrap_or("");
        let scope = cx.guild_id();

        if raw.is_empty() {
            let prefix = cx.herald.prefix_in(scope);
            let current = if prefix.is_empty() {
                "There is no command prefix.".to_owned()
            } else {
                format!("The command prefix is `{prefix}`.")
            };
            let sent = cx
                .reply(&format!(
                    "{current} To run commands, use `{}command`.",
                    cx.herald.calling_prefix(scope)
                ))
                .await?;
            return Ok(Some(vec![sent]));
        }

        if scope.is_some() {
            let capabilities = cx
                .herald
                .adapter
                .member_capabilities(cx.author().id, cx.channel_id())
                .await;
            if !capabilities.contains(&Capability::Administrator) && !cx.herald.is_owner(cx.author().id) {
                return Err(friendly("Only administrators may change the command prefix."));
            }
        } else if !cx.herald.is_owner(cx.author().id) {
            return Err(friendly("Only the bot owner(s) may change the global command prefix."));
        }

        let lowered = raw.to_lowercase();
        let (new_prefix, response) = match lowered.as_str() {
            "none" => (Some(""), "Removed the command prefix entirely".to_owned()),
            "default" => (None, "Reset the command prefix to the default".to_owned()),
            _ => (Some(raw), format!("Set the command prefix to `{raw}`")),
        };

        match scope {
            Some(scope) => {
                cx.herald.set_scope_prefix(scope, new_prefix);
                match new_prefix {
                    Some(prefix) => {
                        let _ = cx
                            .herald
                            .setting_set(Some(scope), "prefix", serde_json::json!(prefix))
                            .await;
                    },
                    None => {
                        let _ = cx.herald.setting_remove(Some(scope), "prefix").await;
                    },
                }
            },
            None => {
                cx.herald.set_global_prefix(new_prefix);
                match new_prefix {
                    Some(prefix) => {
                        let _ = cx.herald.setting_set(None, "prefix", serde_json::json!(prefix)).await;
                    },
                    None => {
                        let _ = cx.herald.setting_remove(None, "prefix").await;
                    },
                }
            },
        }

        let sent = cx
            .reply(&format!(
                "{response}. To run commands, use `{}command`.",
                cx.herald.calling_prefix(scope)
            ))
            .await?;
        Ok(Some(vec![sent]))
    }
}

pub fn help_command() -> (CommandSpec, Box<dyn CommandHandler>) {
    let spec = CommandSpec::new("help", "util", "help", "Displays a list of available commands, or detailed information for a specified command.")
        .aliases(["commands"])
        .guarded()
        .examples(["help", "help prefix"])
        .args(vec![
            ArgumentSpec::new("command", "string", "Which command would you like to view the help for?")
                .default_value(ArgumentValue::Text(String::new())),
        ]);
    (spec, Box::new(HelpHandler))
}

struct HelpHandler;

#[async_trait]
impl CommandHandler for HelpHandler {
    async fn run(&self, cx: &CommandCtxt<'_>, args: &CommandArgs) -> anyhow::Result<Option<Vec<SentMessage>>> {
        let query = args.text("command").unwrap_or("");
        let registry = &cx.herald.registry;
        let prefix = cx.herald.calling_prefix(cx.guild_id());

        if query.is_empty() {
            let mut lines = vec![format!("Use `{prefix}help <command>` for details on a command.")];
            for group in registry.groups() {
                let commands: Vec<_> = registry
                    .commands_in_group(&group.id)
                    .into_iter()
                    .filter(|c| !c.spec.hidden)
                    .collect();
                if commands.is_empty() {
                    continue;
                }
                lines.push(format!("\n**{}**", group.display_name()));
                for command in commands {
                    lines.push(format!("`{prefix}{}`: {}", command.spec.name, command.spec.description));
                }
            }
            let sent = cx.reply(&lines.join("\n")).await?;
            return Ok(Some(vec![sent]));
        }

        let found = registry.find_commands(Some(query), false);
        match found.len() {
            0 => {
                let sent = cx
                    .reply(&format!(
                        "Unable to identify the command. Use `{prefix}help` to view the list of all commands."
                    ))
                    .await?;
                Ok(Some(vec![sent]))
            },
            1 => {
                let command = &found[0];
                let spec = &command.spec;
                let mut text = format!("**{prefix}{}**", spec.name);
                if let Some(format) = &command.format {
                    text.push_str(&format!(" `{format}`"));
                }
                text.push_str(&format!("\n{}", spec.description));
                if !spec.aliases.is_empty() {
                    text.push_str(&format!("\n**Aliases:** {}", spec.aliases.join(", ")));
                }
                text.push_str(&format!(
                    "\n**Group:** {} ({}:{})",
                    command.group.display_name(),
                    spec.group,
                    spec.member_name
                ));
                if let Some(details) = &spec.details {
                    text.push_str(&format!("\n**Details:** {details}"));
                }
                if !spec.examples.is_empty() {
                    text.push_str(&format!("\n**Examples:** {}", spec.examples.join(", ")));
                }
                let sent = cx.reply(&text).await?;
                Ok(Some(vec![sent]))
            },
            _ => {
                let sent = cx.reply("Multiple commands found. Please be more specific.").await?;
                Ok(Some(vec![sent]))
            },
        }
    }
}

pub fn unknown_command() -> (CommandSpec, Box<dyn CommandHandler>) {
    let spec = CommandSpec::new(
        "unknown-command",
        "util",
        "unknown-command",
        "Displays help information for when an unknown command is used.",
    )
    .hidden()
    .unknown();
    (spec, Box::new(UnknownCommandHandler))
}

struct UnknownCommandHandler;

#[async_trait]
impl CommandHandler for UnknownCommandHandler {
    async fn run(&self, cx: &CommandCtxt<'_>, _args: &CommandArgs) -> anyhow::Result<Option<Vec<SentMessage>>> {
        let sent = cx
            .reply(&format!(
                "Unknown command. Use `{}help` to view the list of all commands.",
                cx.herald.calling_prefix(cx.guild_id())
            ))
            .await?;
        Ok(Some(vec![sent]))
    }
}
