//! The `commands` group: runtime enablement of commands and groups.

use anyhow::Context;
use async_trait::async_trait;

use crate::adapter::{Capability, SentMessage};
use crate::command::argument::ArgumentSpec;
use crate::command::types::ArgumentValue;
use crate::command::{CommandArgs, CommandCtxt, CommandHandler, CommandSpec};
use crate::errors::friendly;

pub fn enable_command() -> (CommandSpec, Box<dyn CommandHandler>) {
    let spec = CommandSpec::new("enable", "commands", "enable", "Enables a command or command group.")
        .aliases(["enable-command", "cmd-on", "command-on"])
        .guarded()
        .caller_capabilities([Capability::Administrator])
        .examples(["enable util", "enable Utility", "enable prefix"])
        .args(vec![
            ArgumentSpec::new("target", "command|group", "Which command or group would you like to enable?")
                .label("command/group"),
        ]);
    (spec, Box::new(EnableHandler))
}

struct EnableHandler;

#[async_trait]
impl CommandHandler for EnableHandler {
    async fn run(&self, cx: &CommandCtxt<'_>, args: &CommandArgs) -> anyhow::Result<Option<Vec<SentMessage>>> {
        let target = args.get("target").context("missing target argument")?;
        let scope = cx.guild_id();

        let content = match target {
            ArgumentValue::Command(name) => {
                let command = cx.herald.registry.resolve_command(name)?;
                let group_note = || {
                    if command.group.is_enabled_in(scope) {
                        String::new()
                    } else {
                        format!(
                            ", but the `{}` group is disabled, so it still can't be used",
                            command.group.display_name()
                        )
                    }
                };
                if command.is_enabled_in(scope) {
                    format!("The `{name}` command is already enabled{}.", group_note())
                } else {
                    cx.herald.set_command_enabled(&command, scope, true)?;
                    format!("Enabled the `{name}` command{}.", group_note())
                }
            },
            ArgumentValue::Group(id) => {
                let group = cx.herald.registry.resolve_group(id)?;
                if group.is_enabled_in(scope) {
                    format!("The `{}` group is already enabled.", group.display_name())
                } else {
                    cx.herald.set_group_enabled(&group, scope, true)?;
                    format!("Enabled the `{}` group.", group.display_name())
                }
            },
            other => anyhow::bail!("unexpected argument value {other:?}"),
        };

        let sent = cx.reply(&content).await?;
        Ok(Some(vec![sent]))
    }
}

pub fn disable_command() -> (CommandSpec, Box<dyn CommandHandler>) {
    let spec = CommandSpec::new("disable", "commands", "disable", "Disables a command or command group.")
        .aliases(["disable-command", "cmd-off", "command-off"])
        .guarded()
        .caller_capabilities([Capability::Administrator])
        .examples(["disable util", "disable Utility", "disable prefix"])
        .args(vec![
            ArgumentSpec::new("target", "command|group", "Which command or group would you like to disable?")
                .label("command/group"),
        ]);
    (spec, Box::new(DisableHandler))
}

struct DisableHandler;

#[async_trait]
impl CommandHandler for DisableHandler {
    async fn run(&self, cx: &CommandCtxt<'_>, args: &CommandArgs) -> anyhow::Result<Option<Vec<SentMessage>>> {
        let target = args.get("target").context("missing target argument")?;
        let scope = cx.guild_id();

        let content = match target {
            ArgumentValue::Command(name) => {
                let command = cx.herald.registry.resolve_command(name)?;
                if !command.is_enabled_in(scope) {
                    format!("The `{name}` command is already disabled.")
                } else if command.spec.guarded {
                    return Err(friendly(format!("You cannot disable the `{name}` command.")));
                } else {
                    cx.herald.set_command_enabled(&command, scope, false)?;
                    format!("Disabled the `{name}` command.")
                }
            },
            ArgumentValue::Group(id) => {
                let group = cx.herald.registry.resolve_group(id)?;
                if !group.is_enabled_in(scope) {
                    format!("The `{}` group is already disabled.", group.display_name())
                } else if group.guarded {
                    return Err(friendly(format!(
                        "You cannot disable the `{}` group.",
                        group.display_name()
                    )));
                } else {
                    cx.herald.set_group_enabled(&group, scope, false)?;
                    format!("Disabled the `{}` group.", group.display_name())
                }
            },
            other => anyhow::bail!("unexpected argument value {other:?}"),
        };

        let sent = cx.reply(&content).await?;
        Ok(Some(vec![sent]))
    }
}

pub fn groups_command() -> (CommandSpec, Box<dyn CommandHandler>) {
    let spec = CommandSpec::new("groups", "commands", "groups", "Lists all command groups.")
        .aliases(["list-groups", "show-groups"])
        .guarded()
        .caller_capabilities([Capability::Administrator]);
    (spec, Box::new(GroupsHandler))
}

struct GroupsHandler;

#[async_trait]
impl CommandHandler for GroupsHandler {
    async fn run(&self, cx: &CommandCtxt<'_>, _args: &CommandArgs) -> anyhow::Result<Option<Vec<SentMessage>>> {
        let scope = cx.guild_id();
        let lines: Vec<String> = cx
            .herald
            .registry
            .groups()
            .into_iter()
            .map(|group| {
                let state = if group.is_enabled_in(scope) { "Enabled" } else { "Disabled" };
                format!("**{}:** {state}", group.display_name())
            })
            .collect();
        let sent = cx.reply(&format!("__**Groups**__\n{}", lines.join("\n"))).await?;
        Ok(Some(vec![sent]))
    }
}
