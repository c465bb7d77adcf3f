//! Canonical storage for commands, groups and argument types.
//!
//! Registration enforces the uniqueness invariants up front: no two commands
//! may share a name or alias, no two commands in a group may share a member
//! name, at most one command may be the unknown-command handler, and type
//! ids are unique. Violations are wiring bugs and panic immediately.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::group::CommandGroup;
use super::types::{
    ArgumentKind, BooleanKind, CommandKind, FloatKind, GroupKind, IntegerKind, StringKind, UnionKind,
};
use super::{Command, CommandHandler, CommandSpec};
use crate::builtins;

pub struct Registry {
    commands: RwLock<Vec<Arc<Command>>>,
    groups: RwLock<Vec<Arc<CommandGroup>>>,
    types: RwLock<HashMap<String, Arc<dyn ArgumentKind>>>,
    unknown: RwLock<Option<Arc<Command>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            commands: RwLock::new(Vec::new()),
            groups: RwLock::new(Vec::new()),
            types: RwLock::new(HashMap::new()),
            unknown: RwLock::new(None),
        }
    }

    /// Registers the default types, groups and commands in one go.
    pub fn register_defaults(&self) {
        self.register_default_types();
        self.register_default_groups();
        self.register_default_commands();
    }

    pub fn register_default_types(&self) {
        self.register_kind(Arc::new(StringKind));
        self.register_kind(Arc::new(IntegerKind));
        self.register_kind(Arc::new(FloatKind));
        self.register_kind(Arc::new(BooleanKind));
        self.register_kind(Arc::new(CommandKind));
        self.register_kind(Arc::new(GroupKind));
    }

    pub fn register_default_groups(&self) {
        self.register_group("commands", "Commands", true);
        self.register_group("util", "Utility", false);
    }

    pub fn register_default_commands(&self) {
        let (spec, handler) = builtins::util::ping_command();
        self.register_command(spec, handler);
        let (spec, handler) = builtins::util::prefix_command();
        self.register_command(spec, handler);
        let (spec, handler) = builtins::util::help_command();
        self.register_command(spec, handler);
        let (spec, handler) = builtins::util::unknown_command();
        self.register_command(spec, handler);
        let (spec, handler) = builtins::state::enable_command();
        self.register_command(spec, handler);
        let (spec, handler) = builtins::state::disable_command();
        self.register_command(spec, handler);
        let (spec, handler) = builtins::state::groups_command();
        self.register_command(spec, handler);
    }

    pub fn register_kind(&self, kind: Arc<dyn ArgumentKind>) {
        let id = kind.id().to_owned();
        assert_eq!(id, id.to_lowercase(), "argument type id must be lowercase");
        let mut types = self.types.write().unwrap();
        assert!(
            !types.contains_key(&id),
            "an argument type with the id {id:?} is already registered"
        );
        debug!("registered argument type {id}");
        types.insert(id, kind);
    }

    /// Resolves a type id to its strategy, synthesising (and caching) a
    /// union for `|`-joined ids. Unregistered ids are configuration errors
    /// and panic.
    pub fn resolve_kind(&self, id: &str) -> Arc<dyn ArgumentKind> {
        if let Some(kind) = self.types.read().unwrap().get(id) {
            return kind.clone();
        }
        assert!(id.contains('|'), "argument type {id:?} isn't registered");

        let members: Vec<Arc<dyn ArgumentKind>> = id
            .split('|')
            .map(|member| {
                self.types
                    .read()
                    .unwrap()
                    .get(member)
                    .unwrap_or_else(|| panic!("argument type {member:?} isn't registered"))
                    .clone()
            })
            .collect();
        let union: Arc<dyn ArgumentKind> = Arc::new(UnionKind::new(id.to_owned(), members));
        self.types.write().unwrap().insert(id.to_owned(), union.clone());
        debug!("synthesised union argument type {id}");
        union
    }

    /// Registers a group, or renames an existing group with the same id.
    pub fn register_group(&self, id: &str, name: &str, guarded: bool) -> Arc<CommandGroup> {
        let mut groups = self.groups.write().unwrap();
        if let Some(existing) = groups.iter().find(|g| g.id == id) {
            existing.rename(name);
            debug!("group {id} is already registered; renamed it to {name:?}");
            return existing.clone();
        }
        let group = Arc::new(CommandGroup::new(id, name, guarded));
        groups.push(group.clone());
        debug!("registered group {id}");
        group
    }

    /// Registers a command, enforcing all uniqueness invariants.
    pub fn register_command(&self, mut spec: CommandSpec, handler: Box<dyn CommandHandler>) -> Arc<Command> {
        spec.validate();

        if spec.auto_aliases {
            let mut generated = Vec::new();
            if spec.name.contains('-') {
                generated.push(spec.name.replace('-', ""));
            }
            for alias in &spec.aliases {
                if alias.contains('-') {
                    generated.push(alias.replace('-', ""));
                }
            }
            for alias in generated {
                if !spec.aliases.contains(&alias) {
                    spec.aliases.push(alias);
                }
            }
        }

        let mut commands = self.commands.write().unwrap();
        let taken = |name: &str| {
            commands
                .iter()
                .any(|c| c.spec.name == name || c.spec.aliases.iter().any(|a| a == name))
        };
        assert!(
            !taken(&spec.name),
            "a command with the name/alias {:?} is already registered",
            spec.name
        );
        for alias in &spec.aliases {
            assert!(
                !taken(alias),
                "a command with the name/alias {alias:?} is already registered"
            );
        }

        let group = self
            .groups
            .read()
            .unwrap()
            .iter()
            .find(|g| g.id == spec.group)
            .cloned()
            .unwrap_or_else(|| panic!("group {:?} is not registered", spec.group));
        assert!(
            !commands
                .iter()
                .any(|c| c.spec.group == spec.group && c.spec.member_name == spec.member_name),
            "a command with the member name {:?} is already registered in {}",
            spec.member_name,
            spec.group
        );

        let mut unknown = self.unknown.write().unwrap();
        if spec.unknown {
            assert!(unknown.is_none(), "an unknown command is already registered");
        }

        let command = Arc::new(Command::assemble(spec, handler, group, self));
        if command.spec.unknown {
            *unknown = Some(command.clone());
        }
        debug!(
            "registered command {}:{}",
            command.spec.group, command.spec.member_name
        );
        commands.push(command.clone());
        command
    }

    /// Atomically swaps a command implementation for another sharing the
    /// same identity (name, group, member name).
    pub fn reregister_command(&self, spec: CommandSpec, handler: Box<dyn CommandHandler>) -> Arc<Command> {
        spec.validate();

        let mut commands = self.commands.write().unwrap();
        let index = commands
            .iter()
            .position(|c| c.spec.name == spec.name)
            .unwrap_or_else(|| panic!("command {:?} is not registered", spec.name));
        let old = commands[index].clone();
        assert_eq!(old.spec.group, spec.group, "command group cannot change");
        assert_eq!(old.spec.member_name, spec.member_name, "command member name cannot change");

        let mut unknown = self.unknown.write().unwrap();
        if spec.unknown {
            let replaces_unknown = unknown.as_ref().is_some_and(|u| Arc::ptr_eq(u, &old));
            assert!(
                unknown.is_none() || replaces_unknown,
                "an unknown command is already registered"
            );
        }

        let group = old.group.clone();
        let command = Arc::new(Command::assemble(spec, handler, group, self));
        if unknown.as_ref().is_some_and(|u| Arc::ptr_eq(u, &old)) {
            *unknown = None;
        }
        if command.spec.unknown {
            *unknown = Some(command.clone());
        }
        commands[index] = command.clone();
        debug!(
            "reregistered command {}:{}",
            command.spec.group, command.spec.member_name
        );
        command
    }

    pub fn unregister_command(&self, name: &str) -> Option<Arc<Command>> {
        let mut commands = self.commands.write().unwrap();
        let index = commands.iter().position(|c| c.spec.name == name)?;
        let command = commands.remove(index);
        let mut unknown = self.unknown.write().unwrap();
        if unknown.as_ref().is_some_and(|u| Arc::ptr_eq(u, &command)) {
            *unknown = None;
        }
        debug!(
            "unregistered command {}:{}",
            command.spec.group, command.spec.member_name
        );
        Some(command)
    }

    /// All registered commands in registration order.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        self.commands.read().unwrap().clone()
    }

    pub fn groups(&self) -> Vec<Arc<CommandGroup>> {
        self.groups.read().unwrap().clone()
    }

    pub fn commands_in_group(&self, group: &str) -> Vec<Arc<Command>> {
        self.commands
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.spec.group == group)
            .cloned()
            .collect()
    }

    pub fn unknown_command(&self) -> Option<Arc<Command>> {
        self.unknown.read().unwrap().clone()
    }

    /// Finds commands matching a search string. With `exact`, only full
    /// name/alias/`group:member` matches are returned; otherwise substring
    /// matches, with a full match winning outright.
    pub fn find_commands(&self, search: Option<&str>, exact: bool) -> Vec<Arc<Command>> {
        let commands = self.commands.read().unwrap();
        let Some(search) = search else {
            return commands.clone();
        };
        let lc = search.to_lowercase();

        let exact_match = |c: &Command| {
            c.spec.name == lc
                || c.spec.aliases.iter().any(|a| a == &lc)
                || format!("{}:{}", c.spec.group, c.spec.member_name) == lc
        };
        if exact {
            return commands.iter().filter(|c| exact_match(c)).cloned().collect();
        }

        let matched: Vec<Arc<Command>> = commands
            .iter()
            .filter(|c| {
                c.spec.name.contains(&lc)
                    || format!("{}:{}", c.spec.group, c.spec.member_name) == lc
                    || c.spec.aliases.iter().any(|a| a.contains(&lc))
            })
            .cloned()
            .collect();
        for command in &matched {
            if command.spec.name == lc || command.spec.aliases.iter().any(|a| a == &lc) {
                return vec![command.clone()];
            }
        }
        matched
    }

    /// Resolves a search string to exactly one command, failing when the
    /// reference is ambiguous or unknown.
    pub fn resolve_command(&self, search: &str) -> anyhow::Result<Arc<Command>> {
        let matches = self.find_commands(Some(search), true);
        anyhow::ensure!(matches.len() == 1, "unable to resolve command {search:?}");
        Ok(matches[0].clone())
    }

    pub fn find_groups(&self, search: Option<&str>, exact: bool) -> Vec<Arc<CommandGroup>> {
        let groups = self.groups.read().unwrap();
        let Some(search) = search else {
            return groups.clone();
        };
        let lc = search.to_lowercase();

        if exact {
            return groups
                .iter()
                .filter(|g| g.id == lc || g.display_name().to_lowercase() == lc)
                .cloned()
                .collect();
        }

        let matched: Vec<Arc<CommandGroup>> = groups
            .iter()
            .filter(|g| g.id.contains(&lc) || g.display_name().to_lowercase().contains(&lc))
            .cloned()
            .collect();
        for group in &matched {
            if group.id == lc || group.display_name().to_lowercase() == lc {
                return vec![group.clone()];
            }
        }
        matched
    }

    pub fn resolve_group(&self, search: &str) -> anyhow::Result<Arc<CommandGroup>> {
        let matches = self.find_groups(Some(search), true);
        anyhow::ensure!(matches.len() == 1, "unable to resolve group {search:?}");
        Ok(matches[0].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{herald, CountingHandler, MockAdapter};
    use crate::command::CommandSpec;

    fn counting() -> Box<dyn CommandHandler> {
        Box::new(CountingHandler::new().0)
    }

    fn spec(name: &str, group: &str) -> CommandSpec {
        CommandSpec::new(name, group, name, "a test command")
    }

    #[test]
    fn registers_and_finds_by_name_and_alias() {
        let client = herald(MockAdapter::new());
        let registry = &client.registry;
        registry.register_command(spec("first-command", "util").aliases(["fc"]), counting());

        assert_eq!(registry.find_commands(Some("first-command"), true).len(), 1);
        assert_eq!(registry.find_commands(Some("fc"), true).len(), 1);
        // auto-generated dash-less alias
        assert_eq!(registry.find_commands(Some("firstcommand"), true).len(), 1);
        assert_eq!(registry.find_commands(Some("util:first-command"), true).len(), 1);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_name_panics() {
        let client = herald(MockAdapter::new());
        client.registry.register_command(spec("dupe", "util"), counting());
        client.registry.register_command(spec("dupe", "util"), counting());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn alias_clashing_with_name_panics() {
        let client = herald(MockAdapter::new());
        client.registry.register_command(spec("taken", "util"), counting());
        client
            .registry
            .register_command(spec("other", "util").aliases(["taken"]), counting());
    }

    #[test]
    #[should_panic(expected = "member name")]
    fn duplicate_member_name_in_group_panics() {
        let client = herald(MockAdapter::new());
        client
            .registry
            .register_command(CommandSpec::new("one", "util", "shared", "x"), counting());
        client
            .registry
            .register_command(CommandSpec::new("two", "util", "shared", "x"), counting());
    }

    #[test]
    #[should_panic(expected = "is not registered")]
    fn unknown_group_panics() {
        let client = herald(MockAdapter::new());
        client.registry.register_command(spec("orphan", "nope"), counting());
    }

    #[test]
    #[should_panic(expected = "unknown command is already registered")]
    fn second_unknown_handler_panics() {
        let client = herald(MockAdapter::new());
        client.registry.register_command(spec("u1", "util").unknown(), counting());
        client.registry.register_command(spec("u2", "util").unknown(), counting());
    }

    #[test]
    #[should_panic(expected = "must be lowercase")]
    fn uppercase_name_panics() {
        let client = herald(MockAdapter::new());
        client.registry.register_command(spec("Shout", "util"), counting());
    }

    #[test]
    #[should_panic(expected = "throttling usages must be at least 1")]
    fn zero_throttle_usages_panics() {
        let client = herald(MockAdapter::new());
        client.registry.register_command(
            spec("t", "util").throttling(0, std::time::Duration::from_secs(5)),
            counting(),
        );
    }

    #[test]
    #[should_panic(expected = "isn't registered")]
    fn unregistered_argument_type_panics() {
        let client = herald(MockAdapter::new());
        client.registry.register_command(
            spec("typed", "util").args(vec![crate::command::argument::ArgumentSpec::new(
                "arg", "no-such-type", "?",
            )]),
            counting(),
        );
    }

    #[test]
    fn fuzzy_find_exact_match_wins() {
        let client = herald(MockAdapter::new());
        let registry = &client.registry;
        registry.register_command(spec("play", "util"), counting());
        registry.register_command(spec("playlist", "util"), counting());

        let matched = registry.find_commands(Some("play"), false);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].spec.name, "play");

        let matched = registry.find_commands(Some("pla"), false);
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn resolve_fails_on_ambiguity() {
        let client = herald(MockAdapter::new());
        client.registry.register_command(spec("alpha", "util"), counting());
        assert!(client.registry.resolve_command("alpha").is_ok());
        assert!(client.registry.resolve_command("beta").is_err());
    }

    #[test]
    fn find_groups_matches_id_and_display_name() {
        let client = herald(MockAdapter::new());
        assert_eq!(client.registry.find_groups(Some("util"), true).len(), 1);
        assert_eq!(client.registry.find_groups(Some("Utility"), true).len(), 1);
        assert_eq!(client.registry.find_groups(Some("util"), false).len(), 1);
    }

    #[test]
    fn reregister_swaps_in_place() {
        let client = herald(MockAdapter::new());
        let registry = &client.registry;
        registry.register_command(spec("swap", "util"), counting());
        registry.register_command(spec("anchor", "util"), counting());

        let (handler, runs, _) = CountingHandler::new();
        let swapped = registry.reregister_command(spec("swap", "util").aliases(["sw"]), Box::new(handler));
        assert_eq!(swapped.spec.aliases, vec!["sw".to_owned()]);
        assert_eq!(runs.load(std::sync::atomic::Ordering::Relaxed), 0);

        // registration order preserved
        let all = registry.commands();
        assert_eq!(all[0].spec.name, "swap");
        assert_eq!(all[1].spec.name, "anchor");
    }

    #[test]
    #[should_panic(expected = "group cannot change")]
    fn reregister_cannot_change_group() {
        let client = herald(MockAdapter::new());
        client.registry.register_command(spec("fixed", "util"), counting());
        client.registry.reregister_command(spec("fixed", "commands"), counting());
    }

    #[test]
    fn unregister_removes_command_and_unknown_slot() {
        let client = herald(MockAdapter::new());
        let registry = &client.registry;
        registry.register_command(spec("gone", "util").unknown(), counting());
        assert!(registry.unknown_command().is_some());

        registry.unregister_command("gone");
        assert!(registry.unknown_command().is_none());
        assert!(registry.find_commands(Some("gone"), true).is_empty());
    }

    #[test]
    fn union_types_are_synthesised_and_cached() {
        let client = herald(MockAdapter::new());
        let union = client.registry.resolve_kind("integer|string");
        assert_eq!(union.id(), "integer|string");
        let again = client.registry.resolve_kind("integer|string");
        assert!(Arc::ptr_eq(&union, &again));
    }

    #[test]
    #[should_panic(expected = "isn't registered")]
    fn union_with_unknown_member_panics() {
        let client = herald(MockAdapter::new());
        client.registry.resolve_kind("integer|mystery");
    }

    #[test]
    fn group_reregistration_renames() {
        let client = herald(MockAdapter::new());
        let group = client.registry.register_group("util", "Utilities", false);
        assert_eq!(group.display_name(), "Utilities");
        assert_eq!(client.registry.groups().len(), 2);
    }
}
