use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

/// Framework options, deserialisable from a TOML table so hosts can keep them
/// in their own config file.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeraldOptions {
    /// Default command prefix. An empty string means commands can only be
    /// invoked by mentioning the bot (or, in DMs, with a bare command name).
    pub command_prefix: String,
    /// How long, in seconds, an invocation stays editable (re-dispatching the
    /// command when the source message is edited). `0` disables retention.
    pub command_editable_duration: u64,
    /// Whether editing a non-command message into a command should dispatch
    /// the new command.
    pub non_command_editable: bool,
    /// User ids exempt from throttling and permission checks.
    pub owners: Vec<u64>,
    /// Support invite shown in generic error replies.
    pub invite: Option<String>,
}

impl Default for HeraldOptions {
    fn default() -> Self {
        HeraldOptions {
            command_prefix: "!".to_owned(),
            command_editable_duration: 30,
            non_command_editable: true,
            owners: Vec::new(),
            invite: None,
        }
    }
}

impl HeraldOptions {
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("failed to parse herald options")
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read options file {}", path.display()))?;
        let options = Self::from_toml(&raw)?;
        debug!("loaded herald options from {}", path.display());
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = HeraldOptions::default();
        assert_eq!(options.command_prefix, "!");
        assert_eq!(options.command_editable_duration, 30);
        assert!(options.non_command_editable);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let options = HeraldOptions::from_toml("command_prefix = \"?\"\nowners = [1, 2]").unwrap();
        assert_eq!(options.command_prefix, "?");
        assert_eq!(options.owners, vec![1, 2]);
        assert_eq!(options.command_editable_duration, 30);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(HeraldOptions::from_toml("comand_prefix = \"?\"").is_err());
    }
}
