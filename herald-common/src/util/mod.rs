pub mod args;

use time::macros::format_description;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber with an env-filter and short
/// timestamps. Hosts call this once at startup.
pub fn tracing_init() {
    let timer = UtcTime::new(format_description!("[hour]:[minute]:[second].[subsecond digits:3]"));
    tracing_subscriber::fmt()
        .with_timer(timer)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Escapes markdown formatting characters and neutralises mentions so user
/// input can be echoed back in a prompt.
pub fn escape_markdown(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' | '`' | '*' | '_' | '~' | '|' | '>' => {
                out.push('\\');
                out.push(c);
            },
            '@' => out.push_str("@\u{200b}"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_markdown_formatting() {
        assert_eq!(escape_markdown("*hi*"), "\\*hi\\*");
        assert_eq!(escape_markdown("a`b"), "a\\`b");
    }

    #[test]
    fn escape_markdown_mentions() {
        assert_eq!(escape_markdown("@everyone"), "@\u{200b}everyone");
    }
}
