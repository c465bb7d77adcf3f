use std::fmt;

/// An error whose message is safe to show verbatim to the invoking user.
///
/// Command handlers raise this (through [`friendly`]) when they want the
/// dispatch pipeline to reply with the message itself instead of routing the
/// failure through the generic error hook.
#[derive(Debug)]
pub struct FriendlyError {
    message: String,
}

impl FriendlyError {
    pub fn new(message: impl Into<String>) -> Self {
        FriendlyError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for FriendlyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FriendlyError {}

/// Shorthand for bailing out of a handler with a user-facing message.
pub fn friendly(message: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(FriendlyError::new(message))
}
