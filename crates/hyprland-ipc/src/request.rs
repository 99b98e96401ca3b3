//! Command request encoding
//!
//! Hyprland's command socket takes a single text message per connection.
//! Flags go in front of the command, separated by `/` (`j/clients` asks for
//! JSON output), and argument tokens follow after a space.

use super::HyprError;

/// Prefix marking a batch of commands in one message
const BATCH_PREFIX: &str = "[[BATCH]]";

/// Separator between commands inside a batch
const RECORD_SEPARATOR: char = ';';

/// Flag requesting JSON output
pub const JSON_FLAG: &str = "-j";

/// One request for the command socket
///
/// Tokens are kept in caller order; encoding is deterministic.
///
/// # Example
///
/// ```
/// use hyprland_ipc::CommandRequest;
///
/// let request = CommandRequest::new("clients").flag("-j");
/// assert_eq!(request.encode().unwrap(), "j/clients");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandRequest {
    command: String,
    flags: Vec<String>,
    args: Vec<String>,
}

impl CommandRequest {
    /// Create a request for `command` with no flags or arguments
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            flags: Vec::new(),
            args: Vec::new(),
        }
    }

    /// Create a request from pre-split flag and argument lists
    pub fn with_parts<F, A>(command: impl Into<String>, flags: F, args: A) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            command: command.into(),
            flags: flags.into_iter().map(Into::into).collect(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a flag token (`-j` and `j` are equivalent)
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Append an argument token
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several argument tokens
    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Serialize into the wire message
    ///
    /// # Errors
    ///
    /// Returns `HyprError::InvalidRequest` if the command is empty, a token is
    /// empty or carries a `;` or newline, or a flag is not alphanumeric.
    pub fn encode(&self) -> Result<String, HyprError> {
        validate_token("command", &self.command)?;

        let mut flag_chars = String::new();
        for flag in &self.flags {
            let stripped = flag.trim_start_matches('-');
            if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(invalid(format!("flag '{}' is not a valid flag token", flag)));
            }
            flag_chars.push_str(stripped);
        }

        let mut message = String::new();
        if !flag_chars.is_empty() {
            message.push_str(&flag_chars);
            message.push('/');
        }
        message.push_str(&self.command);

        for arg in &self.args {
            validate_token("argument", arg)?;
            message.push(' ');
            message.push_str(arg);
        }

        Ok(message)
    }

    /// Serialize several requests into one batch message
    ///
    /// Hyprland runs each command in order and concatenates the replies.
    pub fn batch(requests: &[CommandRequest]) -> Result<String, HyprError> {
        if requests.is_empty() {
            return Err(invalid("batch must contain at least one request".to_string()));
        }

        let encoded = requests
            .iter()
            .map(CommandRequest::encode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(format!(
            "{}{}",
            BATCH_PREFIX,
            encoded.join(&RECORD_SEPARATOR.to_string())
        ))
    }
}

fn validate_token(what: &str, token: &str) -> Result<(), HyprError> {
    if token.is_empty() {
        return Err(invalid(format!("{} must not be empty", what)));
    }
    if token.contains(RECORD_SEPARATOR) || token.contains('\n') {
        return Err(invalid(format!(
            "{} '{}' contains a record separator",
            what,
            token.escape_debug()
        )));
    }
    Ok(())
}

fn invalid(reason: String) -> HyprError {
    HyprError::InvalidRequest { reason }
}
