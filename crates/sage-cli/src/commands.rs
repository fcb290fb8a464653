//! Slash commands for the interactive loop

/// Result of executing a slash command
pub enum CommandResult {
    /// Clear the conversation history
    Clear,
    /// Print the stored conversation, styled
    ShowHistory,
    /// Show a message to the user (not sent to the model)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse a slash command. Returns None for regular prompts.
pub fn execute_command(input: &str) -> Option<CommandResult> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let command = input[1..]
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase();

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "clear" | "c" => CommandResult::Clear,

        "pct" => CommandResult::ShowHistory,

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?   Show this help message
  /pct            Print the conversation so far
  /clear, /c      Clear conversation history
  /quit, /q       Exit sage"#
        .to_string()
}
