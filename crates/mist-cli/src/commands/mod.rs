//! Slash commands for interactive mode

use mist_chat::Language;

/// Result of parsing a slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Start an empty chat; the next message creates a conversation
    NewChat,
    /// Print the conversation list
    List,
    /// Open the Nth conversation of the list (zero-based)
    Open(usize),
    /// Delete the Nth conversation of the list (zero-based)
    Delete(usize),
    /// Set the language, or toggle it when none is given
    Language(Option<Language>),
    WhoAmI,
    Logout,
    /// Show a message to the user (not sent to the assistant)
    Message(String),
    Exit,
    Unknown(String),
}

/// Parse a slash command. Returns `None` for ordinary chat input.
pub fn execute_command(input: &str) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),
        "new" | "n" => CommandResult::NewChat,
        "list" | "ls" | "l" => CommandResult::List,
        "open" | "o" => match parse_index(args) {
            Ok(index) => CommandResult::Open(index),
            Err(msg) => CommandResult::Message(msg),
        },
        "delete" | "del" | "rm" => match parse_index(args) {
            Ok(index) => CommandResult::Delete(index),
            Err(msg) => CommandResult::Message(msg),
        },
        "lang" | "language" => {
            if args.is_empty() {
                CommandResult::Language(None)
            } else {
                match args.parse::<Language>() {
                    Ok(language) => CommandResult::Language(Some(language)),
                    Err(_) => CommandResult::Message(format!(
                        "Unknown language: {args}. Use pt or en."
                    )),
                }
            }
        }
        "whoami" | "me" => CommandResult::WhoAmI,
        "logout" => CommandResult::Logout,
        "quit" | "exit" | "q" => CommandResult::Exit,
        _ => CommandResult::Unknown(command),
    })
}

/// Parse a 1-based list position
fn parse_index(args: &str) -> Result<usize, String> {
    match args.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err("Give the conversation number shown by /list, e.g. /open 2".to_string()),
    }
}

pub fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /new, /n             Start a new conversation
  /list, /ls           List your conversations
  /open, /o N          Open conversation N from the list
  /delete, /rm N       Delete conversation N from the list
  /lang [pt|en]        Set the language, or switch it when none is given
  /whoami              Show the logged-in account
  /logout              Log out and forget the stored token
  /quit, /exit, /q     Exit mist

Keys (TUI):
  Tab                  Move between the sidebar and the input
  Ctrl+N               New conversation
  Ctrl+X               Delete the highlighted conversation
  Ctrl+T               Switch language
  Ctrl+B               Show or hide the sidebar
  Ctrl+R               Reload the conversation list
  Ctrl+C, Ctrl+Q       Quit"#
        .to_string()
}
