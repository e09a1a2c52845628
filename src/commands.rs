//! Parser for interactive input lines
//!
//! Plain lines are chat topics. Lines starting with `/` are commands that
//! edit the image prompt, generate images, switch models and so on.
//! Command names are case-insensitive; their arguments are kept verbatim.

use crate::app::Event;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

pub const HELP_TEXT: &str = "\
Type a topic and press Enter to have the assistant refine it into an image prompt.

Image prompt:
  /prompt <text>        Replace the editable image prompt (use \\n for line breaks)
  /prompt               Show the editable image prompt
  /append <text>        Append a line to the editable image prompt
  /use                  Copy the latest assistant reply into the image prompt
  /image                Generate an image from the editable prompt

Gallery:
  /gallery              List generated images, newest first
  /save <index> [dir]   Download an image as PNG

Session:
  /model <id>           Switch chat model (clears history, prompt and gallery)
  /models               List available chat models
  /tokens <n>           Set max tokens for replies (512 step, up to the model limit)
  /history              Show the conversation
  /status               Show model, limits and image availability
  /help                 Show this help
  /exit                 Leave the session";

/// Parse one input line into an event.
///
/// Returns `Ok(None)` for blank lines.
pub fn parse_input(line: &str) -> Result<Option<Event>, CommandError> {
    if line.is_empty() {
        return Ok(None);
    }

    let Some(command_line) = line.trim_start().strip_prefix('/') else {
        return Ok(Some(Event::SubmitTopic(line.to_string())));
    };

    let (name, rest) = match command_line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command_line, ""),
    };
    let name = name.to_lowercase();
    let command = format!("/{}", name);

    let event = match name.as_str() {
        "prompt" if rest.is_empty() => Event::ShowImagePrompt,
        "prompt" => Event::SetImagePrompt(unescape_newlines(rest)),
        "append" => Event::AppendImagePrompt(require(&command, rest, "/append <text>")?.to_string()),
        "use" => Event::UseLastReply,
        "image" | "generate" => Event::GenerateImage,
        "gallery" | "images" => Event::ShowGallery,
        "save" | "download" => parse_save(&command, rest)?,
        "model" => Event::SelectModel(require(&command, rest, "/model <id>")?.to_string()),
        "models" => Event::ListModels,
        "tokens" | "max-tokens" => {
            let value = require(&command, rest, "/tokens <n>")?;
            let tokens = value
                .parse::<u32>()
                .map_err(|_| CommandError::UnsupportedArgument {
                    command: command.clone(),
                    arg: value.to_string(),
                })?;
            Event::SetMaxTokens(tokens)
        }
        "history" => Event::ShowHistory,
        "status" => Event::ShowStatus,
        "help" | "?" => Event::Help,
        "exit" | "quit" => Event::Exit,
        _ => return Err(CommandError::UnknownCommand(command)),
    };

    Ok(Some(event))
}

fn require<'a>(command: &str, rest: &'a str, usage: &str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: usage.to_string(),
        })
    } else {
        Ok(rest)
    }
}

fn parse_save(command: &str, rest: &str) -> Result<Event, CommandError> {
    let rest = require(command, rest, "/save <index> [dir]")?;
    let (index, dir) = match rest.split_once(char::is_whitespace) {
        Some((index, dir)) => (index, Some(PathBuf::from(dir.trim()))),
        None => (rest, None),
    };
    let index = index
        .parse::<usize>()
        .map_err(|_| CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: index.to_string(),
        })?;
    Ok(Event::SaveImage { index, dir })
}

fn unescape_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}
