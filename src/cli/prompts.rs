//! Prompt helpers with inquire → stdin fallback.
//!
//! Every prompt gracefully degrades: if `inquire` fails (e.g. not a real TTY),
//! we fall back to plain stdin prompts. Esc and Ctrl-C cancel the run.

use chaos_core::{Error, Result};
use inquire::{Confirm, InquireError, Select, Text};
use std::io::{self, BufRead, Write};

fn io_error(e: io::Error) -> Error {
    Error::Collaborator(format!("Failed to read input: {}", e))
}

/// Read a trimmed line from stdin.
fn read_line() -> Result<String> {
    let mut input = String::new();
    let read = io::stdin().lock().read_line(&mut input).map_err(io_error)?;
    if read == 0 {
        return Err(Error::Cancelled);
    }
    Ok(input.trim().to_string())
}

fn is_cancel(e: &InquireError) -> bool {
    matches!(
        e,
        InquireError::OperationCanceled | InquireError::OperationInterrupted
    )
}

/// Pick one of `options`; returns its index.
pub fn select(message: &str, options: &[&str]) -> Result<usize> {
    match Select::new(message, options.to_vec()).prompt() {
        Ok(choice) => Ok(options.iter().position(|o| *o == choice).unwrap_or(0)),
        Err(e) if is_cancel(&e) => Err(Error::Cancelled),
        Err(_) => {
            println!("? {}", message);
            for (i, option) in options.iter().enumerate() {
                println!("  {}) {}", i + 1, option);
            }
            print!("> ");
            io::stdout().flush().map_err(io_error)?;
            let input = read_line()?;
            Ok(input
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=options.len()).contains(n))
                .map_or(0, |n| n - 1))
        }
    }
}

/// Free text with an optional default.
pub fn text(message: &str, default: Option<&str>) -> Result<String> {
    let mut builder = Text::new(message);
    if let Some(d) = default {
        builder = builder.with_default(d);
    }
    match builder.prompt() {
        Ok(v) => Ok(v.trim().to_string()),
        Err(e) if is_cancel(&e) => Err(Error::Cancelled),
        Err(_) => {
            match default {
                Some(d) => print!("? {} [{}] ", message, d),
                None => print!("? {} ", message),
            }
            io::stdout().flush().map_err(io_error)?;
            let input = read_line()?;
            if input.is_empty() {
                Ok(default.unwrap_or_default().to_string())
            } else {
                Ok(input)
            }
        }
    }
}

/// Step number prompt; re-asks until the answer is a positive number.
pub fn step_number(message: &str) -> Result<u32> {
    loop {
        let input = text(message, None)?;
        match input.parse::<u32>() {
            Ok(n) if n > 0 => return Ok(n),
            _ => println!("  Please enter a step number (1, 2, ...)"),
        }
    }
}

/// Confirm prompt with fallback.
pub fn confirm(message: &str, default: bool) -> Result<bool> {
    match Confirm::new(message).with_default(default).prompt() {
        Ok(v) => Ok(v),
        Err(e) if is_cancel(&e) => Err(Error::Cancelled),
        Err(_) => {
            let hint = if default { "Y/n" } else { "y/N" };
            print!("? {} ({}) ", message, hint);
            io::stdout().flush().map_err(io_error)?;
            let input = read_line()?;
            match input.to_lowercase().as_str() {
                "y" | "yes" => Ok(true),
                "n" | "no" => Ok(false),
                _ => Ok(default),
            }
        }
    }
}
