//! Errors that carry their own exit code.

use std::fmt;

use matchcity_core::MatchCityError;

use crate::constants::exit_codes;

/// An error the CLI reports with a specific exit code and an optional hint.
#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            code: exit_codes::NOT_FOUND,
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn integrity_failed(message: impl Into<String>) -> Self {
        Self {
            code: exit_codes::INTEGRITY_FAILED,
            message: message.into(),
            hint: None,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

/// Exit code for an error bubbled up to `main`.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.code;
    }
    match err.downcast_ref::<MatchCityError>() {
        Some(MatchCityError::NotFound(_)) => exit_codes::NOT_FOUND,
        Some(MatchCityError::InvalidInput(_)) | Some(MatchCityError::InvalidUrl(_)) => {
            exit_codes::INVALID_INPUT
        }
        _ => 1,
    }
}

/// Print an error (and its hint, if any) to stderr.
pub fn report(err: &anyhow::Error) {
    eprintln!("Error: {:#}", err);
    if let Some(CliError {
        hint: Some(hint), ..
    }) = err.downcast_ref::<CliError>()
    {
        eprintln!();
        eprintln!("{}", hint);
    }
}
