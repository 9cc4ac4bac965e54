use evalgate_core::{GatewayConfig, config::ConfigError};
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("No source given: pass it as an argument, with --file, or on stdin with -")]
    Missing,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type InputResult<T> = Result<T, InputError>;

/// Loads the gateway configuration for local runs.
///
/// A missing file at the default location means "use defaults"; an explicit
/// path that does not exist is an error.
pub fn load_gateway_config(path: &Path, explicit: bool) -> InputResult<GatewayConfig> {
    if !explicit && !path.exists() {
        return Ok(GatewayConfig::default());
    }
    Ok(GatewayConfig::from_file(path)?)
}

/// Resolves the source text from an inline argument or a file.
///
/// `-` in either position reads standard input.
pub fn read_source(inline: Option<&str>, file: Option<&PathBuf>) -> InputResult<String> {
    match (inline, file) {
        (Some("-"), _) => read_stdin(),
        (Some(source), _) => Ok(source.to_string()),
        (None, Some(path)) if path.as_os_str() == "-" => read_stdin(),
        (None, Some(path)) => fs::read_to_string(path).map_err(|source| InputError::Read {
            path: path.display().to_string(),
            source,
        }),
        (None, None) => Err(InputError::Missing),
    }
}

fn read_stdin() -> InputResult<String> {
    let mut source = String::new();
    io::stdin()
        .read_to_string(&mut source)
        .map_err(|source| InputError::Read {
            path: "<stdin>".to_string(),
            source,
        })?;
    Ok(source)
}
