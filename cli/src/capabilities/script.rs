//! Running check and install scripts with the right interpreter.
use std::fs;
use std::io::{BufRead as _, BufReader};
use std::path::{Path, PathBuf};

use crate::exec::{ExecResult, Executor};

/// Interpreter used when neither an explicit one nor a shebang is present.
const DEFAULT_INTERPRETER: &str = "sh";

/// Why a script could not be started.
#[derive(Debug)]
pub enum ScriptFault {
    /// The script file does not exist.
    MissingScript(PathBuf),
    /// The interpreter is not on `PATH`.
    MissingInterpreter(String),
    /// Spawning failed (or the run was cancelled).
    Spawn(anyhow::Error),
}

/// Pick the interpreter for `script`.
///
/// Explicit beats shebang beats `sh`.  `#!/usr/bin/env zsh` yields `zsh`,
/// `#!/bin/bash -e` yields `/bin/bash`.
#[must_use]
pub fn interpreter_for(script: &Path, explicit: Option<&str>) -> String {
    if let Some(explicit) = explicit {
        return explicit.to_string();
    }
    shebang(script).unwrap_or_else(|| DEFAULT_INTERPRETER.to_string())
}

fn shebang(script: &Path) -> Option<String> {
    let file = fs::File::open(script).ok()?;
    let mut first = String::new();
    BufReader::new(file).read_line(&mut first).ok()?;
    let line = first.strip_prefix("#!")?.trim();
    let mut words = line.split_whitespace();
    let program = words.next()?;
    if Path::new(program).file_name().is_some_and(|n| n == "env") {
        return words.find(|w| !w.starts_with('-')).map(str::to_string);
    }
    Some(program.to_string())
}

/// Run `script` from its own directory.
///
/// Exit status is reported in the result, not as an error.
///
/// # Errors
///
/// Returns a [`ScriptFault`] when the script or interpreter is missing or the
/// process cannot be spawned.
pub fn run_script(
    executor: &dyn Executor,
    script: &Path,
    interpreter: Option<&str>,
) -> Result<ExecResult, ScriptFault> {
    if !script.is_file() {
        return Err(ScriptFault::MissingScript(script.to_path_buf()));
    }
    let interpreter = interpreter_for(script, interpreter);
    if !executor.which(&interpreter) {
        return Err(ScriptFault::MissingInterpreter(interpreter));
    }
    let dir = script.parent().unwrap_or_else(|| Path::new("."));
    let path = script.to_string_lossy();
    executor
        .run_in_unchecked(dir, &interpreter, &[&path])
        .map_err(ScriptFault::Spawn)
}
