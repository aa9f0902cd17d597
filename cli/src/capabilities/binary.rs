//! Binary-on-path probe with optional minimum-version gate.
use regex::Regex;

use super::version::Version;
use crate::error::CheckError;
use crate::exec::Executor;
use crate::logging::Log;

/// Parameters of a binary probe.
#[derive(Debug, Clone, Copy)]
pub struct BinaryProbe<'a> {
    /// Program name.
    pub name: &'a str,
    /// Argument printing the version.
    pub version_arg: &'a str,
    /// Non-zero exit of the version command is expected.
    pub returns_nonzero: bool,
    /// Pattern of output lines to ignore.
    pub skip_prefix: Option<&'a str>,
}

impl BinaryProbe<'_> {
    /// Evaluate the probe.
    ///
    /// Without a minimum version, presence on `PATH` is enough.  With one,
    /// the version command is run and the first version found in its output
    /// (stdout, then stderr) must be at least `minimum`.  Output without a
    /// recognisable version passes.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckError`] if the version command cannot be spawned or
    /// the skip pattern is invalid.
    pub fn evaluate(
        &self,
        executor: &dyn Executor,
        minimum: Option<&Version>,
        log: &dyn Log,
    ) -> Result<bool, CheckError> {
        if !executor.which(self.name) {
            log.debug(&format!("{} not found on PATH", self.name));
            return Ok(false);
        }
        let Some(minimum) = minimum else {
            return Ok(true);
        };

        let skip = self
            .skip_prefix
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| CheckError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        let result = executor
            .run_unchecked(self.name, &[self.version_arg])
            .map_err(|e| CheckError::Spawn {
                program: self.name.to_string(),
                message: format!("{e:#}"),
            })?;
        if !result.success && !self.returns_nonzero {
            log.debug(&format!(
                "{} {} exited with {}",
                self.name,
                self.version_arg,
                result.code.unwrap_or(-1)
            ));
            return Ok(false);
        }

        let output = format!("{}\n{}", result.stdout, result.stderr);
        match Version::find_in(&output, skip.as_ref()) {
            Some(found) if found.at_least(minimum) => {
                log.debug(&format!("{} {found} satisfies >= {minimum}", self.name));
                Ok(true)
            }
            Some(found) => {
                log.info(&format!(
                    "{} {found} is older than required {minimum}",
                    self.name
                ));
                Ok(false)
            }
            None => {
                log.debug(&format!(
                    "could not determine {} version; presence accepted",
                    self.name
                ));
                Ok(true)
            }
        }
    }
}
