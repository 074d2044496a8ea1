// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Shell selection, argument quoting and command-line shaping.
//!
//! ```text
//! ShellSetting::Auto      Unix: bash (PATH) else /bin/sh
//!                         Windows: pwsh else powershell
//! ShellSetting::Path(p)   explicit shell
//! ShellSetting::Disabled  no shell; line split on whitespace
//!
//! Invocation::Shell { Bash/Posix }  sh -c "<prefix><line><postfix>"
//! Invocation::Shell { PowerShell }  pwsh -NoProfile -NonInteractive -Command "<line>"
//! Invocation::Direct                argv = line.split_whitespace()
//!
//! quote():  Bash        safe chars kept, else $'...' with escapes
//!           Posix       safe chars kept, else '...' with '\'' for quotes
//!           PowerShell  '...' with '' doubling
//!           Direct      verbatim
//! ```

use regex::Regex;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::error::{ProcessError, ProcessResult};

/// Static cache for executable paths resolved via `which`.
static EXECUTABLE_CACHE: OnceLock<RwLock<BTreeMap<String, PathBuf>>> = OnceLock::new();

fn exe_cache() -> &'static RwLock<BTreeMap<String, PathBuf>> {
    EXECUTABLE_CACHE.get_or_init(|| RwLock::new(BTreeMap::new()))
}

/// Finds the full path to an executable in PATH.
///
/// Results are cached for subsequent lookups.
#[must_use]
pub fn find(program: &str) -> Option<PathBuf> {
    {
        let cache = exe_cache().read().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = cache.get(program) {
            return Some(path.clone());
        }
    }

    let path = which::which(program).ok()?;
    exe_cache()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(program.to_string(), path.clone());
    Some(path)
}

/// Checks if an executable exists in PATH.
#[must_use]
pub fn exists(program: &str) -> bool {
    find(program).is_some()
}

/// Shell choice recorded in a policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ShellSetting {
    /// Platform default, resolved at spawn time.
    #[default]
    Auto,
    /// An explicit shell executable.
    Path(PathBuf),
    /// Run the command line directly without a shell.
    Disabled,
}

impl ShellSetting {
    /// Parses a config/CLI value: `"auto"`, `"none"`/`"false"` or a path.
    #[must_use]
    pub fn from_value(value: &str) -> Self {
        match value.trim() {
            "" | "auto" => Self::Auto,
            "none" | "false" | "disabled" => Self::Disabled,
            path => Self::Path(PathBuf::from(path)),
        }
    }

    /// Resolves the setting to a concrete invocation strategy.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Spawn` if no shell can be found.
    pub fn invocation(&self) -> ProcessResult<Invocation> {
        let program = match self {
            Self::Disabled => return Ok(Invocation::Direct),
            Self::Path(path) => resolve_program(path).ok_or_else(|| ProcessError::Spawn {
                command: path.display().to_string(),
                message: "shell not found".to_string(),
            })?,
            Self::Auto => default_shell().ok_or_else(|| ProcessError::Spawn {
                command: "shell".to_string(),
                message: "no default shell available".to_string(),
            })?,
        };
        let kind = ShellKind::of(&program);
        Ok(Invocation::Shell { program, kind })
    }

    /// Default prologue for this shell (`set -euo pipefail;` for bash/zsh).
    #[must_use]
    pub fn default_prefix(&self) -> Option<&'static str> {
        let stem = match self {
            Self::Disabled => return None,
            Self::Path(path) => shell_stem(path),
            Self::Auto => default_shell().as_deref().and_then(shell_stem),
        }?;
        matches!(stem.as_str(), "bash" | "zsh").then_some("set -euo pipefail;")
    }
}

impl std::fmt::Display for ShellSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Disabled => f.write_str("none"),
        }
    }
}

fn shell_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_ascii_lowercase())
}

fn resolve_program(path: &Path) -> Option<PathBuf> {
    if path.components().count() > 1 || path.is_absolute() {
        return path.exists().then(|| path.to_path_buf());
    }
    find(&path.to_string_lossy())
}

fn default_shell() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        find("pwsh").or_else(|| find("powershell"))
    }
    #[cfg(not(windows))]
    {
        find("bash").or_else(|| {
            let sh = PathBuf::from("/bin/sh");
            sh.exists().then_some(sh)
        })
    }
}

/// Command-line dialect of a shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    /// `bash` / `zsh`, which understand ANSI-C `$'...'` strings.
    Bash,
    /// `sh`, `dash`, `ash` and any other Bourne-style shell.
    Posix,
    /// `pwsh` / `powershell`.
    PowerShell,
}

impl ShellKind {
    fn of(program: &Path) -> Self {
        match shell_stem(program).as_deref() {
            Some("pwsh" | "powershell") => Self::PowerShell,
            Some("bash" | "zsh") => Self::Bash,
            _ => Self::Posix,
        }
    }
}

/// How a resolved command line is turned into a program and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Shell { program: PathBuf, kind: ShellKind },
    Direct,
}

impl Invocation {
    /// Quotes one interpolated argument for this dialect.
    #[must_use]
    pub fn quote(&self, arg: &str) -> String {
        match self {
            Self::Shell {
                kind: ShellKind::Bash,
                ..
            } => quote_bash(arg),
            Self::Shell {
                kind: ShellKind::Posix,
                ..
            } => quote_posix(arg),
            Self::Shell {
                kind: ShellKind::PowerShell,
                ..
            } => quote_powershell(arg),
            Self::Direct => arg.to_string(),
        }
    }

    /// Builds `(program, argv)` for a complete command line.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Spawn` if a direct line is empty.
    pub fn argv(&self, line: &str) -> ProcessResult<(PathBuf, Vec<OsString>)> {
        match self {
            Self::Shell {
                program,
                kind: ShellKind::Bash | ShellKind::Posix,
            } => Ok((program.clone(), vec!["-c".into(), line.into()])),
            Self::Shell {
                program,
                kind: ShellKind::PowerShell,
            } => Ok((
                program.clone(),
                vec![
                    "-NoProfile".into(),
                    "-NonInteractive".into(),
                    "-Command".into(),
                    line.into(),
                ],
            )),
            Self::Direct => {
                let mut words = line.split_whitespace();
                let program = words.next().ok_or_else(|| ProcessError::Spawn {
                    command: line.to_string(),
                    message: "empty command line".to_string(),
                })?;
                let program = find(program).unwrap_or_else(|| PathBuf::from(program));
                Ok((program, words.map(OsString::from).collect()))
            }
        }
    }
}

fn safe_word() -> Option<&'static Regex> {
    static SAFE: OnceLock<Option<Regex>> = OnceLock::new();
    SAFE.get_or_init(|| Regex::new(r"^[\w./:=@,+%-]+$").ok())
        .as_ref()
}

/// Quotes for bash and zsh using ANSI-C `$'...'` strings.
#[must_use]
pub fn quote_bash(arg: &str) -> String {
    if arg.is_empty() {
        return "$''".to_string();
    }
    if safe_word().is_some_and(|re| re.is_match(arg)) {
        return arg.to_string();
    }
    let mut quoted = String::with_capacity(arg.len() + 3);
    quoted.push_str("$'");
    for ch in arg.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\0' => quoted.push_str("\\0"),
            '\x07' => quoted.push_str("\\a"),
            '\x08' => quoted.push_str("\\b"),
            '\x0b' => quoted.push_str("\\v"),
            '\x0c' => quoted.push_str("\\f"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('\'');
    quoted
}

/// Quotes for plain POSIX shells. Nothing is special inside `'...'`, so a
/// single quote closes the string, is escaped, and reopens it.
#[must_use]
pub fn quote_posix(arg: &str) -> String {
    if !arg.is_empty() && safe_word().is_some_and(|re| re.is_match(arg)) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Quotes for PowerShell single-quoted strings.
#[must_use]
pub fn quote_powershell(arg: &str) -> String {
    if !arg.is_empty() && safe_word().is_some_and(|re| re.is_match(arg)) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', "''"))
}

#[cfg(test)]
mod tests;
