// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Command descriptors: a template plus its policy layers.
//!
//! ```text
//! cmd!("grep {} {}", pattern, files)        (sync: collect raw segments)
//!   --> Command { template, global snapshot, instance, call }
//!         .nothrow() .timeout() .cwd() ...  (call-site layer)
//!         .spawn() --> ProcessHandle
//!
//! Template::render(invocation)              (async, inside the driver)
//!   1. await every Pending arg (try_join_all)
//!   2. quote each word with the shell dialect
//!   3. pieces[0] arg[0] pieces[1] ... pieces[n]
//!
//! Arg: Str | List (one quoted word each) | Output (Display) | Pending
//! ```

use futures_util::future::{BoxFuture, try_join_all};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncRead;

use crate::core::cancel::CancelToken;
use crate::core::policy::{self, EnvMap, Policy, PolicyOverride, StdioMode, resolve};
use crate::core::process::{Channel, InputSource, ProcessHandle, ProcessOutput};
use crate::core::shell::{Invocation, ShellSetting};
use crate::error::{ProcessError, ProcessResult};

/// Placeholder recognised by [`Command::from_template`].
const PLACEHOLDER: &str = "{}";

/// A value interpolated into a command template.
pub enum Arg {
    /// One word.
    Str(String),
    /// Several words, each quoted separately.
    List(Vec<String>),
    /// A previous result, interpolated through its `Display`.
    Output(ProcessOutput),
    /// A value that becomes available later.
    Pending(BoxFuture<'static, ProcessResult<Arg>>),
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::List(list) => f.debug_tuple("List").field(list).finish(),
            Self::Output(output) => f.debug_tuple("Output").field(&output.to_string()).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

impl Arg {
    /// Wraps a future resolving to anything convertible into an `Arg`.
    pub fn pending<F, T>(future: F) -> Self
    where
        F: Future<Output = ProcessResult<T>> + Send + 'static,
        T: Into<Self>,
    {
        Self::Pending(Box::pin(async move { future.await.map(Into::into) }))
    }

    /// Awaits pending values and returns the unquoted words.
    async fn into_words(self) -> ProcessResult<Vec<String>> {
        let mut arg = self;
        loop {
            match arg {
                Self::Pending(future) => arg = future.await?,
                Self::Str(s) => return Ok(vec![s]),
                Self::List(list) => return Ok(list),
                Self::Output(output) => return Ok(vec![output.to_string()]),
            }
        }
    }

    fn preview(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::List(list) => list.join(" "),
            Self::Output(output) => output.to_string(),
            Self::Pending(_) => "<pending>".to_string(),
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<&Path> for Arg {
    fn from(value: &Path) -> Self {
        Self::Str(value.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for Arg {
    fn from(value: PathBuf) -> Self {
        Self::from(value.as_path())
    }
}

impl<S: Into<String>> From<Vec<S>> for Arg {
    fn from(value: Vec<S>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<&[&str]> for Arg {
    fn from(value: &[&str]) -> Self {
        Self::List(value.iter().map(|s| (*s).to_string()).collect())
    }
}

macro_rules! impl_from_display {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Self::Str(value.to_string())
                }
            }
        )+
    };
}

impl_from_display!(i32, i64, u16, u32, u64, usize, f64, bool);

impl From<ProcessOutput> for Arg {
    fn from(value: ProcessOutput) -> Self {
        Self::Output(value)
    }
}

impl From<&ProcessOutput> for Arg {
    fn from(value: &ProcessOutput) -> Self {
        Self::Output(value.clone())
    }
}

impl From<ProcessHandle> for Arg {
    fn from(handle: ProcessHandle) -> Self {
        Self::pending(async move { handle.wait().await })
    }
}

impl From<&ProcessHandle> for Arg {
    fn from(handle: &ProcessHandle) -> Self {
        Self::from(handle.clone())
    }
}

/// Literal pieces interleaved with interpolated arguments.
///
/// Invariant: `pieces.len() == args.len() + 1`.
#[derive(Debug)]
pub struct Template {
    pieces: Vec<String>,
    args: Vec<Arg>,
}

impl Template {
    /// A template with no interpolation.
    #[must_use]
    pub fn literal(line: impl Into<String>) -> Self {
        Self {
            pieces: vec![line.into()],
            args: Vec::new(),
        }
    }

    /// Splits `template` on `{}` and pairs each placeholder with an arg.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` when the counts differ.
    pub fn parse(template: &str, args: Vec<Arg>) -> ProcessResult<Self> {
        let pieces: Vec<String> = template.split(PLACEHOLDER).map(str::to_string).collect();
        if pieces.len() != args.len() + 1 {
            return Err(ProcessError::config(
                "template",
                format!(
                    "{} placeholder(s) but {} argument(s)",
                    pieces.len() - 1,
                    args.len()
                ),
            ));
        }
        Ok(Self { pieces, args })
    }

    /// Best-effort text of the template before resolution.
    #[must_use]
    pub fn preview(&self) -> String {
        let mut line = String::new();
        for (index, piece) in self.pieces.iter().enumerate() {
            line.push_str(piece);
            if let Some(arg) = self.args.get(index) {
                line.push_str(&arg.preview());
            }
        }
        line
    }

    /// Awaits every pending argument and builds the quoted command line.
    ///
    /// # Errors
    ///
    /// Returns the first error of a pending argument.
    pub async fn render(self, invocation: &Invocation) -> ProcessResult<String> {
        let words = try_join_all(self.args.into_iter().map(Arg::into_words)).await?;

        let mut line = String::new();
        let mut pieces = self.pieces.into_iter();
        if let Some(first) = pieces.next() {
            line.push_str(&first);
        }
        for (words, piece) in words.into_iter().zip(pieces) {
            let quoted: Vec<String> = words.iter().map(|word| invocation.quote(word)).collect();
            line.push_str(&quoted.join(" "));
            line.push_str(&piece);
        }
        Ok(line)
    }
}

/// An immutable command line plus the policy layers it will run with.
///
/// The process-wide defaults are snapshotted at construction, so later
/// calls to [`policy::set_defaults`] do not affect this command.
pub struct Command {
    template: Template,
    global: PolicyOverride,
    instance: PolicyOverride,
    call: PolicyOverride,
    input: Option<InputSource>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("template", &self.template)
            .field("call", &self.call)
            .field("has_input", &self.input.is_some())
            .finish_non_exhaustive()
    }
}

impl Command {
    /// Creates a command from a complete, already-quoted line.
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self::with_template(Template::literal(line))
    }

    /// Creates a command from a `{}` template and its arguments.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` when placeholders and arguments do
    /// not pair up.
    pub fn from_template(template: &str, args: Vec<Arg>) -> ProcessResult<Self> {
        Template::parse(template, args).map(Self::with_template)
    }

    fn with_template(template: Template) -> Self {
        Self {
            template,
            global: policy::defaults(),
            instance: PolicyOverride::default(),
            call: PolicyOverride::default(),
            input: None,
        }
    }

    /// Replaces the instance-default layer.
    #[must_use]
    pub fn instance_defaults(mut self, instance: PolicyOverride) -> Self {
        self.instance = instance;
        self
    }

    /// Layers `overrides` on top of the current call-site options.
    #[must_use]
    pub fn overrides(mut self, overrides: &PolicyOverride) -> Self {
        self.call = overrides.layer_over(&self.call);
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.call.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Sets one environment variable on top of the inherited environment.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.call.set_env(key, value);
        self
    }

    /// Sets several environment variables.
    #[must_use]
    pub fn envs(mut self, vars: EnvMap) -> Self {
        self.call.env.get_or_insert_with(EnvMap::new).extend(vars);
        self
    }

    #[must_use]
    pub fn shell(mut self, shell: ShellSetting) -> Self {
        self.call.shell = Some(shell);
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.call.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn postfix(mut self, postfix: impl Into<String>) -> Self {
        self.call.postfix = Some(postfix.into());
        self
    }

    /// Sets all three stdio modes at once.
    #[must_use]
    pub const fn stdio(mut self, stdin: StdioMode, stdout: StdioMode, stderr: StdioMode) -> Self {
        self.call.stdin = Some(stdin);
        self.call.stdout = Some(stdout);
        self.call.stderr = Some(stderr);
        self
    }

    #[must_use]
    pub const fn stdin_mode(mut self, mode: StdioMode) -> Self {
        self.call.stdin = Some(mode);
        self
    }

    #[must_use]
    pub const fn stdout_mode(mut self, mode: StdioMode) -> Self {
        self.call.stdout = Some(mode);
        self
    }

    #[must_use]
    pub const fn stderr_mode(mut self, mode: StdioMode) -> Self {
        self.call.stderr = Some(mode);
        self
    }

    /// Kills the process with the timeout signal after `duration`.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.call.timeout = Some(duration);
        self
    }

    #[must_use]
    pub fn timeout_signal(mut self, signal: impl Into<String>) -> Self {
        self.call.timeout_signal = Some(signal.into());
        self
    }

    /// Ties the process to an external cancellation token.
    #[must_use]
    pub fn signal(mut self, token: CancelToken) -> Self {
        self.call.signal = Some(token);
        self
    }

    /// Tolerates non-zero exit codes.
    #[must_use]
    pub const fn nothrow(mut self) -> Self {
        self.call.nothrow = Some(true);
        self
    }

    #[must_use]
    pub const fn quiet(mut self) -> Self {
        self.call.quiet = Some(true);
        self
    }

    #[must_use]
    pub const fn verbose(mut self) -> Self {
        self.call.verbose = Some(true);
        self
    }

    /// Defers the spawn until [`ProcessHandle::run`].
    #[must_use]
    pub const fn halt(mut self) -> Self {
        self.call.halt = Some(true);
        self
    }

    #[must_use]
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.call.delimiter = Some(delimiter.into());
        self
    }

    /// Feeds `bytes` to the process stdin.
    #[must_use]
    pub fn input(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.call.input = Some(bytes.into());
        self
    }

    /// Streams `reader` into the process stdin.
    #[must_use]
    pub fn feed<R>(mut self, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.input = Some(InputSource::Reader(Box::new(reader)));
        self
    }

    /// Resolves the effective policy without spawning.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` for contradictory options.
    pub fn policy(&self) -> ProcessResult<Policy> {
        resolve(&self.call, &self.instance, &self.global)
    }

    /// Text of the command before argument resolution.
    #[must_use]
    pub fn preview(&self) -> String {
        self.template.preview()
    }

    /// Awaits pending arguments and returns the quoted command line
    /// without spawning.
    ///
    /// # Errors
    ///
    /// Returns policy, shell lookup or argument errors.
    pub async fn resolve(self) -> ProcessResult<String> {
        let invocation = self.policy()?.shell().invocation()?;
        self.template.render(&invocation).await
    }

    /// Starts the process (or parks it when `halt` is set).
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` for contradictory options. Runtime
    /// failures surface through the handle.
    pub fn spawn(self) -> ProcessResult<ProcessHandle> {
        self.launch(None, None)
    }

    /// Spawns and waits for the result.
    ///
    /// # Errors
    ///
    /// Returns the settlement error of the process.
    pub async fn run(self) -> ProcessResult<ProcessOutput> {
        self.spawn()?.wait().await
    }

    /// Spawns with an optional piped input and the upstream channel it
    /// reads from.
    pub(crate) fn launch(
        self,
        piped: Option<InputSource>,
        upstream: Option<(&ProcessHandle, Channel)>,
    ) -> ProcessResult<ProcessHandle> {
        let mut policy = self.policy()?;

        let sources = [piped.is_some(), self.input.is_some(), policy.input().is_some()];
        if sources.into_iter().filter(|present| *present).count() > 1 {
            return Err(ProcessError::config(
                "input",
                "stdin has more than one input source",
            ));
        }
        let input = piped.or(self.input);
        if input.is_some()
            && let Some(mode) = policy.stdin()
            && mode != StdioMode::Pipe
        {
            return Err(ProcessError::config(
                "stdio",
                format!("cannot pipe into stdin configured as '{}'", mode.as_str()),
            ));
        }
        if let Some((upstream, _)) = upstream
            && policy.signal().is_none()
        {
            policy.set_signal(upstream.cancel_token().clone());
        }

        Ok(ProcessHandle::launch(
            self.template,
            policy,
            input,
            upstream.map(|(handle, channel)| (handle.clone(), channel)),
        ))
    }
}

impl IntoFuture for Command {
    type Output = ProcessResult<ProcessOutput>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

/// Builds a [`Command`] from a `{}` template.
///
/// ```no_run
/// # async fn demo() -> procflow::error::ProcessResult<()> {
/// let name = "world";
/// let output = procflow::cmd!("echo hello {}", name)?.run().await?;
/// assert_eq!(output, "hello world");
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! cmd {
    ($template:expr $(,)?) => {
        $crate::core::command::Command::from_template($template, ::std::vec::Vec::new())
    };
    ($template:expr, $($arg:expr),+ $(,)?) => {
        $crate::core::command::Command::from_template(
            $template,
            ::std::vec![$($crate::core::command::Arg::from($arg)),+],
        )
    };
}

/// Produces commands sharing one instance-default layer.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    defaults: PolicyOverride,
}

impl Runner {
    #[must_use]
    pub const fn new(defaults: PolicyOverride) -> Self {
        Self { defaults }
    }

    #[must_use]
    pub const fn defaults(&self) -> &PolicyOverride {
        &self.defaults
    }

    /// Mutates the instance defaults for commands built afterwards.
    pub fn update(&mut self, update: impl FnOnce(&mut PolicyOverride)) {
        update(&mut self.defaults);
    }

    /// Builds a command from a complete line.
    #[must_use]
    pub fn command(&self, line: impl Into<String>) -> Command {
        Command::new(line).instance_defaults(self.defaults.clone())
    }

    /// Builds a command from a `{}` template.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessError::Config` on a placeholder/argument mismatch.
    pub fn template(&self, template: &str, args: Vec<Arg>) -> ProcessResult<Command> {
        Command::from_template(template, args)
            .map(|command| command.instance_defaults(self.defaults.clone()))
    }
}
