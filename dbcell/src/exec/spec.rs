//! Exec session request.

use dbcell_shared::errors::{DbcellError, DbcellResult};
use std::collections::BTreeMap;

/// A command to run in a container.
///
/// Stdout and stderr are always attached. Built fresh for each call.
///
/// # Example
///
/// ```
/// use dbcell::ExecSpec;
///
/// let spec = ExecSpec::new("psql")
///     .args(["-U", "postgres", "-XAtc", "checkpoint"])
///     .user("postgres");
/// assert_eq!(spec.command()[0], "psql");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecSpec {
    command: Vec<String>,
    user: Option<String>,
    tty: bool,
    env: Option<BTreeMap<String, String>>,
}

impl ExecSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            command: vec![program.into()],
            user: None,
            tty: false,
            env: None,
        }
    }

    /// Build from a full argv. Fails if `argv` is empty.
    pub fn from_argv<I, S>(argv: I) -> DbcellResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let program = argv
            .next()
            .ok_or_else(|| DbcellError::Config("exec command must not be empty".into()))?;
        Ok(Self::new(program).args(argv))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.command.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn tty(mut self, tty: bool) -> Self {
        self.tty = tty;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn program(&self) -> &str {
        &self.command[0]
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn is_tty(&self) -> bool {
        self.tty
    }

    pub fn env_vars(&self) -> Option<&BTreeMap<String, String>> {
        self.env.as_ref()
    }

    pub(crate) fn validate(&self, op: &str) -> DbcellResult<()> {
        if self.program().trim().is_empty() {
            return Err(DbcellError::Config(format!(
                "{}: exec command has an empty program name",
                op
            )));
        }
        Ok(())
    }
}
