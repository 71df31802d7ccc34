//! Invoking external tools.
//!
//! Every external program is run through a [`Runner`], which only reports
//! how the process exited. [`execute()`] applies the single policy used for
//! all steps: a program that cannot be started or exits unsuccessfully is an
//! [`Error`] tagged with the step it belonged to.

use std::ffi::OsStr;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::ExitStatus;

use tracing::info;

////////////////////////////////////////////////////////////////////////////////////////
// Steps and invocations
////////////////////////////////////////////////////////////////////////////////////////

/// A step of the workflow carried out by an external tool.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Step {
    /// Building the quantifier index.
    BuildIndex,

    /// Downloading the reads of a run.
    Download,

    /// Extracting reads from a downloaded run.
    Extract,

    /// Quantifying transcript abundance for a run.
    Quantify,

    /// Generating splicing event definitions.
    GenerateEvents,

    /// Computing per-event PSI values.
    CalculatePsi,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::BuildIndex => write!(f, "index build"),
            Step::Download => write!(f, "download"),
            Step::Extract => write!(f, "read extraction"),
            Step::Quantify => write!(f, "quantification"),
            Step::GenerateEvents => write!(f, "event generation"),
            Step::CalculatePsi => write!(f, "PSI calculation"),
        }
    }
}

/// A single external program invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Invocation {
    /// The step this invocation carries out.
    step: Step,

    /// The run this invocation belongs to, if any.
    run: Option<String>,

    /// The program.
    program: PathBuf,

    /// The arguments.
    args: Vec<OsString>,
}

impl Invocation {
    /// Creates a new [`Invocation`] with no arguments.
    pub fn new(step: Step, program: impl Into<PathBuf>) -> Self {
        Self {
            step,
            run: None,
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Associates the invocation with a run.
    pub fn for_run(mut self, run: impl Into<String>) -> Self {
        self.run = Some(run.into());
        self
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Gets the step.
    pub fn step(&self) -> Step {
        self.step
    }

    /// Gets the run, if any.
    pub fn run(&self) -> Option<&str> {
        self.run.as_deref()
    }

    /// Gets the program.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Gets the arguments.
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Gets the argument following `flag`, if present.
    ///
    /// # Examples
    ///
    /// ```
    /// use psiflow::tool::Invocation;
    /// use psiflow::tool::Step;
    ///
    /// let invocation = Invocation::new(Step::Quantify, "salmon")
    ///     .args(["quant", "-o", "results/SRR1_quant"]);
    ///
    /// assert_eq!(
    ///     invocation.value_of("-o").and_then(|v| v.to_str()),
    ///     Some("results/SRR1_quant")
    /// );
    /// assert!(invocation.value_of("-i").is_none());
    /// ```
    pub fn value_of(&self, flag: &str) -> Option<&OsStr> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(OsString::as_os_str)
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;

        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Runners
////////////////////////////////////////////////////////////////////////////////////////

/// How an external process exited.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Status {
    /// Whether the process exited successfully.
    success: bool,

    /// The exit code, if the process exited normally.
    code: Option<i32>,
}

impl Status {
    /// A successful exit.
    pub fn success() -> Self {
        Self {
            success: true,
            code: Some(0),
        }
    }

    /// An unsuccessful exit with the given code ([`None`] if the process was
    /// terminated by a signal).
    pub fn failure(code: Option<i32>) -> Self {
        Self {
            success: false,
            code,
        }
    }

    /// Returns whether the process exited successfully.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Gets the exit code.
    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

impl From<ExitStatus> for Status {
    fn from(status: ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Runs external programs.
pub trait Runner {
    /// Runs an invocation to completion.
    fn run(&mut self, invocation: &Invocation) -> io::Result<Status>;
}

impl<F> Runner for F
where
    F: FnMut(&Invocation) -> io::Result<Status>,
{
    fn run(&mut self, invocation: &Invocation) -> io::Result<Status> {
        (*self)(invocation)
    }
}

/// Runs programs as child processes that inherit the standard streams.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> io::Result<Status> {
        Command::new(invocation.program())
            .args(invocation.get_args())
            .status()
            .map(Status::from)
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Execution
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to running an external tool.
#[derive(Debug)]
pub enum Error {
    /// The program could not be started.
    Spawn(Box<Invocation>, io::Error),

    /// The program exited unsuccessfully.
    Failed(Box<Invocation>, Status),
}

impl Error {
    /// Gets the failed invocation.
    pub fn invocation(&self) -> &Invocation {
        match self {
            Error::Spawn(invocation, _) => invocation,
            Error::Failed(invocation, _) => invocation,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let invocation = self.invocation();

        write!(f, "{} failed", invocation.step())?;
        if let Some(run) = invocation.run() {
            write!(f, " for `{run}`")?;
        }

        match self {
            Error::Spawn(_, err) => write!(
                f,
                ": could not start `{}`: {err}",
                invocation.program().display()
            ),
            Error::Failed(_, status) => write!(f, " with {status}: `{invocation}`"),
        }
    }
}

impl std::error::Error for Error {}

/// Runs an invocation, treating anything but a successful exit as an error.
pub fn execute<R>(runner: &mut R, invocation: Invocation) -> Result<(), Error>
where
    R: Runner + ?Sized,
{
    info!("{}: running `{invocation}`", invocation.step());

    match runner.run(&invocation) {
        Ok(status) if status.is_success() => Ok(()),
        Ok(status) => Err(Error::Failed(Box::new(invocation), status)),
        Err(err) => Err(Error::Spawn(Box::new(invocation), err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let invocation = Invocation::new(Step::Download, "prefetch")
            .args(["-v", "SRR1", "-O"])
            .arg(Path::new("fastq_output"))
            .for_run("SRR1");

        assert_eq!(invocation.to_string(), "prefetch -v SRR1 -O fastq_output");
    }

    #[test]
    fn test_failure_is_tagged_with_step_and_run() {
        let mut runner = |_: &Invocation| -> io::Result<Status> { Ok(Status::failure(Some(3))) };
        let invocation = Invocation::new(Step::Quantify, "salmon")
            .arg("quant")
            .for_run("SRR7");

        let err = execute(&mut runner, invocation).unwrap_err();
        assert_eq!(
            err.to_string(),
            "quantification failed for `SRR7` with exit code 3: `salmon quant`"
        );
    }

    #[test]
    fn test_spawn_failure() {
        let mut runner = |_: &Invocation| -> io::Result<Status> {
            Err(io::Error::new(io::ErrorKind::NotFound, "not found"))
        };
        let invocation = Invocation::new(Step::GenerateEvents, "suppa.py");

        let err = execute(&mut runner, invocation).unwrap_err();
        assert!(matches!(err, Error::Spawn(..)));
        assert_eq!(
            err.to_string(),
            "event generation failed: could not start `suppa.py`: not found"
        );
    }

    #[test]
    fn test_success() {
        let mut calls = Vec::new();
        let mut runner = |invocation: &Invocation| -> io::Result<Status> {
            calls.push(invocation.step());
            Ok(Status::success())
        };

        execute(&mut runner, Invocation::new(Step::BuildIndex, "salmon")).unwrap();
        assert_eq!(calls, vec![Step::BuildIndex]);
    }
}
