//! Subprocess execution utilities.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};

use serde::{Deserialize, Serialize};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set several environment variables.
    pub fn envs<'a>(mut self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(&self.env);
        cmd
    }

    /// Execute the command, capturing stdout and stderr.
    pub fn exec(&self) -> io::Result<Output> {
        self.build_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
    }

    /// Execute the command with stdout and stderr written to `log`.
    ///
    /// The log file is truncated first; the command line is written as its
    /// first line.
    pub fn exec_logged(&self, log: &Path) -> io::Result<ExitStatus> {
        use std::io::Write;

        if let Some(parent) = log.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(log)?;
        writeln!(file, "$ {}", self.display_command())?;
        file.flush()?;

        let stderr = file.try_clone()?;
        self.build_command()
            .stdin(Stdio::null())
            .stdout(Stdio::from(file))
            .stderr(Stdio::from(stderr))
            .status()
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Error rendering a command template.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("command template is empty")]
    Empty,

    #[error("unknown placeholder `{{{0}}}` in command template")]
    UnknownPlaceholder(String),
}

/// An argv template with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(Vec<String>);

impl CommandTemplate {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandTemplate(argv.into_iter().map(Into::into).collect())
    }

    pub fn argv(&self) -> &[String] {
        &self.0
    }

    /// Substitute placeholders and return a process builder.
    ///
    /// Every `{name}` in every argument must have a value in `vars`.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<ProcessBuilder, TemplateError> {
        let mut rendered = Vec::with_capacity(self.0.len());
        for arg in &self.0 {
            rendered.push(substitute(arg, vars)?);
        }

        let mut argv = rendered.into_iter();
        let program = argv.next().ok_or(TemplateError::Empty)?;
        Ok(ProcessBuilder::new(program).args(argv))
    }
}

fn substitute(arg: &str, vars: &[(&str, &str)]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                let value = vars
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| TemplateError::UnknownPlaceholder(key.to_string()))?;
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Resolve the Python interpreter, falling back to the bare name.
pub fn find_python(name: &str) -> String {
    match find_executable(name) {
        Some(path) => path.display().to_string(),
        None => {
            tracing::warn!("python interpreter `{}` not found in PATH", name);
            name.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_builder() {
        let output = ProcessBuilder::new("echo").arg("hello").exec().unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("hello"));
    }

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("python3").args(["-m", "pip", "wheel", "six"]);
        assert_eq!(pb.display_command(), "python3 -m pip wheel six");
    }

    #[test]
    fn test_exec_logged_captures_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log = tmp.path().join("logs/build-demo.log");

        let status = ProcessBuilder::new("echo")
            .arg("from-the-build")
            .exec_logged(&log)
            .unwrap();
        assert!(status.success());

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.starts_with("$ echo from-the-build"));
        assert!(contents.contains("\nfrom-the-build"));
    }

    #[test]
    fn test_template_render() {
        let template = CommandTemplate::new(["{python}", "-m", "pip", "wheel", "-w", "{store}", "{specifier}"]);
        let pb = template
            .render(&[("python", "py"), ("store", "/out"), ("specifier", "six>=1")])
            .unwrap();
        assert_eq!(pb.display_command(), "py -m pip wheel -w /out six>=1");
    }

    #[test]
    fn test_template_embedded_and_unknown_placeholders() {
        let template = CommandTemplate::new(["tool", "--dest={store}/x"]);
        let pb = template.render(&[("store", "/out")]).unwrap();
        assert_eq!(pb.get_args(), &["--dest=/out/x".to_string()]);

        let bad = CommandTemplate::new(["tool", "{nope}"]);
        assert_eq!(
            bad.render(&[]).unwrap_err(),
            TemplateError::UnknownPlaceholder("nope".to_string())
        );
        assert_eq!(
            CommandTemplate::new(Vec::<String>::new()).render(&[]).unwrap_err(),
            TemplateError::Empty
        );
    }
}
