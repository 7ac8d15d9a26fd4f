//! # Node command line.
//!
//! [`NodeCommand`] describes how to launch the node: program, arguments and
//! working directory. [`NodeCommand::local`] builds the standard invocation
//! for a node shipped next to the host application:
//!
//! ```text
//! <node_dir>/<executable>[.exe] --config <config_file> -d <data_dir>     (cwd = node_dir)
//! ```

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

/// Default executable name of the node.
pub const NODE_EXECUTABLE: &str = "go-spacemesh";

/// How to launch the node process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCommand {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
}

impl NodeCommand {
    /// Launches `program` with no arguments in the current directory.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Standard invocation of the node shipped in `node_dir`.
    pub fn local(
        node_dir: impl AsRef<Path>,
        config_file: impl AsRef<Path>,
        data_dir: impl AsRef<Path>,
    ) -> Self {
        let node_dir = node_dir.as_ref();
        Self::new(node_dir.join(executable_name(NODE_EXECUTABLE)))
            .arg("--config")
            .arg(config_file.as_ref())
            .arg("-d")
            .arg(data_dir.as_ref())
            .current_dir(node_dir)
    }

    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Builds the OS command: stdin closed, stdout/stderr piped, killed if the
    /// owning handle is dropped without a confirmed exit.
    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Platform file name of an executable.
fn executable_name(base: &str) -> String {
    if cfg!(windows) {
        format!("{base}.exe")
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_invocation_layout() {
        let cmd = NodeCommand::local("/opt/app/node", "/home/u/node-config.json", "/home/u/node-data");

        assert_eq!(
            cmd.program(),
            Path::new("/opt/app/node").join(executable_name(NODE_EXECUTABLE))
        );
        assert_eq!(
            cmd.get_args(),
            &[
                OsString::from("--config"),
                OsString::from("/home/u/node-config.json"),
                OsString::from("-d"),
                OsString::from("/home/u/node-data"),
            ]
        );
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/opt/app/node")));
    }

    #[test]
    fn builder_appends_args_in_order() {
        let cmd = NodeCommand::new("sh").arg("-c").args(["exit 0"]);
        assert_eq!(cmd.get_args(), &[OsString::from("-c"), OsString::from("exit 0")]);
        assert_eq!(cmd.get_current_dir(), None);
    }
}
