//! Interactive vault shell.
//!
//! Each command returns `Result<Flow, ShellError>`; the loop prints errors and
//! keeps going, so only `exit`, `quit` or end of input end the session.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::output;
use strongroom_common::{Error, VaultPath};
use strongroom_vault::VaultSession;

const HELP_TEXT: &str = "
Commands:
  ls, dir                    List files in current directory
  cd <path>                  Change directory
  pwd                        Print current directory
  mkdir <name>               Create directory
  rm <path>                  Delete file or directory (recursive)
  cat <file>                 Show file contents
  upload <local-file>        Upload file to current directory
  download <file> <out>      Download file from vault
  help                       Show this help
  exit, quit                 Exit interactive mode
";

/// What the loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Failure of a single shell command.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Missing or malformed arguments.
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Vault(#[from] Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

type CommandResult = std::result::Result<Flow, ShellError>;

/// Shell state: the open session and the current directory.
pub struct Shell {
    session: VaultSession,
    current: VaultPath,
}

impl Shell {
    /// Start at the vault root.
    pub fn new(session: VaultSession) -> Self {
        Self {
            session,
            current: VaultPath::root(),
        }
    }

    /// Current directory.
    pub fn current(&self) -> &VaultPath {
        &self.current
    }

    /// Read commands until `exit`, `quit` or end of input, then release the
    /// vault.
    ///
    /// Lines are decoded lossily, so a line that is not valid UTF-8 runs as a
    /// command with replacement characters instead of ending the session.
    pub async fn run<R, W>(mut self, mut input: R, out: &mut W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        writeln!(out, "\n=== Interactive Mode ===")?;
        writeln!(out, "Type 'help' for commands, 'exit' to quit\n")?;

        let mut buf = Vec::new();
        loop {
            write!(out, "vault:{}> ", self.current)?;
            out.flush()?;

            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                writeln!(out)?;
                break;
            }
            let line = String::from_utf8_lossy(&buf);

            match self.execute(&line, out).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => break,
                Err(e) => writeln!(out, "Error: {}", e)?,
            }
        }

        writeln!(out, "Goodbye!")?;
        self.session.close();
        Ok(())
    }

    /// Run one input line.
    pub async fn execute(&mut self, line: &str, out: &mut impl Write) -> CommandResult {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        let command = command.to_lowercase();
        debug!(command = %command, "Shell command");

        match command.as_str() {
            "help" => {
                writeln!(out, "{}", HELP_TEXT)?;
            }
            "exit" | "quit" => return Ok(Flow::Exit),
            "ls" | "dir" => {
                let entries = self.session.list(&self.current)?;
                output::print_compact(out, &entries)?;
            }
            "pwd" => writeln!(out, "{}", self.current)?,
            "cd" => self.change_dir(arg, out)?,
            "mkdir" => {
                let target = self.resolve(arg, "mkdir <name>")?;
                self.session.mkdir(&target).await?;
                writeln!(out, "Created: {}", target)?;
            }
            "rm" => {
                let target = self.resolve(arg, "rm <path>")?;
                self.session.delete(&target, true).await?;
                writeln!(out, "Deleted: {}", target)?;
            }
            "cat" => {
                let target = self.resolve(arg, "cat <file>")?;
                let content = self.session.read_text_file(&target).await?;
                writeln!(out, "{}", content)?;
            }
            "upload" => {
                if arg.is_empty() {
                    return Err(ShellError::Usage("upload <local-file>"));
                }
                let target = self.session.upload_local(Path::new(arg), &self.current).await?;
                writeln!(out, "Uploaded: {}", target)?;
            }
            "download" => {
                const USAGE: &str = "download <vault-file> <local-path>";
                let (source, local) = arg
                    .split_once(char::is_whitespace)
                    .map(|(source, local)| (source, local.trim()))
                    .filter(|(_, local)| !local.is_empty())
                    .ok_or(ShellError::Usage(USAGE))?;

                let source = self.current.resolve(source);
                let local = PathBuf::from(local);
                let size = self.session.download(&source, &local).await?;
                writeln!(
                    out,
                    "Downloaded to: {} ({})",
                    local.display(),
                    output::format_size(size)
                )?;
            }
            other => {
                writeln!(
                    out,
                    "Unknown command: {}. Type 'help' for commands.",
                    other
                )?;
            }
        }

        Ok(Flow::Continue)
    }

    fn resolve(&self, arg: &str, usage: &'static str) -> Result<VaultPath, ShellError> {
        if arg.is_empty() {
            return Err(ShellError::Usage(usage));
        }
        Ok(self.current.resolve(arg))
    }

    fn change_dir(&mut self, arg: &str, out: &mut impl Write) -> io::Result<()> {
        if arg.is_empty() || arg == "/" {
            self.current = VaultPath::root();
            return Ok(());
        }

        let target = self.current.resolve(arg);
        if !self.session.exists(&target) {
            writeln!(out, "Directory not found: {}", target)
        } else if !self.session.is_directory(&target) {
            writeln!(out, "Not a directory: {}", target)
        } else {
            self.current = target;
            Ok(())
        }
    }
}
