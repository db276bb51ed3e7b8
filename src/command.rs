//! Command line handling
//!
//! The first token of a command string names the program and is resolved through
//! the executable search path. Remaining tokens are passed through as arguments.
//! Double quotes group whitespace into a single token.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::{ConPtyError, Result};

/// Extensions tried when the program has none (Windows only)
#[cfg(windows)]
const DEFAULT_PATHEXT: &str = ".COM;.EXE;.BAT;.CMD";

/// A command with its program resolved to an executable on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandLine {
    /// Parse `input` and resolve its program against `PATH`
    pub fn resolve(input: &str) -> Result<Self> {
        let search_path = env::var_os("PATH");
        Self::resolve_in(input, search_path.as_deref(), &executable_extensions())
    }

    /// Parse `input` and resolve its program against an explicit search path
    pub fn resolve_in(
        input: &str,
        search_path: Option<&OsStr>,
        extensions: &[String],
    ) -> Result<Self> {
        let mut tokens = split(input)?.into_iter();
        let name = tokens
            .next()
            .ok_or_else(|| ConPtyError::InvalidArgument("command line is empty".to_string()))?;

        let program = lookup(&name, search_path, extensions).ok_or_else(|| {
            ConPtyError::InvalidArgument(format!("executable not found: {}", name))
        })?;

        Ok(Self {
            program,
            args: tokens.collect(),
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Render as a single command line string, quoted the way the
    /// Microsoft C runtime splits it back into `argv`
    pub fn to_windows_string(&self) -> String {
        let mut out = String::new();
        quote_into(&mut out, &self.program.to_string_lossy());
        for arg in &self.args {
            out.push(' ');
            quote_into(&mut out, arg);
        }
        out
    }
}

/// Split a command string on whitespace, honoring double quotes
pub fn split(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_quotes {
        return Err(ConPtyError::InvalidArgument(format!(
            "unterminated quote in command line: {}",
            input
        )));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn lookup(name: &str, search_path: Option<&OsStr>, extensions: &[String]) -> Option<PathBuf> {
    let has_separator = name.contains('/') || name.contains('\\');
    if has_separator || Path::new(name).is_absolute() {
        return candidates(Path::new(name), extensions).find(|p| p.is_file());
    }

    let search_path = search_path?;
    env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .find_map(|dir| candidates(&dir.join(name), extensions).find(|p| p.is_file()))
}

fn candidates<'a>(base: &'a Path, extensions: &'a [String]) -> impl Iterator<Item = PathBuf> + 'a {
    let as_is = (extensions.is_empty() || base.extension().is_some()).then(|| base.to_path_buf());
    let with_ext = extensions.iter().map(move |ext| {
        let mut s = base.as_os_str().to_os_string();
        s.push(ext);
        PathBuf::from(s)
    });
    as_is.into_iter().chain(with_ext)
}

#[cfg(windows)]
fn executable_extensions() -> Vec<String> {
    let pathext = env::var("PATHEXT").unwrap_or_else(|_| DEFAULT_PATHEXT.to_string());
    pathext
        .split(';')
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
        .collect()
}

#[cfg(not(windows))]
fn executable_extensions() -> Vec<String> {
    Vec::new()
}

fn quote_into(out: &mut String, arg: &str) {
    let needs_quotes = arg.is_empty() || arg.contains(|c: char| c == ' ' || c == '\t' || c == '"');
    if !needs_quotes {
        out.push_str(arg);
        return;
    }

    out.push('"');
    let mut backslashes = 0;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                out.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            }
            c => {
                out.extend(std::iter::repeat('\\').take(backslashes));
                out.push(c);
                backslashes = 0;
            }
        }
    }
    // Backslashes before the closing quote must be doubled
    out.extend(std::iter::repeat('\\').take(backslashes * 2));
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn quoted(arg: &str) -> String {
        let mut out = String::new();
        quote_into(&mut out, arg);
        out
    }

    #[test]
    fn test_split_plain() {
        assert_eq!(
            split("cmd.exe /c echo HELLO").unwrap(),
            vec!["cmd.exe", "/c", "echo", "HELLO"]
        );
        assert_eq!(split("  powershell.exe   -NoProfile ").unwrap(), vec!["powershell.exe", "-NoProfile"]);
    }

    #[test]
    fn test_split_quotes() {
        assert_eq!(
            split(r#""C:\Program Files\Git\bin\bash.exe" -c "echo hi""#).unwrap(),
            vec![r"C:\Program Files\Git\bin\bash.exe", "-c", "echo hi"]
        );
        assert_eq!(split(r#"a "" b"#).unwrap(), vec!["a", "", "b"]);
    }

    #[test]
    fn test_split_unterminated_quote() {
        assert!(matches!(split(r#"cmd "oops"#), Err(ConPtyError::InvalidArgument(_))));
    }

    #[test]
    fn test_split_empty() {
        assert!(split("   ").unwrap().is_empty());
    }

    #[test]
    fn test_quote_rules() {
        assert_eq!(quoted("plain"), "plain");
        assert_eq!(quoted(""), "\"\"");
        assert_eq!(quoted("two words"), "\"two words\"");
        assert_eq!(quoted(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(quoted(r"C:\dir with space\"), r#""C:\dir with space\\""#);
    }

    #[test]
    fn test_resolve_in_search_path() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("tool");
        fs::write(&exe, b"").unwrap();

        let cmd = CommandLine::resolve_in("tool --flag value", Some(dir.path().as_os_str()), &[]).unwrap();
        assert_eq!(cmd.program(), exe.as_path());
        assert_eq!(cmd.args(), &["--flag".to_string(), "value".to_string()]);
    }

    #[test]
    fn test_resolve_appends_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("shell.exe");
        fs::write(&exe, b"").unwrap();
        let exts = vec![".com".to_string(), ".exe".to_string()];

        let cmd = CommandLine::resolve_in("shell", Some(dir.path().as_os_str()), &exts).unwrap();
        assert_eq!(cmd.program(), exe.as_path());

        // an explicit extension is tried as-is first
        let cmd = CommandLine::resolve_in("shell.exe", Some(dir.path().as_os_str()), &exts).unwrap();
        assert_eq!(cmd.program(), exe.as_path());
    }

    #[test]
    fn test_resolve_path_with_separator_skips_search() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("direct");
        fs::write(&exe, b"").unwrap();

        let input = format!("\"{}\" arg", exe.display());
        let cmd = CommandLine::resolve_in(&input, None, &[]).unwrap();
        assert_eq!(cmd.program(), exe.as_path());
        assert_eq!(cmd.args(), &["arg".to_string()]);
    }

    #[test]
    fn test_resolve_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let err = CommandLine::resolve_in("nope", Some(dir.path().as_os_str()), &[]).unwrap_err();
        assert!(matches!(err, ConPtyError::InvalidArgument(_)));

        let err = CommandLine::resolve_in("nope", None, &[]).unwrap_err();
        assert!(matches!(err, ConPtyError::InvalidArgument(_)));
    }

    #[test]
    fn test_resolve_empty_command() {
        let err = CommandLine::resolve_in("", None, &[]).unwrap_err();
        assert!(matches!(err, ConPtyError::InvalidArgument(_)));
    }

    #[test]
    fn test_to_windows_string() {
        let cmd = CommandLine {
            program: PathBuf::from(r"C:\Program Files\PowerShell\7\pwsh.exe"),
            args: vec!["-NoProfile".to_string(), "-Command".to_string(), "echo hi".to_string()],
        };
        assert_eq!(
            cmd.to_windows_string(),
            r#""C:\Program Files\PowerShell\7\pwsh.exe" -NoProfile -Command "echo hi""#
        );
    }
}
