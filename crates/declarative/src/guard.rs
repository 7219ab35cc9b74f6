//! Guard expressions - decide whether a descriptor's action runs
//!
//! A guard is a predicate over observable host state. Evaluation is a pure
//! function of [`SystemProbe`] answers: the same probe answers always give
//! the same decision. Probe errors count as `false`.

use crate::context::{FileKind, OsFamily, SystemProbe};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Predicate over host state, composable with AND/OR/NOT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardExpr {
    Const(bool),
    /// Anything (file, directory, link) exists at the path
    PathExists(PathBuf),
    IsDirectory(PathBuf),
    IsSymlink(PathBuf),
    /// The shell command exits with status 0
    CommandSucceeds(String),
    /// The shell command exits with the given status
    ExitCode { command: String, code: i32 },
    OsFamily(OsFamily),
    And(Vec<GuardExpr>),
    Or(Vec<GuardExpr>),
    Not(Box<GuardExpr>),
}

impl GuardExpr {
    pub fn path_exists(path: impl AsRef<Path>) -> Self {
        Self::PathExists(path.as_ref().to_path_buf())
    }

    pub fn is_directory(path: impl AsRef<Path>) -> Self {
        Self::IsDirectory(path.as_ref().to_path_buf())
    }

    pub fn is_symlink(path: impl AsRef<Path>) -> Self {
        Self::IsSymlink(path.as_ref().to_path_buf())
    }

    pub fn command(command: impl Into<String>) -> Self {
        Self::CommandSucceeds(command.into())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(guard: GuardExpr) -> Self {
        Self::Not(Box::new(guard))
    }

    /// Conjoin, flattening nested ANDs
    pub fn and(self, other: GuardExpr) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Disjoin, flattening nested ORs
    pub fn or(self, other: GuardExpr) -> Self {
        match self {
            Self::Or(mut parts) => {
                parts.push(other);
                Self::Or(parts)
            }
            first => Self::Or(vec![first, other]),
        }
    }
}

impl fmt::Display for GuardExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, parts: &[GuardExpr], op: &str| {
            write!(f, "(")?;
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                write!(f, "{part}")?;
            }
            write!(f, ")")
        };
        match self {
            Self::Const(value) => write!(f, "{value}"),
            Self::PathExists(path) => write!(f, "exists({})", path.display()),
            Self::IsDirectory(path) => write!(f, "is_dir({})", path.display()),
            Self::IsSymlink(path) => write!(f, "is_link({})", path.display()),
            Self::CommandSucceeds(command) => write!(f, "`{command}`"),
            Self::ExitCode { command, code } => write!(f, "`{command}` == {code}"),
            Self::OsFamily(family) => write!(f, "os_family == {family}"),
            Self::And(parts) => join(f, parts, "and"),
            Self::Or(parts) => join(f, parts, "or"),
            Self::Not(inner) => write!(f, "not {inner}"),
        }
    }
}

/// Evaluate a guard against the host state reported by `probe`
///
/// `And`/`Or` short-circuit left to right, so a false `only_if` placed
/// before a `not_if` keeps the `not_if` command from running at all.
pub fn evaluate(guard: &GuardExpr, probe: &dyn SystemProbe) -> bool {
    evaluate_within(guard, probe, None)
}

/// [`evaluate`], with each guard command limited to `timeout`
///
/// A command that times out counts as failed.
pub fn evaluate_within(guard: &GuardExpr, probe: &dyn SystemProbe, timeout: Option<Duration>) -> bool {
    let exit_code = |command: &str| {
        probe.exit_code(command, timeout).inspect_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                log::warn!("guard {e}");
            }
        })
    };
    let result = match guard {
        GuardExpr::Const(value) => *value,
        GuardExpr::PathExists(path) => probe.metadata(path).is_ok(),
        GuardExpr::IsDirectory(path) => probe
            .metadata(path)
            .map(|m| m.kind == FileKind::Directory)
            .unwrap_or(false),
        GuardExpr::IsSymlink(path) => probe
            .metadata(path)
            .map(|m| m.kind == FileKind::Symlink)
            .unwrap_or(false),
        GuardExpr::CommandSucceeds(command) => matches!(exit_code(command.as_str()), Ok(0)),
        GuardExpr::ExitCode { command, code } => {
            exit_code(command.as_str()).is_ok_and(|actual| actual == *code)
        }
        GuardExpr::OsFamily(family) => probe.os_family() == *family,
        GuardExpr::And(parts) => parts.iter().all(|p| evaluate_within(p, probe, timeout)),
        GuardExpr::Or(parts) => parts.iter().any(|p| evaluate_within(p, probe, timeout)),
        GuardExpr::Not(inner) => !evaluate_within(inner, probe, timeout),
    };
    log::trace!("guard {guard} -> {result}");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FileMeta;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io;

    /// Probe answering from fixed tables and recording commands it ran
    #[derive(Default)]
    struct FakeProbe {
        paths: HashMap<PathBuf, FileKind>,
        exit_codes: HashMap<String, i32>,
        ran: RefCell<Vec<String>>,
    }

    impl SystemProbe for FakeProbe {
        fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
            self.paths
                .get(path)
                .map(|kind| FileMeta {
                    kind: *kind,
                    mode: 0o755,
                    uid: 0,
                    gid: 0,
                    len: 0,
                })
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn read(&self, _path: &Path) -> io::Result<Vec<u8>> {
            Err(io::Error::from(io::ErrorKind::NotFound))
        }

        fn read_link(&self, _path: &Path) -> io::Result<PathBuf> {
            Err(io::Error::from(io::ErrorKind::NotFound))
        }

        fn exit_code(&self, command: &str, _timeout: Option<Duration>) -> io::Result<i32> {
            self.ran.borrow_mut().push(command.to_string());
            self.exit_codes
                .get(command)
                .copied()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn os_family(&self) -> OsFamily {
            OsFamily::Redhat
        }

        fn user_id(&self, _name: &str) -> Option<u32> {
            None
        }

        fn group_id(&self, _name: &str) -> Option<u32> {
            None
        }
    }

    fn probe() -> FakeProbe {
        let mut probe = FakeProbe::default();
        probe.paths.insert("/etc".into(), FileKind::Directory);
        probe.paths.insert("/etc/hosts".into(), FileKind::File);
        probe.paths.insert("/usr/bin/ranger-kms".into(), FileKind::Symlink);
        probe.exit_codes.insert("true".into(), 0);
        probe.exit_codes.insert("false".into(), 1);
        probe
    }

    #[test]
    fn test_path_guards() {
        let p = probe();
        assert!(evaluate(&GuardExpr::path_exists("/etc/hosts"), &p));
        assert!(!evaluate(&GuardExpr::path_exists("/etc/missing"), &p));
        assert!(evaluate(&GuardExpr::is_directory("/etc"), &p));
        assert!(!evaluate(&GuardExpr::is_directory("/etc/hosts"), &p));
        assert!(evaluate(&GuardExpr::is_symlink("/usr/bin/ranger-kms"), &p));
    }

    #[test]
    fn test_command_guards() {
        let p = probe();
        assert!(evaluate(&GuardExpr::command("true"), &p));
        assert!(!evaluate(&GuardExpr::command("false"), &p));
        // probe error counts as false
        assert!(!evaluate(&GuardExpr::command("no-such-binary"), &p));
        assert!(evaluate(
            &GuardExpr::ExitCode {
                command: "false".into(),
                code: 1
            },
            &p
        ));
    }

    #[test]
    fn test_os_family_guard() {
        let p = probe();
        assert!(evaluate(&GuardExpr::OsFamily(OsFamily::Redhat), &p));
        assert!(!evaluate(&GuardExpr::OsFamily(OsFamily::Windows), &p));
    }

    #[test]
    fn test_only_if_false_never_applies() {
        let p = probe();
        for not_if in [true, false] {
            let guard = GuardExpr::Const(false).and(GuardExpr::not(GuardExpr::Const(not_if)));
            assert!(!evaluate(&guard, &p));
        }
    }

    #[test]
    fn test_not_if_true_skips_even_when_only_if_holds() {
        let p = probe();
        let guard = GuardExpr::command("true").and(GuardExpr::not(GuardExpr::command("true")));
        assert!(!evaluate(&guard, &p));
    }

    #[test]
    fn test_short_circuit_skips_later_commands() {
        let p = probe();
        let guard = GuardExpr::command("false").and(GuardExpr::not(GuardExpr::command("true")));
        assert!(!evaluate(&guard, &p));
        assert_eq!(*p.ran.borrow(), vec!["false".to_string()]);

        let p = probe();
        let guard = GuardExpr::command("true").or(GuardExpr::command("false"));
        assert!(evaluate(&guard, &p));
        assert_eq!(p.ran.borrow().len(), 1);
    }

    #[test]
    fn test_and_flattens() {
        let guard = GuardExpr::Const(true)
            .and(GuardExpr::Const(true))
            .and(GuardExpr::Const(false));
        assert!(matches!(&guard, GuardExpr::And(parts) if parts.len() == 3));
    }

    #[test]
    fn test_display() {
        let guard = GuardExpr::path_exists("/a").and(GuardExpr::not(GuardExpr::command("ls /b")));
        assert_eq!(guard.to_string(), "(exists(/a) and not `ls /b`)");
    }
}
