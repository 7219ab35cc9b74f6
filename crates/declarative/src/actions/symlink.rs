//! Symlink action

use super::{CauseResult, remove_file};
use crate::context::{ApplyContext, FileKind};
use crate::error::FailureCause;
use crate::types::{ApplyResult, Ensure};
use std::fs;
use std::io;
use std::path::Path;

pub(super) fn apply(
    path: &Path,
    to: &Path,
    force: bool,
    ensure: Ensure,
    ctx: &ApplyContext,
) -> CauseResult<ApplyResult> {
    let probe = ctx.host.probe;
    let existing = match probe.metadata(path) {
        Ok(meta) => Some(meta.kind),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(FailureCause::io(path, e)),
    };

    if ensure == Ensure::Absent {
        return match existing {
            None => Ok(ApplyResult::NoChange),
            Some(FileKind::Symlink) => {
                remove_file(path)?;
                log::info!("removed link {}", path.display());
                Ok(ApplyResult::Removed)
            }
            Some(_) => Err(FailureCause::Conflict {
                message: format!("{} is not a symlink", path.display()),
            }),
        };
    }

    match existing {
        None => {
            create_link(to, path)?;
            log::info!("linked {} -> {}", path.display(), to.display());
            Ok(ApplyResult::Created)
        }
        Some(FileKind::Symlink) => {
            let current = probe.read_link(path).map_err(|e| FailureCause::io(path, e))?;
            if current == to {
                return Ok(ApplyResult::NoChange);
            }
            log::info!(
                "relinking {}: {} -> {}",
                path.display(),
                current.display(),
                to.display()
            );
            remove_file(path)?;
            create_link(to, path)?;
            Ok(ApplyResult::Modified)
        }
        Some(kind) if force => {
            log::warn!("replacing {} with a link to {}", path.display(), to.display());
            let removed = if kind == FileKind::Directory {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            removed.map_err(|e| FailureCause::io(path, e))?;
            create_link(to, path)?;
            Ok(ApplyResult::Modified)
        }
        Some(_) => Err(FailureCause::Conflict {
            message: format!(
                "{} exists and is not a symlink; use force to replace it",
                path.display()
            ),
        }),
    }
}

#[cfg(unix)]
fn create_link(to: &Path, path: &Path) -> CauseResult<()> {
    std::os::unix::fs::symlink(to, path).map_err(|e| FailureCause::io(path, e))
}

#[cfg(not(unix))]
fn create_link(_to: &Path, path: &Path) -> CauseResult<()> {
    Err(FailureCause::io(
        path,
        io::Error::new(io::ErrorKind::Unsupported, "symlinks are not supported"),
    ))
}
