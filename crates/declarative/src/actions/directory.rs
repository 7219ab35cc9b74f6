//! Directory action

use super::{CauseResult, Ids, converge_attrs, resolve_ids, set_mode, set_owner};
use crate::context::{ApplyContext, FileKind};
use crate::error::FailureCause;
use crate::types::{ApplyResult, CdAccess, Ensure, FileAttrs};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub(super) struct Options<'a> {
    pub attrs: &'a FileAttrs,
    pub recursive: bool,
    pub ensure: Ensure,
    pub cd_access: Option<CdAccess>,
    pub recursive_ownership: bool,
    pub elevated: bool,
}

pub(super) fn apply(path: &Path, opts: &Options<'_>, ctx: &ApplyContext) -> CauseResult<ApplyResult> {
    match opts.ensure {
        Ensure::Present => ensure_present(path, opts, ctx),
        Ensure::Absent => ensure_absent(path, opts.recursive, ctx),
    }
}

fn ensure_present(path: &Path, opts: &Options<'_>, ctx: &ApplyContext) -> CauseResult<ApplyResult> {
    let ids = resolve_ids(ctx.host.probe, opts.attrs)?;

    let (path, created) = match ctx.host.probe.metadata(path) {
        Ok(meta) if meta.kind == FileKind::Directory => (path.to_path_buf(), false),
        // A link to a directory stands in for it; attributes go to the target
        Ok(meta) if meta.kind == FileKind::Symlink && path.is_dir() => {
            (fs::canonicalize(path).map_err(|e| FailureCause::io(path, e))?, false)
        }
        Ok(_) => {
            return Err(FailureCause::Conflict {
                message: format!("{} exists and is not a directory", path.display()),
            });
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            create(path, opts.recursive, opts.attrs.mode)?;
            log::info!("created directory {}", path.display());
            (path.to_path_buf(), true)
        }
        Err(e) => return Err(FailureCause::io(path, e)),
    };

    let mut changed = converge_attrs(ctx, &path, opts.attrs, ids, opts.elevated)?;

    if let Some(access) = opts.cd_access {
        changed |= grant_cd_access(&path, access, opts.attrs.mode.is_none())?;
    }

    if opts.recursive_ownership && (ids.uid.is_some() || ids.gid.is_some()) {
        changed |= chown_tree(ctx, &path, opts.attrs, ids, opts.elevated)?;
    }

    Ok(if created {
        ApplyResult::Created
    } else if changed {
        ApplyResult::Modified
    } else {
        ApplyResult::NoChange
    })
}

/// Create `path`, and with `recursive` every missing ancestor, applying
/// `mode` to each directory created
fn create(path: &Path, recursive: bool, mode: Option<u32>) -> CauseResult<()> {
    let mut missing = vec![path.to_path_buf()];
    if recursive {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() || dir.exists() {
                break;
            }
            missing.push(dir.to_path_buf());
            current = dir.parent();
        }
    } else if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.is_dir()
    {
        return Err(FailureCause::io(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("parent directory {} does not exist", parent.display()),
            ),
        ));
    }

    for dir in missing.iter().rev() {
        match fs::create_dir(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => continue,
            Err(e) => return Err(FailureCause::io(dir, e)),
        }
        if let Some(mode) = mode {
            set_mode(dir, mode)?;
        }
    }
    Ok(())
}

/// Add execute bits for `access` on every ancestor up to the root
///
/// The directory itself is included only when it has no explicit mode, so
/// that the mode stays authoritative.
fn grant_cd_access(path: &Path, access: CdAccess, include_self: bool) -> CauseResult<bool> {
    let bits = access.bits();
    let mut changed = false;

    let mut dirs: Vec<PathBuf> = path.ancestors().skip(1).map(Path::to_path_buf).collect();
    if include_self {
        dirs.insert(0, path.to_path_buf());
    }

    for dir in dirs {
        if dir.as_os_str().is_empty() || dir.parent().is_none() {
            continue;
        }
        let Some(mode) = current_mode(&dir) else {
            continue;
        };
        if mode & bits != bits {
            log::debug!("{}: adding traverse bits {bits:03o}", dir.display());
            set_mode(&dir, mode | bits)?;
            changed = true;
        }
    }
    Ok(changed)
}

#[cfg(unix)]
fn current_mode(dir: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    let meta = fs::metadata(dir).ok()?;
    meta.is_dir().then(|| meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn current_mode(_dir: &Path) -> Option<u32> {
    None
}

/// Apply owner and group to everything below `root`; links are not followed
fn chown_tree(
    ctx: &ApplyContext,
    root: &Path,
    attrs: &FileAttrs,
    ids: Ids,
    elevated: bool,
) -> CauseResult<bool> {
    let mut changed = false;
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            FailureCause::io(path, e.into())
        })?;
        let meta = ctx
            .host
            .probe
            .metadata(entry.path())
            .map_err(|e| FailureCause::io(entry.path(), e))?;
        if meta.kind == FileKind::Symlink {
            continue;
        }
        let differs =
            ids.uid.is_some_and(|u| u != meta.uid) || ids.gid.is_some_and(|g| g != meta.gid);
        if differs {
            set_owner(ctx, entry.path(), attrs, ids, elevated)?;
            changed = true;
        }
    }
    Ok(changed)
}

fn ensure_absent(path: &Path, recursive: bool, ctx: &ApplyContext) -> CauseResult<ApplyResult> {
    match ctx.host.probe.metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ApplyResult::NoChange),
        Err(e) => Err(FailureCause::io(path, e)),
        Ok(meta) if meta.kind == FileKind::Directory => {
            let removed = if recursive {
                fs::remove_dir_all(path)
            } else {
                fs::remove_dir(path)
            };
            removed.map_err(|e| FailureCause::io(path, e))?;
            log::info!("removed directory {}", path.display());
            Ok(ApplyResult::Removed)
        }
        Ok(_) => Err(FailureCause::Conflict {
            message: format!("{} is not a directory", path.display()),
        }),
    }
}
