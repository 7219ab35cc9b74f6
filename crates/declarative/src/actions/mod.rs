//! Action executor - applies one descriptor to the host
//!
//! Each resource kind has its own module. [`apply`] dispatches on the
//! descriptor's spec and wraps failures into [`Error::ActionFailed`];
//! [`current_state`] and [`desired_state`] back the preview diff.
//!
//! Guards are not evaluated here. The driver decides whether an action runs.

mod command;
mod directory;
mod file;
mod service;
mod symlink;

pub use service::probe_status;

use crate::context::{ApplyContext, FileKind, FileMeta, Host, SystemProbe};
use crate::error::{Error, FailureCause, Result};
use crate::types::{
    ApplyResult, CommandSpec, ContentSource, Ensure, FileAttrs, ResourceDescriptor, ResourceSpec,
    ResourceState, ServiceAction, ServiceStatus,
};
use crate::template;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

pub(crate) type CauseResult<T> = std::result::Result<T, FailureCause>;

/// Converge one resource to its desired state
pub fn apply(descriptor: &ResourceDescriptor, ctx: &ApplyContext) -> Result<ApplyResult> {
    let fail = |cause| Error::action(descriptor.id(), cause);
    let elevated = descriptor.is_elevated();

    match &descriptor.spec {
        ResourceSpec::Directory {
            attrs,
            recursive,
            ensure,
            cd_access,
            recursive_ownership,
        } => directory::apply(
            descriptor.path(),
            &directory::Options {
                attrs,
                recursive: *recursive,
                ensure: *ensure,
                cd_access: *cd_access,
                recursive_ownership: *recursive_ownership,
                elevated,
            },
            ctx,
        )
        .map_err(fail),
        ResourceSpec::File {
            attrs,
            content,
            ensure,
        } => file::apply(&descriptor.id(), descriptor.path(), attrs, content.as_ref(), *ensure, elevated, ctx),
        ResourceSpec::Symlink { to, force, ensure } => {
            symlink::apply(descriptor.path(), to, *force, *ensure, ctx).map_err(fail)
        }
        ResourceSpec::Command(spec) => command::apply(spec, elevated, ctx).map_err(fail),
        ResourceSpec::Service(spec) => service::apply(spec, elevated, ctx).map_err(fail),
    }
}

/// Observed state of a resource, as far as it can be known without acting
pub fn current_state(descriptor: &ResourceDescriptor, host: Host<'_>) -> ResourceState {
    let probe = host.probe;
    match &descriptor.spec {
        ResourceSpec::Directory { attrs, .. } => {
            path_state(probe, descriptor.path(), FileKind::Directory, attrs)
        }
        ResourceSpec::File { attrs, .. } => {
            path_state(probe, descriptor.path(), FileKind::File, attrs)
        }
        ResourceSpec::Symlink { .. } => match probe.read_link(descriptor.path()) {
            Ok(to) => ResourceState::Present {
                details: Some(format!("-> {}", to.display())),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => ResourceState::Absent,
            Err(_) if probe.exists(descriptor.path()) => ResourceState::Present {
                details: Some("not a symlink".to_string()),
            },
            Err(_) => ResourceState::Unknown,
        },
        // Commands are not observable; every pass runs them
        ResourceSpec::Command(_) => ResourceState::Absent,
        ResourceSpec::Service(spec) => {
            match service::probe_status(probe, host.processes, &spec.pid_file) {
                ServiceStatus::Running { pid } => ResourceState::Present {
                    details: Some(format!("running (pid {pid})")),
                },
                ServiceStatus::Stopped => ResourceState::Absent,
                ServiceStatus::Unknown { .. } => ResourceState::Unknown,
            }
        }
    }
}

/// State the resource is converged towards
pub fn desired_state(descriptor: &ResourceDescriptor) -> ResourceState {
    let present = |details: String| ResourceState::Present {
        details: (!details.is_empty()).then_some(details),
    };
    match &descriptor.spec {
        ResourceSpec::Directory {
            ensure: Ensure::Absent,
            ..
        }
        | ResourceSpec::File {
            ensure: Ensure::Absent,
            ..
        }
        | ResourceSpec::Symlink {
            ensure: Ensure::Absent,
            ..
        } => ResourceState::Absent,
        ResourceSpec::Directory { attrs, .. } | ResourceSpec::File { attrs, .. } => {
            present(attrs.summary())
        }
        ResourceSpec::Symlink { to, .. } => present(format!("-> {}", to.display())),
        ResourceSpec::Command(_) => ResourceState::Present { details: None },
        ResourceSpec::Service(spec) => match spec.action {
            ServiceAction::Stop => ResourceState::Absent,
            _ => ResourceState::Present {
                details: Some("running".to_string()),
            },
        },
    }
}

/// Present state of a path, reporting the desired attributes only when they
/// already match so that drift shows up as a difference
fn path_state(probe: &dyn SystemProbe, path: &Path, want: FileKind, attrs: &FileAttrs) -> ResourceState {
    match probe.metadata(path) {
        // Attributes of a link's target are not visible through lstat
        Ok(meta) if meta.kind == FileKind::Symlink => ResourceState::Present {
            details: Some("via symlink".to_string()),
        },
        Ok(meta) if meta.kind == want => {
            let ids = resolve_ids(probe, attrs).unwrap_or_default();
            if attrs_drift(&meta, attrs, ids) {
                ResourceState::Modified {
                    from: describe_meta(&meta),
                    to: attrs.summary(),
                }
            } else {
                let summary = attrs.summary();
                ResourceState::Present {
                    details: (!summary.is_empty()).then_some(summary),
                }
            }
        }
        Ok(meta) => ResourceState::Modified {
            from: format!("{:?}", meta.kind).to_lowercase(),
            to: format!("{want:?}").to_lowercase(),
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => ResourceState::Absent,
        Err(_) => ResourceState::Unknown,
    }
}

fn describe_meta(meta: &FileMeta) -> String {
    format!("{:04o} {}:{}", meta.mode, meta.uid, meta.gid)
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Numeric owner and group of a resource's attributes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Ids {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

pub(crate) fn resolve_ids(probe: &dyn SystemProbe, attrs: &FileAttrs) -> CauseResult<Ids> {
    let uid = match &attrs.owner {
        Some(owner) => Some(
            probe
                .user_id(owner)
                .ok_or_else(|| FailureCause::UnknownUser(owner.clone()))?,
        ),
        None => None,
    };
    let gid = match &attrs.group {
        Some(group) => Some(
            probe
                .group_id(group)
                .ok_or_else(|| FailureCause::UnknownGroup(group.clone()))?,
        ),
        None => None,
    };
    Ok(Ids { uid, gid })
}

fn attrs_drift(meta: &FileMeta, attrs: &FileAttrs, ids: Ids) -> bool {
    attrs.mode.is_some_and(|m| m != meta.mode)
        || ids.uid.is_some_and(|u| u != meta.uid)
        || ids.gid.is_some_and(|g| g != meta.gid)
}

/// Bring mode and ownership of an existing path in line; returns whether
/// anything changed
pub(crate) fn converge_attrs(
    ctx: &ApplyContext,
    path: &Path,
    attrs: &FileAttrs,
    ids: Ids,
    elevated: bool,
) -> CauseResult<bool> {
    let meta = ctx
        .host
        .probe
        .metadata(path)
        .map_err(|e| FailureCause::io(path, e))?;
    let mut changed = false;

    if let Some(mode) = attrs.mode
        && mode != meta.mode
    {
        log::debug!("{}: mode {:04o} -> {mode:04o}", path.display(), meta.mode);
        set_mode(path, mode)?;
        changed = true;
    }

    let owner_differs = ids.uid.is_some_and(|u| u != meta.uid);
    let group_differs = ids.gid.is_some_and(|g| g != meta.gid);
    if owner_differs || group_differs {
        log::debug!("{}: owner {}:{} -> {}", path.display(), meta.uid, meta.gid, attrs.summary());
        set_owner(ctx, path, attrs, ids, elevated)?;
        changed = true;
    }

    Ok(changed)
}

#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> CauseResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| FailureCause::io(path, e))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> CauseResult<()> {
    Ok(())
}

/// Change ownership; elevated resources go through the sudo provider
pub(crate) fn set_owner(
    ctx: &ApplyContext,
    path: &Path,
    attrs: &FileAttrs,
    ids: Ids,
    elevated: bool,
) -> CauseResult<()> {
    if elevated {
        let owner = attrs.owner.clone().unwrap_or_default();
        let owner = match &attrs.group {
            Some(group) => format!("{owner}:{group}"),
            None => owner,
        };
        let spec = CommandSpec::argv(["chown".to_string(), owner, path.display().to_string()]);
        ctx.run_checked(&spec, true)?;
        return Ok(());
    }
    chown(path, ids)
}

#[cfg(unix)]
fn chown(path: &Path, ids: Ids) -> CauseResult<()> {
    std::os::unix::fs::chown(path, ids.uid, ids.gid).map_err(|e| FailureCause::io(path, e))
}

#[cfg(not(unix))]
fn chown(_path: &Path, _ids: Ids) -> CauseResult<()> {
    Ok(())
}

/// Produce the bytes of a content source
///
/// Called only when a file action actually needs the content.
pub(crate) fn resolve_content(
    resource: &str,
    source: &ContentSource,
    ctx: &ApplyContext,
) -> Result<Vec<u8>> {
    match source {
        ContentSource::Inline(bytes) => Ok(bytes.clone()),
        ContentSource::Template { template, bindings } => template::render(template, bindings),
        ContentSource::Local(path) => {
            fs::read(path).map_err(|e| Error::action(resource, FailureCause::io(path, e)))
        }
        ContentSource::Remote(uri) => ctx.fetch(uri),
    }
}

/// Write `source` to `path` atomically
///
/// The content goes to a temporary file in the same directory; `finish`
/// receives the temporary path to set mode and ownership before it is renamed
/// over the target. On any error the temporary file is removed and the target
/// is left as it was.
pub(crate) fn atomic_write<R: Read>(
    path: &Path,
    source: &mut R,
    finish: impl FnOnce(&Path) -> CauseResult<()>,
) -> CauseResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| FailureCause::io(dir, e))?;

    io::copy(source, &mut tmp).map_err(|e| FailureCause::io(path, e))?;
    tmp.flush().map_err(|e| FailureCause::io(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| FailureCause::io(path, e))?;

    finish(tmp.path())?;

    tmp.persist(path)
        .map_err(|e| FailureCause::io(path, e.error))?;
    Ok(())
}

/// Remove a file or link, treating "already gone" as success
pub(crate) fn remove_file(path: &Path) -> CauseResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FailureCause::io(path, e)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by the per-kind action tests

    use crate::context::ApplyContext;
    use crate::host::LocalHost;

    pub fn ctx(host: &LocalHost) -> ApplyContext<'_> {
        ApplyContext::new(host.host(), false)
    }

    #[cfg(unix)]
    pub fn current_user() -> String {
        // SAFETY: geteuid has no preconditions
        unsafe { libc::geteuid() }.to_string()
    }

    #[cfg(unix)]
    pub fn current_group() -> String {
        // SAFETY: getegid has no preconditions
        unsafe { libc::getegid() }.to_string()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LocalHost;
    use std::io::Cursor;

    /// Reader that yields some bytes and then fails
    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::other("connection reset"));
            }
            self.served = true;
            let chunk = b"partial new content";
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core-site.xml");
        fs::write(&path, b"old").unwrap();

        atomic_write(&path, &mut Cursor::new(b"new".to_vec()), |_| Ok(())).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert_eq!(entries(dir.path()), vec!["core-site.xml".to_string()]);
    }

    #[test]
    fn test_atomic_write_failing_reader_keeps_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core-site.xml");
        fs::write(&path, b"old content").unwrap();

        let err = atomic_write(&path, &mut FailingReader { served: false }, |_| Ok(())).unwrap_err();

        assert!(matches!(err, FailureCause::Io { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"old content");
        assert_eq!(entries(dir.path()), vec!["core-site.xml".to_string()]);
    }

    #[test]
    fn test_atomic_write_failing_finish_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.properties");

        let err = atomic_write(&path, &mut Cursor::new(b"x".to_vec()), |_| {
            Err(FailureCause::UnknownUser("nobody-here".into()))
        })
        .unwrap_err();

        assert!(matches!(err, FailureCause::UnknownUser(_)));
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_resolve_ids_unknown_user() {
        let host = LocalHost::new();
        let attrs = FileAttrs {
            owner: Some("no-such-user-for-tests".into()),
            ..Default::default()
        };
        let err = resolve_ids(host.host().probe, &attrs).unwrap_err();
        assert!(matches!(err, FailureCause::UnknownUser(_)));
    }

    #[test]
    fn test_desired_state() {
        let dir = ResourceDescriptor::directory("/var/run/svc").mode(0o751);
        assert_eq!(
            desired_state(&dir),
            ResourceState::Present {
                details: Some("0751".into())
            }
        );
        assert_eq!(
            desired_state(&ResourceDescriptor::file("/etc/x").absent()),
            ResourceState::Absent
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_current_state_reports_mode_drift() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("svc");
        fs::create_dir(&path).unwrap();
        set_mode(&path, 0o700).unwrap();

        let host = LocalHost::new();
        let desc = ResourceDescriptor::directory(&path).mode(0o751);
        assert!(matches!(
            current_state(&desc, host.host()),
            ResourceState::Modified { .. }
        ));

        set_mode(&path, 0o751).unwrap();
        assert_eq!(current_state(&desc, host.host()), desired_state(&desc));

        let missing = ResourceDescriptor::directory(tmp.path().join("missing"));
        assert_eq!(current_state(&missing, host.host()), ResourceState::Absent);
    }
}
