//! File action

use super::{CauseResult, atomic_write, converge_attrs, remove_file, resolve_content, resolve_ids, set_mode, set_owner};
use crate::context::{ApplyContext, FileKind};
use crate::error::{Error, FailureCause, Result};
use crate::types::{ApplyResult, ContentSource, Ensure, FileAttrs};
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

/// Mode for newly created files that declare none
const DEFAULT_MODE: u32 = 0o644;

pub(super) fn apply(
    id: &str,
    path: &Path,
    attrs: &FileAttrs,
    content: Option<&ContentSource>,
    ensure: Ensure,
    elevated: bool,
    ctx: &ApplyContext,
) -> Result<ApplyResult> {
    let fail = |cause| Error::action(id, cause);
    let probe = ctx.host.probe;

    // A link stands in for its target: content and attributes go through it.
    // Removal takes the link itself.
    let target;
    let path = match probe.metadata(path) {
        Ok(meta) if meta.kind == FileKind::Symlink && ensure == Ensure::Present => {
            target = link_target(path).map_err(fail)?;
            log::debug!("{} resolves to {}", path.display(), target.display());
            target.as_path()
        }
        _ => path,
    };

    let existing = match probe.metadata(path) {
        Ok(meta) if meta.kind == FileKind::Directory || meta.kind == FileKind::Other => {
            return Err(fail(FailureCause::Conflict {
                message: format!("{} exists and is not a regular file", path.display()),
            }));
        }
        Ok(meta) => Some(meta),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(fail(FailureCause::io(path, e))),
    };

    if ensure == Ensure::Absent {
        return match existing {
            None => Ok(ApplyResult::NoChange),
            Some(_) => {
                remove_file(path).map_err(fail)?;
                log::info!("removed {}", path.display());
                Ok(ApplyResult::Removed)
            }
        };
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.is_dir()
    {
        return Err(fail(FailureCause::io(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("parent directory {} does not exist", parent.display()),
            ),
        )));
    }

    let ids = resolve_ids(probe, attrs).map_err(fail)?;

    let desired = match content {
        Some(source) => Some(resolve_content(id, source, ctx)?),
        None if existing.is_none() => Some(Vec::new()),
        None => None,
    };

    if let Some(bytes) = desired {
        let unchanged = existing.is_some()
            && probe
                .read(path)
                .is_ok_and(|current| blake3::hash(&current) == blake3::hash(&bytes));

        if !unchanged {
            let mode = attrs
                .mode
                .or(existing.map(|m| m.mode))
                .unwrap_or(DEFAULT_MODE);
            atomic_write(path, &mut Cursor::new(bytes), |tmp| {
                set_mode(tmp, mode)?;
                if ids.uid.is_some() || ids.gid.is_some() {
                    set_owner(ctx, tmp, attrs, ids, elevated)?;
                }
                Ok(())
            })
            .map_err(fail)?;

            log::info!("wrote {}", path.display());
            return Ok(if existing.is_some() {
                ApplyResult::Modified
            } else {
                ApplyResult::Created
            });
        }
    }

    let changed = converge_attrs(ctx, path, attrs, ids, elevated).map_err(fail)?;
    Ok(if changed {
        ApplyResult::Modified
    } else {
        ApplyResult::NoChange
    })
}

/// Final target of a symlink; a dangling link resolves to where it points
fn link_target(path: &Path) -> CauseResult<PathBuf> {
    match fs::canonicalize(path) {
        Ok(target) => Ok(target),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let to = fs::read_link(path).map_err(|e| FailureCause::io(path, e))?;
            Ok(match path.parent() {
                Some(parent) if to.is_relative() => parent.join(to),
                _ => to,
            })
        }
        Err(e) => Err(FailureCause::io(path, e)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::super::testing::{ctx, current_user};
    use crate::actions::apply as apply_descriptor;
    use crate::error::{Error, FailureCause};
    use crate::host::LocalHost;
    use crate::template::{Template, bindings_from};
    use crate::types::{ApplyResult, ContentSource, ResourceDescriptor};
    use serde_json::json;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_write_then_no_change() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("server.properties");
        let host = LocalHost::new();
        let desc = ResourceDescriptor::file(&path)
            .owner(current_user())
            .mode(0o640)
            .content(ContentSource::text("broker.id=0\n"));

        assert_eq!(apply_descriptor(&desc, &ctx(&host)).unwrap(), ApplyResult::Created);
        assert_eq!(fs::read_to_string(&path).unwrap(), "broker.id=0\n");
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o7777, 0o640);

        assert_eq!(apply_descriptor(&desc, &ctx(&host)).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn test_content_change_is_modified_and_keeps_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("kafka-env.sh");
        fs::write(&path, b"old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        let host = LocalHost::new();

        let desc = ResourceDescriptor::file(&path).content(ContentSource::text("new"));
        assert_eq!(apply_descriptor(&desc, &ctx(&host)).unwrap(), ApplyResult::Modified);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o7777, 0o755);
    }

    #[test]
    fn test_mode_only_change() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("hosts");
        fs::write(&path, b"same").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        let host = LocalHost::new();

        let desc = ResourceDescriptor::file(&path)
            .mode(0o644)
            .content(ContentSource::text("same"));
        assert_eq!(apply_descriptor(&desc, &ctx(&host)).unwrap(), ApplyResult::Modified);
    }

    #[test]
    fn test_no_content_creates_empty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dfs_data_dir_mount.hist");
        let host = LocalHost::new();
        let desc = ResourceDescriptor::file(&path);

        assert_eq!(apply_descriptor(&desc, &ctx(&host)).unwrap(), ApplyResult::Created);
        assert_eq!(fs::read(&path).unwrap(), b"");
        fs::write(&path, b"kept").unwrap();
        assert_eq!(apply_descriptor(&desc, &ctx(&host)).unwrap(), ApplyResult::NoChange);
        assert_eq!(fs::read(&path).unwrap(), b"kept");
    }

    #[test]
    fn test_template_missing_binding_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("jaas.conf");
        let host = LocalHost::new();
        let desc = ResourceDescriptor::file(&path).content(ContentSource::template(
            Template::text("principal={{principal}}"),
            bindings_from(&json!({})),
        ));

        let err = apply_descriptor(&desc, &ctx(&host)).unwrap_err();
        assert!(matches!(err, Error::MissingBinding { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_local_source_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source.jar");
        fs::write(&source, b"jar").unwrap();
        let path = tmp.path().join("lib.jar");
        let host = LocalHost::new();

        let desc = ResourceDescriptor::file(&path).content(ContentSource::Local(source));
        assert_eq!(apply_descriptor(&desc, &ctx(&host)).unwrap(), ApplyResult::Created);
        assert_eq!(fs::read(&path).unwrap(), b"jar");
    }

    #[test]
    fn test_missing_parent_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("no/such/dir/file");
        let host = LocalHost::new();

        let err = apply_descriptor(
            &ResourceDescriptor::file(&path).content(ContentSource::text("x")),
            &ctx(&host),
        )
        .unwrap_err();
        assert!(matches!(err.cause(), Some(FailureCause::Io { .. })));
    }

    #[test]
    fn test_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stale.pid");
        fs::write(&path, b"1").unwrap();
        let host = LocalHost::new();

        let desc = ResourceDescriptor::file(&path).absent();
        assert_eq!(apply_descriptor(&desc, &ctx(&host)).unwrap(), ApplyResult::Removed);
        assert_eq!(apply_descriptor(&desc, &ctx(&host)).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn test_symlinked_file_writes_through_link() {
        let tmp = tempfile::tempdir().unwrap();
        let real = tmp.path().join("real.conf");
        let link = tmp.path().join("link.conf");
        fs::write(&real, b"a=1\n").unwrap();
        fs::set_permissions(&real, fs::Permissions::from_mode(0o600)).unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let host = LocalHost::new();

        let same = ResourceDescriptor::file(&link)
            .mode(0o644)
            .content(ContentSource::text("a=1\n"));
        assert_eq!(apply_descriptor(&same, &ctx(&host)).unwrap(), ApplyResult::Modified);
        assert_eq!(apply_descriptor(&same, &ctx(&host)).unwrap(), ApplyResult::NoChange);
        assert_eq!(fs::metadata(&real).unwrap().permissions().mode() & 0o7777, 0o644);

        let changed = ResourceDescriptor::file(&link)
            .mode(0o644)
            .content(ContentSource::text("a=2\n"));
        assert_eq!(apply_descriptor(&changed, &ctx(&host)).unwrap(), ApplyResult::Modified);
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "a=2\n");
        assert_eq!(apply_descriptor(&changed, &ctx(&host)).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn test_symlink_to_directory_conflicts() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("conf.d");
        fs::create_dir(&dir).unwrap();
        let link = tmp.path().join("conf");
        std::os::unix::fs::symlink(&dir, &link).unwrap();
        let host = LocalHost::new();

        let err = apply_descriptor(
            &ResourceDescriptor::file(&link).content(ContentSource::text("x")),
            &ctx(&host),
        )
        .unwrap_err();
        assert!(matches!(err.cause(), Some(FailureCause::Conflict { .. })));
    }

    #[test]
    fn test_dangling_symlink_creates_target() {
        let tmp = tempfile::tempdir().unwrap();
        let link = tmp.path().join("current.conf");
        std::os::unix::fs::symlink("real.conf", &link).unwrap();
        let host = LocalHost::new();

        let desc = ResourceDescriptor::file(&link).content(ContentSource::text("x"));
        assert_eq!(apply_descriptor(&desc, &ctx(&host)).unwrap(), ApplyResult::Created);
        assert_eq!(fs::read_to_string(tmp.path().join("real.conf")).unwrap(), "x");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }
}
