//! Local-filesystem request handler.
//!
//! The engine owns the protocol; this module owns the filesystem. Every
//! non-INIT command lands in [`LocalBackend::handle`], which parses the
//! version-specific body, performs the operation and either sends its own
//! response (HANDLE/DATA/NAME/ATTRS/EXTENDED_REPLY) or returns a status for
//! the engine to emit.

mod handles;

use std::io::SeekFrom;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use nix::unistd::{Gid, Group, Uid, User};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use oxsftp_core::attrs::{format_longname, FileAttributes, Timestamp};
use oxsftp_core::charset::CharsetError;
use oxsftp_core::constants::*;
use oxsftp_core::wire::WireError;
use oxsftp_core::{Command, Outcome, Request, RequestHandler};

pub use handles::{DirHandle, FileHandle, Handle, HandleTable};

/// Internal handler error, folded into an [`Outcome`] at the trait boundary.
enum HandlerError {
    /// Body parse failure: answer BAD_MESSAGE.
    Wire(WireError),
    /// Host error: answer via the errno mapping.
    Io(std::io::Error),
    /// A specific status.
    Status(u32),
}

impl From<WireError> for HandlerError {
    fn from(err: WireError) -> Self {
        HandlerError::Wire(err)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::Io(err)
    }
}

impl From<CharsetError> for HandlerError {
    fn from(_: CharsetError) -> Self {
        HandlerError::Status(SSH_FX_INVALID_FILENAME)
    }
}

type HandlerResult = Result<Outcome, HandlerError>;

/// Serves the local filesystem.
#[derive(Default)]
pub struct LocalBackend {
    handles: HandleTable,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestHandler for LocalBackend {
    async fn handle(&self, command: Command, request: &mut Request<'_>) -> Outcome {
        let result = match command {
            // INIT is the engine's; it cannot reach a handler table entry
            // that routes here.
            Command::Init => Ok(Outcome::Status(SSH_FX_FAILURE)),
            Command::Open => self.open(request).await,
            Command::Close => self.close(request).await,
            Command::Read => self.read(request).await,
            Command::Write => self.write(request).await,
            Command::Lstat => self.stat(request, false).await,
            Command::Stat => self.stat(request, true).await,
            Command::Fstat => self.fstat(request).await,
            Command::Setstat => self.setstat(request).await,
            Command::Fsetstat => self.fsetstat(request).await,
            Command::Opendir => self.opendir(request).await,
            Command::Readdir => self.readdir(request).await,
            Command::Remove => self.remove(request).await,
            Command::Mkdir => self.mkdir(request).await,
            Command::Rmdir => self.rmdir(request).await,
            Command::Realpath => self.realpath(request).await,
            Command::Rename => self.rename(request).await,
            Command::Readlink => self.readlink(request).await,
            Command::Symlink => self.symlink(request).await,
            Command::Link => self.link(request).await,
            Command::Extended => self.extended(request).await,
        };
        match result {
            Ok(outcome) => outcome,
            Err(HandlerError::Wire(err)) => {
                debug!(error = %err, "request body parse failed");
                Outcome::Status(SSH_FX_BAD_MESSAGE)
            }
            Err(HandlerError::Io(err)) => Outcome::Errno(err),
            Err(HandlerError::Status(status)) => Outcome::Status(status),
        }
    }
}

impl LocalBackend {
    // =========================================================================
    // Open / close / read / write
    // =========================================================================

    async fn open(&self, request: &mut Request<'_>) -> HandlerResult {
        let path = parse_path(request)?;
        let version = request.version();

        let (options, wants_write, append, delete_on_close) = if version <= 4 {
            let pflags = request.cursor.u32()?;
            let attrs = FileAttributes::decode(version, &mut request.cursor)?;
            legacy_open_options(pflags, &attrs)
        } else {
            let access = request.cursor.u32()?;
            let flags = request.cursor.u32()?;
            let attrs = FileAttributes::decode(version, &mut request.cursor)?;
            acl_open_options(access, flags, &attrs)?
        };
        if wants_write && request.readonly() {
            return Err(HandlerError::Status(SSH_FX_PERMISSION_DENIED));
        }

        let file = options.open(&path).await?;
        let key = self.handles.insert(Handle::File(FileHandle {
            file: AsyncMutex::new(file),
            path,
            append,
            delete_on_close,
        }));
        Ok(request.respond_handle(&key).await)
    }

    async fn close(&self, request: &mut Request<'_>) -> HandlerResult {
        let key = request.cursor.bytes()?;
        let Some(handle) = self.handles.remove(&key) else {
            return Err(HandlerError::Status(SSH_FX_INVALID_HANDLE));
        };
        if let Handle::File(file) = handle.as_ref() {
            if file.delete_on_close {
                // Best effort; the close itself still succeeds.
                let _ = tokio::fs::remove_file(&file.path).await;
            }
        }
        Ok(Outcome::Status(SSH_FX_OK))
    }

    async fn read(&self, request: &mut Request<'_>) -> HandlerResult {
        let key = request.cursor.bytes()?;
        let offset = request.cursor.u64()?;
        let wanted = request.cursor.u32()? as usize;

        let handle = self.file_handle(&key)?;
        let mut file = handle.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; wanted.min(MAX_READ_LEN)];
        let n = file.read(&mut buf).await?;
        drop(file);

        if n == 0 && wanted > 0 {
            return Err(HandlerError::Status(SSH_FX_EOF));
        }
        Ok(request.respond_data(&buf[..n]).await)
    }

    async fn write(&self, request: &mut Request<'_>) -> HandlerResult {
        let key = request.cursor.bytes()?;
        let offset = request.cursor.u64()?;
        let data = request.cursor.bytes()?;

        if request.readonly() {
            return Err(HandlerError::Status(SSH_FX_PERMISSION_DENIED));
        }
        let handle = self.file_handle(&key)?;
        let mut file = handle.file.lock().await;
        if !handle.append {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(Outcome::Status(SSH_FX_OK))
    }

    // =========================================================================
    // Stat family
    // =========================================================================

    async fn stat(&self, request: &mut Request<'_>, follow: bool) -> HandlerResult {
        let path = parse_path(request)?;
        let version = request.version();
        if version >= 4 {
            // desired-attribute flags; we always report what we have
            let _ = request.cursor.u32();
        }
        let meta = if follow {
            tokio::fs::metadata(&path).await?
        } else {
            tokio::fs::symlink_metadata(&path).await?
        };
        let mut attrs = FileAttributes::from_metadata(&meta);
        if version >= 4 {
            fill_owner_group(&mut attrs);
        }
        Ok(request.respond_attrs(&attrs).await)
    }

    async fn fstat(&self, request: &mut Request<'_>) -> HandlerResult {
        let key = request.cursor.bytes()?;
        let version = request.version();
        if version >= 4 {
            let _ = request.cursor.u32();
        }
        let Some(handle) = self.handles.get(&key) else {
            return Err(HandlerError::Status(SSH_FX_INVALID_HANDLE));
        };
        let meta = match handle.as_ref() {
            Handle::File(file) => file.file.lock().await.metadata().await?,
            Handle::Dir(dir) => tokio::fs::metadata(&dir.path).await?,
        };
        let mut attrs = FileAttributes::from_metadata(&meta);
        if version >= 4 {
            fill_owner_group(&mut attrs);
        }
        Ok(request.respond_attrs(&attrs).await)
    }

    async fn setstat(&self, request: &mut Request<'_>) -> HandlerResult {
        let path = parse_path(request)?;
        let attrs = FileAttributes::decode(request.version(), &mut request.cursor)?;
        if request.readonly() {
            return Err(HandlerError::Status(SSH_FX_PERMISSION_DENIED));
        }
        apply_setstat(&path, None, &attrs, request.version()).await
    }

    async fn fsetstat(&self, request: &mut Request<'_>) -> HandlerResult {
        let key = request.cursor.bytes()?;
        let attrs = FileAttributes::decode(request.version(), &mut request.cursor)?;
        if request.readonly() {
            return Err(HandlerError::Status(SSH_FX_PERMISSION_DENIED));
        }
        let handle = self.file_handle(&key)?;
        apply_setstat(&handle.path, Some(&*handle), &attrs, request.version()).await
    }

    // =========================================================================
    // Directories
    // =========================================================================

    async fn opendir(&self, request: &mut Request<'_>) -> HandlerResult {
        let path = parse_path(request)?;
        let reader = tokio::fs::read_dir(&path).await?;
        let key = self.handles.insert(Handle::Dir(DirHandle {
            reader: AsyncMutex::new(reader),
            path,
        }));
        Ok(request.respond_handle(&key).await)
    }

    async fn readdir(&self, request: &mut Request<'_>) -> HandlerResult {
        let key = request.cursor.bytes()?;
        let version = request.version();
        let Some(handle) = self.handles.get(&key) else {
            return Err(HandlerError::Status(SSH_FX_INVALID_HANDLE));
        };
        let Handle::Dir(dir) = handle.as_ref() else {
            return Err(HandlerError::Status(SSH_FX_INVALID_HANDLE));
        };

        let mut entries = Vec::new();
        let mut reader = dir.reader.lock().await;
        while entries.len() < READDIR_BATCH {
            let Some(entry) = reader.next_entry().await? else {
                break;
            };
            let name = request.paths().to_wire(entry.file_name().as_bytes())?;
            let mut attrs = match entry.metadata().await {
                Ok(meta) => FileAttributes::from_metadata(&meta),
                Err(_) => FileAttributes::default(),
            };
            if version >= 4 {
                fill_owner_group(&mut attrs);
            }
            entries.push((name, attrs));
        }
        drop(reader);

        if entries.is_empty() {
            return Err(HandlerError::Status(SSH_FX_EOF));
        }

        let id = request.id;
        let now = unix_now();
        let out = request.out();
        out.begin();
        out.u8(SSH_FXP_NAME);
        out.u32(id);
        out.u32(entries.len() as u32);
        for (name, attrs) in &entries {
            out.str(name);
            if version == 3 {
                out.str(&format_longname(attrs, name, now));
            }
            attrs.encode(version, out);
        }
        Ok(request.finish().await)
    }

    // =========================================================================
    // Namespace operations
    // =========================================================================

    async fn remove(&self, request: &mut Request<'_>) -> HandlerResult {
        let path = parse_path(request)?;
        if request.readonly() {
            return Err(HandlerError::Status(SSH_FX_PERMISSION_DENIED));
        }
        tokio::fs::remove_file(&path).await?;
        Ok(Outcome::Status(SSH_FX_OK))
    }

    async fn mkdir(&self, request: &mut Request<'_>) -> HandlerResult {
        let path = parse_path(request)?;
        let attrs = FileAttributes::decode(request.version(), &mut request.cursor)?;
        if request.readonly() {
            return Err(HandlerError::Status(SSH_FX_PERMISSION_DENIED));
        }
        tokio::fs::create_dir(&path).await?;
        if let Some(mode) = attrs.permissions {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(mode & 0o7777);
            tokio::fs::set_permissions(&path, perms).await?;
        }
        Ok(Outcome::Status(SSH_FX_OK))
    }

    async fn rmdir(&self, request: &mut Request<'_>) -> HandlerResult {
        let path = parse_path(request)?;
        if request.readonly() {
            return Err(HandlerError::Status(SSH_FX_PERMISSION_DENIED));
        }
        tokio::fs::remove_dir(&path).await?;
        Ok(Outcome::Status(SSH_FX_OK))
    }

    async fn rename(&self, request: &mut Request<'_>) -> HandlerResult {
        let from = parse_path(request)?;
        let to = parse_path(request)?;
        let version = request.version();
        let flags = if version >= 5 { request.cursor.u32()? } else { 0 };
        if request.readonly() {
            return Err(HandlerError::Status(SSH_FX_PERMISSION_DENIED));
        }
        // Before v5 (and without the overwrite flag) rename must not clobber
        // an existing target.
        let overwrite = version >= 5 && flags & SSH_FXF_RENAME_OVERWRITE != 0;
        if !overwrite && tokio::fs::symlink_metadata(&to).await.is_ok() {
            return Err(HandlerError::Status(SSH_FX_FILE_ALREADY_EXISTS));
        }
        tokio::fs::rename(&from, &to).await?;
        Ok(Outcome::Status(SSH_FX_OK))
    }

    async fn realpath(&self, request: &mut Request<'_>) -> HandlerResult {
        let path = parse_path(request)?;
        if request.version() >= 6 {
            // control byte and compose-path strings; lexical resolution is
            // what we do anyway. A short trailing field does not advance the
            // cursor, so stop draining on the first parse failure.
            let _ = request.cursor.u8();
            while request.cursor.remaining() > 0 {
                if request.cursor.bytes().is_err() {
                    break;
                }
            }
        }
        let resolved = match tokio::fs::canonicalize(&path).await {
            Ok(resolved) => resolved,
            Err(_) => lexical_normalize(&path),
        };
        let attrs = match tokio::fs::symlink_metadata(&resolved).await {
            Ok(meta) => FileAttributes::from_metadata(&meta),
            Err(_) => FileAttributes::default(),
        };
        self.respond_single_name(request, &resolved, attrs).await
    }

    async fn readlink(&self, request: &mut Request<'_>) -> HandlerResult {
        let path = parse_path(request)?;
        let target = tokio::fs::read_link(&path).await?;
        self.respond_single_name(request, &target, FileAttributes::default())
            .await
    }

    async fn symlink(&self, request: &mut Request<'_>) -> HandlerResult {
        let first = parse_path(request)?;
        let second = parse_path(request)?;
        if request.readonly() {
            return Err(HandlerError::Status(SSH_FX_PERMISSION_DENIED));
        }
        // v3 clients disagree about the argument order; the advertised
        // symlink-order extension says which one we expect.
        let (link, target) = if request.reverse_symlink() {
            (second, first)
        } else {
            (first, second)
        };
        tokio::fs::symlink(&target, &link).await?;
        Ok(Outcome::Status(SSH_FX_OK))
    }

    async fn link(&self, request: &mut Request<'_>) -> HandlerResult {
        let new_link = parse_path(request)?;
        let existing = parse_path(request)?;
        let symlink = request.cursor.u8()? != 0;
        if request.readonly() {
            return Err(HandlerError::Status(SSH_FX_PERMISSION_DENIED));
        }
        if symlink {
            tokio::fs::symlink(&existing, &new_link).await?;
        } else {
            tokio::fs::hard_link(&existing, &new_link).await?;
        }
        Ok(Outcome::Status(SSH_FX_OK))
    }

    // =========================================================================
    // Extensions
    // =========================================================================

    async fn extended(&self, request: &mut Request<'_>) -> HandlerResult {
        let name = request.cursor.utf8()?;
        match name.as_str() {
            "space-available" => self.space_available(request).await,
            // version-select and anything else we did not advertise.
            _ => {
                debug!(extension = %name, "unsupported extended request");
                Err(HandlerError::Status(SSH_FX_OP_UNSUPPORTED))
            }
        }
    }

    async fn space_available(&self, request: &mut Request<'_>) -> HandlerResult {
        let path = parse_path(request)?;
        let stat = nix::sys::statvfs::statvfs(&path)
            .map_err(|errno| HandlerError::Io(std::io::Error::from_raw_os_error(errno as i32)))?;
        let frsize = stat.fragment_size() as u64;

        let id = request.id;
        let out = request.out();
        out.begin();
        out.u8(SSH_FXP_EXTENDED_REPLY);
        out.u32(id);
        out.u64(stat.blocks() as u64 * frsize); // bytes-on-device
        out.u64(stat.blocks_free() as u64 * frsize); // unused-bytes-on-device
        out.u64(0); // bytes-available-to-user (unknown)
        out.u64(stat.blocks_available() as u64 * frsize); // unused-bytes-available-to-user
        out.u32(frsize as u32); // bytes-per-allocation-unit
        Ok(request.finish().await)
    }

    // =========================================================================
    // Shared helpers
    // =========================================================================

    fn file_handle(&self, key: &[u8]) -> Result<FileHandleRef, HandlerError> {
        match self.handles.get(key) {
            Some(handle) if matches!(handle.as_ref(), Handle::File(_)) => {
                Ok(FileHandleRef(handle))
            }
            _ => Err(HandlerError::Status(SSH_FX_INVALID_HANDLE)),
        }
    }

    async fn respond_single_name(
        &self,
        request: &mut Request<'_>,
        path: &Path,
        attrs: FileAttributes,
    ) -> HandlerResult {
        let version = request.version();
        let name = request.paths().to_wire(path.as_os_str().as_bytes())?;
        let id = request.id;
        let now = unix_now();
        let out = request.out();
        out.begin();
        out.u8(SSH_FXP_NAME);
        out.u32(id);
        out.u32(1);
        out.str(&name);
        if version == 3 {
            out.str(&format_longname(&attrs, &name, now));
        }
        attrs.encode(version, out);
        Ok(request.finish().await)
    }
}

/// A handle already checked to be a file; derefs to the [`FileHandle`].
struct FileHandleRef(std::sync::Arc<Handle>);

impl std::ops::Deref for FileHandleRef {
    type Target = FileHandle;
    fn deref(&self) -> &FileHandle {
        match self.0.as_ref() {
            Handle::File(file) => file,
            Handle::Dir(_) => unreachable!("checked at construction"),
        }
    }
}

/// Parse one path argument: wire string, charset-converted to local bytes.
fn parse_path(request: &mut Request<'_>) -> Result<PathBuf, HandlerError> {
    let raw = request.cursor.bytes()?;
    let local = request.paths().to_local(&raw)?;
    Ok(PathBuf::from(std::ffi::OsString::from_vec(local)))
}

/// v3/v4 pflags to open options. Returns (options, wants_write, append,
/// delete_on_close).
fn legacy_open_options(pflags: u32, attrs: &FileAttributes) -> (OpenOptions, bool, bool, bool) {
    let mut options = OpenOptions::new();
    let read = pflags & SSH_FXF_READ != 0;
    let write = pflags & SSH_FXF_WRITE != 0;
    let append = pflags & SSH_FXF_APPEND != 0;
    options.read(read || !write);
    options.write(write);
    if append {
        options.append(true);
    }
    if pflags & SSH_FXF_CREAT != 0 {
        if pflags & SSH_FXF_EXCL != 0 {
            options.create_new(true);
        } else {
            options.create(true);
        }
    }
    if pflags & SSH_FXF_TRUNC != 0 {
        options.truncate(true);
    }
    if let Some(mode) = attrs.permissions {
        options.mode(mode & 0o7777);
    }
    let wants_write = write || append || pflags & (SSH_FXF_CREAT | SSH_FXF_TRUNC) != 0;
    (options, wants_write, append, false)
}

/// v5/v6 desired-access + flags to open options.
fn acl_open_options(
    access: u32,
    flags: u32,
    attrs: &FileAttributes,
) -> Result<(OpenOptions, bool, bool, bool), HandlerError> {
    let mut options = OpenOptions::new();
    let read = access & ACE4_READ_DATA != 0;
    let write = access & (ACE4_WRITE_DATA | ACE4_APPEND_DATA) != 0;
    let append = flags & (SSH_FXF_APPEND_DATA | SSH_FXF_APPEND_DATA_ATOMIC) != 0;
    options.read(read || !write);
    options.write(write || append);
    if append {
        options.append(true);
    }

    let mut creates = false;
    match flags & SSH_FXF_ACCESS_DISPOSITION {
        SSH_FXF_CREATE_NEW => {
            options.create_new(true);
            creates = true;
        }
        SSH_FXF_CREATE_TRUNCATE => {
            options.create(true).truncate(true);
            creates = true;
        }
        SSH_FXF_OPEN_EXISTING => {}
        SSH_FXF_OPEN_OR_CREATE => {
            options.create(true);
            creates = true;
        }
        SSH_FXF_TRUNCATE_EXISTING => {
            options.truncate(true);
            creates = true;
        }
        _ => return Err(HandlerError::Status(SSH_FX_INVALID_PARAMETER)),
    }
    if flags & SSH_FXF_NOFOLLOW != 0 {
        options.custom_flags(nix::fcntl::OFlag::O_NOFOLLOW.bits());
    }
    if let Some(mode) = attrs.permissions {
        options.mode(mode & 0o7777);
    }
    let delete_on_close = flags & SSH_FXF_DELETE_ON_CLOSE != 0;
    let wants_write = write || append || creates || delete_on_close;
    Ok((options, wants_write, append, delete_on_close))
}

/// Apply SETSTAT/FSETSTAT attributes. `file` is set for the handle-based
/// variant so truncation can use the already-open descriptor.
async fn apply_setstat(
    path: &Path,
    file: Option<&FileHandle>,
    attrs: &FileAttributes,
    version: u32,
) -> HandlerResult {
    let supported = if version <= 3 {
        SSH_FILEXFER_ATTR_SIZE
            | SSH_FILEXFER_ATTR_UIDGID
            | SSH_FILEXFER_ATTR_PERMISSIONS
            | SSH_FILEXFER_ATTR_ACMODTIME
    } else {
        SSH_FILEXFER_ATTR_SIZE
            | SSH_FILEXFER_ATTR_OWNERGROUP
            | SSH_FILEXFER_ATTR_PERMISSIONS
            | SSH_FILEXFER_ATTR_ACCESSTIME
            | SSH_FILEXFER_ATTR_MODIFYTIME
            | SSH_FILEXFER_ATTR_SUBSECOND_TIMES
            | SSH_FILEXFER_ATTR_ALLOCATION_SIZE
    };
    if attrs.valid & !supported != 0 {
        // We must not change anything if we cannot do all of it.
        return Err(HandlerError::Status(SSH_FX_OP_UNSUPPORTED));
    }

    if let Some(size) = attrs.size {
        match file {
            Some(handle) => handle.file.lock().await.set_len(size).await?,
            None => {
                let target = OpenOptions::new().write(true).open(path).await?;
                target.set_len(size).await?;
            }
        }
    }

    if let Some((uid, gid)) = resolve_ownership(attrs)? {
        nix::unistd::chown(path, uid, gid)
            .map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))?;
    }

    if let Some(mode) = attrs.permissions {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(mode & 0o7777);
        tokio::fs::set_permissions(path, perms).await?;
    }

    if attrs.atime.is_some() || attrs.mtime.is_some() {
        let meta = tokio::fs::symlink_metadata(path).await?;
        let current = FileAttributes::from_metadata(&meta);
        let pick = |wanted: Option<Timestamp>, fallback: Option<Timestamp>| {
            let ts = wanted.or(fallback).unwrap_or(Timestamp::new(0));
            filetime::FileTime::from_unix_time(ts.seconds as i64, ts.nanoseconds.unwrap_or(0))
        };
        let atime = pick(attrs.atime, current.atime);
        let mtime = pick(attrs.mtime, current.mtime);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || filetime::set_file_times(&path, atime, mtime))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))??;
    }

    Ok(Outcome::Status(SSH_FX_OK))
}

/// Turn ownership attributes into a chown target. Numeric ids win; names
/// are resolved against the local user database.
fn resolve_ownership(
    attrs: &FileAttributes,
) -> Result<Option<(Option<Uid>, Option<Gid>)>, HandlerError> {
    if let Some((uid, gid)) = attrs.uid_gid {
        return Ok(Some((
            Some(Uid::from_raw(uid)),
            Some(Gid::from_raw(gid)),
        )));
    }
    let Some((owner, group)) = &attrs.owner_group else {
        return Ok(None);
    };
    let user = User::from_name(owner)
        .ok()
        .flatten()
        .ok_or(HandlerError::Status(SSH_FX_OWNER_INVALID))?;
    let group = Group::from_name(group)
        .ok()
        .flatten()
        .ok_or(HandlerError::Status(SSH_FX_GROUP_INVALID))?;
    Ok(Some((Some(user.uid), Some(group.gid))))
}

/// Resolve numeric ids to names for v4+ attribute responses.
fn fill_owner_group(attrs: &mut FileAttributes) {
    let Some((uid, gid)) = attrs.uid_gid else {
        return;
    };
    let owner = User::from_uid(Uid::from_raw(uid)).ok().flatten();
    let group = Group::from_gid(Gid::from_raw(gid)).ok().flatten();
    if let (Some(owner), Some(group)) = (owner, group) {
        attrs.owner_group = Some((owner.name, group.name));
    }
}

/// Normalize a path without touching the filesystem, for REALPATH on names
/// that do not (yet) exist.
fn lexical_normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push("/");
    }
    normalized
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
