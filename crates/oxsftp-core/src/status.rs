//! Status code texts and the host-errno mapping.
//!
//! Clamping to the negotiated version's status range happens where STATUS
//! responses are emitted (the dispatcher); this module only knows the
//! version-independent tables.

use nix::errno::Errno;

use crate::constants::*;

/// Canonical message for a status code, used when the handler supplies none.
pub fn status_to_string(status: u32) -> &'static str {
    match status {
        SSH_FX_OK => "OK",
        SSH_FX_EOF => "end of file",
        SSH_FX_NO_SUCH_FILE => "file does not exist",
        SSH_FX_PERMISSION_DENIED => "permission denied",
        SSH_FX_FAILURE => "operation failed",
        SSH_FX_BAD_MESSAGE => "badly encoded SFTP packet",
        SSH_FX_NO_CONNECTION => "no connection",
        SSH_FX_CONNECTION_LOST => "connection lost",
        SSH_FX_OP_UNSUPPORTED => "operation not supported",
        SSH_FX_INVALID_HANDLE => "invalid handle",
        SSH_FX_NO_SUCH_PATH => "path does not exist or is invalid",
        SSH_FX_FILE_ALREADY_EXISTS => "file already exists",
        SSH_FX_WRITE_PROTECT => "file is on read-only medium",
        SSH_FX_NO_MEDIA => "no medium in drive",
        SSH_FX_NO_SPACE_ON_FILESYSTEM => "no space on filesystem",
        SSH_FX_QUOTA_EXCEEDED => "quota exceeded",
        SSH_FX_UNKNOWN_PRINCIPAL => "unknown principal",
        SSH_FX_LOCK_CONFLICT => "file is locked",
        SSH_FX_DIR_NOT_EMPTY => "directory is not empty",
        SSH_FX_NOT_A_DIRECTORY => "file is not a directory",
        SSH_FX_INVALID_FILENAME => "invalid filename",
        SSH_FX_LINK_LOOP => "too many symbolic links",
        SSH_FX_CANNOT_DELETE => "file cannot be deleted",
        SSH_FX_INVALID_PARAMETER => "invalid parameter",
        SSH_FX_FILE_IS_A_DIRECTORY => "file is a directory",
        SSH_FX_BYTE_RANGE_LOCK_CONFLICT => "byte range is locked",
        SSH_FX_BYTE_RANGE_LOCK_REFUSED => "cannot lock byte range",
        SSH_FX_DELETE_PENDING => "file deletion pending",
        SSH_FX_FILE_CORRUPT => "file is corrupt",
        SSH_FX_OWNER_INVALID => "invalid owner",
        SSH_FX_GROUP_INVALID => "invalid group",
        SSH_FX_NO_MATCHING_BYTE_RANGE_LOCK => "no such lock",
        _ => "unknown status",
    }
}

/// Map a host errno to the SFTP status code range.
pub fn errno_to_status(errno: Errno) -> u32 {
    match errno {
        Errno::EPERM | Errno::EACCES => SSH_FX_PERMISSION_DENIED,
        Errno::ENOENT => SSH_FX_NO_SUCH_FILE,
        Errno::EIO => SSH_FX_FILE_CORRUPT,
        Errno::ENOSPC => SSH_FX_NO_SPACE_ON_FILESYSTEM,
        Errno::ENOTDIR => SSH_FX_NOT_A_DIRECTORY,
        Errno::EISDIR => SSH_FX_FILE_IS_A_DIRECTORY,
        Errno::EEXIST => SSH_FX_FILE_ALREADY_EXISTS,
        Errno::EROFS => SSH_FX_WRITE_PROTECT,
        Errno::ELOOP => SSH_FX_LINK_LOOP,
        Errno::ENAMETOOLONG => SSH_FX_INVALID_FILENAME,
        Errno::ENOTEMPTY => SSH_FX_DIR_NOT_EMPTY,
        Errno::EDQUOT => SSH_FX_QUOTA_EXCEEDED,
        _ => SSH_FX_FAILURE,
    }
}

/// Map an I/O error to `(status, message)`.
///
/// The message is the host's error string. Errors without a raw OS code
/// (e.g. synthesized `UnexpectedEof`) map by error kind where one fits.
pub fn io_error_to_status(err: &std::io::Error) -> (u32, String) {
    let status = match err.raw_os_error() {
        Some(0) => SSH_FX_OK,
        Some(code) => errno_to_status(Errno::from_raw(code)),
        None => match err.kind() {
            std::io::ErrorKind::NotFound => SSH_FX_NO_SUCH_FILE,
            std::io::ErrorKind::PermissionDenied => SSH_FX_PERMISSION_DENIED,
            std::io::ErrorKind::AlreadyExists => SSH_FX_FILE_ALREADY_EXISTS,
            _ => SSH_FX_FAILURE,
        },
    };
    (status, err.to_string())
}
