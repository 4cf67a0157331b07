//! Protocol and configuration constants for oxsftp.
//!
//! Wire values come from the SFTP drafts: draft-ietf-secsh-filexfer-02 (v3)
//! through draft-ietf-secsh-filexfer-13 (v6). All integers are big-endian on
//! the wire.

// =============================================================================
// Packet Types
// =============================================================================

pub const SSH_FXP_INIT: u8 = 1;
pub const SSH_FXP_VERSION: u8 = 2;
pub const SSH_FXP_OPEN: u8 = 3;
pub const SSH_FXP_CLOSE: u8 = 4;
pub const SSH_FXP_READ: u8 = 5;
pub const SSH_FXP_WRITE: u8 = 6;
pub const SSH_FXP_LSTAT: u8 = 7;
pub const SSH_FXP_FSTAT: u8 = 8;
pub const SSH_FXP_SETSTAT: u8 = 9;
pub const SSH_FXP_FSETSTAT: u8 = 10;
pub const SSH_FXP_OPENDIR: u8 = 11;
pub const SSH_FXP_READDIR: u8 = 12;
pub const SSH_FXP_REMOVE: u8 = 13;
pub const SSH_FXP_MKDIR: u8 = 14;
pub const SSH_FXP_RMDIR: u8 = 15;
pub const SSH_FXP_REALPATH: u8 = 16;
pub const SSH_FXP_STAT: u8 = 17;
pub const SSH_FXP_RENAME: u8 = 18;
pub const SSH_FXP_READLINK: u8 = 19;
/// v3-v5 only; replaced by SSH_FXP_LINK in v6.
pub const SSH_FXP_SYMLINK: u8 = 20;
/// v6 only.
pub const SSH_FXP_LINK: u8 = 21;

pub const SSH_FXP_STATUS: u8 = 101;
pub const SSH_FXP_HANDLE: u8 = 102;
pub const SSH_FXP_DATA: u8 = 103;
pub const SSH_FXP_NAME: u8 = 104;
pub const SSH_FXP_ATTRS: u8 = 105;

pub const SSH_FXP_EXTENDED: u8 = 200;
pub const SSH_FXP_EXTENDED_REPLY: u8 = 201;

// =============================================================================
// Status Codes
// =============================================================================

pub const SSH_FX_OK: u32 = 0;
pub const SSH_FX_EOF: u32 = 1;
pub const SSH_FX_NO_SUCH_FILE: u32 = 2;
pub const SSH_FX_PERMISSION_DENIED: u32 = 3;
pub const SSH_FX_FAILURE: u32 = 4;
pub const SSH_FX_BAD_MESSAGE: u32 = 5;
pub const SSH_FX_NO_CONNECTION: u32 = 6;
pub const SSH_FX_CONNECTION_LOST: u32 = 7;
pub const SSH_FX_OP_UNSUPPORTED: u32 = 8;
pub const SSH_FX_INVALID_HANDLE: u32 = 9;
pub const SSH_FX_NO_SUCH_PATH: u32 = 10;
pub const SSH_FX_FILE_ALREADY_EXISTS: u32 = 11;
pub const SSH_FX_WRITE_PROTECT: u32 = 12;
pub const SSH_FX_NO_MEDIA: u32 = 13;
pub const SSH_FX_NO_SPACE_ON_FILESYSTEM: u32 = 14;
pub const SSH_FX_QUOTA_EXCEEDED: u32 = 15;
pub const SSH_FX_UNKNOWN_PRINCIPAL: u32 = 16;
pub const SSH_FX_LOCK_CONFLICT: u32 = 17;
pub const SSH_FX_DIR_NOT_EMPTY: u32 = 18;
pub const SSH_FX_NOT_A_DIRECTORY: u32 = 19;
pub const SSH_FX_INVALID_FILENAME: u32 = 20;
pub const SSH_FX_LINK_LOOP: u32 = 21;
pub const SSH_FX_CANNOT_DELETE: u32 = 22;
pub const SSH_FX_INVALID_PARAMETER: u32 = 23;
pub const SSH_FX_FILE_IS_A_DIRECTORY: u32 = 24;
pub const SSH_FX_BYTE_RANGE_LOCK_CONFLICT: u32 = 25;
pub const SSH_FX_BYTE_RANGE_LOCK_REFUSED: u32 = 26;
pub const SSH_FX_DELETE_PENDING: u32 = 27;
pub const SSH_FX_FILE_CORRUPT: u32 = 28;
pub const SSH_FX_OWNER_INVALID: u32 = 29;
pub const SSH_FX_GROUP_INVALID: u32 = 30;
pub const SSH_FX_NO_MATCHING_BYTE_RANGE_LOCK: u32 = 31;

// =============================================================================
// Attribute Flags
// =============================================================================

pub const SSH_FILEXFER_ATTR_SIZE: u32 = 0x00000001;
/// v3 only; the bit means OWNERGROUP from v4 on.
pub const SSH_FILEXFER_ATTR_UIDGID: u32 = 0x00000002;
pub const SSH_FILEXFER_ATTR_PERMISSIONS: u32 = 0x00000004;
/// v3 name for bit 3; v4+ call it ACCESSTIME.
pub const SSH_FILEXFER_ATTR_ACMODTIME: u32 = 0x00000008;
pub const SSH_FILEXFER_ATTR_ACCESSTIME: u32 = 0x00000008;
pub const SSH_FILEXFER_ATTR_CREATETIME: u32 = 0x00000010;
pub const SSH_FILEXFER_ATTR_MODIFYTIME: u32 = 0x00000020;
pub const SSH_FILEXFER_ATTR_ACL: u32 = 0x00000040;
pub const SSH_FILEXFER_ATTR_OWNERGROUP: u32 = 0x00000080;
pub const SSH_FILEXFER_ATTR_SUBSECOND_TIMES: u32 = 0x00000100;
pub const SSH_FILEXFER_ATTR_BITS: u32 = 0x00000200;
pub const SSH_FILEXFER_ATTR_ALLOCATION_SIZE: u32 = 0x00000400;
pub const SSH_FILEXFER_ATTR_TEXT_HINT: u32 = 0x00000800;
pub const SSH_FILEXFER_ATTR_MIME_TYPE: u32 = 0x00001000;
pub const SSH_FILEXFER_ATTR_LINK_COUNT: u32 = 0x00002000;
pub const SSH_FILEXFER_ATTR_UNTRANSLATED_NAME: u32 = 0x00004000;
pub const SSH_FILEXFER_ATTR_CTIME: u32 = 0x00008000;
pub const SSH_FILEXFER_ATTR_EXTENDED: u32 = 0x80000000;

// =============================================================================
// File Types (v4+)
// =============================================================================

pub const SSH_FILEXFER_TYPE_REGULAR: u8 = 1;
pub const SSH_FILEXFER_TYPE_DIRECTORY: u8 = 2;
pub const SSH_FILEXFER_TYPE_SYMLINK: u8 = 3;
pub const SSH_FILEXFER_TYPE_SPECIAL: u8 = 4;
pub const SSH_FILEXFER_TYPE_UNKNOWN: u8 = 5;
pub const SSH_FILEXFER_TYPE_SOCKET: u8 = 6;
pub const SSH_FILEXFER_TYPE_CHAR_DEVICE: u8 = 7;
pub const SSH_FILEXFER_TYPE_BLOCK_DEVICE: u8 = 8;
pub const SSH_FILEXFER_TYPE_FIFO: u8 = 9;

// =============================================================================
// Open Flags (v3)
// =============================================================================

pub const SSH_FXF_READ: u32 = 0x00000001;
pub const SSH_FXF_WRITE: u32 = 0x00000002;
pub const SSH_FXF_APPEND: u32 = 0x00000004;
pub const SSH_FXF_CREAT: u32 = 0x00000008;
pub const SSH_FXF_TRUNC: u32 = 0x00000010;
pub const SSH_FXF_EXCL: u32 = 0x00000020;

// =============================================================================
// Open Flags (v5+)
// =============================================================================

/// Mask over the three disposition bits.
pub const SSH_FXF_ACCESS_DISPOSITION: u32 = 0x00000007;
pub const SSH_FXF_CREATE_NEW: u32 = 0x00000000;
pub const SSH_FXF_CREATE_TRUNCATE: u32 = 0x00000001;
pub const SSH_FXF_OPEN_EXISTING: u32 = 0x00000002;
pub const SSH_FXF_OPEN_OR_CREATE: u32 = 0x00000003;
pub const SSH_FXF_TRUNCATE_EXISTING: u32 = 0x00000004;
pub const SSH_FXF_APPEND_DATA: u32 = 0x00000008;
pub const SSH_FXF_APPEND_DATA_ATOMIC: u32 = 0x00000010;
pub const SSH_FXF_TEXT_MODE: u32 = 0x00000020;
pub const SSH_FXF_NOFOLLOW: u32 = 0x00000400;
pub const SSH_FXF_DELETE_ON_CLOSE: u32 = 0x00000800;

// =============================================================================
// ACE4 Access Mask Bits (v5+)
// =============================================================================

pub const ACE4_READ_DATA: u32 = 0x00000001;
pub const ACE4_WRITE_DATA: u32 = 0x00000002;
pub const ACE4_APPEND_DATA: u32 = 0x00000004;

// =============================================================================
// Attrib Bits (v6)
// =============================================================================

pub const SSH_FILEXFER_ATTR_FLAGS_HIDDEN: u32 = 0x00000004;

// =============================================================================
// Rename Flags (v5+)
// =============================================================================

pub const SSH_FXF_RENAME_OVERWRITE: u32 = 0x00000001;
pub const SSH_FXF_RENAME_ATOMIC: u32 = 0x00000002;
pub const SSH_FXF_RENAME_NATIVE: u32 = 0x00000004;

// =============================================================================
// Server Identity
// =============================================================================

/// Vendor name sent in the `vendor-id` VERSION extension.
pub const VENDOR_NAME: &str = "oxsftp project";

/// Product name sent in the `vendor-id` VERSION extension.
pub const PRODUCT_NAME: &str = "oxsftp";

/// Extension documenting the argument order we expect for SSH_FXP_SYMLINK.
pub const EXT_SYMLINK_ORDER: &str = "symlink-order@oxsftp.org";

/// Extension documenting the argument order we expect for SSH_FXP_LINK.
pub const EXT_LINK_ORDER: &str = "link-order@oxsftp.org";

// =============================================================================
// Engine Tunables
// =============================================================================

/// Default worker pool size. The pool bound is configurable; four workers is
/// the historical default for this kind of server.
pub const DEFAULT_WORKERS: usize = 4;

/// Bound on the pending-job queue feeding the pool. A full queue blocks the
/// reader, propagating flow control back to the peer.
pub const WORK_QUEUE_DEPTH: usize = 64;

/// Maximum accepted inbound packet size. The largest legal SFTP request body
/// is a WRITE chunk well under this; a hostile length prefix must not be able
/// to drive allocation.
pub const MAX_PACKET_SIZE: usize = 256 * 1024;

/// Upper bound on the data returned for a single READ. max-read-size is
/// advertised as 0, so short reads are always legal.
pub const MAX_READ_LEN: usize = 256 * 1024;

/// Directory entries returned per READDIR response.
pub const READDIR_BATCH: usize = 32;
