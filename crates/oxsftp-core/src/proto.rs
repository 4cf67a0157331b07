//! Per-version protocol descriptors.
//!
//! Each negotiated version is described by an immutable table: the commands
//! it accepts (sorted ascending by type byte for binary search), the highest
//! status code its clients understand, the capability bits advertised in
//! VERSION, and the extension names listed in `supported`/`supported2`.
//!
//! Dispatch starts from [`PRE_INIT`], which accepts only INIT; the INIT
//! handler swaps in the negotiated table exactly once.

use crate::constants::*;

/// A dispatchable request, the target of a command-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Init,
    Open,
    Close,
    Read,
    Write,
    Lstat,
    Fstat,
    Setstat,
    Fsetstat,
    Opendir,
    Readdir,
    Remove,
    Mkdir,
    Rmdir,
    Realpath,
    Stat,
    Rename,
    Readlink,
    Symlink,
    Link,
    Extended,
}

/// One command-table entry.
#[derive(Debug, Clone, Copy)]
pub struct CommandEntry {
    pub type_code: u8,
    pub command: Command,
}

const fn cmd(type_code: u8, command: Command) -> CommandEntry {
    CommandEntry { type_code, command }
}

/// Immutable description of one protocol version.
#[derive(Debug)]
pub struct ProtocolDescriptor {
    /// Version number advertised in the VERSION response.
    pub version: u32,
    /// Accepted commands, ascending by type byte.
    pub commands: &'static [CommandEntry],
    /// Highest status code this version defines; larger codes are clamped
    /// to SSH_FX_FAILURE before emission.
    pub max_status: u32,
    /// Attribute bits advertised in `supported`/`supported2`.
    pub attr_bits: u32,
    /// Open-flag bits advertised in `supported`/`supported2`.
    pub open_flags: u32,
    /// Advertised supported-access-mask.
    pub access_mask: u32,
    /// Extension names listed in `supported`/`supported2`.
    pub extensions: &'static [&'static str],
}

impl ProtocolDescriptor {
    /// Binary-search the command table by type byte.
    pub fn lookup(&self, type_code: u8) -> Option<Command> {
        self.commands
            .binary_search_by_key(&type_code, |entry| entry.type_code)
            .ok()
            .map(|i| self.commands[i].command)
    }

    /// True for the sentinel table active before INIT succeeds.
    pub fn is_pre_init(&self) -> bool {
        std::ptr::eq(self, &PRE_INIT)
    }
}

/// Pick the descriptor for a client-advertised version. Versions 0-2 are
/// refused; anything at or above 6 negotiates 6 (we never negotiate down;
/// a v6 client may follow up with `version-select`).
pub fn select(version: u32) -> Option<&'static ProtocolDescriptor> {
    match version {
        0..=2 => None,
        3 => Some(&V3),
        4 => Some(&V4),
        5 => Some(&V5),
        _ => Some(&V6),
    }
}

const ATTR_BITS_V5: u32 = SSH_FILEXFER_ATTR_SIZE
    | SSH_FILEXFER_ATTR_PERMISSIONS
    | SSH_FILEXFER_ATTR_ACCESSTIME
    | SSH_FILEXFER_ATTR_MODIFYTIME
    | SSH_FILEXFER_ATTR_OWNERGROUP
    | SSH_FILEXFER_ATTR_SUBSECOND_TIMES;

const OPEN_FLAGS_V5: u32 = SSH_FXF_ACCESS_DISPOSITION
    | SSH_FXF_APPEND_DATA
    | SSH_FXF_APPEND_DATA_ATOMIC
    | SSH_FXF_TEXT_MODE;

const OPEN_FLAGS_V6: u32 = OPEN_FLAGS_V5 | SSH_FXF_NOFOLLOW | SSH_FXF_DELETE_ON_CLOSE;

static PRE_INIT_COMMANDS: [CommandEntry; 1] = [cmd(SSH_FXP_INIT, Command::Init)];

// INIT stays in every table so that a repeated INIT reaches the init
// handler, which refuses it with SSH_FX_FAILURE.
static V3_COMMANDS: [CommandEntry; 20] = [
    cmd(SSH_FXP_INIT, Command::Init),
    cmd(SSH_FXP_OPEN, Command::Open),
    cmd(SSH_FXP_CLOSE, Command::Close),
    cmd(SSH_FXP_READ, Command::Read),
    cmd(SSH_FXP_WRITE, Command::Write),
    cmd(SSH_FXP_LSTAT, Command::Lstat),
    cmd(SSH_FXP_FSTAT, Command::Fstat),
    cmd(SSH_FXP_SETSTAT, Command::Setstat),
    cmd(SSH_FXP_FSETSTAT, Command::Fsetstat),
    cmd(SSH_FXP_OPENDIR, Command::Opendir),
    cmd(SSH_FXP_READDIR, Command::Readdir),
    cmd(SSH_FXP_REMOVE, Command::Remove),
    cmd(SSH_FXP_MKDIR, Command::Mkdir),
    cmd(SSH_FXP_RMDIR, Command::Rmdir),
    cmd(SSH_FXP_REALPATH, Command::Realpath),
    cmd(SSH_FXP_STAT, Command::Stat),
    cmd(SSH_FXP_RENAME, Command::Rename),
    cmd(SSH_FXP_READLINK, Command::Readlink),
    cmd(SSH_FXP_SYMLINK, Command::Symlink),
    cmd(SSH_FXP_EXTENDED, Command::Extended),
];

// v6 replaces SYMLINK with LINK.
static V6_COMMANDS: [CommandEntry; 20] = [
    cmd(SSH_FXP_INIT, Command::Init),
    cmd(SSH_FXP_OPEN, Command::Open),
    cmd(SSH_FXP_CLOSE, Command::Close),
    cmd(SSH_FXP_READ, Command::Read),
    cmd(SSH_FXP_WRITE, Command::Write),
    cmd(SSH_FXP_LSTAT, Command::Lstat),
    cmd(SSH_FXP_FSTAT, Command::Fstat),
    cmd(SSH_FXP_SETSTAT, Command::Setstat),
    cmd(SSH_FXP_FSETSTAT, Command::Fsetstat),
    cmd(SSH_FXP_OPENDIR, Command::Opendir),
    cmd(SSH_FXP_READDIR, Command::Readdir),
    cmd(SSH_FXP_REMOVE, Command::Remove),
    cmd(SSH_FXP_MKDIR, Command::Mkdir),
    cmd(SSH_FXP_RMDIR, Command::Rmdir),
    cmd(SSH_FXP_REALPATH, Command::Realpath),
    cmd(SSH_FXP_STAT, Command::Stat),
    cmd(SSH_FXP_RENAME, Command::Rename),
    cmd(SSH_FXP_READLINK, Command::Readlink),
    cmd(SSH_FXP_LINK, Command::Link),
    cmd(SSH_FXP_EXTENDED, Command::Extended),
];

/// Sentinel descriptor active until INIT succeeds.
pub static PRE_INIT: ProtocolDescriptor = ProtocolDescriptor {
    version: 3,
    commands: &PRE_INIT_COMMANDS,
    max_status: SSH_FX_OP_UNSUPPORTED,
    attr_bits: 0,
    open_flags: 0,
    access_mask: 0,
    extensions: &[],
};

pub static V3: ProtocolDescriptor = ProtocolDescriptor {
    version: 3,
    commands: &V3_COMMANDS,
    max_status: SSH_FX_OP_UNSUPPORTED,
    attr_bits: 0,
    open_flags: 0,
    access_mask: 0,
    extensions: &[],
};

pub static V4: ProtocolDescriptor = ProtocolDescriptor {
    version: 4,
    commands: &V3_COMMANDS,
    max_status: SSH_FX_NO_MEDIA,
    attr_bits: 0,
    open_flags: 0,
    access_mask: 0,
    extensions: &[],
};

pub static V5: ProtocolDescriptor = ProtocolDescriptor {
    version: 5,
    commands: &V3_COMMANDS,
    max_status: SSH_FX_LOCK_CONFLICT,
    attr_bits: ATTR_BITS_V5,
    open_flags: OPEN_FLAGS_V5,
    access_mask: 0xFFFF_FFFF,
    extensions: &["space-available"],
};

pub static V6: ProtocolDescriptor = ProtocolDescriptor {
    version: 6,
    commands: &V6_COMMANDS,
    max_status: SSH_FX_NO_MATCHING_BYTE_RANGE_LOCK,
    attr_bits: ATTR_BITS_V5,
    open_flags: OPEN_FLAGS_V6,
    access_mask: 0xFFFF_FFFF,
    extensions: &["space-available"],
};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_sorted(desc: &ProtocolDescriptor) {
        for pair in desc.commands.windows(2) {
            assert!(
                pair[0].type_code < pair[1].type_code,
                "v{} table out of order at type {}",
                desc.version,
                pair[1].type_code
            );
        }
    }

    #[test]
    fn command_tables_are_sorted() {
        for desc in [&PRE_INIT, &V3, &V4, &V5, &V6] {
            assert_sorted(desc);
        }
    }

    #[test]
    fn lookup_finds_every_entry() {
        for entry in V6.commands {
            assert_eq!(V6.lookup(entry.type_code), Some(entry.command));
        }
    }

    #[test]
    fn lookup_misses_unknown_types() {
        assert_eq!(V3.lookup(0xFE), None);
        assert_eq!(PRE_INIT.lookup(SSH_FXP_OPEN), None);
    }

    #[test]
    fn selection_rules() {
        assert!(select(0).is_none());
        assert!(select(1).is_none());
        assert!(select(2).is_none());
        assert_eq!(select(3).unwrap().version, 3);
        assert_eq!(select(4).unwrap().version, 4);
        assert_eq!(select(5).unwrap().version, 5);
        assert_eq!(select(6).unwrap().version, 6);
        // We do not negotiate down from futures we don't know.
        assert_eq!(select(17).unwrap().version, 6);
    }

    #[test]
    fn symlink_is_v3_to_v5_only() {
        assert_eq!(V3.lookup(SSH_FXP_SYMLINK), Some(Command::Symlink));
        assert_eq!(V5.lookup(SSH_FXP_SYMLINK), Some(Command::Symlink));
        assert_eq!(V6.lookup(SSH_FXP_SYMLINK), None);
        assert_eq!(V6.lookup(SSH_FXP_LINK), Some(Command::Link));
        assert_eq!(V3.lookup(SSH_FXP_LINK), None);
    }

    #[test]
    fn max_status_grows_with_version() {
        assert_eq!(V3.max_status, 8);
        assert_eq!(V4.max_status, 13);
        assert_eq!(V5.max_status, 17);
        assert_eq!(V6.max_status, 31);
    }

    #[test]
    fn pre_init_identity() {
        assert!(PRE_INIT.is_pre_init());
        assert!(!V3.is_pre_init());
    }
}
