//! File attribute codec.
//!
//! Two wire layouts exist: v3 (flags + optional fixed fields) and v4+
//! (flags + type byte + optional fields, timestamps widened to 64 bits with
//! optional nanoseconds). Decode accepts everything a version legally allows
//! and records the raw flag word so handlers can refuse what they cannot
//! honor; encode emits only the fields that are set.

use crate::constants::*;
use crate::wire::{PacketBuilder, PacketCursor, WireError};

/// A protocol timestamp. Nanoseconds ride along only when the subsecond
/// flag is negotiated into the attribute block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub seconds: u64,
    pub nanoseconds: Option<u32>,
}

impl Timestamp {
    pub fn new(seconds: u64) -> Self {
        Self {
            seconds,
            nanoseconds: None,
        }
    }

    pub fn with_nanos(seconds: u64, nanoseconds: u32) -> Self {
        Self {
            seconds,
            nanoseconds: Some(nanoseconds),
        }
    }
}

/// Decoded (or to-be-encoded) file attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileAttributes {
    /// Raw flag word as received; zero when built locally.
    pub valid: u32,
    /// SSH_FILEXFER_TYPE_* (v4+; v3 has no type byte).
    pub kind: Option<u8>,
    pub size: Option<u64>,
    pub uid_gid: Option<(u32, u32)>,
    pub owner_group: Option<(String, String)>,
    /// Full mode word including the file-type bits, as stat reports it.
    pub permissions: Option<u32>,
    pub atime: Option<Timestamp>,
    pub mtime: Option<Timestamp>,
    pub ctime: Option<Timestamp>,
    pub link_count: Option<u32>,
}

/// Flag bits a v3 peer may set.
const V3_VALID_MASK: u32 = SSH_FILEXFER_ATTR_SIZE
    | SSH_FILEXFER_ATTR_UIDGID
    | SSH_FILEXFER_ATTR_PERMISSIONS
    | SSH_FILEXFER_ATTR_ACMODTIME
    | SSH_FILEXFER_ATTR_EXTENDED;

/// Flag bits a v4/v5 peer may set.
const V4_VALID_MASK: u32 = SSH_FILEXFER_ATTR_SIZE
    | SSH_FILEXFER_ATTR_OWNERGROUP
    | SSH_FILEXFER_ATTR_PERMISSIONS
    | SSH_FILEXFER_ATTR_ACCESSTIME
    | SSH_FILEXFER_ATTR_CREATETIME
    | SSH_FILEXFER_ATTR_MODIFYTIME
    | SSH_FILEXFER_ATTR_SUBSECOND_TIMES
    | SSH_FILEXFER_ATTR_ACL
    | SSH_FILEXFER_ATTR_EXTENDED;

/// Flag bits a v6 peer may set.
const V6_VALID_MASK: u32 = V4_VALID_MASK
    | SSH_FILEXFER_ATTR_BITS
    | SSH_FILEXFER_ATTR_ALLOCATION_SIZE
    | SSH_FILEXFER_ATTR_TEXT_HINT
    | SSH_FILEXFER_ATTR_MIME_TYPE
    | SSH_FILEXFER_ATTR_LINK_COUNT
    | SSH_FILEXFER_ATTR_UNTRANSLATED_NAME
    | SSH_FILEXFER_ATTR_CTIME;

impl FileAttributes {
    /// Decode one attribute block for the given protocol version.
    pub fn decode(version: u32, cursor: &mut PacketCursor) -> Result<Self, WireError> {
        if version <= 3 {
            Self::decode_v3(cursor)
        } else {
            Self::decode_v4(version, cursor)
        }
    }

    fn decode_v3(cursor: &mut PacketCursor) -> Result<Self, WireError> {
        let flags = cursor.u32()?;
        if flags & !V3_VALID_MASK != 0 {
            return Err(WireError::Invalid("attribute flags"));
        }
        let mut attrs = Self {
            valid: flags,
            ..Self::default()
        };
        if flags & SSH_FILEXFER_ATTR_SIZE != 0 {
            attrs.size = Some(cursor.u64()?);
        }
        if flags & SSH_FILEXFER_ATTR_UIDGID != 0 {
            attrs.uid_gid = Some((cursor.u32()?, cursor.u32()?));
        }
        if flags & SSH_FILEXFER_ATTR_PERMISSIONS != 0 {
            attrs.permissions = Some(cursor.u32()?);
        }
        if flags & SSH_FILEXFER_ATTR_ACMODTIME != 0 {
            attrs.atime = Some(Timestamp::new(u64::from(cursor.u32()?)));
            attrs.mtime = Some(Timestamp::new(u64::from(cursor.u32()?)));
        }
        skip_extended_pairs(flags, cursor)?;
        Ok(attrs)
    }

    fn decode_v4(version: u32, cursor: &mut PacketCursor) -> Result<Self, WireError> {
        let flags = cursor.u32()?;
        let mask = if version >= 6 {
            V6_VALID_MASK
        } else {
            V4_VALID_MASK
        };
        if flags & !mask != 0 {
            return Err(WireError::Invalid("attribute flags"));
        }
        let subsecond = flags & SSH_FILEXFER_ATTR_SUBSECOND_TIMES != 0;
        let time = |cursor: &mut PacketCursor| -> Result<Timestamp, WireError> {
            let seconds = cursor.u64()?;
            let nanoseconds = if subsecond { Some(cursor.u32()?) } else { None };
            Ok(Timestamp {
                seconds,
                nanoseconds,
            })
        };

        let mut attrs = Self {
            valid: flags,
            kind: Some(cursor.u8()?),
            ..Self::default()
        };
        if flags & SSH_FILEXFER_ATTR_SIZE != 0 {
            attrs.size = Some(cursor.u64()?);
        }
        if flags & SSH_FILEXFER_ATTR_ALLOCATION_SIZE != 0 {
            cursor.u64()?;
        }
        if flags & SSH_FILEXFER_ATTR_OWNERGROUP != 0 {
            attrs.owner_group = Some((cursor.utf8()?, cursor.utf8()?));
        }
        if flags & SSH_FILEXFER_ATTR_PERMISSIONS != 0 {
            attrs.permissions = Some(cursor.u32()?);
        }
        if flags & SSH_FILEXFER_ATTR_ACCESSTIME != 0 {
            attrs.atime = Some(time(cursor)?);
        }
        if flags & SSH_FILEXFER_ATTR_CREATETIME != 0 {
            time(cursor)?;
        }
        if flags & SSH_FILEXFER_ATTR_MODIFYTIME != 0 {
            attrs.mtime = Some(time(cursor)?);
        }
        if flags & SSH_FILEXFER_ATTR_CTIME != 0 {
            attrs.ctime = Some(time(cursor)?);
        }
        if flags & SSH_FILEXFER_ATTR_ACL != 0 {
            cursor.bytes()?;
        }
        if flags & SSH_FILEXFER_ATTR_BITS != 0 {
            cursor.u32()?;
            cursor.u32()?;
        }
        if flags & SSH_FILEXFER_ATTR_TEXT_HINT != 0 {
            cursor.u8()?;
        }
        if flags & SSH_FILEXFER_ATTR_MIME_TYPE != 0 {
            cursor.bytes()?;
        }
        if flags & SSH_FILEXFER_ATTR_LINK_COUNT != 0 {
            attrs.link_count = Some(cursor.u32()?);
        }
        if flags & SSH_FILEXFER_ATTR_UNTRANSLATED_NAME != 0 {
            cursor.bytes()?;
        }
        skip_extended_pairs(flags, cursor)?;
        Ok(attrs)
    }

    /// Encode for the given protocol version.
    pub fn encode(&self, version: u32, out: &mut PacketBuilder) {
        if version <= 3 {
            self.encode_v3(out)
        } else {
            self.encode_v4(version, out)
        }
    }

    fn encode_v3(&self, out: &mut PacketBuilder) {
        let mut flags = 0;
        if self.size.is_some() {
            flags |= SSH_FILEXFER_ATTR_SIZE;
        }
        if self.uid_gid.is_some() {
            flags |= SSH_FILEXFER_ATTR_UIDGID;
        }
        if self.permissions.is_some() {
            flags |= SSH_FILEXFER_ATTR_PERMISSIONS;
        }
        if self.atime.is_some() && self.mtime.is_some() {
            flags |= SSH_FILEXFER_ATTR_ACMODTIME;
        }
        out.u32(flags);
        if let Some(size) = self.size {
            out.u64(size);
        }
        if let Some((uid, gid)) = self.uid_gid {
            out.u32(uid);
            out.u32(gid);
        }
        if let Some(permissions) = self.permissions {
            out.u32(permissions);
        }
        if let (Some(atime), Some(mtime)) = (self.atime, self.mtime) {
            out.u32(atime.seconds as u32);
            out.u32(mtime.seconds as u32);
        }
    }

    fn encode_v4(&self, version: u32, out: &mut PacketBuilder) {
        let times = [self.atime, self.mtime, self.ctime];
        let present = times.iter().flatten().count();
        let subsecond =
            present > 0 && times.iter().flatten().all(|t| t.nanoseconds.is_some());

        let mut flags = 0;
        if self.size.is_some() {
            flags |= SSH_FILEXFER_ATTR_SIZE;
        }
        if self.owner_group.is_some() {
            flags |= SSH_FILEXFER_ATTR_OWNERGROUP;
        }
        if self.permissions.is_some() {
            flags |= SSH_FILEXFER_ATTR_PERMISSIONS;
        }
        if self.atime.is_some() {
            flags |= SSH_FILEXFER_ATTR_ACCESSTIME;
        }
        if self.mtime.is_some() {
            flags |= SSH_FILEXFER_ATTR_MODIFYTIME;
        }
        if self.ctime.is_some() && version >= 6 {
            flags |= SSH_FILEXFER_ATTR_CTIME;
        }
        if self.link_count.is_some() && version >= 6 {
            flags |= SSH_FILEXFER_ATTR_LINK_COUNT;
        }
        if subsecond {
            flags |= SSH_FILEXFER_ATTR_SUBSECOND_TIMES;
        }

        let time = |out: &mut PacketBuilder, t: Timestamp| {
            out.u64(t.seconds);
            if subsecond {
                out.u32(t.nanoseconds.unwrap_or(0));
            }
        };

        out.u32(flags);
        out.u8(self.kind.unwrap_or(SSH_FILEXFER_TYPE_UNKNOWN));
        if let Some(size) = self.size {
            out.u64(size);
        }
        if let Some((owner, group)) = &self.owner_group {
            out.str(owner);
            out.str(group);
        }
        if let Some(permissions) = self.permissions {
            out.u32(permissions);
        }
        if let Some(atime) = self.atime {
            time(out, atime);
        }
        if let Some(mtime) = self.mtime {
            time(out, mtime);
        }
        if flags & SSH_FILEXFER_ATTR_CTIME != 0 {
            time(out, self.ctime.expect("ctime flag implies ctime"));
        }
        if flags & SSH_FILEXFER_ATTR_LINK_COUNT != 0 {
            out.u32(self.link_count.expect("link-count flag implies link count"));
        }
    }
}

/// Consume extended (name, data) pairs a client may append.
fn skip_extended_pairs(flags: u32, cursor: &mut PacketCursor) -> Result<(), WireError> {
    if flags & SSH_FILEXFER_ATTR_EXTENDED != 0 {
        let count = cursor.u32()?;
        for _ in 0..count {
            cursor.bytes()?;
            cursor.bytes()?;
        }
    }
    Ok(())
}

/// SSH_FILEXFER_TYPE_* for a Unix mode word.
pub fn kind_from_mode(mode: u32) -> u8 {
    match mode & 0o170000 {
        0o010000 => SSH_FILEXFER_TYPE_FIFO,
        0o020000 => SSH_FILEXFER_TYPE_CHAR_DEVICE,
        0o040000 => SSH_FILEXFER_TYPE_DIRECTORY,
        0o060000 => SSH_FILEXFER_TYPE_BLOCK_DEVICE,
        0o100000 => SSH_FILEXFER_TYPE_REGULAR,
        0o120000 => SSH_FILEXFER_TYPE_SYMLINK,
        0o140000 => SSH_FILEXFER_TYPE_SOCKET,
        _ => SSH_FILEXFER_TYPE_SPECIAL,
    }
}

#[cfg(unix)]
impl FileAttributes {
    /// Build attributes from stat results.
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        let ts = |secs: i64, nsec: i64| {
            Timestamp::with_nanos(secs.max(0) as u64, nsec.clamp(0, 999_999_999) as u32)
        };
        Self {
            valid: 0,
            kind: Some(kind_from_mode(meta.mode())),
            size: Some(meta.size()),
            uid_gid: Some((meta.uid(), meta.gid())),
            owner_group: None,
            permissions: Some(meta.mode()),
            atime: Some(ts(meta.atime(), meta.atime_nsec())),
            mtime: Some(ts(meta.mtime(), meta.mtime_nsec())),
            ctime: Some(ts(meta.ctime(), meta.ctime_nsec())),
            link_count: Some(meta.nlink() as u32),
        }
    }
}

// =============================================================================
// v3 longname formatting
// =============================================================================

/// Format the `ls -l`-style longname v3 NAME entries carry. `now_seconds`
/// decides whether the timestamp shows a clock time (same year) or a year.
pub fn format_longname(attrs: &FileAttributes, name: &str, now_seconds: u64) -> String {
    let mut perms = String::with_capacity(10);
    perms.push(type_char(attrs));
    match attrs.permissions {
        Some(mode) => {
            for shift in [6u32, 3, 0] {
                let bits = mode >> shift;
                perms.push(if bits & 0o4 != 0 { 'r' } else { '-' });
                perms.push(if bits & 0o2 != 0 { 'w' } else { '-' });
                perms.push(if bits & 0o1 != 0 { 'x' } else { '-' });
            }
        }
        None => perms.push_str("?????????"),
    }

    let links = attrs
        .link_count
        .map_or_else(|| "?".into(), |n| n.to_string());
    let size = attrs.size.map_or_else(|| "?".into(), |n| n.to_string());
    let (owner, group) = match (&attrs.owner_group, attrs.uid_gid) {
        (Some((owner, group)), _) => (owner.clone(), group.clone()),
        (None, Some((uid, gid))) => (uid.to_string(), gid.to_string()),
        (None, None) => ("?".into(), "?".into()),
    };
    let date = attrs
        .mtime
        .map_or_else(|| "?".into(), |t| format_date(t.seconds, now_seconds));

    format!("{perms:>10.10} {links:>3.3} {owner:<8.8} {group:<8.8} {size:>8.8} {date:>12.12} {name}")
}

fn type_char(attrs: &FileAttributes) -> char {
    let kind = attrs
        .kind
        .or_else(|| attrs.permissions.map(kind_from_mode))
        .unwrap_or(SSH_FILEXFER_TYPE_UNKNOWN);
    match kind {
        SSH_FILEXFER_TYPE_REGULAR => '-',
        SSH_FILEXFER_TYPE_DIRECTORY => 'd',
        SSH_FILEXFER_TYPE_SYMLINK => 'l',
        SSH_FILEXFER_TYPE_SOCKET => 's',
        SSH_FILEXFER_TYPE_CHAR_DEVICE => 'c',
        SSH_FILEXFER_TYPE_BLOCK_DEVICE => 'b',
        SSH_FILEXFER_TYPE_FIFO => 'p',
        _ => '?',
    }
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn format_date(seconds: u64, now_seconds: u64) -> String {
    let (year, month, day, hour, minute) = civil_from_unix(seconds);
    let (this_year, ..) = civil_from_unix(now_seconds);
    if year == this_year {
        format!("{} {:02} {:02}:{:02}", MONTHS[month - 1], day, hour, minute)
    } else {
        format!("{} {:02}  {}", MONTHS[month - 1], day, year)
    }
}

/// Unix seconds → (year, month 1-12, day 1-31, hour, minute), UTC.
fn civil_from_unix(seconds: u64) -> (i64, usize, u32, u32, u32) {
    let days = (seconds / 86_400) as i64;
    let rem = seconds % 86_400;
    // Civil-from-days, Gregorian calendar.
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let year = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as usize;
    let year = if month <= 2 { year + 1 } else { year };
    (year, month, day, (rem / 3600) as u32, (rem % 3600 / 60) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn roundtrip(version: u32, attrs: &FileAttributes) -> FileAttributes {
        let mut out = PacketBuilder::new();
        out.begin();
        attrs.encode(version, &mut out);
        let frame = out.end();
        let mut cursor = PacketCursor::new(Bytes::copy_from_slice(&frame[4..]));
        let decoded = FileAttributes::decode(version, &mut cursor).unwrap();
        assert_eq!(cursor.remaining(), 0, "decode must consume the block");
        decoded
    }

    #[test]
    fn v3_roundtrip() {
        let attrs = FileAttributes {
            size: Some(1024),
            uid_gid: Some((1000, 100)),
            permissions: Some(0o100644),
            atime: Some(Timestamp::new(1_700_000_000)),
            mtime: Some(Timestamp::new(1_700_000_100)),
            ..Default::default()
        };
        let decoded = roundtrip(3, &attrs);
        assert_eq!(decoded.size, Some(1024));
        assert_eq!(decoded.uid_gid, Some((1000, 100)));
        assert_eq!(decoded.permissions, Some(0o100644));
        assert_eq!(decoded.mtime.unwrap().seconds, 1_700_000_100);
    }

    #[test]
    fn v6_roundtrip_with_subseconds() {
        let attrs = FileAttributes {
            kind: Some(SSH_FILEXFER_TYPE_REGULAR),
            size: Some(7),
            owner_group: Some(("alice".into(), "users".into())),
            permissions: Some(0o100600),
            atime: Some(Timestamp::with_nanos(10, 1)),
            mtime: Some(Timestamp::with_nanos(20, 2)),
            ctime: Some(Timestamp::with_nanos(30, 3)),
            link_count: Some(2),
            ..Default::default()
        };
        let decoded = roundtrip(6, &attrs);
        assert_eq!(decoded.kind, Some(SSH_FILEXFER_TYPE_REGULAR));
        assert_eq!(decoded.owner_group, attrs.owner_group);
        assert_eq!(decoded.mtime, Some(Timestamp::with_nanos(20, 2)));
        assert_eq!(decoded.ctime, Some(Timestamp::with_nanos(30, 3)));
        assert_eq!(decoded.link_count, Some(2));
    }

    #[test]
    fn v4_drops_ctime_and_link_count() {
        let attrs = FileAttributes {
            kind: Some(SSH_FILEXFER_TYPE_REGULAR),
            ctime: Some(Timestamp::new(30)),
            link_count: Some(4),
            ..Default::default()
        };
        let decoded = roundtrip(4, &attrs);
        assert_eq!(decoded.ctime, None);
        assert_eq!(decoded.link_count, None);
    }

    #[test]
    fn v3_rejects_v6_flag_bits() {
        let mut out = PacketBuilder::new();
        out.begin();
        out.u32(SSH_FILEXFER_ATTR_CTIME);
        let frame = out.end();
        let mut cursor = PacketCursor::new(Bytes::copy_from_slice(&frame[4..]));
        assert!(matches!(
            FileAttributes::decode(3, &mut cursor),
            Err(WireError::Invalid(_))
        ));
    }

    #[test]
    fn decode_skips_extended_pairs() {
        let mut out = PacketBuilder::new();
        out.begin();
        out.u32(SSH_FILEXFER_ATTR_EXTENDED);
        out.u32(1);
        out.str("x@example.com");
        out.str("data");
        let frame = out.end();
        let mut cursor = PacketCursor::new(Bytes::copy_from_slice(&frame[4..]));
        let attrs = FileAttributes::decode(3, &mut cursor).unwrap();
        assert_eq!(attrs.size, None);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn truncated_attrs_fail() {
        let mut cursor = PacketCursor::new(Bytes::from_static(&[0, 0, 0]));
        assert!(FileAttributes::decode(3, &mut cursor).is_err());
    }

    #[test]
    fn kind_mapping() {
        assert_eq!(kind_from_mode(0o100644), SSH_FILEXFER_TYPE_REGULAR);
        assert_eq!(kind_from_mode(0o040755), SSH_FILEXFER_TYPE_DIRECTORY);
        assert_eq!(kind_from_mode(0o120777), SSH_FILEXFER_TYPE_SYMLINK);
    }

    #[test]
    fn longname_shape() {
        let attrs = FileAttributes {
            kind: Some(SSH_FILEXFER_TYPE_REGULAR),
            size: Some(1234),
            uid_gid: Some((1000, 100)),
            permissions: Some(0o100644),
            // 2021-01-01 00:00:00 UTC
            mtime: Some(Timestamp::new(1_609_459_200)),
            link_count: Some(1),
            ..Default::default()
        };
        // "now" in a different year, so the year is shown.
        let line = format_longname(&attrs, "hello.txt", 1_700_000_000);
        assert!(line.starts_with("-rw-r--r--"), "got {line:?}");
        assert!(line.ends_with("hello.txt"));
        assert!(line.contains("Jan 01  2021"), "got {line:?}");
        assert!(line.contains("1234"));
    }

    #[test]
    fn longname_same_year_shows_clock() {
        let attrs = FileAttributes {
            permissions: Some(0o100644),
            mtime: Some(Timestamp::new(1_609_459_260)), // 2021-01-01 00:01 UTC
            ..Default::default()
        };
        let line = format_longname(&attrs, "f", 1_612_137_600); // 2021-02-01
        assert!(line.contains("Jan 01 00:01"), "got {line:?}");
    }

    #[test]
    fn civil_conversion_known_dates() {
        assert_eq!(civil_from_unix(0), (1970, 1, 1, 0, 0));
        assert_eq!(civil_from_unix(951_782_400), (2000, 2, 29, 0, 0));
        assert_eq!(civil_from_unix(1_700_000_000), (2023, 11, 14, 22, 13));
    }
}
