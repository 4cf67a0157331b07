//! End-to-end tests: a real engine wired to the local-filesystem backend,
//! driven through an in-memory stream against a temporary directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::timeout;

use oxsftp_core::constants::*;
use oxsftp_core::wire::PacketCursor;
use oxsftp_core::{Engine, SessionConfig};
use oxsftp_server::backend::LocalBackend;

const TICK: Duration = Duration::from_secs(5);

struct Client {
    stream: DuplexStream,
}

impl Client {
    async fn start_with(config: SessionConfig, version: u32) -> Client {
        let (client_io, server_io) = duplex(1 << 18);
        let (server_read, server_write) = tokio::io::split(server_io);
        let engine = Engine::new(config, Arc::new(LocalBackend::new()), Box::new(server_write));
        tokio::spawn(engine.run(server_read));

        let mut client = Client { stream: client_io };
        let mut init = vec![SSH_FXP_INIT];
        init.extend_from_slice(&version.to_be_bytes());
        client.send(&init).await;
        let frame = client.recv().await;
        assert_eq!(frame[0], SSH_FXP_VERSION);
        client
    }

    async fn start(version: u32) -> Client {
        Self::start_with(SessionConfig::default(), version).await
    }

    async fn send(&mut self, payload: &[u8]) {
        self.stream
            .write_all(&(payload.len() as u32).to_be_bytes())
            .await
            .unwrap();
        self.stream.write_all(payload).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    async fn recv(&mut self) -> Bytes {
        let mut len_buf = [0u8; 4];
        timeout(TICK, self.stream.read_exact(&mut len_buf))
            .await
            .expect("timed out waiting for a response")
            .unwrap();
        let mut payload = vec![0u8; u32::from_be_bytes(len_buf) as usize];
        timeout(TICK, self.stream.read_exact(&mut payload))
            .await
            .expect("timed out reading response body")
            .unwrap();
        Bytes::from(payload)
    }

    async fn expect_status(&mut self, id: u32) -> u32 {
        let frame = self.recv().await;
        let mut cursor = PacketCursor::new(frame);
        assert_eq!(cursor.u8().unwrap(), SSH_FXP_STATUS);
        assert_eq!(cursor.u32().unwrap(), id);
        cursor.u32().unwrap()
    }

    async fn expect_handle(&mut self, id: u32) -> Bytes {
        let frame = self.recv().await;
        let mut cursor = PacketCursor::new(frame);
        assert_eq!(cursor.u8().unwrap(), SSH_FXP_HANDLE, "expected HANDLE");
        assert_eq!(cursor.u32().unwrap(), id);
        cursor.bytes().unwrap()
    }

    async fn expect_data(&mut self, id: u32) -> Bytes {
        let frame = self.recv().await;
        let mut cursor = PacketCursor::new(frame);
        assert_eq!(cursor.u8().unwrap(), SSH_FXP_DATA, "expected DATA");
        assert_eq!(cursor.u32().unwrap(), id);
        cursor.bytes().unwrap()
    }
}

fn put_str(buf: &mut Vec<u8>, s: &[u8]) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s);
}

fn path_req(type_code: u8, id: u32, path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    let mut buf = vec![type_code];
    buf.extend_from_slice(&id.to_be_bytes());
    put_str(&mut buf, path.as_os_str().as_bytes());
    buf
}

fn open_v3(id: u32, path: &Path, pflags: u32) -> Vec<u8> {
    let mut buf = path_req(SSH_FXP_OPEN, id, path);
    buf.extend_from_slice(&pflags.to_be_bytes());
    buf.extend_from_slice(&0u32.to_be_bytes()); // empty attrs
    buf
}

fn open_v6(id: u32, path: &Path, access: u32, flags: u32) -> Vec<u8> {
    let mut buf = path_req(SSH_FXP_OPEN, id, path);
    buf.extend_from_slice(&access.to_be_bytes());
    buf.extend_from_slice(&flags.to_be_bytes());
    buf.extend_from_slice(&0u32.to_be_bytes()); // attr flags
    buf.push(SSH_FILEXFER_TYPE_REGULAR);
    buf
}

fn handle_req(type_code: u8, id: u32, handle: &[u8]) -> Vec<u8> {
    let mut buf = vec![type_code];
    buf.extend_from_slice(&id.to_be_bytes());
    put_str(&mut buf, handle);
    buf
}

fn write_req(id: u32, handle: &[u8], offset: u64, data: &[u8]) -> Vec<u8> {
    let mut buf = handle_req(SSH_FXP_WRITE, id, handle);
    buf.extend_from_slice(&offset.to_be_bytes());
    put_str(&mut buf, data);
    buf
}

fn read_req(id: u32, handle: &[u8], offset: u64, len: u32) -> Vec<u8> {
    let mut buf = handle_req(SSH_FXP_READ, id, handle);
    buf.extend_from_slice(&offset.to_be_bytes());
    buf.extend_from_slice(&len.to_be_bytes());
    buf
}

fn two_path_req(type_code: u8, id: u32, first: &Path, second: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    let mut buf = path_req(type_code, id, first);
    put_str(&mut buf, second.as_os_str().as_bytes());
    buf
}

// =============================================================================
// File lifecycle
// =============================================================================

#[tokio::test]
async fn v3_create_write_read_close() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("hello.txt");
    let mut client = Client::start(3).await;

    client
        .send(&open_v3(
            1,
            &file,
            SSH_FXF_WRITE | SSH_FXF_CREAT | SSH_FXF_TRUNC,
        ))
        .await;
    let handle = client.expect_handle(1).await;

    client.send(&write_req(2, &handle, 0, b"hello world")).await;
    assert_eq!(client.expect_status(2).await, SSH_FX_OK);

    client.send(&handle_req(SSH_FXP_CLOSE, 3, &handle)).await;
    assert_eq!(client.expect_status(3).await, SSH_FX_OK);
    assert_eq!(std::fs::read(&file).unwrap(), b"hello world");

    // Reopen for reading, pull it back in two slices.
    client.send(&open_v3(4, &file, SSH_FXF_READ)).await;
    let handle = client.expect_handle(4).await;

    client.send(&read_req(5, &handle, 0, 5)).await;
    assert_eq!(client.expect_data(5).await.as_ref(), b"hello");

    client.send(&read_req(6, &handle, 6, 100)).await;
    assert_eq!(client.expect_data(6).await.as_ref(), b"world");

    client.send(&read_req(7, &handle, 100, 10)).await;
    assert_eq!(client.expect_status(7).await, SSH_FX_EOF);

    client.send(&handle_req(SSH_FXP_CLOSE, 8, &handle)).await;
    assert_eq!(client.expect_status(8).await, SSH_FX_OK);
}

#[tokio::test]
async fn v3_write_offsets_are_honored() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("sparse.bin");
    let mut client = Client::start(3).await;

    client
        .send(&open_v3(1, &file, SSH_FXF_WRITE | SSH_FXF_CREAT))
        .await;
    let handle = client.expect_handle(1).await;
    client.send(&write_req(2, &handle, 4, b"tail")).await;
    assert_eq!(client.expect_status(2).await, SSH_FX_OK);
    client.send(&write_req(3, &handle, 0, b"head")).await;
    assert_eq!(client.expect_status(3).await, SSH_FX_OK);
    client.send(&handle_req(SSH_FXP_CLOSE, 4, &handle)).await;
    client.expect_status(4).await;

    assert_eq!(std::fs::read(&file).unwrap(), b"headtail");
}

#[tokio::test]
async fn v3_open_missing_file_maps_no_such_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = Client::start(3).await;
    client
        .send(&open_v3(1, &dir.path().join("absent"), SSH_FXF_READ))
        .await;
    assert_eq!(client.expect_status(1).await, SSH_FX_NO_SUCH_FILE);
}

#[tokio::test]
async fn v3_exclusive_create_fails_on_existing() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("taken");
    std::fs::write(&file, b"x").unwrap();
    let mut client = Client::start(3).await;
    client
        .send(&open_v3(
            1,
            &file,
            SSH_FXF_WRITE | SSH_FXF_CREAT | SSH_FXF_EXCL,
        ))
        .await;
    // FILE_ALREADY_EXISTS post-dates v3, so the engine clamps it.
    assert_eq!(client.expect_status(1).await, SSH_FX_FAILURE);
}

#[tokio::test]
async fn stale_handle_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("f");
    let mut client = Client::start(3).await;
    client
        .send(&open_v3(1, &file, SSH_FXF_WRITE | SSH_FXF_CREAT))
        .await;
    let handle = client.expect_handle(1).await;
    client.send(&handle_req(SSH_FXP_CLOSE, 2, &handle)).await;
    client.expect_status(2).await;

    client.send(&read_req(3, &handle, 0, 4)).await;
    // SSH_FX_INVALID_HANDLE post-dates v3, so the client sees the clamp.
    assert_eq!(client.expect_status(3).await, SSH_FX_FAILURE);
}

// =============================================================================
// Stat family
// =============================================================================

#[tokio::test]
async fn v3_stat_reports_size_and_mode() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("stat-me");
    std::fs::write(&file, b"12345").unwrap();
    let mut client = Client::start(3).await;

    client.send(&path_req(SSH_FXP_STAT, 1, &file)).await;
    let frame = client.recv().await;
    let mut cursor = PacketCursor::new(frame);
    assert_eq!(cursor.u8().unwrap(), SSH_FXP_ATTRS);
    assert_eq!(cursor.u32().unwrap(), 1);
    let attrs = oxsftp_core::attrs::FileAttributes::decode(3, &mut cursor).unwrap();
    assert_eq!(attrs.size, Some(5));
    assert!(attrs.permissions.is_some());
    assert!(attrs.uid_gid.is_some());
}

#[tokio::test]
async fn v6_stat_reports_type_and_owner_names() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = Client::start(6).await;

    let mut req = path_req(SSH_FXP_STAT, 1, dir.path());
    req.extend_from_slice(&0u32.to_be_bytes()); // desired attrs
    client.send(&req).await;

    let frame = client.recv().await;
    let mut cursor = PacketCursor::new(frame);
    assert_eq!(cursor.u8().unwrap(), SSH_FXP_ATTRS);
    assert_eq!(cursor.u32().unwrap(), 1);
    let attrs = oxsftp_core::attrs::FileAttributes::decode(6, &mut cursor).unwrap();
    assert_eq!(attrs.kind, Some(SSH_FILEXFER_TYPE_DIRECTORY));
    assert!(attrs.mtime.is_some());
}

#[tokio::test]
async fn setstat_truncates_and_chmods() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("shrink");
    std::fs::write(&file, b"0123456789").unwrap();
    let mut client = Client::start(3).await;

    let mut req = path_req(SSH_FXP_SETSTAT, 1, &file);
    req.extend_from_slice(
        &(SSH_FILEXFER_ATTR_SIZE | SSH_FILEXFER_ATTR_PERMISSIONS).to_be_bytes(),
    );
    req.extend_from_slice(&4u64.to_be_bytes());
    req.extend_from_slice(&0o600u32.to_be_bytes());
    client.send(&req).await;
    assert_eq!(client.expect_status(1).await, SSH_FX_OK);

    use std::os::unix::fs::MetadataExt;
    let meta = std::fs::metadata(&file).unwrap();
    assert_eq!(meta.len(), 4);
    assert_eq!(meta.mode() & 0o7777, 0o600);
}

// =============================================================================
// Directories
// =============================================================================

#[tokio::test]
async fn mkdir_readdir_rmdir() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("sub");
    let mut client = Client::start(3).await;

    let mut req = path_req(SSH_FXP_MKDIR, 1, &sub);
    req.extend_from_slice(&0u32.to_be_bytes());
    client.send(&req).await;
    assert_eq!(client.expect_status(1).await, SSH_FX_OK);
    assert!(sub.is_dir());

    std::fs::write(sub.join("a"), b"1").unwrap();
    std::fs::write(sub.join("b"), b"2").unwrap();

    client.send(&path_req(SSH_FXP_OPENDIR, 2, &sub)).await;
    let handle = client.expect_handle(2).await;

    client.send(&handle_req(SSH_FXP_READDIR, 3, &handle)).await;
    let frame = client.recv().await;
    let mut cursor = PacketCursor::new(frame);
    assert_eq!(cursor.u8().unwrap(), SSH_FXP_NAME);
    assert_eq!(cursor.u32().unwrap(), 3);
    let count = cursor.u32().unwrap();
    assert_eq!(count, 2);
    let mut names = Vec::new();
    for _ in 0..count {
        names.push(cursor.utf8().unwrap());
        let longname = cursor.utf8().unwrap();
        assert!(longname.starts_with('-'), "longname {longname:?}");
        oxsftp_core::attrs::FileAttributes::decode(3, &mut cursor).unwrap();
    }
    names.sort();
    assert_eq!(names, vec!["a", "b"]);

    // A drained scan answers EOF.
    client.send(&handle_req(SSH_FXP_READDIR, 4, &handle)).await;
    assert_eq!(client.expect_status(4).await, SSH_FX_EOF);

    client.send(&handle_req(SSH_FXP_CLOSE, 5, &handle)).await;
    client.expect_status(5).await;

    std::fs::remove_file(sub.join("a")).unwrap();
    std::fs::remove_file(sub.join("b")).unwrap();
    client.send(&path_req(SSH_FXP_RMDIR, 6, &sub)).await;
    assert_eq!(client.expect_status(6).await, SSH_FX_OK);
    assert!(!sub.exists());
}

// =============================================================================
// Namespace operations
// =============================================================================

#[tokio::test]
async fn rename_refuses_existing_target_in_v3() {
    let dir = tempfile::tempdir().unwrap();
    let from = dir.path().join("from");
    let to = dir.path().join("to");
    std::fs::write(&from, b"a").unwrap();
    std::fs::write(&to, b"b").unwrap();
    let mut client = Client::start(3).await;

    client.send(&two_path_req(SSH_FXP_RENAME, 1, &from, &to)).await;
    // FILE_ALREADY_EXISTS clamps to FAILURE for a v3 client.
    assert_eq!(client.expect_status(1).await, SSH_FX_FAILURE);

    std::fs::remove_file(&to).unwrap();
    client.send(&two_path_req(SSH_FXP_RENAME, 2, &from, &to)).await;
    assert_eq!(client.expect_status(2).await, SSH_FX_OK);
    assert!(to.exists() && !from.exists());
}

#[tokio::test]
async fn remove_missing_file_maps_no_such_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = Client::start(3).await;
    client
        .send(&path_req(SSH_FXP_REMOVE, 1, &dir.path().join("ghost")))
        .await;
    assert_eq!(client.expect_status(1).await, SSH_FX_NO_SUCH_FILE);
}

#[tokio::test]
async fn symlink_and_readlink_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("target");
    let link = dir.path().join("link");
    std::fs::write(&target, b"t").unwrap();
    let mut client = Client::start(3).await;

    // Default order: linkpath first, targetpath second.
    client.send(&two_path_req(SSH_FXP_SYMLINK, 1, &link, &target)).await;
    assert_eq!(client.expect_status(1).await, SSH_FX_OK);
    assert_eq!(std::fs::read_link(&link).unwrap(), target);

    client.send(&path_req(SSH_FXP_READLINK, 2, &link)).await;
    let frame = client.recv().await;
    let mut cursor = PacketCursor::new(frame);
    assert_eq!(cursor.u8().unwrap(), SSH_FXP_NAME);
    assert_eq!(cursor.u32().unwrap(), 2);
    assert_eq!(cursor.u32().unwrap(), 1);
    let reported = cursor.utf8().unwrap();
    assert_eq!(Path::new(&reported), target);
}

#[tokio::test]
async fn reverse_symlink_swaps_argument_order() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("target");
    let link = dir.path().join("link");
    std::fs::write(&target, b"t").unwrap();
    let config = SessionConfig {
        reverse_symlink: true,
        ..SessionConfig::default()
    };
    let mut client = Client::start_with(config, 3).await;

    // Reversed order: targetpath first, linkpath second.
    client.send(&two_path_req(SSH_FXP_SYMLINK, 1, &target, &link)).await;
    assert_eq!(client.expect_status(1).await, SSH_FX_OK);
    assert_eq!(std::fs::read_link(&link).unwrap(), target);
}

#[tokio::test]
async fn realpath_resolves_dots() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().canonicalize().unwrap();
    let messy = canonical.join("./sub/..");
    let mut client = Client::start(3).await;

    client.send(&path_req(SSH_FXP_REALPATH, 1, &messy)).await;
    let frame = client.recv().await;
    let mut cursor = PacketCursor::new(frame);
    assert_eq!(cursor.u8().unwrap(), SSH_FXP_NAME);
    assert_eq!(cursor.u32().unwrap(), 1);
    assert_eq!(cursor.u32().unwrap(), 1);
    let resolved = cursor.utf8().unwrap();
    assert_eq!(Path::new(&resolved), canonical);
}

#[tokio::test]
async fn v6_realpath_with_truncated_compose_paths_still_responds() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().canonicalize().unwrap();
    let mut client = Client::start(6).await;

    // Control byte plus a garbage tail too short to be a compose-path
    // string; the server must still answer rather than spin on it.
    let mut req = path_req(SSH_FXP_REALPATH, 1, &canonical);
    req.push(0); // control byte
    req.extend_from_slice(&[0xFF, 0xFF]);
    client.send(&req).await;

    let frame = client.recv().await;
    let mut cursor = PacketCursor::new(frame);
    assert_eq!(cursor.u8().unwrap(), SSH_FXP_NAME);
    assert_eq!(cursor.u32().unwrap(), 1);
    assert_eq!(cursor.u32().unwrap(), 1);
    let resolved = cursor.utf8().unwrap();
    assert_eq!(Path::new(&resolved), canonical);
}

#[tokio::test]
async fn v6_hard_link() {
    let dir = tempfile::tempdir().unwrap();
    let original = dir.path().join("original");
    let link = dir.path().join("alias");
    std::fs::write(&original, b"data").unwrap();
    let mut client = Client::start(6).await;

    let mut req = two_path_req(SSH_FXP_LINK, 1, &link, &original);
    req.push(0); // hard link
    client.send(&req).await;
    assert_eq!(client.expect_status(1).await, SSH_FX_OK);
    assert_eq!(std::fs::read(&link).unwrap(), b"data");

    use std::os::unix::fs::MetadataExt;
    assert_eq!(std::fs::metadata(&original).unwrap().nlink(), 2);
}

// =============================================================================
// v6 opens
// =============================================================================

#[tokio::test]
async fn v6_open_disposition_create_truncate() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("v6file");
    std::fs::write(&file, b"old contents").unwrap();
    let mut client = Client::start(6).await;

    client
        .send(&open_v6(
            1,
            &file,
            ACE4_READ_DATA | ACE4_WRITE_DATA,
            SSH_FXF_CREATE_TRUNCATE,
        ))
        .await;
    let handle = client.expect_handle(1).await;
    client.send(&write_req(2, &handle, 0, b"new")).await;
    assert_eq!(client.expect_status(2).await, SSH_FX_OK);
    client.send(&handle_req(SSH_FXP_CLOSE, 3, &handle)).await;
    client.expect_status(3).await;

    assert_eq!(std::fs::read(&file).unwrap(), b"new");
}

#[tokio::test]
async fn v6_delete_on_close() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("transient");
    let mut client = Client::start(6).await;

    client
        .send(&open_v6(
            1,
            &file,
            ACE4_READ_DATA | ACE4_WRITE_DATA,
            SSH_FXF_OPEN_OR_CREATE | SSH_FXF_DELETE_ON_CLOSE,
        ))
        .await;
    let handle = client.expect_handle(1).await;
    assert!(file.exists());
    client.send(&handle_req(SSH_FXP_CLOSE, 2, &handle)).await;
    assert_eq!(client.expect_status(2).await, SSH_FX_OK);
    assert!(!file.exists());
}

// =============================================================================
// Read-only mode
// =============================================================================

#[tokio::test]
async fn readonly_mode_refuses_mutation_but_allows_reads() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("protected");
    std::fs::write(&file, b"keep me").unwrap();
    let config = SessionConfig {
        readonly: true,
        ..SessionConfig::default()
    };
    let mut client = Client::start_with(config, 3).await;

    client
        .send(&open_v3(1, &file, SSH_FXF_WRITE | SSH_FXF_TRUNC))
        .await;
    assert_eq!(client.expect_status(1).await, SSH_FX_PERMISSION_DENIED);

    client.send(&path_req(SSH_FXP_REMOVE, 2, &file)).await;
    assert_eq!(client.expect_status(2).await, SSH_FX_PERMISSION_DENIED);

    let mut mkdir = path_req(SSH_FXP_MKDIR, 3, &dir.path().join("nope"));
    mkdir.extend_from_slice(&0u32.to_be_bytes());
    client.send(&mkdir).await;
    assert_eq!(client.expect_status(3).await, SSH_FX_PERMISSION_DENIED);

    client.send(&open_v3(4, &file, SSH_FXF_READ)).await;
    let handle = client.expect_handle(4).await;
    client.send(&read_req(5, &handle, 0, 100)).await;
    assert_eq!(client.expect_data(5).await.as_ref(), b"keep me");

    assert_eq!(std::fs::read(&file).unwrap(), b"keep me");
}

// =============================================================================
// Extensions
// =============================================================================

#[tokio::test]
async fn space_available_reports_filesystem_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = Client::start(6).await;

    use std::os::unix::ffi::OsStrExt;
    let mut req = vec![SSH_FXP_EXTENDED];
    req.extend_from_slice(&1u32.to_be_bytes());
    put_str(&mut req, b"space-available");
    put_str(&mut req, dir.path().as_os_str().as_bytes());
    client.send(&req).await;

    let frame = client.recv().await;
    let mut cursor = PacketCursor::new(frame);
    assert_eq!(cursor.u8().unwrap(), SSH_FXP_EXTENDED_REPLY);
    assert_eq!(cursor.u32().unwrap(), 1);
    let bytes_on_device = cursor.u64().unwrap();
    let unused_on_device = cursor.u64().unwrap();
    cursor.u64().unwrap(); // bytes-available-to-user
    let unused_for_user = cursor.u64().unwrap();
    let alloc_unit = cursor.u32().unwrap();
    assert!(bytes_on_device > 0);
    assert!(unused_on_device <= bytes_on_device);
    assert!(unused_for_user <= bytes_on_device);
    assert!(alloc_unit > 0);
}

#[tokio::test]
async fn unknown_extension_is_unsupported() {
    let mut client = Client::start(6).await;
    let mut req = vec![SSH_FXP_EXTENDED];
    req.extend_from_slice(&9u32.to_be_bytes());
    put_str(&mut req, b"made-up@example.com");
    client.send(&req).await;
    assert_eq!(client.expect_status(9).await, SSH_FX_OP_UNSUPPORTED);
}
