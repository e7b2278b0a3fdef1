/*!
 * Registry Tests
 * fdinfo by descriptor, rings built from configuration files
 */

use crate::common::{field, section};
use ai_os_ringdiag::ring::{Opcode, RingConfig, SetupFlags, Sqe};
use ai_os_ringdiag::{RingBuilder, RingRegistry};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use tempfile::NamedTempFile;

#[test]
fn test_show_fdinfo_by_descriptor() {
    let registry = RingRegistry::new();
    let (fd, ring) = registry.create_ring(RingBuilder::new(4)).unwrap();
    ring.submit_sqe(&Sqe::new(Opcode::Close).with_fd(12)).unwrap();

    let mut out = String::new();
    assert!(registry.show_fdinfo(fd, &mut out));
    assert_eq!(field(&out, "SQEs"), Some("1"));
    assert!(out.contains("opcode:CLOSE, fd:12,"));
}

#[test]
fn test_destroyed_descriptor_is_unknown() {
    let registry = RingRegistry::new();
    let (fd, ring) = registry.create_ring(RingBuilder::new(2)).unwrap();
    let removed = registry.destroy_ring(fd).unwrap();
    assert!(Arc::ptr_eq(&removed, &ring.share()));

    let mut out = String::new();
    assert!(!registry.show_fdinfo(fd, &mut out));
    assert!(out.is_empty());
    // Owner handle still works after the descriptor is gone
    ring.submit_sqe(&Sqe::new(Opcode::Nop)).unwrap();
}

#[test]
fn test_busy_ring_reports_nothing() {
    let registry = RingRegistry::new();
    let (fd, ring) = registry.create_ring(RingBuilder::new(2)).unwrap();
    let _guard = ring.lock();

    let mut out = String::new();
    assert!(registry.show_fdinfo(fd, &mut out));
    assert!(out.is_empty());
}

#[test]
fn test_ring_from_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "sq_entries": 16,
            "cq_entries": 64,
            "flags": {},
            "file_slots": 2,
            "buf_slots": 3,
            "napi": {{ "track_mode": 2, "busy_poll_dt": 1000, "prefer_busy_poll": true }}
        }}"#,
        SetupFlags::NO_SQARRAY.bits()
    )
    .unwrap();

    let config = RingConfig::from_path(file.path()).unwrap();
    let registry = RingRegistry::new();
    let (fd, ring) = registry
        .create_ring(RingBuilder::from_config(&config))
        .unwrap();
    ring.register_file(1, "/var/log/ring.log").unwrap();

    let mut out = String::new();
    registry.show_fdinfo(fd, &mut out);
    assert_eq!(field(&out, "SqMask"), Some("0xf"));
    assert_eq!(field(&out, "CqMask"), Some("0x3f"));
    assert_eq!(field(&out, "UserFiles"), Some("2"));
    assert_eq!(field(&out, "UserBufs"), Some("3"));
    assert_eq!(
        section(&out, "UserFiles:", "UserBufs:"),
        vec!["    1: /var/log/ring.log"]
    );
    #[cfg(feature = "napi")]
    assert_eq!(field(&out, "napi tracking"), Some("static"));
}

#[test]
fn test_invalid_config_builds_nothing() {
    let config = RingConfig::from_json(r#"{ "sq_entries": 12 }"#).unwrap();
    let registry = RingRegistry::new();
    assert!(registry
        .create_ring(RingBuilder::from_config(&config))
        .is_err());
    assert!(registry.is_empty());
}

#[test]
fn test_concurrent_fdinfo_readers() {
    let registry = RingRegistry::new();
    let fds: Vec<_> = (0..4)
        .map(|_| registry.create_ring(RingBuilder::new(8)).unwrap())
        .collect();
    for (_, ring) in &fds {
        ring.submit_sqe(&Sqe::new(Opcode::Nop)).unwrap();
    }

    let handles: Vec<_> = fds
        .iter()
        .map(|(fd, _)| {
            let registry = registry.clone();
            let fd = *fd;
            thread::spawn(move || {
                let mut seen = 0;
                for _ in 0..100 {
                    let mut out = String::new();
                    assert!(registry.show_fdinfo(fd, &mut out));
                    if !out.is_empty() {
                        seen += 1;
                    }
                }
                seen
            })
        })
        .collect();

    for h in handles {
        // Each ring has a single reader thread, so its lock is never contended
        assert_eq!(h.join().unwrap(), 100);
    }
}
