//! 分片标识函数的单元测试

use std::collections::HashSet;

use uuid::Uuid;

use crate::utils::{shard_id, shard_ids};

#[test]
fn test_shard_id_is_deterministic() {
    assert_eq!(shard_id("v1", 0), shard_id("v1", 0));
    assert_eq!(shard_id("v1", 7), shard_id("v1", 7));
}

#[test]
fn test_shard_id_depends_on_modifier_and_index() {
    assert_ne!(shard_id("v1", 0), shard_id("v1", 1));
    assert_ne!(shard_id("v1", 0), shard_id("v2", 0));
}

#[test]
fn test_shard_id_matches_md5_layout() {
    // md5("v10") 的前 16 字节经版本/变体位修正后即为分片标识
    let digest = md5::compute(b"v10").0;
    let mut expected = digest;
    expected[6] = (expected[6] & 0x0f) | 0x30;
    expected[8] = (expected[8] & 0x3f) | 0x80;
    assert_eq!(shard_id("v1", 0), Uuid::from_bytes(expected).to_string());
}

#[test]
fn test_shard_id_is_version_three_uuid() {
    let id = Uuid::parse_str(&shard_id("modifier", 42)).unwrap();
    assert_eq!(id.get_version_num(), 3);
    assert_eq!(id.get_variant(), uuid::Variant::RFC4122);
}

#[test]
fn test_shard_ids_are_disjoint_and_ordered() {
    let ids = shard_ids("v1", 16);
    assert_eq!(ids.len(), 16);
    assert_eq!(ids[3], shard_id("v1", 3));
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), 16);
}

#[test]
fn test_shard_ids_empty_when_count_zero() {
    assert!(shard_ids("v1", 0).is_empty());
}
