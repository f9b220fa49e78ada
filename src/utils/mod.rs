//! 工具函数模块
//!
//! 提供分片标识计算

#[cfg(test)]
mod shard_tests;

use uuid::Uuid;

/// 计算分片标识
///
/// 对 `modifier + index` 做 MD5，强制写入 UUID 版本 3 与 RFC 4122 变体位，
/// 以 UUID 字符串形式返回。同一 `(modifier, index)` 永远得到同一标识，
/// 修改 `modifier` 即可整体轮换全部分片标识。
pub fn shard_id(modifier: &str, index: u32) -> String {
    let mut context = md5::Context::new();
    context.consume(modifier.as_bytes());
    context.consume(index.to_string().as_bytes());
    let mut bytes: [u8; 16] = context.compute().0;
    bytes[6] = (bytes[6] & 0x0f) | 0x30;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    Uuid::from_bytes(bytes).to_string()
}

/// 计算全部分片标识，顺序与分片序号一致
pub fn shard_ids(modifier: &str, count: u32) -> Vec<String> {
    (0..count).map(|index| shard_id(modifier, index)).collect()
}
