//! Backend key naming
//!
//! Data entries and tag member sets live side by side in one key space:
//! - `data:<key>` = serialized payload
//! - `tags:<tag>` = set of cache keys carrying the tag

pub const DATA_PREFIX: &str = "data:";
pub const TAG_PREFIX: &str = "tags:";

/// Backend key holding the payload of `key`
pub fn data_key(key: &str) -> String {
    format!("{}{}", DATA_PREFIX, key)
}

/// Backend key holding the member set of `tag`
pub fn tag_key(tag: &str) -> String {
    format!("{}{}", TAG_PREFIX, tag)
}
