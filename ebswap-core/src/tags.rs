use crate::types::TagSet;

/// Key prefix reserved by the provider; tags under it cannot be written.
pub const RESERVED_TAG_PREFIX: &str = "aws:";

/// Union of `base` and `overrides`, with the override value winning on key collision.
pub fn merge_tags(base: &TagSet, overrides: TagSet) -> TagSet {
    let mut merged = base.clone();
    merged.extend(overrides);
    merged
}

/// Drops tags the provider does not allow callers to write.
pub fn writable_tags(tags: &TagSet) -> TagSet {
    tags.iter()
        .filter(|(key, _)| !key.starts_with(RESERVED_TAG_PREFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Builds a [`TagSet`] from literal pairs.
pub fn tag_set<K, V, I>(pairs: I) -> TagSet
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}
