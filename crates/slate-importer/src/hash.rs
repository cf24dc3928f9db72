//! The overlay hash and the tags string.

use rustc_hash::FxHashMap;

/// Hash the whole source overlay: sort filenames, feed `name || content`
/// pairs into blake3, return the lower-case hex digest. An empty overlay
/// hashes to the empty string, which signals `no_hash` on state keys.
///
/// The hash is deliberately coarse - any overlay edit busts every
/// overlay-aware check, trading pessimistic re-checks for soundness.
pub fn src_map_hash(src_map: &FxHashMap<String, Vec<u8>>) -> String {
    if src_map.is_empty() {
        return String::new();
    }
    let mut names: Vec<&String> = src_map.keys().collect();
    names.sort_unstable();
    let mut hasher = blake3::Hasher::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(&src_map[name]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Canonical form of a tag list: sorted, space-joined.
pub fn tags_str(tags: &[String]) -> String {
    match tags.len() {
        0 => String::new(),
        1 => tags[0].clone(),
        _ => {
            let mut sorted = tags.to_vec();
            sorted.sort_unstable();
            sorted.join(" ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(entries: &[(&str, &str)]) -> FxHashMap<String, Vec<u8>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn empty_overlay_hashes_to_empty_string() {
        assert_eq!(src_map_hash(&FxHashMap::default()), "");
    }

    #[test]
    fn hash_is_order_independent_and_content_sensitive() {
        let a = src_map_hash(&overlay(&[("/p/a.sl", "x"), ("/p/b.sl", "y")]));
        let b = src_map_hash(&overlay(&[("/p/b.sl", "y"), ("/p/a.sl", "x")]));
        assert_eq!(a, b);

        let c = src_map_hash(&overlay(&[("/p/a.sl", "x"), ("/p/b.sl", "z")]));
        assert_ne!(a, c);
    }

    #[test]
    fn hash_covers_the_whole_overlay() {
        // Adding an unrelated file changes the hash: the contract is one
        // hash over the entire overlay, not per package.
        let a = src_map_hash(&overlay(&[("/p/a.sl", "x")]));
        let b = src_map_hash(&overlay(&[("/p/a.sl", "x"), ("/q/b.sl", "y")]));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_lower_hex() {
        let h = src_map_hash(&overlay(&[("/p/a.sl", "x")]));
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn tags_are_sorted_and_joined() {
        assert_eq!(tags_str(&[]), "");
        assert_eq!(tags_str(&["b".into()]), "b");
        assert_eq!(tags_str(&["b".into(), "a".into()]), "a b");
    }
}
