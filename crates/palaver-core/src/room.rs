/// Derive the identifier of a two-party conversation. The pair is sorted
/// lexicographically and joined with `_`, so either participant derives the
/// same key. Identifiers are assumed not to contain the separator.
pub fn room_key(a: &str, b: &str) -> String {
    let mut pair = [a, b];
    pair.sort_unstable();
    pair.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_key_is_order_independent() {
        assert_eq!(room_key("u1", "u2"), room_key("u2", "u1"));
    }

    #[test]
    fn test_room_key_sorted_pair() {
        assert_eq!(room_key("u2", "u1"), "u1_u2");
        assert_eq!(room_key("u1", "u2"), "u1_u2");
    }

    #[test]
    fn test_room_key_opaque_ids() {
        assert_eq!(
            room_key("zZx9", "AbC3"),
            format!("{}_{}", "AbC3", "zZx9")
        );
    }
}
