use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Reduce bucket of a key. `DefaultHasher::new()` uses fixed keys, so the
/// routing is stable across runs and processes.
pub fn hash_to_partition<K: Hash>(key: &K, num_partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % num_partitions
}

pub fn env_var_truthy(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Parsed value of an environment variable; unset or unparsable yields `None`.
pub fn env_var_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Debug rendering used to name a key in logs and errors, capped so that huge
/// composite keys do not flood the output.
pub fn describe_key<K: std::fmt::Debug>(key: &K) -> String {
    const MAX: usize = 120;
    let s = format!("{:?}", key);
    if s.chars().count() <= MAX {
        s
    } else {
        let mut cut: String = s.chars().take(MAX).collect();
        cut.push_str("...");
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_key_truncates_long_keys() {
        let long = "x".repeat(500);
        let d = describe_key(&long);
        assert!(d.ends_with("..."));
        assert_eq!(d.chars().count(), 123);
        assert_eq!(describe_key(&("Drama", "love")), "(\"Drama\", \"love\")");
    }

    #[test]
    fn equal_tuple_keys_route_to_same_bucket() {
        let a = ("Drama".to_string(), "love".to_string());
        let b = ("Drama".to_string(), "love".to_string());
        assert_eq!(hash_to_partition(&a, 7), hash_to_partition(&b, 7));
        assert!(hash_to_partition(&a, 7) < 7);
    }

    #[test]
    fn unset_env_is_not_truthy() {
        assert!(!env_var_truthy("MRCHAIN_TEST_SURELY_UNSET_VAR"));
        assert_eq!(env_var_parse::<usize>("MRCHAIN_TEST_SURELY_UNSET_VAR"), None);
    }
}
