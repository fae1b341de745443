//! Reserved data-set keys
//!
//! Keys in `RESERVED_KEY_MIN..=RESERVED_KEY_MAX` are never handed out by the
//! key sequence. They identify handles synthesized by the registry: the live
//! server handle and the per-category "most recent" virtual handles.

pub const RESERVED_KEY_MIN: i32 = 5000;
pub const RESERVED_KEY_MAX: i32 = 5999;

pub const KEY_LIVE: i32 = 5000;
pub const KEY_MOST_RECENT_LICENSE_A: i32 = 5001;
pub const KEY_MOST_RECENT_LICENSE_A_FM: i32 = 5002;
pub const KEY_MOST_RECENT_LICENSE_B: i32 = 5003;
pub const KEY_MOST_RECENT_WIRELESS: i32 = 5004;

pub fn is_reserved_key(key: i32) -> bool {
    (RESERVED_KEY_MIN..=RESERVED_KEY_MAX).contains(&key)
}

/// Step the key sequence forward, jumping over the reserved range.
pub fn next_sequence_key(current: i32) -> i32 {
    let next = current + 1;
    if is_reserved_key(next) {
        RESERVED_KEY_MAX + 1
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_skips_reserved_range() {
        assert_eq!(next_sequence_key(0), 1);
        assert_eq!(next_sequence_key(4998), 4999);
        assert_eq!(next_sequence_key(4999), 6000);
        assert_eq!(next_sequence_key(6000), 6001);
    }

    #[test]
    fn test_synthetic_keys_are_reserved() {
        for key in [
            KEY_LIVE,
            KEY_MOST_RECENT_LICENSE_A,
            KEY_MOST_RECENT_LICENSE_A_FM,
            KEY_MOST_RECENT_LICENSE_B,
            KEY_MOST_RECENT_WIRELESS,
        ] {
            assert!(is_reserved_key(key));
        }
        assert!(!is_reserved_key(4999));
        assert!(!is_reserved_key(6000));
    }
}
