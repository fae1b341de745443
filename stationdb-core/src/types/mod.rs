/// Core types shared across all StationDB modules
pub mod cancel;
pub mod format;
pub mod keys;

// Re-export commonly used types at module level
pub use cancel::CancelFlag;
pub use format::{FormatType, RecordKind};
pub use keys::{
    is_reserved_key, next_sequence_key, KEY_LIVE, KEY_MOST_RECENT_LICENSE_A,
    KEY_MOST_RECENT_LICENSE_A_FM, KEY_MOST_RECENT_LICENSE_B, KEY_MOST_RECENT_WIRELESS,
    RESERVED_KEY_MAX, RESERVED_KEY_MIN,
};
