//! Process-wide environment flags.
//!
//! Every environment lookup of the selection pipelines goes through this
//! module and is read once per process; nothing else touches the
//! environment, and nothing reads it inside a hot loop.

use once_cell::sync::Lazy;

/// Disables the `is_fast` heuristic filter during selection when set to a
/// false-ish value.
pub const PERF_FILTERING_VAR: &str = "CONVPLAN_PERF_FILTERING";

/// Tuning enforcement for the find pipeline; see
/// [`FindEnforce`](crate::enforce::FindEnforce).
pub const FIND_ENFORCE_VAR: &str = "CONVPLAN_FIND_ENFORCE";

static PERF_FILTERING_DISABLED: Lazy<bool> = Lazy::new(|| {
    std::env::var(PERF_FILTERING_VAR)
        .map(|value| parse_disabled(&value))
        .unwrap_or(false)
});

pub fn perf_filtering_disabled() -> bool {
    *PERF_FILTERING_DISABLED
}

/// True when `value` spells a disabled state, case-insensitively.
pub(crate) fn parse_disabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "no" | "off" | "false" | "disable" | "disabled"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn false_ish_spellings_disable() {
        for value in ["0", "no", "OFF", "False", " disabled "] {
            assert!(parse_disabled(value), "{value:?} should disable");
        }
    }

    #[test]
    fn other_values_keep_the_filter() {
        for value in ["", "1", "yes", "on", "2", "enabled"] {
            assert!(!parse_disabled(value), "{value:?} should not disable");
        }
    }
}
