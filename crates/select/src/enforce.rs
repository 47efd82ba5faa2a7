//! Tuning enforcement control for the find pipeline.

use crate::env::FIND_ENFORCE_VAR;
use once_cell::sync::Lazy;
use std::fmt;

/// How the find pipeline treats the performance database, from the
/// environment. `none` is the production default; the other states exist
/// for rebuilding or auditing tuning data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FindEnforce {
    #[default]
    None,
    /// Search even when the caller did not ask for tuning.
    Search,
    /// Skip the load whenever a search is going to run, refreshing the
    /// persisted entry.
    Update,
    /// Drop the persisted entry and fall back to the default config.
    Clean,
    /// Ignore the persisted entry.
    SkipLoad,
}

static FROM_ENV: Lazy<FindEnforce> = Lazy::new(|| {
    std::env::var(FIND_ENFORCE_VAR)
        .map(|value| FindEnforce::parse(&value))
        .unwrap_or_default()
});

impl FindEnforce {
    /// The process-wide state parsed from [`FIND_ENFORCE_VAR`].
    pub fn from_env() -> Self {
        *FROM_ENV
    }

    pub(crate) fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" => FindEnforce::None,
            "search" => FindEnforce::Search,
            "update" => FindEnforce::Update,
            "clean" => FindEnforce::Clean,
            "skip_load" | "skipload" => FindEnforce::SkipLoad,
            other => {
                tracing::warn!(value = other, "unknown find-enforce value, using none");
                FindEnforce::None
            }
        }
    }
}

impl fmt::Display for FindEnforce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FindEnforce::None => "none",
            FindEnforce::Search => "search",
            FindEnforce::Update => "update",
            FindEnforce::Clean => "clean",
            FindEnforce::SkipLoad => "skip_load",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_full_state_set() {
        assert_eq!(FindEnforce::parse(""), FindEnforce::None);
        assert_eq!(FindEnforce::parse("none"), FindEnforce::None);
        assert_eq!(FindEnforce::parse("SEARCH"), FindEnforce::Search);
        assert_eq!(FindEnforce::parse("update"), FindEnforce::Update);
        assert_eq!(FindEnforce::parse(" clean "), FindEnforce::Clean);
        assert_eq!(FindEnforce::parse("skip_load"), FindEnforce::SkipLoad);
        assert_eq!(FindEnforce::parse("skipload"), FindEnforce::SkipLoad);
    }

    #[test]
    fn unknown_values_fall_back_to_none() {
        assert_eq!(FindEnforce::parse("everything"), FindEnforce::None);
    }
}
