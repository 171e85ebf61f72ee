//! Predicates deciding which record ids are admitted.

use std::collections::HashSet;
use std::sync::Arc;

/// Shared id predicate. Records whose id fails it are invisible to readers.
pub type IdValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Accept every id, including the empty string.
pub fn all_ids() -> IdValidator {
    Arc::new(|_: &str| true)
}

/// Accept non-empty ids made only of ASCII digits (ZIP code tabulation areas).
pub fn digits_only() -> IdValidator {
    Arc::new(|id: &str| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
}

/// Accept every id except the listed ones.
pub fn excluding<I, S>(ids: I) -> IdValidator
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let excluded: HashSet<String> = ids.into_iter().map(Into::into).collect();
    Arc::new(move |id: &str| !excluded.contains(id))
}
