//! Small list helpers with caller-supplied equality.
//!
//! Membership lists are short and ordered, so these work on slices and keep
//! first-seen order instead of going through a hash set.

/// Drop later duplicates, keeping the first occurrence.
pub fn unique_by<T: Clone>(items: &[T], eq: impl Fn(&T, &T) -> bool) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for it in items {
        if !out.iter().any(|o| eq(o, it)) {
            out.push(it.clone());
        }
    }
    out
}

/// Items of `items` that match nothing in `remove`.
pub fn exclude_by<T: Clone>(items: &[T], remove: &[T], eq: impl Fn(&T, &T) -> bool) -> Vec<T> {
    items
        .iter()
        .filter(|it| !remove.iter().any(|r| eq(it, r)))
        .cloned()
        .collect()
}
