use std::num::NonZeroUsize;

/// Split `items` into consecutive groups of at most `size`.
///
/// Order is preserved and nothing is dropped or duplicated: flattening the
/// result gives back `items`. An empty input yields no groups.
pub fn chunk<T>(items: Vec<T>, size: NonZeroUsize) -> Vec<Vec<T>> {
    let size = size.get();
    let mut groups = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        groups.push(iter.by_ref().take(size).collect());
    }
    groups
}
