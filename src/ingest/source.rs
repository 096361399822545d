use std::sync::Mutex;

/// Cursor shared by every worker; fetching the next item is atomic.
pub(crate) struct SharedSource<I> {
    inner: Mutex<I>,
}

impl<I: Iterator> SharedSource<I> {
    pub(crate) fn new(iter: I) -> Self {
        Self {
            inner: Mutex::new(iter),
        }
    }

    /// Next item, or `None` once exhausted.
    ///
    /// A poisoned cursor reads as exhausted; the worker that panicked while
    /// holding it fails the run.
    pub(crate) fn next(&self) -> Option<I::Item> {
        self.inner.lock().ok()?.next()
    }
}

/// Split `items` into `parts` contiguous runs, preserving order within each run.
pub(crate) fn partition<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let parts = parts.max(1);
    let base = items.len() / parts;
    let extra = items.len() % parts;
    let mut iter = items.into_iter();
    (0..parts)
        .map(|i| {
            let take = base + usize::from(i < extra);
            iter.by_ref().take(take).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, thread};

    use super::*;

    #[test]
    fn shared_cursor_hands_out_each_item_once() {
        let source = SharedSource::new(0..10_000u32);
        let seen: Vec<Vec<u32>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let mut got = Vec::new();
                        while let Some(item) = source.next() {
                            got.push(item);
                        }
                        got
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let all: HashSet<u32> = seen.iter().flatten().copied().collect();
        assert_eq!(seen.iter().map(Vec::len).sum::<usize>(), 10_000);
        assert_eq!(all.len(), 10_000);
        for got in &seen {
            assert!(got.windows(2).all(|w| w[0] < w[1]), "each worker sees cursor order");
        }
    }

    #[test]
    fn partitions_are_contiguous_and_balanced() {
        let parts = partition((0..10).collect::<Vec<_>>(), 3);
        assert_eq!(parts, vec![vec![0, 1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]]);

        let sparse = partition(vec![1, 2], 4);
        assert_eq!(sparse.len(), 4);
        assert_eq!(sparse.iter().map(Vec::len).collect::<Vec<_>>(), vec![1, 1, 0, 0]);
    }
}
