//! Memoization of derived views on (snapshot identity, parameters)

use std::sync::Arc;

/// Caches the output of a derived view.
///
/// The cache key is the snapshot's `Arc` identity plus the parameters, so a
/// new snapshot (even one with equal contents) or changed parameters cause a
/// recompute, and nothing else does. The cached snapshot is retained so its
/// address cannot be reused while the entry lives.
pub struct Memo<S, P, O> {
    key: Option<(Option<Arc<S>>, P)>,
    value: Option<O>,
    computations: usize,
}

impl<S, P, O> Default for Memo<S, P, O> {
    fn default() -> Self {
        Self {
            key: None,
            value: None,
            computations: 0,
        }
    }
}

impl<S, P: PartialEq + Clone, O> Memo<S, P, O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached output, recomputing with `compute` on a key change
    pub fn get<F>(&mut self, snapshot: Option<&Arc<S>>, params: &P, compute: F) -> &O
    where
        F: FnOnce(Option<&S>, &P) -> O,
    {
        let hit = match &self.key {
            Some((cached, cached_params)) => same_snapshot(cached.as_ref(), snapshot) && cached_params == params,
            None => false,
        };

        let value = match (hit, self.value.take()) {
            (true, Some(value)) => value,
            _ => {
                self.computations += 1;
                self.key = Some((snapshot.cloned(), params.clone()));
                compute(snapshot.map(|s| s.as_ref()), params)
            }
        };
        self.value.insert(value)
    }

    /// Number of times the output was computed
    pub fn computations(&self) -> usize {
        self.computations
    }

    /// Drop the cached output
    pub fn clear(&mut self) {
        self.key = None;
        self.value = None;
    }
}

fn same_snapshot<S>(a: Option<&Arc<S>>, b: Option<&Arc<S>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recomputes_only_on_new_snapshot_or_params() {
        let mut memo: Memo<Vec<i32>, i32, i32> = Memo::new();
        let first = Arc::new(vec![1, 2, 3]);

        let sum = |s: Option<&Vec<i32>>, offset: &i32| s.map(|v| v.iter().sum::<i32>()).unwrap_or(0) + offset;

        assert_eq!(*memo.get(Some(&first), &0, sum), 6);
        assert_eq!(*memo.get(Some(&first), &0, sum), 6);
        assert_eq!(memo.computations(), 1);

        assert_eq!(*memo.get(Some(&first), &10, sum), 16);
        assert_eq!(memo.computations(), 2);

        // Equal contents, new snapshot: still recomputed.
        let second = Arc::new(vec![1, 2, 3]);
        assert_eq!(*memo.get(Some(&second), &10, sum), 16);
        assert_eq!(memo.computations(), 3);

        assert_eq!(*memo.get(None, &10, sum), 10);
        assert_eq!(memo.computations(), 4);
    }
}
