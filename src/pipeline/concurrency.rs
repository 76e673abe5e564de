//! Ordered fan-out over scoped worker threads.
//!
//! Used for independent PDF pages, chunk calls and anomaly batches. Results
//! always come back in input order regardless of completion order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::PipelineError;

/// Apply `f` to every item on at most `max_workers` threads.
pub fn map_ordered<T, R, F>(items: &[T], max_workers: usize, f: F) -> Result<Vec<R>, PipelineError>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    let workers = max_workers.max(1).min(items.len());
    if workers <= 1 {
        return Ok(items.iter().enumerate().map(|(i, item)| f(i, item)).collect());
    }

    let next = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<R>>> = Mutex::new((0..items.len()).map(|_| None).collect());

    let joined = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(item) = items.get(index) else {
                        break;
                    };
                    let result = f(index, item);
                    let mut guard = match slots.lock() {
                        Ok(g) => g,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    guard[index] = Some(result);
                })
            })
            .collect();
        handles.into_iter().all(|h| h.join().is_ok())
    });

    if !joined {
        return Err(PipelineError::WorkerPanicked);
    }

    let slots = match slots.into_inner() {
        Ok(s) => s,
        Err(poisoned) => poisoned.into_inner(),
    };
    slots
        .into_iter()
        .map(|slot| slot.ok_or(PipelineError::WorkerPanicked))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn preserves_input_order() {
        let items: Vec<u64> = (0..20).collect();
        let out = map_ordered(&items, 4, |_, &n| {
            // Later items finish first.
            std::thread::sleep(Duration::from_millis(20 - n));
            n * 10
        })
        .unwrap();
        assert_eq!(out, (0..20).map(|n| n * 10).collect::<Vec<_>>());
    }

    #[test]
    fn passes_index() {
        let items = vec!["a", "b", "c"];
        let out = map_ordered(&items, 2, |i, s| format!("{i}{s}")).unwrap();
        assert_eq!(out, vec!["0a", "1b", "2c"]);
    }

    #[test]
    fn empty_and_single_worker() {
        let empty: Vec<i32> = vec![];
        assert!(map_ordered(&empty, 8, |_, x| *x).unwrap().is_empty());
        assert_eq!(map_ordered(&[1, 2], 1, |_, x| x + 1).unwrap(), vec![2, 3]);
    }

    #[test]
    fn worker_panic_is_reported() {
        let items = vec![1, 2, 3, 4];
        let result = map_ordered(&items, 2, |_, &x| {
            if x == 3 {
                panic!("boom");
            }
            x
        });
        assert!(matches!(result, Err(PipelineError::WorkerPanicked)));
    }
}
