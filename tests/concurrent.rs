use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use unpile::Stack;

const THREADS: usize = 8;
const PER_THREAD: usize = 2_000;

fn init_tracing() {
    #[cfg(feature = "tracing")]
    if let Ok(filter) = std::env::var("UNPILE_LOG") {
        use tracing_subscriber::{filter::Targets, fmt, prelude::*};

        match filter.parse::<Targets>() {
            Ok(targets) => {
                let _ = fmt::Subscriber::builder()
                    .with_test_writer()
                    .finish()
                    .with(targets)
                    .try_init();
            }
            Err(e) => eprintln!("invalid UNPILE_LOG={:?}: {}", filter, e),
        }
    }
}

#[test]
fn test_disjoint_pushes_pop_exactly_once() {
    init_tracing();

    let stack = Arc::new(Stack::new());
    let start = Arc::new(Barrier::new(THREADS * 2));
    let done_pushing = Arc::new(AtomicBool::new(false));

    let pushers: Vec<_> = (0..THREADS)
        .map(|t| {
            let stack = stack.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                for i in 0..PER_THREAD {
                    stack.push(t * PER_THREAD + i);
                }
            })
        })
        .collect();

    let poppers: Vec<_> = (0..THREADS)
        .map(|_| {
            let stack = stack.clone();
            let start = start.clone();
            let done_pushing = done_pushing.clone();
            thread::spawn(move || {
                start.wait();
                let mut popped = Vec::new();
                loop {
                    match stack.pop() {
                        Some(v) => popped.push(v),
                        None if done_pushing.load(Ordering::SeqCst) => break,
                        None => thread::yield_now(),
                    }
                }
                popped
            })
        })
        .collect();

    for pusher in pushers {
        pusher.join().unwrap();
    }
    done_pushing.store(true, Ordering::SeqCst);

    let mut seen = HashSet::new();
    for popper in poppers {
        for v in popper.join().unwrap() {
            assert!(seen.insert(v), "{} popped twice", v);
        }
    }
    while let Some(v) = stack.pop() {
        assert!(seen.insert(v), "{} popped twice", v);
    }

    assert_eq!(seen.len(), THREADS * PER_THREAD);
    assert!((0..THREADS * PER_THREAD).all(|v| seen.contains(&v)));
    assert!(stack.is_empty());
    assert_eq!(stack.len(), 0);
}

#[test]
fn test_per_thread_lifo() {
    init_tracing();

    // Values from one pusher always come off in reverse push order, because
    // each of its pushes lands on top of the previous one.
    let stack = Arc::new(Stack::new());

    let pushers: Vec<_> = (0..THREADS)
        .map(|t| {
            let stack = stack.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    stack.push((t, i));
                }
            })
        })
        .collect();

    for pusher in pushers {
        pusher.join().unwrap();
    }

    let mut last = vec![usize::MAX; THREADS];
    while let Some((t, i)) = stack.pop() {
        assert!(i < last[t], "thread {} popped {} after {}", t, i, last[t]);
        last[t] = i;
    }
    assert!(last.iter().all(|&i| i == 0));
}

#[test]
fn test_peek_races_pop() {
    init_tracing();

    let stack = Arc::new(Stack::new());
    for i in 0..10_000 {
        stack.push(Arc::new(i.to_string()));
    }

    let peekers: Vec<_> = (0..4)
        .map(|_| {
            let stack = stack.clone();
            thread::spawn(move || {
                while let Some(top) = stack.top() {
                    // Reading through a popped node must stay valid.
                    assert!(top.parse::<u32>().is_ok());
                    if let Some(v) = stack.peek() {
                        assert!(!v.is_empty());
                    }
                }
            })
        })
        .collect();

    let poppers: Vec<_> = (0..4)
        .map(|_| {
            let stack = stack.clone();
            thread::spawn(move || {
                let mut count = 0;
                while stack.pop_entry().is_some() {
                    count += 1;
                }
                count
            })
        })
        .collect();

    let popped: usize = poppers.into_iter().map(|p| p.join().unwrap()).sum();
    for peeker in peekers {
        peeker.join().unwrap();
    }

    assert_eq!(popped, 10_000);
}

#[test]
fn test_append_and_clear_under_contention() {
    init_tracing();

    let stack = Arc::new(Stack::new());

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let stack = stack.clone();
            thread::spawn(move || {
                for round in 0..100 {
                    let batch: Stack<usize> = (0..10).map(|i| t * 1_000 + i).collect();
                    stack.append(batch);
                    if round % 10 == 0 {
                        stack.clear();
                    } else {
                        stack.pop();
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let mut stack = Arc::try_unwrap(stack).unwrap();
    assert_eq!(stack.iter().count(), stack.len());
}
