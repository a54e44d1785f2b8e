#![no_main]

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use unpile::{Operation, Stack};

fuzz_target!(|ops: Vec<Operation<i32>>| {
    let stack: Arc<Stack<Arc<i32>>> = Arc::new(Stack::new());

    let mut threads = vec![];

    let len = ops.len();

    for sub_ops in ops.chunks(std::cmp::max(len / 20, 1)) {
        let sub_ops = sub_ops.to_vec();
        let stack = stack.clone();

        threads.push(std::thread::spawn(move || {
            sub_ops.into_iter().for_each(|op| match op {
                Operation::Peek => {
                    if let Some(e) = stack.top() {
                        std::thread::yield_now();
                        stack.push(Arc::new(**e));
                    }
                }
                Operation::Pop => {
                    stack.pop();
                }
                Operation::PopPush => {
                    if let Some(e) = stack.pop_entry() {
                        stack.push(Arc::new(e.wrapping_mul(**e)))
                    }
                }
                Operation::Push { item } => stack.push(Arc::new(item)),
                Operation::Append { items } => {
                    stack.append(items.into_iter().map(Arc::new).collect());
                }
                Operation::Clear => stack.clear(),
            })
        }))
    }

    for thread in threads {
        thread.join().unwrap()
    }
});
