#![no_main]

use libfuzzer_sys::fuzz_target;
use unpile::{Operation, Stack};

fuzz_target!(|ops: Vec<Operation<i32>>| {
    let mut stack = Stack::new();
    let mut model: Vec<i32> = Vec::new();

    for op in ops {
        match op {
            Operation::Push { item } => {
                stack.push(item);
                model.push(item);
            }
            Operation::Pop => assert_eq!(stack.pop(), model.pop()),
            Operation::Peek => assert_eq!(stack.peek(), model.last().copied()),
            Operation::PopPush => {
                if let Some(e) = stack.pop() {
                    assert_eq!(Some(e), model.pop());
                    stack.push(e.wrapping_mul(e));
                    model.push(e.wrapping_mul(e));
                } else {
                    assert!(model.is_empty());
                }
            }
            Operation::Append { items } => {
                model.extend(items.iter().copied());
                stack.append(items.into_iter().collect());
            }
            Operation::Clear => {
                stack.clear();
                model.clear();
            }
        }

        assert_eq!(stack.len(), model.len());
        assert_eq!(stack.is_empty(), model.is_empty());
    }

    assert!(stack.iter().copied().eq(model.iter().rev().copied()));
});
