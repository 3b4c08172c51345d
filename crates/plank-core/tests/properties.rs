//! Property-based tests for plank-core.
//!
//! Queue and stack order against a `VecDeque` model, tagged word arithmetic,
//! and shared/weak reference accounting over random operation sequences.

use std::collections::VecDeque;

use proptest::prelude::*;
use plank_core::{
    CounterState, Counts, LockFreeQueue, LockFreeStack, OwnedElement, SharedPtr, TaggedValue,
    TaggedWord, WeakPtr,
};

#[derive(Debug, Clone)]
enum ContainerOp {
    Push(usize),
    Pop,
}

fn container_ops() -> impl Strategy<Value = Vec<ContainerOp>> {
    prop::collection::vec(
        prop_oneof![
            (1usize..10_000).prop_map(ContainerOp::Push),
            Just(ContainerOp::Pop),
        ],
        0..200,
    )
}

#[derive(Debug, Clone)]
enum RefOp {
    CloneStrong,
    DropStrong(usize),
    TakeWeak,
    DropWeak(usize),
    Upgrade(usize),
}

fn ref_ops() -> impl Strategy<Value = Vec<RefOp>> {
    prop::collection::vec(
        prop_oneof![
            Just(RefOp::CloneStrong),
            (0usize..16).prop_map(RefOp::DropStrong),
            Just(RefOp::TakeWeak),
            (0usize..16).prop_map(RefOp::DropWeak),
            (0usize..16).prop_map(RefOp::Upgrade),
        ],
        0..100,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// N pushes followed by N pops return the pushed payloads in order.
    #[test]
    fn queue_is_fifo(payloads in prop::collection::vec(1usize..usize::MAX, 0..300)) {
        let queue = LockFreeQueue::new();
        for &data in &payloads {
            queue.push(OwnedElement::with_data(data).unwrap());
        }
        prop_assert_eq!(queue.len(), payloads.len());
        let popped: Vec<_> = std::iter::from_fn(|| queue.pop().map(OwnedElement::into_data)).collect();
        prop_assert_eq!(popped, payloads);
        prop_assert!(queue.is_empty());
    }

    /// N pushes followed by N pops return the pushed payloads reversed.
    #[test]
    fn stack_is_lifo(payloads in prop::collection::vec(1usize..usize::MAX, 0..300)) {
        let stack = LockFreeStack::new();
        for &data in &payloads {
            stack.push(OwnedElement::with_data(data).unwrap());
        }
        let popped: Vec<_> = std::iter::from_fn(|| stack.pop().map(OwnedElement::into_data)).collect();
        let mut expected = payloads;
        expected.reverse();
        prop_assert_eq!(popped, expected);
    }

    /// Interleaved pushes and pops match a `VecDeque` model.
    #[test]
    fn queue_matches_model(ops in container_ops()) {
        let queue = LockFreeQueue::new();
        let mut model = VecDeque::new();
        for op in ops {
            match op {
                ContainerOp::Push(data) => {
                    queue.push(OwnedElement::with_data(data).unwrap());
                    model.push_back(data);
                }
                ContainerOp::Pop => {
                    prop_assert_eq!(queue.pop().map(OwnedElement::into_data), model.pop_front());
                }
            }
            prop_assert_eq!(queue.len(), model.len());
        }
    }

    /// Interleaved pushes and pops match a `Vec` model.
    #[test]
    fn stack_matches_model(ops in container_ops()) {
        let stack = LockFreeStack::new();
        let mut model = Vec::new();
        for op in ops {
            match op {
                ContainerOp::Push(data) => {
                    stack.push(OwnedElement::with_data(data).unwrap());
                    model.push(data);
                }
                ContainerOp::Pop => {
                    prop_assert_eq!(stack.pop().map(OwnedElement::into_data), model.pop());
                }
            }
            prop_assert_eq!(stack.len(), model.len());
        }
    }

    /// Payload arithmetic wraps like `usize` and every write bumps the tag once.
    #[test]
    fn tagged_word_add_wraps(start in any::<usize>(), tag in any::<usize>(), deltas in prop::collection::vec(any::<isize>(), 0..50)) {
        let word = TaggedWord::new(start, tag);
        let mut expected = start;
        for &delta in &deltas {
            expected = expected.wrapping_add_signed(delta);
            prop_assert_eq!(word.add(delta), expected);
        }
        prop_assert_eq!(word.load(), TaggedValue::new(expected, tag.wrapping_add(deltas.len())));
    }

    /// Live and weak counts track the handles that exist; upgrades succeed
    /// exactly while a strong handle exists; the value is destroyed once.
    #[test]
    fn reference_accounting(ops in ref_ops()) {
        let mut strong = vec![SharedPtr::new(42u64).unwrap()];
        let mut weak: Vec<WeakPtr<u64>> = Vec::new();
        let observer = SharedPtr::weak_pointer(&strong[0]).unwrap();

        for op in ops {
            match op {
                RefOp::CloneStrong => {
                    if let Some(p) = strong.first() {
                        strong.push(p.clone());
                    }
                }
                RefOp::DropStrong(i) => {
                    if !strong.is_empty() {
                        strong.remove(i % strong.len());
                    }
                }
                RefOp::TakeWeak => {
                    if let Some(p) = strong.first() {
                        weak.push(SharedPtr::weak_pointer(p).unwrap());
                    } else {
                        weak.push(observer.clone());
                    }
                }
                RefOp::DropWeak(i) => {
                    if !weak.is_empty() {
                        weak.remove(i % weak.len());
                    }
                }
                RefOp::Upgrade(i) => {
                    if !weak.is_empty() {
                        let upgraded = weak[i % weak.len()].upgrade();
                        prop_assert_eq!(upgraded.is_some(), !strong.is_empty());
                        if let Some(p) = upgraded {
                            prop_assert_eq!(*p, 42);
                        }
                    }
                }
            }

            let counts = observer.counts();
            prop_assert_eq!(counts, Counts { live: strong.len(), weak: weak.len() + 1 });
            let expected_state = if strong.is_empty() { CounterState::WeakOnly } else { CounterState::Live };
            prop_assert_eq!(observer.state(), expected_state);
        }

        strong.clear();
        prop_assert!(observer.upgrade().is_none());
        weak.clear();
        prop_assert_eq!(observer.counts(), Counts { live: 0, weak: 1 });
        prop_assert_eq!(observer.state(), CounterState::WeakOnly);
    }
}
