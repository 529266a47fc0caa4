use mirror_core::{Observation, PollPolicy, StabilityTracker, StreamAccumulator};
use pretty_assertions::assert_eq;

/// Feeds samples until the tracker settles; returns the 1-based settling tick.
fn settle_tick<T: PartialEq + Clone>(samples: &[T], required: u32) -> Option<usize> {
    let mut tracker = StabilityTracker::new(required);
    for (index, sample) in samples.iter().enumerate() {
        tracker.observe(sample.clone());
        if tracker.is_settled() {
            return Some(index + 1);
        }
    }
    None
}

#[test]
fn settles_when_run_reaches_required_length() {
    assert_eq!(settle_tick(&[1, 2, 2, 2], 3), Some(4));
    assert_eq!(settle_tick(&[5, 5, 5], 3), Some(3));
    assert_eq!(settle_tick(&[1, 2, 3], 1), Some(1));
}

#[test]
fn never_settles_without_a_constant_run() {
    assert_eq!(settle_tick(&[1, 2, 1, 2, 1, 2], 2), None);
    assert_eq!(settle_tick(&[1, 1, 2, 2, 3], 3), None);
}

#[test]
fn change_resets_the_run() {
    let mut tracker = StabilityTracker::new(3);
    assert_eq!(tracker.observe("a"), Observation::Changed);
    assert_eq!(tracker.observe("a"), Observation::Repeated);
    assert_eq!(tracker.run_length(), 2);
    assert_eq!(tracker.observe("b"), Observation::Changed);
    assert_eq!(tracker.run_length(), 1);
    assert_eq!(tracker.last(), Some(&"b"));
}

#[test]
fn zero_requirement_behaves_like_one() {
    assert_eq!(settle_tick(&["x"], 0), Some(1));
}

#[test]
fn streamed_samples_produce_chunks_then_settle_on_fourth_tick() {
    let samples = ["a", "ab", "ab", "ab", "ab"];
    let mut tracker = StabilityTracker::new(3);
    let mut acc = StreamAccumulator::new();
    let mut chunks = Vec::new();
    let mut settled_at = None;

    for (index, sample) in samples.iter().enumerate() {
        if tracker.observe(sample.to_string()) == Observation::Changed {
            chunks.extend(acc.advance(sample));
        }
        if tracker.is_settled() {
            settled_at = Some(index + 1);
            break;
        }
    }

    assert_eq!(chunks, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(settled_at, Some(4));
}

#[test]
fn default_policies_match_their_purpose() {
    let settle = PollPolicy::page_settle();
    assert_eq!(settle.max_ticks, 40);
    assert_eq!(settle.required_stable_ticks, 4);

    let response = PollPolicy::response();
    assert_eq!(response.max_ticks, 600);
    assert_eq!(response.required_stable_ticks, 10);

    assert_eq!(PollPolicy::thread_list().max_ticks, 20);
    assert_eq!(PollPolicy::thread_list().immediate().tick_interval_ms, 0);
}
