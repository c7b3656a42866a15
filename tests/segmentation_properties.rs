//! Property tests for segmentation and quota enforcement

mod common;

use actseq_rs::machine::SessionStatus;
use actseq_rs::observation::{Normalizer, Observation, RawObservation};
use actseq_rs::quota::QuotaLimits;
use actseq_rs::segmentation::{CostModel, MismatchWeighting, Segmenter};
use actseq_rs::session::SessionTable;
use common::builders::{idle_working, PresetBuilder};
use proptest::prelude::*;

fn label_strategy() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![
        4 => Just(Some("A")),
        4 => Just(Some("B")),
        1 => Just(Some("C")),
        1 => Just(None),
    ]
}

fn window_strategy(max_len: usize) -> impl Strategy<Value = Vec<RawObservation>> {
    prop::collection::vec((label_strategy(), 0.0f64..=1.0), 0..max_len).prop_map(|frames| {
        frames
            .into_iter()
            .enumerate()
            .map(|(i, (label, confidence))| match label {
                Some(l) => RawObservation::action(i as u64, i as f64 * 0.5, l, confidence),
                None => RawObservation::unlabeled(i as u64, i as f64 * 0.5, confidence),
            })
            .collect()
    })
}

fn weighting_strategy() -> impl Strategy<Value = MismatchWeighting> {
    prop_oneof![
        Just(MismatchWeighting::Confidence),
        Just(MismatchWeighting::InverseConfidence),
        Just(MismatchWeighting::Uniform),
    ]
}

fn normalize(raw: Vec<RawObservation>) -> Vec<Observation> {
    Normalizer::new().normalize_all(raw).unwrap()
}

proptest! {
    #[test]
    fn segments_partition_the_window(
        raw in window_strategy(60),
        penalty in 0.0f64..3.0,
        weighting in weighting_strategy(),
    ) {
        let observations = normalize(raw);
        let segments = Segmenter::new(CostModel::new(penalty, weighting)).segment(&observations);

        if observations.is_empty() {
            prop_assert!(segments.is_empty());
        } else {
            prop_assert_eq!(segments[0].start, 0);
            prop_assert_eq!(segments.last().unwrap().end, observations.len() - 1);
            for pair in segments.windows(2) {
                prop_assert_eq!(pair[0].end + 1, pair[1].start);
            }
            let covered: usize = segments.iter().map(|s| s.observation_count()).sum();
            prop_assert_eq!(covered, observations.len());
            for s in &segments {
                prop_assert!(s.start <= s.end);
                prop_assert!(s.start_time <= s.end_time);
                prop_assert!(s.span >= 0.0);
                prop_assert!(s.mean_confidence > -1e-9 && s.mean_confidence < 1.0 + 1e-9);
            }
        }
    }

    #[test]
    fn segmentation_is_deterministic(raw in window_strategy(40), penalty in 0.0f64..2.0) {
        let observations = normalize(raw);
        let segmenter = Segmenter::new(CostModel::new(penalty, MismatchWeighting::Confidence));
        prop_assert_eq!(segmenter.segment(&observations), segmenter.segment(&observations));
    }

    #[test]
    fn dominant_label_occurs_in_segment(raw in window_strategy(40), penalty in 0.0f64..2.0) {
        let observations = normalize(raw);
        let segments = Segmenter::new(CostModel::new(penalty, MismatchWeighting::Uniform))
            .segment(&observations);
        for s in &segments {
            let present = observations[s.start..=s.end]
                .iter()
                .any(|o| o.label() == &s.dominant_label);
            prop_assert!(present);
        }
    }

    #[test]
    fn single_observation_is_one_segment(
        label in label_strategy(),
        confidence in 0.0f64..=1.0,
        weighting in weighting_strategy(),
    ) {
        let raw = match label {
            Some(l) => RawObservation::action(7, 3.5, l, confidence),
            None => RawObservation::unlabeled(7, 3.5, confidence),
        };
        let observations = normalize(vec![raw]);
        let segments = Segmenter::new(CostModel::new(1.0, weighting)).segment(&observations);
        prop_assert_eq!(segments.len(), 1);
        prop_assert_eq!(segments[0].start_frame, 7);
        prop_assert_eq!(segments[0].end_frame, 7);
        prop_assert_eq!(&segments[0].dominant_label, observations[0].label());
    }

    #[test]
    fn higher_penalty_never_adds_segments(raw in window_strategy(40), low in 0.0f64..1.0, extra in 0.01f64..2.0) {
        let observations = normalize(raw);
        let fine = Segmenter::new(CostModel::new(low, MismatchWeighting::Confidence))
            .segment(&observations);
        let coarse = Segmenter::new(CostModel::new(low + extra, MismatchWeighting::Confidence))
            .segment(&observations);
        prop_assert!(coarse.len() <= fine.len());
    }

    #[test]
    fn quota_ceilings_hold(
        raw in window_strategy(50),
        max_transitions in 0u64..6,
        max_span in 0.0f64..10.0,
    ) {
        let mut table = SessionTable::new(common::splitting_segmenter());
        let limits = QuotaLimits::unlimited()
            .with_max_transitions(max_transitions)
            .with_max_span(max_span);
        let id = table.create(idle_working().build(), limits);

        let result = table.ingest(id, raw).unwrap();
        let report = table.advance(id, &result).unwrap();

        prop_assert!(report.quota.consumed_transitions <= max_transitions);
        prop_assert!(report.quota.consumed_span <= max_span + 1e-9);
        prop_assert_eq!(report.quota.consumed_transitions as usize, report.log.transitions().count());
        if report.status == SessionStatus::QuotaExceeded {
            prop_assert!(report.quota.is_exceeded());
        }
    }

    #[test]
    fn accepted_transitions_follow_the_graph(raw in window_strategy(50)) {
        // A and B only lead forward; C resets
        let preset = PresetBuilder::new("chain", "a")
            .node("a", &["b"])
            .node("b", &["c"])
            .node("c", &["a"])
            .map("A", "a")
            .map("B", "b")
            .map("C", "c")
            .build();
        let mut table = SessionTable::new(common::splitting_segmenter());
        let id = table.create(preset.clone(), QuotaLimits::unlimited());

        let result = table.ingest(id, raw).unwrap();
        let report = table.advance(id, &result).unwrap();

        let mut current = preset.start_id().to_string();
        for t in report.log.transitions() {
            prop_assert_eq!(&t.from_node_id, &current);
            prop_assert!(preset.is_transition_allowed(&t.from_node_id, &t.to_node_id));
            current = t.to_node_id.clone();
        }
        let seqs: Vec<u64> = report.log.entries().iter().map(|e| e.seq()).collect();
        prop_assert!(seqs.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(report.log.len(), result.len());
    }
}
