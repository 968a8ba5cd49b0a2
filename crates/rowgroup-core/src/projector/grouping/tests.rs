use super::*;
use crate::{
    aggregate::AggregateKind,
    error::{ErrorClass, ErrorOrigin},
    expr::columns,
    obs::{MetricsSink, with_metrics_sink},
    projector::{CollectingProjector, RowSource},
    row,
    value::Value,
};
use proptest::prelude::*;
use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
};

fn unbounded() -> Arc<RamAccountingContext> {
    Arc::new(RamAccountingContext::unbounded("grouping-tests"))
}

// Group on column 0 (text) and sum column 1.
fn sum_by_text(ram: Arc<RamAccountingContext>) -> GroupingProjector {
    GroupingProjector::new(
        &[DataType::Text],
        vec![Input::Expression(0)],
        columns([0, 1]),
        &[AggregationContext::of(
            AggregateKind::Sum,
            vec![Input::Expression(1)],
        )],
        ram,
    )
    .expect("valid single-key projector")
}

// Group on `key_types.len()` leading columns and count rows.
fn count_by(key_types: &[DataType], ram: Arc<RamAccountingContext>) -> GroupingProjector {
    GroupingProjector::new(
        key_types,
        (0..key_types.len()).map(Input::Expression).collect(),
        columns(0..key_types.len()),
        &[AggregationContext::of(AggregateKind::Count, vec![])],
        ram,
    )
    .expect("valid counting projector")
}

fn attach_sink(
    projector: &Arc<GroupingProjector>,
    sink: CollectingProjector,
) -> Arc<CollectingProjector> {
    let sink = Arc::new(sink);
    projector.downstream(sink.clone());

    sink
}

fn run_to_completion(projector: GroupingProjector, rows: Vec<Row>) -> Arc<CollectingProjector> {
    let projector = Arc::new(projector);
    let sink = attach_sink(&projector, CollectingProjector::new());
    let source = RowSource::new(rows);
    source.downstream(projector.clone());

    projector.start_projection().expect("start should succeed");
    source.run().expect("every row should fold");

    sink
}

fn as_set(rows: Vec<Row>) -> HashSet<Row> {
    rows.into_iter().collect()
}

#[derive(Default)]
struct CapturingSink {
    events: RefCell<Vec<MetricsEvent>>,
}

impl MetricsSink for CapturingSink {
    fn record(&self, event: MetricsEvent) {
        self.events.borrow_mut().push(event);
    }
}

#[test]
fn single_key_sum_emits_one_row_per_key() {
    let sink = run_to_completion(
        sum_by_text(unbounded()),
        vec![row!["A", 1], row!["B", 2], row!["A", 3]],
    );

    assert_eq!(
        as_set(sink.rows()),
        as_set(vec![row!["A", 4i64], row!["B", 2i64]])
    );
    assert_eq!(sink.finished_count(), 1);
    assert!(sink.failures().is_empty());
}

#[test]
fn multi_key_count_splits_on_any_differing_column() {
    let sink = run_to_completion(
        count_by(&[DataType::Text, DataType::Text], unbounded()),
        vec![row!["A", "X", 1], row!["A", "Y", 2], row!["A", "X", 3]],
    );

    assert_eq!(
        as_set(sink.rows()),
        as_set(vec![row!["A", "X", 2i64], row!["A", "Y", 1i64]])
    );
}

#[test]
fn null_keys_form_one_group() {
    let sink = run_to_completion(
        count_by(&[DataType::Long], unbounded()),
        vec![row![None::<i64>], row![1i64], row![None::<i64>]],
    );

    assert_eq!(
        as_set(sink.rows()),
        as_set(vec![row![None::<i64>, 2i64], row![1i64, 1i64]])
    );
}

#[test]
fn zero_key_columns_fold_every_row_into_one_group() {
    let sink = run_to_completion(
        GroupingProjector::new(
            &[],
            vec![],
            columns([0]),
            &[AggregationContext::of(
                AggregateKind::Sum,
                vec![Input::Expression(0)],
            )],
            unbounded(),
        )
        .expect("global aggregate is valid"),
        vec![row![1], row![2], row![3]],
    );

    assert_eq!(sink.rows(), vec![row![6i64]]);
}

#[test]
fn construction_rejects_key_arity_mismatch() {
    let err = GroupingProjector::new(
        &[DataType::Text, DataType::Long],
        vec![Input::Expression(0)],
        columns([0]),
        &[],
        unbounded(),
    )
    .err()
    .expect("two types for one input");

    assert_eq!(
        err,
        GroupError::Configuration(ConfigurationError::KeyArityMismatch {
            key_types: 2,
            key_inputs: 1
        })
    );
}

#[test]
fn construction_rejects_unknown_and_unhashable_key_types() {
    let unknown = GroupingProjector::new(
        &[DataType::Text, DataType::Undefined],
        vec![Input::Expression(0), Input::Expression(1)],
        columns([0, 1]),
        &[],
        unbounded(),
    )
    .err()
    .expect("undefined key type");
    assert_eq!(
        unknown,
        GroupError::Configuration(ConfigurationError::UnknownKeyType { index: 1 })
    );

    let unhashable = GroupingProjector::new(
        &[DataType::Object],
        vec![Input::Expression(0)],
        columns([0]),
        &[],
        unbounded(),
    )
    .err()
    .expect("object key type");
    assert_eq!(
        unhashable,
        GroupError::Configuration(ConfigurationError::UnhashableKeyType {
            index: 0,
            data_type: DataType::Object
        })
    );
}

#[test]
fn construction_rejects_inputs_past_bound_expressions() {
    let err = GroupingProjector::new(
        &[DataType::Text],
        vec![Input::Expression(0)],
        columns([0]),
        &[AggregationContext::of(
            AggregateKind::Max,
            vec![Input::Expression(4)],
        )],
        unbounded(),
    )
    .err()
    .expect("aggregate input 4 is unbound");

    assert_eq!(
        err,
        GroupError::Configuration(ConfigurationError::InputOutOfRange {
            index: 4,
            expressions: 1
        })
    );
}

#[test]
fn construction_charges_grouper_overhead() {
    let ram = unbounded();
    let _projector = count_by(&[DataType::Long], ram.clone());

    assert_eq!(ram.total_bytes(), 8);
}

#[test]
fn single_key_accounting_charges_lookup_always_and_key_on_miss() {
    let ram = unbounded();
    let projector = count_by(&[DataType::Text], ram.clone());
    projector.register_upstream(&RowSource::new(vec![]));

    projector.set_next_row(&row!["ab"]).expect("fits");
    // grouper 8 + lookup 32 + count state 8 + round_up(36 + 2) 40 + entry 24
    assert_eq!(ram.total_bytes(), 112);

    projector.set_next_row(&row!["ab"]).expect("fits");
    assert_eq!(ram.total_bytes(), 144, "a hit only charges the lookup");

    projector.upstream_finished().expect("drain fits");
    // outer round_up(12 + 1 * 4) 16 + inner round_up(12 + 2 * 4) 24
    assert_eq!(ram.total_bytes(), 184);
}

#[test]
fn multi_key_accounting_charges_list_header_and_elements_on_miss() {
    let ram = unbounded();
    let projector = count_by(&[DataType::Text, DataType::Integer], ram.clone());
    projector.register_upstream(&RowSource::new(vec![]));

    projector.set_next_row(&row!["a", 1]).expect("fits");
    // grouper 8 + lookup 32 + count state 8
    // + key list 12 + (round_up(37 + 4) + 4) 52 + (round_up(16 + 4) + 4) 28 + entry 24
    assert_eq!(ram.total_bytes(), 164);

    projector.set_next_row(&row!["a", 1]).expect("fits");
    assert_eq!(ram.total_bytes(), 196);
}

#[test]
fn circuit_break_during_push_notifies_downstream_then_fails() {
    // grouper 8 + first row 32 + 8 + 24 + 24 = 96; the next lookup breaches.
    let ram = Arc::new(RamAccountingContext::new("tight", 100));
    let projector = Arc::new(count_by(&[DataType::Long], ram.clone()));
    let sink = attach_sink(&projector, CollectingProjector::new());
    projector.register_upstream(&RowSource::new(vec![]));
    projector.start_projection().expect("start");

    assert_eq!(projector.set_next_row(&row![1i64]), Ok(true));
    let err = projector
        .set_next_row(&row![2i64])
        .expect_err("second row breaches the ceiling");

    assert!(err.is_circuit_breaking(), "{err}");
    assert_eq!(sink.failures(), vec![err]);
    assert!(ram.is_tripped());

    assert_eq!(
        projector.set_next_row(&row![3i64]),
        Ok(false),
        "an aborted projector folds no further rows"
    );
    assert_eq!(projector.group_count(), 0);

    projector.upstream_finished().expect("aborted drain is a no-op");
    assert!(sink.rows().is_empty());
    assert_eq!(sink.finished_count(), 0);
}

#[test]
fn circuit_break_while_draining_is_forwarded() {
    // grouper 8 + first row 88 = 96 before the drain; the outer array charge breaches.
    let ram = Arc::new(RamAccountingContext::new("drain", 100));
    let projector = Arc::new(count_by(&[DataType::Long], ram));
    let sink = attach_sink(&projector, CollectingProjector::new());
    projector.register_upstream(&RowSource::new(vec![]));

    projector.set_next_row(&row![1i64]).expect("fits");
    let err = projector
        .upstream_finished()
        .expect_err("output arrays breach the ceiling");

    assert!(err.is_circuit_breaking());
    assert_eq!(sink.failures(), vec![err]);
    assert!(sink.rows().is_empty());
}

#[test]
fn failed_fold_aborts_instead_of_emitting_a_partial_group() {
    let projector = Arc::new(
        GroupingProjector::new(
            &[DataType::Text],
            vec![Input::Expression(0)],
            columns([0, 1]),
            &[
                AggregationContext::of(AggregateKind::Count, vec![]),
                AggregationContext::of(AggregateKind::Sum, vec![Input::Expression(1)]),
            ],
            unbounded(),
        )
        .expect("valid projector"),
    );
    let sink = attach_sink(&projector, CollectingProjector::new());
    projector.register_upstream(&RowSource::new(vec![]));
    projector.start_projection().expect("start");

    assert_eq!(projector.set_next_row(&row!["A", 1]), Ok(true));
    let GroupError::Internal(err) = projector
        .set_next_row(&row!["A", "x"])
        .expect_err("sum rejects text")
    else {
        panic!("non-numeric sum must be an internal error");
    };
    assert_eq!(err.class, ErrorClass::Unsupported);
    assert_eq!(err.origin, ErrorOrigin::Aggregate);
    assert_eq!(sink.failures(), vec![GroupError::Internal(err)]);

    assert_eq!(projector.set_next_row(&row!["A", 2]), Ok(false));
    assert_eq!(projector.group_count(), 0);

    projector.upstream_finished().expect("aborted drain is a no-op");
    assert!(sink.rows().is_empty());
    assert_eq!(sink.finished_count(), 0);
}

#[test]
fn downstream_push_error_during_drain_fails_downstream() {
    // Accepts nothing, but records the signals it receives.
    #[derive(Default)]
    struct RefusingProjector {
        signals: CollectingProjector,
    }

    impl Projector for RefusingProjector {
        fn start_projection(&self) -> Result<(), GroupError> {
            self.signals.start_projection()
        }

        fn set_next_row(&self, _: &Row) -> Result<bool, GroupError> {
            Err(InternalError::projector_internal("downstream rejected the row").into())
        }

        fn register_upstream(&self, upstream: &dyn ProjectorUpstream) {
            self.signals.register_upstream(upstream);
        }

        fn upstream_finished(&self) -> Result<(), GroupError> {
            self.signals.upstream_finished()
        }

        fn upstream_failed(&self, error: GroupError) {
            self.signals.upstream_failed(error);
        }
    }

    let projector = Arc::new(count_by(&[DataType::Long], unbounded()));
    let refusing = Arc::new(RefusingProjector::default());
    projector.downstream(refusing.clone());
    projector.register_upstream(&RowSource::new(vec![]));

    projector.set_next_row(&row![1i64]).expect("fits");
    let err = projector
        .upstream_finished()
        .expect_err("downstream rejects the drained row");

    assert_eq!(refusing.signals.failures(), vec![err]);
    assert_eq!(refusing.signals.finished_count(), 0);
}

#[test]
fn latched_failure_is_surfaced_and_rows_are_still_emitted() {
    let projector = Arc::new(sum_by_text(unbounded()));
    let sink = attach_sink(&projector, CollectingProjector::new());

    let healthy = RowSource::new(vec![row!["A", 1], row!["B", 2]]);
    let failing = RowSource::failing(vec![row!["A", 3]], GroupError::upstream("shard lost"));
    healthy.downstream(projector.clone());
    failing.downstream(projector.clone());
    assert_eq!(projector.remaining_upstreams(), 2);

    projector.start_projection().expect("start");
    failing.run().expect("failure is reported, not returned");
    assert_eq!(
        projector.latched_failure(),
        Some(&GroupError::upstream("shard lost"))
    );
    assert!(sink.failures().is_empty(), "latched until the last producer");

    healthy.run().expect("last producer finishes normally");

    assert_eq!(sink.failures(), vec![GroupError::upstream("shard lost")]);
    assert_eq!(
        as_set(sink.rows()),
        as_set(vec![row!["A", 4i64], row!["B", 2i64]])
    );
    assert_eq!(sink.finished_count(), 1);
}

#[test]
fn only_the_first_latched_failure_is_kept() {
    let projector = Arc::new(sum_by_text(unbounded()));
    let sink = attach_sink(&projector, CollectingProjector::new());
    for _ in 0..3 {
        projector.register_upstream(&RowSource::new(vec![]));
    }

    projector.upstream_failed(GroupError::upstream("first"));
    projector.upstream_failed(GroupError::upstream("second"));
    projector.upstream_finished().expect("drain");

    assert_eq!(sink.failures(), vec![GroupError::upstream("first")]);
    assert_eq!(sink.finished_count(), 1);
}

#[test]
fn failing_last_producer_discards_the_table() {
    let projector = Arc::new(sum_by_text(unbounded()));
    let sink = attach_sink(&projector, CollectingProjector::new());

    let healthy = RowSource::new(vec![row!["A", 1]]);
    let failing = RowSource::failing(vec![row!["B", 2]], GroupError::upstream("node down"));
    healthy.downstream(projector.clone());
    failing.downstream(projector.clone());

    projector.start_projection().expect("start");
    healthy.run().expect("first producer finishes");
    failing.run().expect("failure is reported, not returned");

    assert_eq!(sink.failures(), vec![GroupError::upstream("node down")]);
    assert!(sink.rows().is_empty());
    assert_eq!(sink.finished_count(), 0);
    assert_eq!(projector.group_count(), 0);
}

#[test]
fn start_without_producers_completes_immediately() {
    let projector = Arc::new(sum_by_text(unbounded()));
    let sink = attach_sink(&projector, CollectingProjector::new());

    projector.start_projection().expect("empty drain");

    assert!(sink.rows().is_empty());
    assert_eq!(sink.finished_count(), 1);
}

#[test]
fn downstream_backpressure_stops_forwarding_but_completes() {
    let capture = Rc::new(CapturingSink::default());
    let projector = Arc::new(count_by(&[DataType::Long], unbounded()));
    let sink = attach_sink(&projector, CollectingProjector::with_limit(1));
    let source = RowSource::new(vec![row![1i64], row![2i64], row![3i64]]);
    source.downstream(projector.clone());

    with_metrics_sink(capture.clone(), || {
        projector.start_projection().expect("start");
        source.run().expect("run");
    });

    assert_eq!(sink.rows().len(), 1);
    assert_eq!(sink.finished_count(), 1);

    let events = capture.events.borrow();
    assert_eq!(events.first(), Some(&MetricsEvent::ProjectionStart));
    assert!(
        matches!(
            events.last(),
            Some(MetricsEvent::ProjectionFinish {
                rows_grouped: 3,
                groups: 3,
                rows_forwarded: 1,
                ..
            })
        ),
        "unexpected events: {events:?}"
    );
}

#[test]
fn push_after_drain_fails_fast() {
    let projector = sum_by_text(unbounded());
    projector.start_projection().expect("drains immediately");

    let GroupError::Internal(err) = projector
        .set_next_row(&row!["A", 1])
        .expect_err("table already drained")
    else {
        panic!("push after drain must be an internal error");
    };

    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert_eq!(err.origin, ErrorOrigin::Projector);
}

#[test]
fn short_rows_surface_expression_errors() {
    let projector = sum_by_text(unbounded());
    projector.register_upstream(&RowSource::new(vec![]));

    let err = projector
        .set_next_row(&row!["A"])
        .expect_err("column 1 is missing");

    assert!(matches!(
        err,
        GroupError::Internal(InternalError {
            origin: ErrorOrigin::Expression,
            ..
        })
    ));
}

#[test]
fn group_count_tracks_distinct_keys() {
    let projector = count_by(&[DataType::Integer], unbounded());
    projector.register_upstream(&RowSource::new(vec![]));

    for value in [1, 2, 1, 3, 2] {
        projector.set_next_row(&row![value]).expect("fits");
    }

    assert_eq!(projector.group_count(), 3);
}

proptest! {
    #[test]
    fn grouping_is_independent_of_row_order(
        pairs in prop::collection::vec((0..5i32, -100..100i32), 0..64),
    ) {
        let rows = pairs
            .iter()
            .map(|(key, value)| row![*key, *value])
            .collect::<Vec<_>>();
        let mut reversed = rows.clone();
        reversed.reverse();

        let sum_by_int = || {
            GroupingProjector::new(
                &[DataType::Integer],
                vec![Input::Expression(0)],
                columns([0, 1]),
                &[AggregationContext::of(AggregateKind::Sum, vec![Input::Expression(1)])],
                unbounded(),
            )
            .expect("valid projector")
        };

        let forward = as_set(run_to_completion(sum_by_int(), rows).rows());
        let backward = as_set(run_to_completion(sum_by_int(), reversed).rows());

        let mut expected = HashMap::<i32, i64>::new();
        for (key, value) in &pairs {
            *expected.entry(*key).or_default() += i64::from(*value);
        }
        let expected = expected
            .into_iter()
            .map(|(key, total)| row![key, Value::Long(total)])
            .collect::<HashSet<_>>();

        prop_assert_eq!(&forward, &expected);
        prop_assert_eq!(&backward, &expected);
    }
}
