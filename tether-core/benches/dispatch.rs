//! Dispatch benchmarks: raw tracked-action fan-out, observable writes, and
//! writes through bound presenter delegates.

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tether_core::prelude::*;
use tether_core::TrackedAction;

fn bench_action_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracked_action/invoke");

    for handlers in [1usize, 4, 16, 64] {
        let action = TrackedAction::<u64>::new();
        let sink = Arc::new(AtomicU64::new(0));
        for _ in 0..handlers {
            let sink = sink.clone();
            action.subscribe(move |value| {
                sink.fetch_add(*value, Ordering::Relaxed);
            });
        }

        group.throughput(Throughput::Elements(handlers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(handlers), &action, |b, action| {
            b.iter(|| action.invoke(black_box(&1)));
        });
    }

    group.finish();
}

fn bench_list_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("observable_list/push");

    for len in [0usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let list = ObservableList::from_vec((0..len as u64).collect());
            list.subscribe(|l| {
                black_box(l.previous_value().len());
            });
            b.iter(|| {
                list.push(black_box(7));
                list.remove_at(len).ok();
            });
        });
    }

    group.finish();
}

#[derive(Default)]
struct Gauge {
    core: ModelCore,
    value: ObservableVariable<f64>,
}

impl DataModel for Gauge {
    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema.observable("value", |m: &Self| &m.value);
    }
}

struct GaugeView {
    id: SubscriberId,
    gauge: Arc<Gauge>,
    last: AtomicU64,
}

impl Subscriber for GaugeView {
    type Model = Gauge;

    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn model(&self) -> Option<Arc<Gauge>> {
        Some(self.gauge.clone())
    }

    fn declare(table: &mut BindingTable<Self>) {
        table.on_value_and_previous("value", "on_value", |view: &Self, value: f64, _: f64| {
            view.last.store(value.to_bits(), Ordering::Relaxed);
        });
    }
}

fn bench_bound_write(c: &mut Criterion) {
    let bindings = Bindings::default();
    let gauge = Arc::new(Gauge::default());
    let view = Arc::new(GaugeView {
        id: SubscriberId::new(),
        gauge: gauge.clone(),
        last: AtomicU64::new(0),
    });
    view.bind(&bindings);

    let mut next = 0.0;
    c.bench_function("bound_variable/set_value", |b| {
        b.iter(|| {
            next += 1.0;
            gauge.value.set_value(black_box(next));
        });
    });
}

criterion_group!(benches, bench_action_fanout, bench_list_push, bench_bound_write);
criterion_main!(benches);
