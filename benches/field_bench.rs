use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use proto_field_bridge::deserialization::parse_message;
use proto_field_bridge::serialization::{serialize_message, serialize_message_into};
use proto_field_bridge::types::{TYPE_INT32, TYPE_STRING};
use proto_field_bridge::{FieldAccessor, FieldSpec, HostValue, MapField, MessageDescriptor, MessageRef, RepeatedField};
use proto_field_bridge::field::{Int32Kind, MessageKind};
use std::hint::black_box;
use std::sync::Arc;

// ─── Test Data ──────────────────────────────────────────────────────────────

/// {
///   name: string = 1,
///   counts: repeated int32 = 2,
///   scores: map<string, int32> = 3,
///   children: repeated Child = 4,
/// }
fn bench_schema() -> Arc<MessageDescriptor> {
    let child = MessageDescriptor::builder("bench.Child")
        .field(FieldSpec::scalar("value", 1, TYPE_INT32))
        .build()
        .unwrap();
    MessageDescriptor::builder("bench.Record")
        .field(FieldSpec::scalar("name", 1, TYPE_STRING))
        .field(FieldSpec::scalar("counts", 2, TYPE_INT32).repeated())
        .field(FieldSpec::map("scores", 3, TYPE_STRING, FieldSpec::scalar("", 0, TYPE_INT32)))
        .field(FieldSpec::message("children", 4, &child).repeated())
        .build()
        .unwrap()
}

const MAP_ENTRIES: usize = 64;
const REPEATED_LEN: usize = 256;

/// A record with a populated map, repeated scalars and repeated children.
fn make_record(descriptor: &Arc<MessageDescriptor>) -> MessageRef {
    let record = MessageRef::new(descriptor);
    record.set_attr("name", &HostValue::from("bench")).unwrap();

    let counts = RepeatedField::<Int32Kind>::new(&record, field(descriptor, "counts")).unwrap();
    for i in 0..REPEATED_LEN {
        counts.add(&HostValue::from(i as i64)).unwrap();
    }

    let scores = MapField::<Int32Kind>::new(&record, field(descriptor, "scores")).unwrap();
    for i in 0..MAP_ENTRIES {
        scores.set(&HostValue::from(format!("key{i}")), i as i32).unwrap();
    }

    let children = FieldAccessor::<MessageKind>::new(&record, field(descriptor, "children")).unwrap();
    for i in 0..16 {
        let child = children.add_default().unwrap();
        child.set_attr("value", &HostValue::from(i as i64)).unwrap();
    }
    record
}

fn field<'a>(
    descriptor: &'a Arc<MessageDescriptor>,
    name: &str,
) -> &'a Arc<proto_field_bridge::FieldDescriptor> {
    descriptor.find_field_by_name(name).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 1: Map Lookup
// ═══════════════════════════════════════════════════════════════════════════

fn bench_map_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_lookup");
    let descriptor = bench_schema();
    let record = make_record(&descriptor);
    let scores = MapField::<Int32Kind>::new(&record, field(&descriptor, "scores")).unwrap();

    let first = HostValue::from("key0");
    let last = HostValue::from(format!("key{}", MAP_ENTRIES - 1));
    let missing = HostValue::from("absent");

    group.bench_function("get (first entry)", |b| {
        b.iter(|| scores.get(black_box(&first)).unwrap())
    });

    group.bench_function("get (last entry)", |b| {
        b.iter(|| scores.get(black_box(&last)).unwrap())
    });

    group.bench_function("contains (miss)", |b| {
        b.iter(|| scores.contains(black_box(&missing)).unwrap())
    });

    group.bench_function("get_attr + get_item", |b| {
        b.iter(|| {
            let HostValue::Map(map) = record.get_attr(black_box("scores")).unwrap() else {
                panic!("Expected map");
            };
            map.get_item(black_box(&last)).unwrap()
        })
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 2: Repeated Insert
// ═══════════════════════════════════════════════════════════════════════════

fn bench_repeated_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("repeated_insert");
    let descriptor = bench_schema();
    let value = HostValue::from(7i64);

    for (label, position) in [("front", 0i64), ("middle", REPEATED_LEN as i64 / 2), ("back", REPEATED_LEN as i64)] {
        group.bench_function(format!("insert ({label})"), |b| {
            b.iter_batched(
                || make_record(&descriptor),
                |record| {
                    let counts = RepeatedField::<Int32Kind>::new(&record, field(&descriptor, "counts")).unwrap();
                    counts.insert(black_box(position), &value).unwrap();
                    record
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.bench_function("insert + delete (front)", |b| {
        let record = make_record(&descriptor);
        let counts = RepeatedField::<Int32Kind>::new(&record, field(&descriptor, "counts")).unwrap();
        b.iter(|| {
            counts.insert(black_box(0), &value).unwrap();
            counts.delete(black_box(0)).unwrap();
        })
    });

    group.bench_function("get_item", |b| {
        let record = make_record(&descriptor);
        let counts = RepeatedField::<Int32Kind>::new(&record, field(&descriptor, "counts")).unwrap();
        let index = HostValue::from(REPEATED_LEN as i64 - 1);
        b.iter(|| counts.get_item(black_box(&index)).unwrap())
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 3: Buffer Reuse (serialize_message_into vs serialize_message)
// ═══════════════════════════════════════════════════════════════════════════

fn bench_buffer_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_reuse");
    let descriptor = bench_schema();
    let record = make_record(&descriptor);

    group.bench_function("serialize_message (fresh alloc)", |b| {
        b.iter(|| serialize_message(black_box(&record)).unwrap())
    });

    group.bench_function("serialize_message_into (reuse)", |b| {
        let mut buf = Vec::new();
        b.iter(|| serialize_message_into(black_box(&record), &mut buf).unwrap())
    });

    let bytes = serialize_message(&record).unwrap();
    group.bench_function("parse_message", |b| {
        b.iter(|| parse_message(&descriptor, black_box(&bytes)).unwrap())
    });

    group.finish();
}

// ─── Criterion Main ─────────────────────────────────────────────────────────

criterion_group!(benches, bench_map_lookup, bench_repeated_insert, bench_buffer_reuse);
criterion_main!(benches);
