use criterion::{black_box, criterion_group, criterion_main, Criterion};
use event_bus::EventEnvelope;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskCreatedV1 {
    task_id: i64,
    title: String,
    description: String,
    user_id: i64,
    project_id: i64,
    status: String,
    priority: String,
}

fn sample() -> EventEnvelope<TaskCreatedV1> {
    EventEnvelope::new(
        "task.created",
        "task-service",
        "1.0",
        TaskCreatedV1 {
            task_id: 42,
            title: "Write launch checklist".to_string(),
            description: "Everything that must happen before the launch window".to_string(),
            user_id: 7,
            project_id: 42,
            status: "TODO".to_string(),
            priority: "MEDIUM".to_string(),
        },
    )
}

fn envelope_encode(c: &mut Criterion) {
    let envelope = sample();
    c.bench_function("envelope_encode", |b| {
        b.iter(|| serde_json::to_vec(black_box(&envelope)).unwrap())
    });
}

fn envelope_decode(c: &mut Criterion) {
    let bytes = serde_json::to_vec(&sample()).unwrap();
    c.bench_function("envelope_decode", |b| {
        b.iter(|| {
            let envelope: EventEnvelope<TaskCreatedV1> =
                serde_json::from_slice(black_box(&bytes)).unwrap();
            envelope
        })
    });
}

criterion_group!(benches, envelope_encode, envelope_decode);
criterion_main!(benches);
