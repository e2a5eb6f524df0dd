use chrono::{NaiveDate, NaiveTime};
use common::EmployeeId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{NewSchedule, Schedule, ScheduleStatus};
use store::{InMemoryStore, ScheduleRepository};

fn make_schedule(day: u32) -> Schedule {
    Schedule::create(NewSchedule {
        employee_id: EmployeeId::new(),
        work_date: NaiveDate::from_ymd_opt(2026, 1, 1 + day % 28).unwrap(),
        start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        status: Some(ScheduleStatus::Booked),
        notes: None,
    })
    .unwrap()
}

fn bench_insert_schedule(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("store/insert_schedule", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryStore::new();
                store.insert_schedule(&make_schedule(0)).await.unwrap();
            });
        });
    });
}

fn bench_cancel_transitions(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("store/pending_cancel_then_cancelled", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryStore::new();
                let schedule = make_schedule(3);
                store.insert_schedule(&schedule).await.unwrap();
                store
                    .transition_schedule_status(
                        schedule.id,
                        ScheduleStatus::Booked,
                        ScheduleStatus::PendingCancel,
                        Some("bench".to_string()),
                    )
                    .await
                    .unwrap();
                store
                    .transition_schedule_status(
                        schedule.id,
                        ScheduleStatus::PendingCancel,
                        ScheduleStatus::Cancelled,
                        Some("bench".to_string()),
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_lookup_among_many(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let target = make_schedule(10);

    rt.block_on(async {
        for day in 0..500 {
            store.insert_schedule(&make_schedule(day)).await.unwrap();
        }
        store.insert_schedule(&target).await.unwrap();
    });

    c.bench_function("store/find_by_employee_and_date_500", |b| {
        b.iter(|| {
            rt.block_on(async {
                store
                    .find_schedule_by_employee_and_date(target.employee_id, target.work_date)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_insert_schedule,
    bench_cancel_transitions,
    bench_lookup_among_many
);
criterion_main!(benches);
