use std::sync::Arc;
use std::time::Duration;

use common::{AppointmentId, EmployeeId, MedicineId, RequestContext};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{MedicalExam, Money, NewPrescriptionItem};
use saga::{
    Compensator, CreatePrescription, InMemoryBillingService, InMemoryEscalationLog,
    InMemoryInventoryService, PrescriptionSaga, RetryPolicy,
};
use store::{ExamRepository, InMemoryStore};

const MEDICINES: usize = 5;

async fn setup(compensator: Compensator) -> (
    PrescriptionSaga<InMemoryStore, InMemoryStore, InMemoryInventoryService, InMemoryBillingService>,
    MedicalExam,
) {
    let store = InMemoryStore::new();
    let inventory = InMemoryInventoryService::new();
    for i in 0..MEDICINES {
        inventory
            .add_medicine(format!("MED-{i}"), format!("Medicine {i}"), Money::from_cents(500), 1_000_000)
            .await;
    }
    let exam = MedicalExam::new(AppointmentId::new(), "patient-bench", EmployeeId::new());
    store.insert_exam(&exam).await.unwrap();

    let saga = PrescriptionSaga::new(
        store.clone(),
        store,
        inventory,
        InMemoryBillingService::new(),
        compensator,
    );
    (saga, exam)
}

fn request() -> CreatePrescription {
    CreatePrescription {
        notes: None,
        items: (0..MEDICINES)
            .map(|i| NewPrescriptionItem::new(format!("MED-{i}"), 1, "daily"))
            .collect(),
    }
}

fn bench_create_and_cancel(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let compensator = Compensator::new(RetryPolicy::default(), Arc::new(InMemoryEscalationLog::new()));

    c.bench_function("saga/prescription_create_cancel_5_items", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (saga, exam) = setup(compensator.clone()).await;
                let ctx = RequestContext::system();
                let prescription = saga.create(&ctx, exam.id, request()).await.unwrap();
                saga.cancel(&ctx, prescription.id, "bench").await.unwrap();
            });
        });
    });
}

fn bench_cancel_with_retries(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    // zero base delay: retries without wall-clock sleeps
    let compensator = Compensator::new(
        RetryPolicy::new(3, Duration::ZERO),
        Arc::new(InMemoryEscalationLog::new()),
    );

    c.bench_function("saga/prescription_cancel_with_retries", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryStore::new();
                let inventory = InMemoryInventoryService::new();
                inventory
                    .add_medicine("MED-0", "Medicine 0", Money::from_cents(500), 100)
                    .await;
                let exam = MedicalExam::new(AppointmentId::new(), "patient-bench", EmployeeId::new());
                store.insert_exam(&exam).await.unwrap();
                let saga = PrescriptionSaga::new(
                    store.clone(),
                    store,
                    inventory.clone(),
                    InMemoryBillingService::new(),
                    compensator.clone(),
                );

                let ctx = RequestContext::system();
                let prescription = saga
                    .create(
                        &ctx,
                        exam.id,
                        CreatePrescription {
                            notes: None,
                            items: vec![NewPrescriptionItem::new("MED-0", 1, "daily")],
                        },
                    )
                    .await
                    .unwrap();
                inventory
                    .fail_adjustments(&MedicineId::new("MED-0"), 2)
                    .await;
                saga.cancel(&ctx, prescription.id, "bench").await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_create_and_cancel,
    bench_cancel_with_retries
);
criterion_main!(benches);
