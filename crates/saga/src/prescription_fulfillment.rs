//! Prescription fulfillment saga: issue with stock decrement, cancel with
//! stock restore, dispense with invoicing.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use common::{ExamId, MedicineId, PrescriptionId, RequestContext};
use domain::{NewPrescriptionItem, Prescription, PrescriptionItem, PrescriptionStatus};
use serde::{Deserialize, Serialize};
use store::{ExamRepository, PrescriptionRepository, StoreError};

use crate::compensator::Compensator;
use crate::error::{RemoteError, Result, SagaError};
use crate::services::{BillingClient, InventoryClient};
use crate::step::{Step, run_steps};

/// Saga name of prescription creation.
pub const SAGA_CREATE: &str = "prescription_create";

/// Saga name of prescription cancellation.
pub const SAGA_CANCEL: &str = "prescription_cancel";

/// Notes sent with the invoice requested after a dispense.
pub const INVOICE_NOTES: &str = "Auto-generated after prescription dispense";

/// Input for issuing a prescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePrescription {
    pub notes: Option<String>,
    pub items: Vec<NewPrescriptionItem>,
}

/// Signed change of one medicine's stock. The inverse applies the opposite
/// delta.
struct StockAdjustment<'a, I> {
    inventory: &'a I,
    medicine_id: MedicineId,
    delta: i64,
}

impl<'a, I: InventoryClient> StockAdjustment<'a, I> {
    /// One decrement per item, in prescription order.
    fn decrements(inventory: &'a I, items: &[PrescriptionItem]) -> Vec<Self> {
        items
            .iter()
            .map(|item| StockAdjustment {
                inventory,
                medicine_id: item.medicine_id.clone(),
                delta: -i64::from(item.quantity),
            })
            .collect()
    }

    fn reversed(&self) -> Self {
        StockAdjustment {
            inventory: self.inventory,
            medicine_id: self.medicine_id.clone(),
            delta: -self.delta,
        }
    }
}

#[async_trait]
impl<'a, I: InventoryClient> Step for StockAdjustment<'a, I> {
    fn name(&self) -> &'static str {
        if self.delta < 0 {
            "decrement_stock"
        } else {
            "restore_stock"
        }
    }

    fn resource_key(&self) -> String {
        format!("medicine {}", self.medicine_id)
    }

    fn magnitude(&self) -> i64 {
        -self.delta
    }

    async fn forward(&self, ctx: &RequestContext) -> std::result::Result<u64, RemoteError> {
        self.inventory
            .adjust_stock(ctx, &self.medicine_id, self.delta)
            .await?;
        Ok(self.delta.unsigned_abs())
    }

    async fn inverse(&self, ctx: &RequestContext) -> std::result::Result<u64, RemoteError> {
        self.inventory
            .adjust_stock(ctx, &self.medicine_id, -self.delta)
            .await?;
        Ok(self.delta.unsigned_abs())
    }
}

fn observe<T>(saga: &'static str, started: Instant, result: &Result<T>) {
    metrics::histogram!("saga_duration_seconds", "saga" => saga)
        .record(started.elapsed().as_secs_f64());
    if let Err(error) = result {
        metrics::counter!("saga_failed_total", "saga" => saga).increment(1);
        tracing::warn!(saga, %error, "saga failed");
    }
}

/// Orchestrates prescriptions against the remote medicine inventory.
pub struct PrescriptionSaga<P, X, I, B>
where
    P: PrescriptionRepository,
    X: ExamRepository,
    I: InventoryClient,
    B: BillingClient,
{
    prescriptions: P,
    exams: X,
    inventory: I,
    billing: B,
    compensator: Compensator,
}

impl<P, X, I, B> PrescriptionSaga<P, X, I, B>
where
    P: PrescriptionRepository,
    X: ExamRepository,
    I: InventoryClient,
    B: BillingClient,
{
    /// Creates a new prescription saga.
    pub fn new(prescriptions: P, exams: X, inventory: I, billing: B, compensator: Compensator) -> Self {
        Self {
            prescriptions,
            exams,
            inventory,
            billing,
            compensator,
        }
    }

    /// Issues a prescription for an exam and takes its items out of stock.
    ///
    /// Nothing is written until every item has been checked against current
    /// stock. If a decrement then fails, the earlier decrements are
    /// compensated but the prescription stays persisted as ACTIVE.
    #[tracing::instrument(skip(self, ctx, input), fields(saga = SAGA_CREATE, items = input.items.len()))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        exam_id: ExamId,
        input: CreatePrescription,
    ) -> Result<Prescription> {
        metrics::counter!("saga_executions_total", "saga" => SAGA_CREATE).increment(1);
        let started = Instant::now();
        let result = self.execute_create(ctx, exam_id, input).await;
        observe(SAGA_CREATE, started, &result);
        result
    }

    async fn execute_create(
        &self,
        ctx: &RequestContext,
        exam_id: ExamId,
        input: CreatePrescription,
    ) -> Result<Prescription> {
        // 1. Validate input
        if input.items.is_empty() {
            return Err(SagaError::Validation(
                "Prescription must contain at least one item".to_string(),
            ));
        }
        if let Some(item) = input.items.iter().find(|i| i.quantity == 0) {
            return Err(SagaError::Validation(format!(
                "Quantity for medicine {} must be greater than 0",
                item.medicine_id
            )));
        }

        // 2. Exam without prescription
        let exam = self
            .exams
            .get_exam(exam_id)
            .await?
            .ok_or_else(|| SagaError::not_found("MedicalExam", exam_id))?;
        if exam.has_prescription
            || self
                .prescriptions
                .find_prescription_by_exam(exam_id)
                .await?
                .is_some()
        {
            return Err(already_prescribed(exam_id));
        }

        // 3. Stock check and price snapshot, no writes yet. Lines naming the
        // same medicine are checked against their combined quantity.
        let mut requested: HashMap<MedicineId, u32> = HashMap::new();
        for item in &input.items {
            let total = requested.entry(item.medicine_id.clone()).or_default();
            *total = total.saturating_add(item.quantity);
        }

        let mut items = Vec::with_capacity(input.items.len());
        for request in input.items {
            let medicine = self
                .inventory
                .get_medicine(ctx, &request.medicine_id)
                .await?
                .ok_or_else(|| SagaError::not_found("Medicine", &request.medicine_id))?;

            let required = requested
                .get(&request.medicine_id)
                .copied()
                .unwrap_or(request.quantity);
            if medicine.quantity < required {
                return Err(SagaError::InsufficientStock {
                    medicine: medicine.name,
                    required,
                    available: medicine.quantity,
                });
            }
            items.push(PrescriptionItem::snapshot(
                request,
                medicine.name,
                medicine.unit_price,
            ));
        }

        // 4. Persist
        let prescription = Prescription::issue(&exam, input.notes, items)?;
        match self.prescriptions.insert_prescription(&prescription).await {
            Ok(()) => {}
            Err(StoreError::Duplicate { .. }) => return Err(already_prescribed(exam_id)),
            Err(e) => return Err(e.into()),
        }
        self.exams.mark_exam_prescribed(exam_id).await?;

        // 5. Decrement stock item by item
        let steps = StockAdjustment::decrements(&self.inventory, prescription.items());
        if let Err(failure) = run_steps(SAGA_CREATE, ctx, &steps, &self.compensator).await {
            let medicine_id = steps[failure.index].medicine_id.clone();
            tracing::error!(
                prescription_id = %prescription.id,
                %medicine_id,
                compensated = failure.report.compensated,
                failed = failure.report.residual.len(),
                "stock decrement failed; prescription left ACTIVE"
            );
            return Err(SagaError::StockDecrementFailed {
                medicine_id,
                compensated: failure.report.compensated,
                failed: failure.report.residual.len(),
                source: failure.error,
            });
        }

        tracing::info!(
            prescription_id = %prescription.id,
            %exam_id,
            total = prescription.total_amount().cents(),
            "prescription issued"
        );
        Ok(prescription)
    }

    /// Cancels an ACTIVE prescription and puts its stock back.
    ///
    /// Stock that cannot be restored after retries is escalated; the
    /// cancellation goes ahead regardless. If the CANCELLED status cannot be
    /// saved, the restored stock is decremented again and the store error
    /// is returned.
    #[tracing::instrument(skip(self, ctx, reason), fields(saga = SAGA_CANCEL, user = %ctx.user_id))]
    pub async fn cancel(
        &self,
        ctx: &RequestContext,
        prescription_id: PrescriptionId,
        reason: &str,
    ) -> Result<Prescription> {
        metrics::counter!("saga_executions_total", "saga" => SAGA_CANCEL).increment(1);
        let started = Instant::now();
        let result = self.execute_cancel(ctx, prescription_id, reason).await;
        observe(SAGA_CANCEL, started, &result);
        result
    }

    async fn execute_cancel(
        &self,
        ctx: &RequestContext,
        prescription_id: PrescriptionId,
        reason: &str,
    ) -> Result<Prescription> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SagaError::Validation(
                "Cancellation reason is required".to_string(),
            ));
        }

        let mut prescription = self.get(prescription_id).await?;
        prescription.cancel(ctx.user_id.clone(), reason, Utc::now())?;

        let decrements = StockAdjustment::decrements(&self.inventory, prescription.items());
        let report = self.compensator.compensate(SAGA_CANCEL, ctx, &decrements).await;

        if let Err(error) = self
            .prescriptions
            .save_prescription_transition(&prescription, PrescriptionStatus::Active)
            .await
        {
            // The prescription is still ACTIVE, so the stock put back must
            // come out again.
            let restored: Vec<_> = report
                .succeeded
                .iter()
                .map(|&index| decrements[index].reversed())
                .collect();
            let rollback = self.compensator.compensate(SAGA_CANCEL, ctx, &restored).await;
            tracing::error!(
                %prescription_id,
                %error,
                taken_back = rollback.compensated,
                escalated = rollback.residual.len(),
                "cancellation not saved; restored stock taken back"
            );
            return Err(error.into());
        }

        tracing::info!(
            %prescription_id,
            restored = report.compensated,
            escalated = report.residual.len(),
            "prescription cancelled"
        );
        Ok(prescription)
    }

    /// Marks an ACTIVE prescription dispensed, then asks billing for an
    /// invoice. A billing failure is logged and does not fail the dispense.
    #[tracing::instrument(skip(self, ctx), fields(user = %ctx.user_id))]
    pub async fn dispense(
        &self,
        ctx: &RequestContext,
        prescription_id: PrescriptionId,
    ) -> Result<Prescription> {
        let mut prescription = self.get(prescription_id).await?;
        prescription.dispense(ctx.user_id.clone(), Utc::now())?;
        self.prescriptions
            .save_prescription_transition(&prescription, PrescriptionStatus::Active)
            .await?;
        tracing::info!(%prescription_id, "prescription dispensed");

        match self.exams.get_exam(prescription.exam_id).await {
            Ok(Some(exam)) => {
                match self
                    .billing
                    .create_invoice(ctx, exam.appointment_id, INVOICE_NOTES)
                    .await
                {
                    Ok(invoice) => {
                        tracing::info!(%prescription_id, invoice_id = %invoice.id, "invoice requested")
                    }
                    Err(error) => {
                        tracing::warn!(%prescription_id, %error, "invoice creation failed")
                    }
                }
            }
            Ok(None) => {
                tracing::warn!(%prescription_id, exam_id = %prescription.exam_id, "exam missing, no invoice")
            }
            Err(error) => {
                tracing::warn!(%prescription_id, %error, "exam lookup failed, no invoice")
            }
        }

        Ok(prescription)
    }

    /// Gets a prescription by id.
    pub async fn get(&self, prescription_id: PrescriptionId) -> Result<Prescription> {
        self.prescriptions
            .get_prescription(prescription_id)
            .await?
            .ok_or_else(|| SagaError::not_found("Prescription", prescription_id))
    }

    /// Gets the prescription issued for an exam.
    pub async fn find_by_exam(&self, exam_id: ExamId) -> Result<Prescription> {
        self.prescriptions
            .find_prescription_by_exam(exam_id)
            .await?
            .ok_or_else(|| SagaError::not_found("Prescription for exam", exam_id))
    }
}

fn already_prescribed(exam_id: ExamId) -> SagaError {
    SagaError::Conflict(format!("Prescription already exists for exam {exam_id}"))
}
