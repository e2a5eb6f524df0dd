use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{EmployeeId, ExamId, MedicineId, PrescriptionId, PrescriptionItemId, ScheduleId};
use domain::{
    Cancellation, Dispensation, MedicalExam, Money, Prescription, PrescriptionItem,
    PrescriptionStatus, Schedule, ScheduleStatus,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    ExamRepository, PrescriptionRepository, Result, ScheduleRepository, StoreError,
};

const SCHEDULE_COLUMNS: &str =
    "id, employee_id, work_date, start_time, end_time, status, notes, updated_at";

const PRESCRIPTION_COLUMNS: &str = "id, medical_exam_id, patient_id, doctor_id, status, notes, \
     prescribed_at, cancelled_at, cancelled_by, cancel_reason, dispensed_at, dispensed_by";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_schedule(row: PgRow) -> Result<Schedule> {
        let status: String = row.try_get("status")?;
        Ok(Schedule {
            id: ScheduleId::from_uuid(row.try_get::<Uuid, _>("id")?),
            employee_id: EmployeeId::from_uuid(row.try_get::<Uuid, _>("employee_id")?),
            work_date: row.try_get("work_date")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            status: status.parse().map_err(StoreError::InvalidData)?,
            notes: row.try_get("notes")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_exam(row: PgRow) -> Result<MedicalExam> {
        Ok(MedicalExam {
            id: ExamId::from_uuid(row.try_get::<Uuid, _>("id")?),
            appointment_id: row.try_get::<Uuid, _>("appointment_id")?.into(),
            patient_id: row.try_get("patient_id")?,
            doctor_id: EmployeeId::from_uuid(row.try_get::<Uuid, _>("doctor_id")?),
            has_prescription: row.try_get("has_prescription")?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<PrescriptionItem> {
        let medicine_id: String = row.try_get("medicine_id")?;
        let quantity: i32 = row.try_get("quantity")?;
        let duration_days: Option<i32> = row.try_get("duration_days")?;

        Ok(PrescriptionItem {
            id: PrescriptionItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            medicine_id: MedicineId::new(medicine_id),
            medicine_name: row.try_get("medicine_name")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity: to_u32("quantity", quantity)?,
            dosage: row.try_get("dosage")?,
            duration_days: duration_days
                .map(|d| to_u32("duration_days", d))
                .transpose()?,
            instructions: row.try_get("instructions")?,
        })
    }

    async fn load_prescription(&self, row: PgRow) -> Result<Prescription> {
        let id = PrescriptionId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let status: String = row.try_get("status")?;
        let status: PrescriptionStatus = status.parse().map_err(StoreError::InvalidData)?;

        let cancelled_at: Option<DateTime<Utc>> = row.try_get("cancelled_at")?;
        let cancellation = match cancelled_at {
            Some(at) => Some(Cancellation {
                at,
                by: row
                    .try_get::<Option<String>, _>("cancelled_by")?
                    .unwrap_or_default(),
                reason: row
                    .try_get::<Option<String>, _>("cancel_reason")?
                    .unwrap_or_default(),
            }),
            None => None,
        };

        let dispensed_at: Option<DateTime<Utc>> = row.try_get("dispensed_at")?;
        let dispensation = match dispensed_at {
            Some(at) => Some(Dispensation {
                at,
                by: row
                    .try_get::<Option<String>, _>("dispensed_by")?
                    .unwrap_or_default(),
            }),
            None => None,
        };

        let item_rows = sqlx::query(
            r#"
            SELECT id, medicine_id, medicine_name, unit_price_cents, quantity, dosage,
                   duration_days, instructions
            FROM prescription_items
            WHERE prescription_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        let items = item_rows
            .into_iter()
            .map(Self::row_to_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(Prescription::restore(
            id,
            ExamId::from_uuid(row.try_get::<Uuid, _>("medical_exam_id")?),
            row.try_get("patient_id")?,
            EmployeeId::from_uuid(row.try_get::<Uuid, _>("doctor_id")?),
            status,
            row.try_get("notes")?,
            row.try_get("prescribed_at")?,
            cancellation,
            dispensation,
            items,
        ))
    }

    async fn current_schedule_status(&self, id: ScheduleId) -> Result<Option<String>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM schedules WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(status)
    }
}

fn to_u32(column: &str, value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("negative {column}: {value}")))
}

fn to_i32(column: &str, value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("{column} out of range: {value}")))
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.constraint() == Some(constraint))
}

#[async_trait]
impl ScheduleRepository for PostgresStore {
    async fn insert_schedule(&self, schedule: &Schedule) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schedules (id, employee_id, work_date, start_time, end_time, status, notes, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(schedule.id.as_uuid())
        .bind(schedule.employee_id.as_uuid())
        .bind(schedule.work_date)
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .bind(schedule.status.as_str())
        .bind(&schedule.notes)
        .bind(schedule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "unique_employee_work_date") {
                return StoreError::Duplicate {
                    entity: "Schedule",
                    key: format!("{} on {}", schedule.employee_id, schedule.work_date),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        let row = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_schedule).transpose()
    }

    async fn find_schedule_by_employee_and_date(
        &self,
        employee_id: EmployeeId,
        work_date: NaiveDate,
    ) -> Result<Option<Schedule>> {
        let row = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE employee_id = $1 AND work_date = $2"
        ))
        .bind(employee_id.as_uuid())
        .bind(work_date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_schedule).transpose()
    }

    async fn transition_schedule_status(
        &self,
        id: ScheduleId,
        expected: ScheduleStatus,
        next: ScheduleStatus,
        notes: Option<String>,
    ) -> Result<Schedule> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE schedules
            SET status = $3, notes = $4, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {SCHEDULE_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(&notes)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_schedule(row);
        }

        match self.current_schedule_status(id).await? {
            Some(actual) => Err(StoreError::StatusConflict {
                entity: "Schedule",
                id: id.to_string(),
                expected: expected.to_string(),
                actual,
            }),
            None => Err(StoreError::NotFound {
                entity: "Schedule",
                id: id.to_string(),
            }),
        }
    }

    async fn delete_schedule(&self, id: ScheduleId) -> Result<()> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "Schedule",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ExamRepository for PostgresStore {
    async fn insert_exam(&self, exam: &MedicalExam) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO medical_exams (id, appointment_id, patient_id, doctor_id, has_prescription)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(exam.id.as_uuid())
        .bind(exam.appointment_id.as_uuid())
        .bind(&exam.patient_id)
        .bind(exam.doctor_id.as_uuid())
        .bind(exam.has_prescription)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "medical_exams_pkey") {
                return StoreError::Duplicate {
                    entity: "MedicalExam",
                    key: exam.id.to_string(),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_exam(&self, id: ExamId) -> Result<Option<MedicalExam>> {
        let row = sqlx::query(
            r#"
            SELECT id, appointment_id, patient_id, doctor_id, has_prescription
            FROM medical_exams
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_exam).transpose()
    }

    async fn mark_exam_prescribed(&self, id: ExamId) -> Result<()> {
        let result = sqlx::query("UPDATE medical_exams SET has_prescription = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "MedicalExam",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PrescriptionRepository for PostgresStore {
    async fn insert_prescription(&self, prescription: &Prescription) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO prescriptions (id, medical_exam_id, patient_id, doctor_id, status, notes, prescribed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(prescription.id.as_uuid())
        .bind(prescription.exam_id.as_uuid())
        .bind(&prescription.patient_id)
        .bind(prescription.doctor_id.as_uuid())
        .bind(prescription.status.as_str())
        .bind(&prescription.notes)
        .bind(prescription.prescribed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "unique_prescription_exam") {
                return StoreError::Duplicate {
                    entity: "Prescription",
                    key: format!("exam {}", prescription.exam_id),
                };
            }
            StoreError::Database(e)
        })?;

        for (position, item) in prescription.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO prescription_items
                    (id, prescription_id, position, medicine_id, medicine_name, unit_price_cents,
                     quantity, dosage, duration_days, instructions)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(prescription.id.as_uuid())
            .bind(position as i32)
            .bind(item.medicine_id.as_str())
            .bind(&item.medicine_name)
            .bind(item.unit_price.cents())
            .bind(to_i32("quantity", item.quantity)?)
            .bind(&item.dosage)
            .bind(
                item.duration_days
                    .map(|d| to_i32("duration_days", d))
                    .transpose()?,
            )
            .bind(&item.instructions)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_prescription(&self, id: PrescriptionId) -> Result<Option<Prescription>> {
        let row = sqlx::query(&format!(
            "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_prescription(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_prescription_by_exam(&self, exam_id: ExamId) -> Result<Option<Prescription>> {
        let row = sqlx::query(&format!(
            "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE medical_exam_id = $1"
        ))
        .bind(exam_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_prescription(row).await?)),
            None => Ok(None),
        }
    }

    async fn save_prescription_transition(
        &self,
        prescription: &Prescription,
        expected: PrescriptionStatus,
    ) -> Result<()> {
        let cancellation = prescription.cancellation.as_ref();
        let dispensation = prescription.dispensation.as_ref();

        let result = sqlx::query(
            r#"
            UPDATE prescriptions
            SET status = $3,
                cancelled_at = $4, cancelled_by = $5, cancel_reason = $6,
                dispensed_at = $7, dispensed_by = $8
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(prescription.id.as_uuid())
        .bind(expected.as_str())
        .bind(prescription.status.as_str())
        .bind(cancellation.map(|c| c.at))
        .bind(cancellation.map(|c| c.by.as_str()))
        .bind(cancellation.map(|c| c.reason.as_str()))
        .bind(dispensation.map(|d| d.at))
        .bind(dispensation.map(|d| d.by.as_str()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let actual: Option<String> =
            sqlx::query_scalar("SELECT status FROM prescriptions WHERE id = $1")
                .bind(prescription.id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match actual {
            Some(actual) => Err(StoreError::StatusConflict {
                entity: "Prescription",
                id: prescription.id.to_string(),
                expected: expected.to_string(),
                actual,
            }),
            None => Err(StoreError::NotFound {
                entity: "Prescription",
                id: prescription.id.to_string(),
            }),
        }
    }
}
