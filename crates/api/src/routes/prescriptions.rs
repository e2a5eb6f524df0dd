//! Prescription endpoints backed by the fulfillment saga.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ExamId, PrescriptionId};
use domain::{NewPrescriptionItem, Prescription};
use saga::CreatePrescription;
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePrescriptionRequest {
    pub notes: Option<String>,
    pub items: Vec<PrescriptionItemRequest>,
}

#[derive(Deserialize)]
pub struct PrescriptionItemRequest {
    pub medicine_id: String,
    pub quantity: u32,
    pub dosage: String,
    pub duration_days: Option<u32>,
    pub instructions: Option<String>,
}

#[derive(Deserialize)]
pub struct CancelPrescriptionRequest {
    pub reason: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct PrescriptionResponse {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub total_cents: i64,
}

impl From<Prescription> for PrescriptionResponse {
    fn from(prescription: Prescription) -> Self {
        let total_cents = prescription.total_amount().cents();
        Self {
            prescription,
            total_cents,
        }
    }
}

// -- Handlers --

/// POST /exams/{exam_id}/prescriptions: issue a prescription and take its
/// items out of stock.
#[tracing::instrument(skip(state, caller, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(exam_id): Path<String>,
    Caller(caller): Caller,
    Json(req): Json<CreatePrescriptionRequest>,
) -> Result<(StatusCode, Json<PrescriptionResponse>), ApiError> {
    let exam_id: ExamId = parse_id("exam", &exam_id)?;
    let items = req
        .items
        .into_iter()
        .map(|item| NewPrescriptionItem {
            medicine_id: item.medicine_id.into(),
            quantity: item.quantity,
            dosage: item.dosage,
            duration_days: item.duration_days,
            instructions: item.instructions,
        })
        .collect();

    let prescription = state
        .prescriptions
        .create(
            &caller,
            exam_id,
            CreatePrescription {
                notes: req.notes,
                items,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(prescription.into())))
}

/// GET /exams/{exam_id}/prescription
#[tracing::instrument(skip(state))]
pub async fn get_by_exam(
    State(state): State<Arc<AppState>>,
    Path(exam_id): Path<String>,
) -> Result<Json<PrescriptionResponse>, ApiError> {
    let exam_id: ExamId = parse_id("exam", &exam_id)?;
    Ok(Json(state.prescriptions.find_by_exam(exam_id).await?.into()))
}

/// GET /exams/prescriptions/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PrescriptionResponse>, ApiError> {
    let prescription_id: PrescriptionId = parse_id("prescription", &id)?;
    Ok(Json(state.prescriptions.get(prescription_id).await?.into()))
}

/// POST /exams/prescriptions/{id}/cancel: cancel and restore stock.
#[tracing::instrument(skip(state, caller, req))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Caller(caller): Caller,
    Json(req): Json<CancelPrescriptionRequest>,
) -> Result<Json<PrescriptionResponse>, ApiError> {
    let prescription_id: PrescriptionId = parse_id("prescription", &id)?;
    let prescription = state
        .prescriptions
        .cancel(&caller, prescription_id, &req.reason)
        .await?;
    Ok(Json(prescription.into()))
}

/// POST /exams/prescriptions/{id}/dispense
#[tracing::instrument(skip(state, caller))]
pub async fn dispense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Caller(caller): Caller,
) -> Result<Json<PrescriptionResponse>, ApiError> {
    let prescription_id: PrescriptionId = parse_id("prescription", &id)?;
    Ok(Json(
        state.prescriptions.dispense(&caller, prescription_id).await?.into(),
    ))
}
