//! HTTP implementations of the remote clients.
//!
//! Every collaborating service wraps its payload in
//! `{"code": .., "message": .., "data": ..}`. Any non-2xx status, transport
//! error or undecodable body is a [`RemoteError`]. Stock adjustments are
//! judged by status alone.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{AppointmentId, EmployeeId, MedicineId, RequestContext};
use domain::Money;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::services::appointment::AppointmentClient;
use crate::services::billing::{BillingClient, InvoiceRef};
use crate::services::inventory::{InventoryClient, MedicineInfo};

/// Connection settings for one remote service.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL, e.g. `http://appointment-service:8080`.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,
}

impl HttpClientConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    message: Option<String>,
    data: Option<T>,
}

/// Shared request plumbing: identity headers and envelope decoding.
#[derive(Debug, Clone)]
struct RemoteHttp {
    client: Client,
    base_url: String,
    service: &'static str,
}

impl RemoteHttp {
    fn new(service: &'static str, config: HttpClientConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Transport {
                service,
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport(&self, err: reqwest::Error) -> RemoteError {
        RemoteError::Transport {
            service: self.service,
            message: err.to_string(),
        }
    }

    fn decode(&self, message: impl Into<String>) -> RemoteError {
        RemoteError::Decode {
            service: self.service,
            message: message.into(),
        }
    }

    /// Sends the request with the identity headers and returns the status
    /// and raw body.
    async fn exchange(
        &self,
        request: RequestBuilder,
        ctx: &RequestContext,
    ) -> Result<(StatusCode, Vec<u8>), RemoteError> {
        let request = ctx
            .headers()
            .into_iter()
            .fold(request, |req, (name, value)| req.header(name, value));

        let response = request.send().await.map_err(|e| self.transport(e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport(e))?;
        Ok((status, body.to_vec()))
    }

    fn rejected(&self, status: StatusCode, body: &[u8]) -> RemoteError {
        let message = serde_json::from_slice::<Envelope<serde_json::Value>>(body)
            .ok()
            .and_then(|envelope| envelope.message)
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
        RemoteError::Rejected {
            service: self.service,
            status: status.as_u16(),
            message,
        }
    }

    /// Sends a command whose response carries nothing the caller needs.
    /// Any 2xx is success, whatever the body holds.
    async fn execute(&self, request: RequestBuilder, ctx: &RequestContext) -> Result<(), RemoteError> {
        let (status, body) = self.exchange(request, ctx).await?;
        if !status.is_success() {
            return Err(self.rejected(status, &body));
        }
        Ok(())
    }

    /// Sends the request and returns the `data` field. `Ok(None)` on 404.
    async fn send_optional<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        ctx: &RequestContext,
    ) -> Result<Option<T>, RemoteError> {
        let (status, body) = self.exchange(request, ctx).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.rejected(status, &body));
        }

        let envelope: Envelope<T> =
            serde_json::from_slice(&body).map_err(|e| self.decode(e.to_string()))?;
        envelope
            .data
            .map(Some)
            .ok_or_else(|| self.decode("response has no data"))
    }

    /// Sends the request and returns the `data` field; 404 is an error.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        ctx: &RequestContext,
    ) -> Result<T, RemoteError> {
        self.send_optional(request, ctx)
            .await?
            .ok_or_else(|| RemoteError::Rejected {
                service: self.service,
                status: StatusCode::NOT_FOUND.as_u16(),
                message: "resource not found".to_string(),
            })
    }
}

/// Appointment service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAppointmentClient {
    http: RemoteHttp,
}

impl HttpAppointmentClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            http: RemoteHttp::new("appointment-service", config)?,
        })
    }

    fn day_query(doctor_id: EmployeeId, date: NaiveDate) -> [(&'static str, String); 2] {
        [("doctorId", doctor_id.to_string()), ("date", date.to_string())]
    }
}

#[async_trait]
impl AppointmentClient for HttpAppointmentClient {
    async fn cancel_by_doctor_and_date(
        &self,
        ctx: &RequestContext,
        doctor_id: EmployeeId,
        date: NaiveDate,
        reason: &str,
    ) -> Result<u64, RemoteError> {
        let request = self
            .http
            .client
            .post(self.http.url("/appointments/bulk-cancel"))
            .query(&Self::day_query(doctor_id, date))
            .query(&[("reason", reason)]);
        self.http.send(request, ctx).await
    }

    async fn restore_by_doctor_and_date(
        &self,
        ctx: &RequestContext,
        doctor_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<u64, RemoteError> {
        let request = self
            .http
            .client
            .post(self.http.url("/appointments/bulk-restore"))
            .query(&Self::day_query(doctor_id, date));
        self.http.send(request, ctx).await
    }

    async fn count_active_by_doctor_and_date(
        &self,
        ctx: &RequestContext,
        doctor_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<u64, RemoteError> {
        let request = self
            .http
            .client
            .get(self.http.url("/appointments/count"))
            .query(&Self::day_query(doctor_id, date));
        self.http.send(request, ctx).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MedicineDto {
    id: String,
    name: String,
    quantity: Option<i64>,
    selling_price: Option<f64>,
}

#[derive(Debug, Serialize)]
struct StockUpdateRequest {
    delta: i64,
}

/// Medicine service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    http: RemoteHttp,
}

impl HttpInventoryClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            http: RemoteHttp::new("medicine-service", config)?,
        })
    }

    fn quantity(&self, value: i64) -> Result<u32, RemoteError> {
        u32::try_from(value).map_err(|_| self.http.decode(format!("invalid quantity {value}")))
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    async fn get_medicine(
        &self,
        ctx: &RequestContext,
        medicine_id: &MedicineId,
    ) -> Result<Option<MedicineInfo>, RemoteError> {
        let request = self
            .http
            .client
            .get(self.http.url(&format!("/medicines/{medicine_id}")));

        let Some(dto) = self.http.send_optional::<MedicineDto>(request, ctx).await? else {
            return Ok(None);
        };

        let unit_price = dto
            .selling_price
            .map(|price| Money::from_cents((price * 100.0).round() as i64))
            .unwrap_or_default();

        Ok(Some(MedicineInfo {
            id: MedicineId::new(dto.id),
            name: dto.name,
            unit_price,
            quantity: self.quantity(dto.quantity.unwrap_or(0))?,
        }))
    }

    async fn adjust_stock(
        &self,
        ctx: &RequestContext,
        medicine_id: &MedicineId,
        delta: i64,
    ) -> Result<(), RemoteError> {
        let request = self
            .http
            .client
            .patch(self.http.url(&format!("/medicines/{medicine_id}/stock")))
            .json(&StockUpdateRequest { delta });

        self.http.execute(request, ctx).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceRequest<'a> {
    appointment_id: String,
    notes: &'a str,
}

/// Billing service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBillingClient {
    http: RemoteHttp,
}

impl HttpBillingClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            http: RemoteHttp::new("billing-service", config)?,
        })
    }
}

#[async_trait]
impl BillingClient for HttpBillingClient {
    async fn create_invoice(
        &self,
        ctx: &RequestContext,
        appointment_id: AppointmentId,
        notes: &str,
    ) -> Result<InvoiceRef, RemoteError> {
        let request = self
            .http
            .client
            .post(self.http.url("/invoices"))
            .json(&InvoiceRequest {
                appointment_id: appointment_id.to_string(),
                notes,
            });
        self.http.send(request, ctx).await
    }
}
