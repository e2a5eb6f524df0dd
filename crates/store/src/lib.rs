//! Persistence for the entities the sagas own locally.
//!
//! Every status write goes through a compare-and-set so two concurrent
//! sagas cannot both move the same record out of the same status.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use repository::{ExamRepository, PrescriptionRepository, ScheduleRepository};
