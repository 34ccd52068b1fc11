//! Service functions sitting between the HTTP handlers and the [`Store`].
//!
//! Each function validates its input, applies the business rules and maps
//! store results to [`AppError`]s.
//!
//! [`Store`]: crate::db::Store
//! [`AppError`]: crate::error::AppError

pub mod accounts;
pub mod alerts;
pub mod catalog;
pub mod checkout;
pub mod dashboard;
pub mod orders;
pub mod prescriptions;
