//! Saudi VAT tax invoices with ZATCA Phase-1 QR codes.
//!
//! The invoice arithmetic lives in [`services::calculator`] and the QR
//! payload encoder in [`services::zatca`]. Everything else stores, edits,
//! extracts and prints the invoice around those two.

pub mod commands;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

pub use models::{CompanyInfo, InvoiceData, InvoiceTotals, LineItem};
pub use services::calculator::calculate_totals;
pub use services::zatca::{decode_zatca_base64, generate_zatca_base64, zatca_timestamp, ZatcaError, ZatcaQr};
