pub mod extract;
pub mod invoices;
pub mod settings;
