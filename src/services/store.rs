use anyhow::Result;
use serde_json::Value;

use crate::db::Database;
use crate::models::InvoiceData;
use crate::services::merge::reconcile_persisted;

/// Settings key the whole invoice is stored under, as JSON.
pub const INVOICE_KEY: &str = "saudi-invoicer-data";

pub struct InvoiceStore<'a> {
    db: &'a Database,
}

impl<'a> InvoiceStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        InvoiceStore { db }
    }

    /// Never fails on bad content: missing, unparseable or oddly shaped data
    /// all come back as the default invoice, with whatever fields could be
    /// salvaged laid over it. Only database errors are returned.
    pub fn load(&self) -> Result<InvoiceData> {
        let defaults = InvoiceData::default_invoice();
        let Some(raw) = self.db.get_setting(INVOICE_KEY)? else {
            return Ok(defaults);
        };

        let stored = match serde_json::from_str::<Value>(&raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "stored invoice is not valid JSON, using defaults");
                return Ok(defaults);
            }
        };
        if !stored.is_object() {
            tracing::warn!("stored invoice is not an object, using defaults");
            return Ok(defaults);
        }

        Ok(reconcile_persisted(&stored, defaults))
    }

    pub fn save(&self, invoice: &InvoiceData) -> Result<()> {
        let serialized = serde_json::to_string(invoice)?;
        self.db.set_setting(INVOICE_KEY, &serialized)?;
        tracing::debug!(invoice_number = %invoice.invoice_number, "invoice saved");
        Ok(())
    }

    /// Replaces the stored invoice with a fresh default one.
    pub fn reset(&self) -> Result<InvoiceData> {
        let invoice = InvoiceData::default_invoice();
        self.save(&invoice)?;
        Ok(invoice)
    }

    /// Loads, applies `edit`, saves, and returns the edited invoice.
    pub fn update<F>(&self, edit: F) -> Result<InvoiceData>
    where
        F: FnOnce(&mut InvoiceData) -> Result<()>,
    {
        let mut invoice = self.load()?;
        edit(&mut invoice)?;
        self.save(&invoice)?;
        Ok(invoice)
    }
}
