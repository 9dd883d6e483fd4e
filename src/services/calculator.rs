use crate::models::{InvoiceData, InvoiceTotals, LineItem};

/// Sums line subtotals and taxes, then subtracts the flat discount once.
/// Nothing is rounded here and a discount larger than the gross amount
/// yields a negative total.
pub fn calculate_totals(items: &[LineItem], discount: f64) -> InvoiceTotals {
    // Fold from +0.0: `Sum` for f64 starts at -0.0, which prints as "-0.00".
    let subtotal = items.iter().map(LineItem::line_total).fold(0.0, |acc, v| acc + v);
    let total_tax = items.iter().map(LineItem::line_tax).fold(0.0, |acc, v| acc + v);
    InvoiceTotals {
        subtotal,
        total_tax,
        total: subtotal + total_tax - discount,
    }
}

impl InvoiceData {
    pub fn totals(&self) -> InvoiceTotals {
        calculate_totals(&self.items, self.discount)
    }
}
