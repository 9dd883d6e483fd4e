//! Field-by-field reconciliation of partial invoice data.
//!
//! Two sources hand us incomplete invoices: whatever was stored by an older
//! build (or edited by hand), and the image extraction service. Neither is
//! trusted wholesale. Each known field is copied only when present with the
//! expected shape.

use serde_json::{Map, Value};

use crate::models::{new_item_id, CompanyInfo, ExtractedInvoice, ExtractedParty, InvoiceData, LineItem, DEFAULT_TAX_RATE};

/// Overlays a stored JSON document onto `defaults`. Unknown keys are
/// ignored, wrongly typed ones keep the default value.
pub fn reconcile_persisted(stored: &Value, defaults: InvoiceData) -> InvoiceData {
    let Some(obj) = stored.as_object() else {
        return defaults;
    };

    let mut invoice = defaults;
    copy_string(obj, "invoiceNumber", &mut invoice.invoice_number);
    copy_string(obj, "date", &mut invoice.date);
    copy_string(obj, "time", &mut invoice.time);
    copy_string(obj, "type", &mut invoice.invoice_type);
    copy_string(obj, "notes", &mut invoice.notes);
    copy_number(obj, "discount", &mut invoice.discount);

    if let Some(seller) = obj.get("seller").and_then(Value::as_object) {
        reconcile_company(seller, &mut invoice.seller);
    }
    if let Some(buyer) = obj.get("buyer").and_then(Value::as_object) {
        reconcile_company(buyer, &mut invoice.buyer);
    }

    if let Some(items) = obj.get("items").and_then(Value::as_array) {
        invoice.items = items.iter().filter_map(reconcile_item).collect();
        let dropped = items.len() - invoice.items.len();
        if dropped > 0 {
            tracing::warn!(dropped, "stored items that are not objects were skipped");
        }
    }

    invoice
}

/// Rebuilds one stored item. Missing or mistyped fields get a fresh id, an
/// empty description, zero amounts and the standard tax rate.
fn reconcile_item(value: &Value) -> Option<LineItem> {
    let obj = value.as_object()?;
    let mut item = LineItem {
        id: new_item_id(),
        description: String::new(),
        quantity: 0.0,
        unit_price: 0.0,
        tax_rate: DEFAULT_TAX_RATE,
    };
    copy_string(obj, "id", &mut item.id);
    copy_string(obj, "description", &mut item.description);
    copy_number(obj, "quantity", &mut item.quantity);
    copy_number(obj, "unitPrice", &mut item.unit_price);
    copy_number(obj, "taxRate", &mut item.tax_rate);
    Some(item)
}

fn reconcile_company(obj: &Map<String, Value>, company: &mut CompanyInfo) {
    copy_string(obj, "name", &mut company.name);
    copy_string(obj, "address", &mut company.address);
    copy_string(obj, "vatNumber", &mut company.vat_number);
    copy_string(obj, "crNumber", &mut company.cr_number);
    copy_string(obj, "contact", &mut company.contact);
    match obj.get("logoUrl") {
        Some(Value::String(url)) => company.logo_url = Some(url.clone()),
        Some(Value::Null) => company.logo_url = None,
        _ => {}
    }
}

fn copy_string(obj: &Map<String, Value>, key: &str, target: &mut String) {
    if let Some(value) = obj.get(key).and_then(Value::as_str) {
        *target = value.to_string();
    }
}

fn copy_number(obj: &Map<String, Value>, key: &str, target: &mut f64) {
    if let Some(value) = obj.get(key).and_then(Value::as_f64) {
        *target = value;
    }
}

/// Merges extraction output over the invoice being edited. Only non-empty
/// values replace existing ones, and the item list is replaced only when the
/// extraction found at least one item. Discount, notes, type, contact
/// details and logos are never touched.
pub fn apply_extracted(invoice: &mut InvoiceData, extracted: ExtractedInvoice) {
    overwrite(&mut invoice.invoice_number, extracted.invoice_number);
    overwrite(&mut invoice.date, extracted.date);
    overwrite(&mut invoice.time, extracted.time);
    apply_party(&mut invoice.seller, extracted.seller);
    apply_party(&mut invoice.buyer, extracted.buyer);
    if !extracted.items.is_empty() {
        invoice.items = extracted.items;
    }
}

fn apply_party(company: &mut CompanyInfo, party: ExtractedParty) {
    overwrite(&mut company.name, party.name);
    overwrite(&mut company.vat_number, party.vat_number);
    overwrite(&mut company.cr_number, party.cr_number);
    overwrite(&mut company.address, party.address);
}

fn overwrite(target: &mut String, value: Option<String>) {
    if let Some(value) = value {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            *target = trimmed.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_object_falls_back_to_defaults() {
        let defaults = InvoiceData::default_invoice();
        assert_eq!(reconcile_persisted(&json!([1, 2]), defaults.clone()), defaults);
        assert_eq!(reconcile_persisted(&json!("text"), defaults.clone()), defaults);
    }

    #[test]
    fn partial_seller_keeps_other_default_fields() {
        let defaults = InvoiceData::default_invoice();
        let stored = json!({
            "invoiceNumber": "INV-9",
            "seller": { "name": "Acme" },
            "discount": 50
        });
        let invoice = reconcile_persisted(&stored, defaults.clone());
        assert_eq!(invoice.invoice_number, "INV-9");
        assert_eq!(invoice.seller.name, "Acme");
        assert_eq!(invoice.seller.vat_number, defaults.seller.vat_number);
        assert_eq!(invoice.buyer, defaults.buyer);
        assert_eq!(invoice.discount, 50.0);
        assert_eq!(invoice.items, defaults.items);
    }

    #[test]
    fn wrongly_typed_fields_keep_defaults() {
        let defaults = InvoiceData::default_invoice();
        let stored = json!({
            "invoiceNumber": 42,
            "discount": "lots",
            "buyer": "nobody",
            "items": { "not": "a list" }
        });
        let invoice = reconcile_persisted(&stored, defaults.clone());
        assert_eq!(invoice, defaults);
    }

    #[test]
    fn partial_items_are_completed_field_by_field() {
        let stored = json!({
            "items": [
                { "id": "a1", "description": "consulting", "quantity": 2, "unitPrice": 150 },
                { "description": "no numbers", "taxRate": 0.05 },
                "garbage",
                { "id": "c3", "quantity": "two", "unitPrice": 10, "taxRate": 0 }
            ]
        });
        let items = reconcile_persisted(&stored, InvoiceData::default_invoice()).items;
        assert_eq!(items.len(), 3);

        assert_eq!(items[0], LineItem {
            id: "a1".into(),
            description: "consulting".into(),
            quantity: 2.0,
            unit_price: 150.0,
            tax_rate: DEFAULT_TAX_RATE,
        });

        assert_eq!(items[1].id.len(), 9);
        assert_eq!(items[1].description, "no numbers");
        assert_eq!(items[1].quantity, 0.0);
        assert_eq!(items[1].unit_price, 0.0);
        assert_eq!(items[1].tax_rate, 0.05);

        assert_eq!(items[2].id, "c3");
        assert_eq!(items[2].description, "");
        assert_eq!(items[2].quantity, 0.0);
        assert_eq!(items[2].tax_rate, 0.0);
    }

    #[test]
    fn stored_items_replace_defaults_even_when_empty() {
        let stored = json!({ "items": [] });
        let invoice = reconcile_persisted(&stored, InvoiceData::default_invoice());
        assert!(invoice.items.is_empty());
    }

    #[test]
    fn null_logo_clears_it() {
        let stored = json!({ "seller": { "logoUrl": null } });
        let invoice = reconcile_persisted(&stored, InvoiceData::default_invoice());
        assert_eq!(invoice.seller.logo_url, None);
    }

    #[test]
    fn extracted_values_only_replace_when_present() {
        let mut invoice = InvoiceData::default_invoice();
        let before = invoice.clone();
        apply_extracted(
            &mut invoice,
            ExtractedInvoice {
                invoice_number: Some("A-17".into()),
                date: Some("".into()),
                seller: ExtractedParty {
                    name: Some("  New Seller ".into()),
                    vat_number: None,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        assert_eq!(invoice.invoice_number, "A-17");
        assert_eq!(invoice.date, before.date);
        assert_eq!(invoice.seller.name, "New Seller");
        assert_eq!(invoice.seller.vat_number, before.seller.vat_number);
        assert_eq!(invoice.seller.contact, before.seller.contact);
        assert_eq!(invoice.seller.logo_url, before.seller.logo_url);
        assert_eq!(invoice.items, before.items);
    }

    #[test]
    fn extracted_items_replace_the_list() {
        let mut invoice = InvoiceData::default_invoice();
        let items = vec![LineItem::new("scanned", 2.0, 10.0, 0.15)];
        apply_extracted(
            &mut invoice,
            ExtractedInvoice {
                items: items.clone(),
                ..Default::default()
            },
        );
        assert_eq!(invoice.items, items);
    }
}
