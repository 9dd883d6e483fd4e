use anyhow::{anyhow, Result};
use clap::Subcommand;
use std::path::PathBuf;

use crate::models::{InvoiceData, InvoiceTotals};
use crate::services::editor::{InvoiceField, ItemField};
use crate::services::render::render_invoice_html;
use crate::services::state::AppState;
use crate::services::zatca::{decode_zatca_base64, ZatcaQr};
use crate::utils::{format_currency, format_decimal};

#[derive(Subcommand, Debug)]
pub enum ItemCommand {
    /// Append a line item. Unset values use the form defaults.
    Add {
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        quantity: Option<String>,
        #[arg(long)]
        price: Option<String>,
        #[arg(long)]
        tax_rate: Option<String>,
    },
    /// Change one field of an item: description, quantity, price or tax.
    Update { id: String, field: ItemField, value: String },
    /// Delete an item.
    Remove { id: String },
}

pub fn show_invoice(state: &AppState, json: bool) -> Result<()> {
    let invoice = state.store().load()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&invoice)?);
        return Ok(());
    }
    print!("{}", describe_invoice(&invoice));
    Ok(())
}

pub fn show_totals(state: &AppState, json: bool) -> Result<()> {
    let invoice = state.store().load()?;
    let totals = invoice.totals();
    if json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
    } else {
        print!("{}", describe_totals(&totals, invoice.discount));
    }
    Ok(())
}

pub fn set_field(state: &AppState, field: InvoiceField, value: &str) -> Result<()> {
    let invoice = state.store().update(|invoice| invoice.set_field(field, value))?;
    tracing::info!(?field, "invoice field updated");
    print!("{}", describe_totals(&invoice.totals(), invoice.discount));
    Ok(())
}

pub fn run_item(state: &AppState, command: ItemCommand) -> Result<()> {
    match command {
        ItemCommand::Add {
            description,
            quantity,
            price,
            tax_rate,
        } => {
            let mut new_id = String::new();
            state.store().update(|invoice| {
                let id = invoice.add_item();
                let edits = [
                    (ItemField::Description, description),
                    (ItemField::Quantity, quantity),
                    (ItemField::UnitPrice, price),
                    (ItemField::TaxRate, tax_rate),
                ];
                for (field, value) in edits {
                    if let Some(value) = value {
                        invoice.update_item(&id, field, &value)?;
                    }
                }
                new_id = id;
                Ok(())
            })?;
            println!("{}", new_id);
        }
        ItemCommand::Update { id, field, value } => {
            state.store().update(|invoice| invoice.update_item(&id, field, &value))?;
        }
        ItemCommand::Remove { id } => {
            state.store().update(|invoice| {
                if invoice.remove_item(&id) {
                    Ok(())
                } else {
                    Err(anyhow!("Item not found: {}", id))
                }
            })?;
        }
    }
    Ok(())
}

pub fn reset_invoice(state: &AppState) -> Result<()> {
    let invoice = state.store().reset()?;
    tracing::info!("invoice reset to defaults");
    print!("{}", describe_invoice(&invoice));
    Ok(())
}

pub fn show_qr(state: &AppState, decode: Option<String>) -> Result<()> {
    if let Some(payload) = decode {
        for record in decode_zatca_base64(&payload)? {
            println!("{}\t{}", record.tag, record.value);
        }
        return Ok(());
    }

    let invoice = state.store().load()?;
    let payload = ZatcaQr::from_invoice(&invoice).encode()?;
    println!("{}", payload);
    Ok(())
}

pub fn print_invoice(state: &AppState, output: Option<PathBuf>, no_open: bool) -> Result<()> {
    let invoice = state.store().load()?;
    let html = render_invoice_html(&invoice);
    let path = output.unwrap_or_else(|| {
        state
            .data_dir()
            .join(format!("invoice-{}.html", sanitize_file_stem(&invoice.invoice_number)))
    });
    std::fs::write(&path, html).map_err(|e| anyhow!("Write {}: {}", path.display(), e))?;
    tracing::info!(path = %path.display(), "invoice document written");
    println!("{}", path.display());

    if !no_open {
        open::that(&path).map_err(|e| anyhow!("Open {}: {}", path.display(), e))?;
    }
    Ok(())
}

fn sanitize_file_stem(value: &str) -> String {
    let stem: String = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "draft".to_string()
    } else {
        stem
    }
}

pub fn describe_invoice(invoice: &InvoiceData) -> String {
    let mut out = String::new();
    out.push_str(&format!("Invoice {} ({})\n", invoice.invoice_number, invoice.invoice_type));
    out.push_str(&format!("Date     {} {}\n", invoice.date, invoice.time));
    out.push_str(&format!(
        "Seller   {} | VAT {} | CR {}\n",
        invoice.seller.name, invoice.seller.vat_number, invoice.seller.cr_number
    ));
    out.push_str(&format!("Buyer    {} | VAT {}\n", invoice.buyer.name, invoice.buyer.vat_number));
    out.push_str("Items\n");
    for item in &invoice.items {
        out.push_str(&format!(
            "  [{}] {} x {} @ {} ({:.0}%) = {}\n",
            item.id,
            item.description,
            item.quantity,
            format_currency(item.unit_price),
            item.tax_rate * 100.0,
            format_currency(item.line_gross())
        ));
    }
    if !invoice.notes.is_empty() {
        out.push_str(&format!("Notes    {}\n", invoice.notes));
    }
    out.push_str(&describe_totals(&invoice.totals(), invoice.discount));
    out
}

fn describe_totals(totals: &InvoiceTotals, discount: f64) -> String {
    let mut out = format!("Subtotal {}\n", format_decimal(totals.subtotal));
    if discount > 0.0 {
        out.push_str(&format!("Discount -{}\n", format_decimal(discount)));
    }
    out.push_str(&format!("VAT      {}\n", format_decimal(totals.total_tax)));
    out.push_str(&format!("Total    {}\n", format_decimal(totals.total)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_keeps_safe_characters() {
        assert_eq!(sanitize_file_stem("INV-2024/07"), "INV-2024_07");
        assert_eq!(sanitize_file_stem(""), "draft");
    }

    #[test]
    fn description_lists_items_and_totals() {
        let text = describe_invoice(&InvoiceData::default_invoice());
        assert!(text.contains("[1]"));
        assert!(text.contains("Total    7130.00"));
        assert!(!text.contains("Discount"));
    }
}
