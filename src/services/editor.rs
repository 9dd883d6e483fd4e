//! Edits made through the form surface. Each operation changes one field
//! (or one item) and leaves everything else as it was.

use anyhow::{anyhow, Result};
use std::str::FromStr;

use crate::models::{CompanyInfo, InvoiceData, LineItem, Party, DEFAULT_TAX_RATE};
use crate::utils::{normalize_date, normalize_time, parse_decimal};

pub const NEW_ITEM_DESCRIPTION: &str = "خدمة جديدة";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceField {
    InvoiceNumber,
    Type,
    Date,
    Time,
    Discount,
    Notes,
    Party(Party, PartyField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyField {
    Name,
    Address,
    VatNumber,
    CrNumber,
    Contact,
    LogoUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    Description,
    Quantity,
    UnitPrice,
    TaxRate,
}

impl FromStr for PartyField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "name" => Ok(PartyField::Name),
            "address" => Ok(PartyField::Address),
            "vat" | "vat-number" => Ok(PartyField::VatNumber),
            "cr" | "cr-number" => Ok(PartyField::CrNumber),
            "contact" => Ok(PartyField::Contact),
            "logo" | "logo-url" => Ok(PartyField::LogoUrl),
            other => Err(anyhow!("Unknown party field: {}", other)),
        }
    }
}

/// Accepts `number`, `type`, `date`, `time`, `discount`, `notes`, and
/// `seller.<field>` / `buyer.<field>`.
impl FromStr for InvoiceField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some((party, field)) = s.split_once('.') {
            let party = match party {
                "seller" => Party::Seller,
                "buyer" => Party::Buyer,
                other => return Err(anyhow!("Unknown party: {}", other)),
            };
            return Ok(InvoiceField::Party(party, field.parse()?));
        }
        match s {
            "number" | "invoice-number" => Ok(InvoiceField::InvoiceNumber),
            "type" => Ok(InvoiceField::Type),
            "date" => Ok(InvoiceField::Date),
            "time" => Ok(InvoiceField::Time),
            "discount" => Ok(InvoiceField::Discount),
            "notes" => Ok(InvoiceField::Notes),
            other => Err(anyhow!("Unknown invoice field: {}", other)),
        }
    }
}

impl FromStr for ItemField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "description" => Ok(ItemField::Description),
            "quantity" | "qty" => Ok(ItemField::Quantity),
            "price" | "unit-price" => Ok(ItemField::UnitPrice),
            "tax" | "tax-rate" => Ok(ItemField::TaxRate),
            other => Err(anyhow!("Unknown item field: {}", other)),
        }
    }
}

impl InvoiceData {
    pub fn set_field(&mut self, field: InvoiceField, value: &str) -> Result<()> {
        match field {
            InvoiceField::InvoiceNumber => self.invoice_number = value.to_string(),
            InvoiceField::Type => self.invoice_type = value.to_string(),
            InvoiceField::Date => {
                self.date = normalize_date(Some(value.to_string())).unwrap_or_default();
            }
            InvoiceField::Time => {
                self.time = normalize_time(Some(value.to_string())).unwrap_or_default();
            }
            InvoiceField::Discount => self.discount = parse_decimal(value)?,
            InvoiceField::Notes => self.notes = value.to_string(),
            InvoiceField::Party(party, field) => self.party_mut(party).set_field(field, value),
        }
        Ok(())
    }

    pub fn party_mut(&mut self, party: Party) -> &mut CompanyInfo {
        match party {
            Party::Seller => &mut self.seller,
            Party::Buyer => &mut self.buyer,
        }
    }

    /// Appends a placeholder item and returns its id.
    pub fn add_item(&mut self) -> String {
        let item = LineItem::new(NEW_ITEM_DESCRIPTION, 1.0, 0.0, DEFAULT_TAX_RATE);
        let id = item.id.clone();
        self.items.push(item);
        id
    }

    pub fn update_item(&mut self, id: &str, field: ItemField, value: &str) -> Result<()> {
        let item = self
            .find_item_mut(id)
            .ok_or_else(|| anyhow!("Item not found: {}", id))?;
        match field {
            ItemField::Description => item.description = value.to_string(),
            ItemField::Quantity => item.quantity = parse_decimal(value)?,
            ItemField::UnitPrice => item.unit_price = parse_decimal(value)?,
            ItemField::TaxRate => item.tax_rate = parse_decimal(value)?,
        }
        Ok(())
    }

    /// Removes the item with `id`. Returns whether anything was removed.
    pub fn remove_item(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }
}

impl CompanyInfo {
    pub fn set_field(&mut self, field: PartyField, value: &str) {
        match field {
            PartyField::Name => self.name = value.to_string(),
            PartyField::Address => self.address = value.to_string(),
            PartyField::VatNumber => self.vat_number = value.to_string(),
            PartyField::CrNumber => self.cr_number = value.to_string(),
            PartyField::Contact => self.contact = value.to_string(),
            PartyField::LogoUrl => {
                let trimmed = value.trim();
                self.logo_url = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
        }
    }
}
