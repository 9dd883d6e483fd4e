use chrono::Local;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TAX_RATE: f64 = 0.15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: String,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub tax_rate: f64,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: f64, unit_price: f64, tax_rate: f64) -> Self {
        LineItem {
            id: new_item_id(),
            description: description.into(),
            quantity,
            unit_price,
            tax_rate,
        }
    }

    /// Quantity times unit price, before tax.
    pub fn line_total(&self) -> f64 {
        self.quantity * self.unit_price
    }

    pub fn line_tax(&self) -> f64 {
        self.line_total() * self.tax_rate
    }

    pub fn line_gross(&self) -> f64 {
        self.line_total() + self.line_tax()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInfo {
    pub name: String,
    pub address: String,
    /// Expected to be 15 digits; not validated.
    pub vat_number: String,
    pub cr_number: String,
    pub contact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceData {
    pub invoice_number: String,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// Local wall-clock time, `HH:MM`.
    pub time: String,
    #[serde(rename = "type")]
    pub invoice_type: String,
    pub seller: CompanyInfo,
    pub buyer: CompanyInfo,
    pub items: Vec<LineItem>,
    pub discount: f64,
    pub notes: String,
}

impl InvoiceData {
    /// The sample invoice a fresh workspace starts from, dated now.
    pub fn default_invoice() -> Self {
        let now = Local::now();
        InvoiceData {
            invoice_number: "00100234".to_string(),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M").to_string(),
            invoice_type: "فاتورة ضريبية".to_string(),
            seller: CompanyInfo {
                name: "مؤسسة الحلول التقنية".to_string(),
                address: "الرياض، المملكة العربية السعودية".to_string(),
                vat_number: "300123456700003".to_string(),
                cr_number: "1010101010".to_string(),
                contact: "0555555555".to_string(),
                logo_url: Some("https://picsum.photos/200/200".to_string()),
            },
            buyer: CompanyInfo {
                name: "شركة العملاء المميزين".to_string(),
                address: "جدة، حي الروضة".to_string(),
                vat_number: "300987654300003".to_string(),
                cr_number: String::new(),
                contact: String::new(),
                logo_url: None,
            },
            items: vec![
                LineItem {
                    id: "1".to_string(),
                    description: "تصميم واجهة مستخدم UX/UI".to_string(),
                    quantity: 1.0,
                    unit_price: 5000.0,
                    tax_rate: DEFAULT_TAX_RATE,
                },
                LineItem {
                    id: "2".to_string(),
                    description: "استضافة خادم سحابي (لمدة سنة)".to_string(),
                    quantity: 1.0,
                    unit_price: 1200.0,
                    tax_rate: DEFAULT_TAX_RATE,
                },
            ],
            discount: 0.0,
            notes: String::new(),
        }
    }

    pub fn find_item_mut(&mut self, id: &str) -> Option<&mut LineItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }
}

/// Aggregates derived from the line items and discount. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub total_tax: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Seller,
    Buyer,
}

/// Partial invoice returned by the image extraction service. Every field is
/// untrusted and optional; see `services::merge::apply_extracted`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedInvoice {
    pub invoice_number: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub seller: ExtractedParty,
    pub buyer: ExtractedParty,
    pub items: Vec<LineItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedParty {
    pub name: Option<String>,
    pub vat_number: Option<String>,
    pub cr_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLog {
    pub source_hash: Option<String>,
    pub process_type: String,
    pub status: String,
    pub message: Option<String>,
    pub created_at: String,
}

pub fn new_item_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..9].to_string()
}
