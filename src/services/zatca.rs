//! ZATCA (Fatoora) Phase-1 QR payload.
//!
//! The payload is five TLV records, one byte tag, one byte length, then the
//! UTF-8 value, concatenated in tag order and Base64 encoded:
//!
//! 1. Seller name
//! 2. VAT registration number
//! 3. Timestamp
//! 4. Invoice total (with VAT), two decimals
//! 5. VAT total, two decimals

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

use crate::models::InvoiceData;
use crate::utils::format_decimal;

pub const TAG_SELLER_NAME: u8 = 1;
pub const TAG_VAT_NUMBER: u8 = 2;
pub const TAG_TIMESTAMP: u8 = 3;
pub const TAG_INVOICE_TOTAL: u8 = 4;
pub const TAG_VAT_TOTAL: u8 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ZatcaError {
    #[error("Value for tag {tag} is {len} bytes, the limit is 255")]
    ValueTooLong { tag: u8, len: usize },
    #[error("Missing QR field: {0}")]
    MissingField(&'static str),
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),
    #[error("Payload truncated at byte {0}")]
    Truncated(usize),
    #[error("Expected tag {expected}, found {found}")]
    UnexpectedTag { expected: u8, found: u8 },
    #[error("Value for tag {0} is not valid UTF-8")]
    InvalidUtf8(u8),
    #[error("{0} unexpected bytes after tag 5")]
    TrailingBytes(usize),
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvRecord {
    pub tag: u8,
    pub value: String,
}

pub fn generate_zatca_base64(
    seller_name: &str,
    vat_number: &str,
    timestamp: &str,
    invoice_total: &str,
    vat_total: &str,
) -> Result<String, ZatcaError> {
    let fields = [
        (TAG_SELLER_NAME, seller_name),
        (TAG_VAT_NUMBER, vat_number),
        (TAG_TIMESTAMP, timestamp),
        (TAG_INVOICE_TOTAL, invoice_total),
        (TAG_VAT_TOTAL, vat_total),
    ];

    let capacity = fields.iter().map(|(_, value)| value.len() + 2).sum();
    let mut buffer = Vec::with_capacity(capacity);
    for (tag, value) in fields {
        push_record(&mut buffer, tag, value)?;
    }
    Ok(general_purpose::STANDARD.encode(buffer))
}

fn push_record(buffer: &mut Vec<u8>, tag: u8, value: &str) -> Result<(), ZatcaError> {
    let bytes = value.as_bytes();
    let len = u8::try_from(bytes.len()).map_err(|_| ZatcaError::ValueTooLong { tag, len: bytes.len() })?;
    buffer.push(tag);
    buffer.push(len);
    buffer.extend_from_slice(bytes);
    Ok(())
}

/// Parses a payload produced by [`generate_zatca_base64`] back into its five
/// records, checking that tags appear in order 1..5 with nothing trailing.
pub fn decode_zatca_base64(payload: &str) -> Result<Vec<TlvRecord>, ZatcaError> {
    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ZatcaError::InvalidBase64(e.to_string()))?;

    let mut records = Vec::with_capacity(5);
    let mut offset = 0;
    for expected in TAG_SELLER_NAME..=TAG_VAT_TOTAL {
        let header = bytes.get(offset..offset + 2).ok_or(ZatcaError::Truncated(offset))?;
        let (tag, len) = (header[0], header[1] as usize);
        if tag != expected {
            return Err(ZatcaError::UnexpectedTag { expected, found: tag });
        }
        offset += 2;
        let raw = bytes.get(offset..offset + len).ok_or(ZatcaError::Truncated(offset))?;
        let value = std::str::from_utf8(raw).map_err(|_| ZatcaError::InvalidUtf8(tag))?;
        records.push(TlvRecord {
            tag,
            value: value.to_string(),
        });
        offset += len;
    }

    if offset != bytes.len() {
        return Err(ZatcaError::TrailingBytes(bytes.len() - offset));
    }
    Ok(records)
}

/// Joins the invoice date and time into the QR timestamp.
///
/// The time is local wall-clock time, but the `Z` suffix claims UTC. No
/// conversion happens; readers of existing QR codes expect this exact shape.
pub fn zatca_timestamp(date: &str, time: &str) -> String {
    format!("{}T{}:00Z", date, time)
}

/// Builder that refuses to encode until every field has been supplied.
#[derive(Debug, Default, Clone)]
pub struct ZatcaQr {
    seller_name: Option<String>,
    vat_number: Option<String>,
    timestamp: Option<String>,
    invoice_total: Option<String>,
    vat_total: Option<String>,
}

impl ZatcaQr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_invoice(invoice: &InvoiceData) -> Self {
        let totals = invoice.totals();
        ZatcaQr::new()
            .seller_name(&invoice.seller.name)
            .vat_number(&invoice.seller.vat_number)
            .timestamp(zatca_timestamp(&invoice.date, &invoice.time))
            .invoice_total(format_decimal(totals.total))
            .vat_total(format_decimal(totals.total_tax))
    }

    pub fn seller_name(mut self, value: impl Into<String>) -> Self {
        self.seller_name = Some(value.into());
        self
    }

    pub fn vat_number(mut self, value: impl Into<String>) -> Self {
        self.vat_number = Some(value.into());
        self
    }

    pub fn timestamp(mut self, value: impl Into<String>) -> Self {
        self.timestamp = Some(value.into());
        self
    }

    pub fn invoice_total(mut self, value: impl Into<String>) -> Self {
        self.invoice_total = Some(value.into());
        self
    }

    pub fn vat_total(mut self, value: impl Into<String>) -> Self {
        self.vat_total = Some(value.into());
        self
    }

    pub fn encode(&self) -> Result<String, ZatcaError> {
        generate_zatca_base64(
            required(&self.seller_name, "seller_name")?,
            required(&self.vat_number, "vat_number")?,
            required(&self.timestamp, "timestamp")?,
            required(&self.invoice_total, "invoice_total")?,
            required(&self.vat_total, "vat_total")?,
        )
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ZatcaError> {
    value.as_deref().ok_or(ZatcaError::MissingField(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(payload: &str) -> Vec<u8> {
        general_purpose::STANDARD.decode(payload).unwrap()
    }

    #[test]
    fn encodes_ascii_fields_byte_for_byte() {
        let payload = generate_zatca_base64("Bobs", "300", "T", "1.00", "0.15").unwrap();
        let mut expected = vec![1u8, 4];
        expected.extend_from_slice(b"Bobs");
        expected.extend_from_slice(&[2, 3]);
        expected.extend_from_slice(b"300");
        expected.extend_from_slice(&[3, 1]);
        expected.extend_from_slice(b"T");
        expected.extend_from_slice(&[4, 4]);
        expected.extend_from_slice(b"1.00");
        expected.extend_from_slice(&[5, 4]);
        expected.extend_from_slice(b"0.15");
        assert_eq!(raw(&payload), expected);
    }

    #[test]
    fn empty_values_still_emit_tag_and_zero_length() {
        let payload = generate_zatca_base64("", "", "", "", "").unwrap();
        assert_eq!(raw(&payload), vec![1, 0, 2, 0, 3, 0, 4, 0, 5, 0]);
    }

    #[test]
    fn length_counts_utf8_bytes_not_chars() {
        let payload = generate_zatca_base64("مؤسسة", "1", "2", "3", "4").unwrap();
        let bytes = raw(&payload);
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[1] as usize, "مؤسسة".len());
        assert_eq!("مؤسسة".chars().count(), 5);
        assert_eq!(bytes[1], 10);
    }

    #[test]
    fn accepts_exactly_255_bytes() {
        let name = "a".repeat(255);
        let payload = generate_zatca_base64(&name, "", "", "", "").unwrap();
        let bytes = raw(&payload);
        assert_eq!(bytes[1], 0xFF);
        assert_eq!(decode_zatca_base64(&payload).unwrap()[0].value, name);
    }

    #[test]
    fn rejects_256_bytes() {
        let notes = "x".repeat(256);
        let err = generate_zatca_base64("seller", "vat", "ts", &notes, "0.00").unwrap_err();
        assert_eq!(err, ZatcaError::ValueTooLong { tag: 4, len: 256 });
    }

    #[test]
    fn rejects_multibyte_value_over_limit() {
        // 128 Arabic letters are 256 bytes.
        let name = "ب".repeat(128);
        let err = generate_zatca_base64(&name, "", "", "", "").unwrap_err();
        assert_eq!(err, ZatcaError::ValueTooLong { tag: 1, len: 256 });
    }

    #[test]
    fn builder_requires_every_field() {
        let err = ZatcaQr::new()
            .seller_name("s")
            .vat_number("v")
            .timestamp("t")
            .vat_total("0.00")
            .encode()
            .unwrap_err();
        assert_eq!(err, ZatcaError::MissingField("invoice_total"));
    }

    #[test]
    fn builder_matches_plain_function() {
        let built = ZatcaQr::new()
            .seller_name("s")
            .vat_number("v")
            .timestamp("t")
            .invoice_total("1.00")
            .vat_total("0.00")
            .encode()
            .unwrap();
        assert_eq!(built, generate_zatca_base64("s", "v", "t", "1.00", "0.00").unwrap());
    }

    #[test]
    fn timestamp_appends_seconds_and_z_without_conversion() {
        assert_eq!(zatca_timestamp("2024-01-15", "10:30"), "2024-01-15T10:30:00Z");
    }

    #[test]
    fn from_invoice_formats_totals_once() {
        let mut invoice = InvoiceData::default_invoice();
        invoice.date = "2024-01-15".to_string();
        invoice.time = "10:30".to_string();
        let payload = ZatcaQr::from_invoice(&invoice).encode().unwrap();
        let records = decode_zatca_base64(&payload).unwrap();
        let values: Vec<&str> = records.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(
            values,
            vec![
                "مؤسسة الحلول التقنية",
                "300123456700003",
                "2024-01-15T10:30:00Z",
                "7130.00",
                "930.00"
            ]
        );
    }

    #[test]
    fn decode_rejects_out_of_order_tags() {
        let payload = general_purpose::STANDARD.encode([2u8, 0, 1, 0, 3, 0, 4, 0, 5, 0]);
        assert_eq!(
            decode_zatca_base64(&payload).unwrap_err(),
            ZatcaError::UnexpectedTag { expected: 1, found: 2 }
        );
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let payload = general_purpose::STANDARD.encode([1u8, 5, b'a', b'b']);
        assert_eq!(decode_zatca_base64(&payload).unwrap_err(), ZatcaError::Truncated(2));
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let payload = general_purpose::STANDARD.encode([1u8, 0, 2, 0, 3, 0, 4, 0, 5, 0, 9]);
        assert_eq!(decode_zatca_base64(&payload).unwrap_err(), ZatcaError::TrailingBytes(1));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode_zatca_base64("@@@"), Err(ZatcaError::InvalidBase64(_))));
    }
}
