//! Printable tax invoice document.
//!
//! Produces one self-contained A4 HTML page with the ZATCA QR code inlined as
//! SVG. When the QR payload cannot be built the page still renders, with a
//! notice where the code would be.

use std::fmt::Write as _;

use qrcode::render::svg;
use qrcode::QrCode;

use crate::models::{CompanyInfo, InvoiceData};
use crate::services::zatca::ZatcaQr;
use crate::utils::format_currency;

const QR_SIZE: u32 = 110;
const CURRENCY_LABEL: &str = "ريال";

pub fn render_qr_svg(payload: &str) -> Result<String, qrcode::types::QrError> {
    let code = QrCode::new(payload.as_bytes())?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(QR_SIZE, QR_SIZE)
        .build();
    // Drop the XML prolog so the markup can sit inside HTML.
    Ok(match image.find("<svg") {
        Some(start) => image[start..].to_string(),
        None => image,
    })
}

fn qr_block(invoice: &InvoiceData) -> String {
    let payload = match ZatcaQr::from_invoice(invoice).encode() {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "QR payload unavailable");
            return format!(r#"<div class="qr-missing">QR unavailable: {}</div>"#, escape_html(&err.to_string()));
        }
    };
    match render_qr_svg(&payload) {
        Ok(svg) => svg,
        Err(err) => {
            tracing::warn!(error = %err, "QR rendering failed");
            format!(r#"<div class="qr-missing">QR unavailable: {}</div>"#, escape_html(&err.to_string()))
        }
    }
}

pub fn render_invoice_html(invoice: &InvoiceData) -> String {
    let totals = invoice.totals();
    let mut html = String::with_capacity(8 * 1024);

    html.push_str(
        r#"<!DOCTYPE html>
<html lang="ar" dir="rtl">
<head>
<meta charset="utf-8">
<title>"#,
    );
    html.push_str(&escape_html(&invoice.invoice_number));
    html.push_str(
        r#"</title>
<style>
body { font-family: sans-serif; font-size: 13px; margin: 0; }
.page { width: 210mm; min-height: 297mm; margin: 0 auto; padding: 24px; box-sizing: border-box; }
.header { display: flex; justify-content: space-between; border-bottom: 2px solid #222; padding-bottom: 16px; margin-bottom: 16px; }
.header > div { width: 33%; }
.logo { height: 96px; object-fit: contain; }
.grid { display: flex; gap: 16px; margin-bottom: 16px; }
.box { flex: 1; border: 1px solid #ccc; border-radius: 4px; padding: 12px; }
table { width: 100%; border-collapse: collapse; text-align: center; }
th, td { border: 1px solid #ccc; padding: 6px; }
.totals { width: 50%; margin-inline-start: auto; margin-top: 16px; border: 1px solid #ccc; }
.totals div { display: flex; justify-content: space-between; padding: 6px; border-bottom: 1px solid #ccc; }
.totals .grand { background: #1e3a8a; color: #fff; font-size: 16px; font-weight: bold; }
.discount { color: #dc2626; }
.footer { margin-top: 32px; border-top: 1px solid #ccc; padding-top: 12px; color: #666; font-size: 11px; display: flex; justify-content: space-between; }
.qr-missing { width: 110px; font-size: 10px; color: #dc2626; }
@media print { .page { width: auto; min-height: 0; padding: 0; } }
</style>
</head>
<body>
<div class="page">
"#,
    );

    render_header(&mut html, &invoice.seller);

    let _ = write!(
        html,
        r#"<div class="grid">
<div class="box">
<h3>العميل / Bill To</h3>
<p>الاسم: <strong>{}</strong></p>
<p>الرقم الضريبي: {}</p>
<p>العنوان: {}</p>
</div>
<div class="box">
<p>رقم الفاتورة: <strong>{}</strong></p>
<p>التاريخ: {}</p>
<p>الوقت: {}</p>
</div>
<div class="qr">{}</div>
</div>
"#,
        escape_html(&invoice.buyer.name),
        escape_html(&invoice.buyer.vat_number),
        escape_html(&invoice.buyer.address),
        escape_html(&invoice.invoice_number),
        escape_html(&invoice.date),
        escape_html(&invoice.time),
        qr_block(invoice),
    );

    html.push_str(
        r#"<table>
<thead><tr><th>#</th><th>وصف الخدمة / المنتجات</th><th>الكمية</th><th>سعر الوحدة</th><th>نسبة الضريبة</th><th>الضريبة</th><th>الاجمالي</th></tr></thead>
<tbody>
"#,
    );
    for (index, item) in invoice.items.iter().enumerate() {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.0}%</td><td>{}</td><td><strong>{}</strong></td></tr>",
            index + 1,
            escape_html(&item.description),
            item.quantity,
            format_currency(item.unit_price),
            item.tax_rate * 100.0,
            format_currency(item.line_tax()),
            format_currency(item.line_gross()),
        );
    }
    html.push_str("</tbody>\n</table>\n");

    html.push_str("<div class=\"totals\">\n");
    let _ = writeln!(
        html,
        "<div><span>صافي قيمة الأعمال (Subtotal)</span><strong>{} {}</strong></div>",
        format_currency(totals.subtotal),
        CURRENCY_LABEL
    );
    if invoice.discount > 0.0 {
        let _ = writeln!(
            html,
            "<div class=\"discount\"><span>الخصومات (Discount)</span><span>- {} {}</span></div>",
            format_currency(invoice.discount),
            CURRENCY_LABEL
        );
    }
    let _ = writeln!(
        html,
        "<div><span>ضريبة القيمة المضافة (VAT 15%)</span><strong>{} {}</strong></div>",
        format_currency(totals.total_tax),
        CURRENCY_LABEL
    );
    let _ = writeln!(
        html,
        "<div class=\"grand\"><span>اجمالي الفاتورة (Total)</span><span>{} {}</span></div>",
        format_currency(totals.total),
        CURRENCY_LABEL
    );
    html.push_str("</div>\n");

    html.push_str("<div class=\"footer\">\n<div>\n");
    if !invoice.notes.trim().is_empty() {
        let _ = writeln!(html, "<p><strong>ملاحظات:</strong> {}</p>", escape_html(&invoice.notes));
    }
    html.push_str(
        "<p>تم اصدار هذه الفاتورة الكترونياً وهي معتمدة من هيئة الزكاة والضريبة والجمارك.</p>\n</div>\n<div>Page 1 of 1</div>\n</div>\n",
    );

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn render_header(html: &mut String, seller: &CompanyInfo) {
    let logo = match seller.logo_url.as_deref().filter(|url| !url.trim().is_empty()) {
        Some(url) => format!(r#"<img class="logo" src="{}" alt="Logo">"#, escape_html(url)),
        None => "<div class=\"logo\">شعار الشركة</div>".to_string(),
    };
    let _ = write!(
        html,
        r#"<div class="header">
<div>{}<h1>{}</h1></div>
<div style="text-align:center"><h2>فاتورة ضريبية</h2><p>TAX INVOICE</p></div>
<div>
<p><strong>رقم السجل التجاري:</strong> {}</p>
<p><strong>الرقم الضريبي:</strong> {}</p>
<p>{}</p>
<p>{}</p>
</div>
</div>
"#,
        logo,
        escape_html(&seller.name),
        escape_html(&seller.cr_number),
        escape_html(&seller.vat_number),
        escape_html(&seller.address),
        escape_html(&seller.contact),
    );
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_totals_and_qr() {
        let invoice = InvoiceData::default_invoice();
        let html = render_invoice_html(&invoice);
        assert!(html.contains("6,200.00 ريال"));
        assert!(html.contains("930.00 ريال"));
        assert!(html.contains("7,130.00 ريال"));
        assert!(html.contains("<svg"));
        assert!(!html.contains("<?xml"));
        assert!(!html.contains("الخصومات"));
    }

    #[test]
    fn discount_row_only_when_positive() {
        let mut invoice = InvoiceData::default_invoice();
        invoice.discount = 130.0;
        let html = render_invoice_html(&invoice);
        assert!(html.contains("- 130.00 ريال"));
        assert!(html.contains("7,000.00 ريال"));
    }

    #[test]
    fn oversized_seller_name_degrades_to_notice() {
        let mut invoice = InvoiceData::default_invoice();
        invoice.seller.name = "x".repeat(300);
        let html = render_invoice_html(&invoice);
        assert!(html.contains("QR unavailable"));
        assert!(html.contains("7,130.00 ريال"));
    }

    #[test]
    fn escapes_user_text() {
        let mut invoice = InvoiceData::default_invoice();
        invoice.notes = "<script>alert('x')</script>".to_string();
        let html = render_invoice_html(&invoice);
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn line_rows_show_tax_percent_and_gross() {
        let html = render_invoice_html(&InvoiceData::default_invoice());
        assert!(html.contains("<td>15%</td><td>750.00</td><td><strong>5,750.00</strong></td>"));
    }
}
