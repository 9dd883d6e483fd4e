use anyhow::{anyhow, Result};
use std::path::Path;
use thiserror::Error;

use crate::db::Database;
use crate::models::InvoiceData;
use crate::services::gemini::{ExtractionError, GeminiExtractor};
use crate::services::merge::apply_extracted;
use crate::services::store::InvoiceStore;
use crate::utils::sha256_hex;

/// The extraction service gave nothing usable. The stored invoice is left
/// untouched and the user may retry with a clearer image.
#[derive(Debug, Error)]
#[error("Could not extract invoice data from the image, please try again with a clearer picture: {0}")]
pub struct ExtractionFailure(#[from] pub ExtractionError);

pub fn mime_type_for(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(|| anyhow!("Image has no file extension: {}", path.display()))?;
    match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "webp" => Ok("image/webp"),
        "heic" => Ok("image/heic"),
        "heif" => Ok("image/heif"),
        other => Err(anyhow!("Unsupported image type: {}", other)),
    }
}

pub async fn process_image(db: &Database, path: &Path, extractor: &GeminiExtractor) -> Result<InvoiceData> {
    let mime_type = mime_type_for(path)?;
    let image = std::fs::read(path).map_err(|e| anyhow!("Read {}: {}", path.display(), e))?;
    process_image_bytes(db, &image, mime_type, extractor).await
}

pub async fn process_image_bytes(
    db: &Database,
    image: &[u8],
    mime_type: &str,
    extractor: &GeminiExtractor,
) -> Result<InvoiceData> {
    let image_hash = sha256_hex(image);
    tracing::info!(hash = %image_hash, mime_type, bytes = image.len(), "extracting invoice from image");

    let extracted = match extractor.extract_invoice(image, mime_type).await {
        Ok((extracted, _raw)) => extracted,
        Err(err) => {
            tracing::warn!(hash = %image_hash, error = %err, "extraction failed");
            if let Err(log_err) = db.log_processing(Some(&image_hash), "extract", "failed", Some(&err.to_string())) {
                tracing::warn!(error = %log_err, "could not record failed extraction");
            }
            return Err(ExtractionFailure(err).into());
        }
    };

    let store = InvoiceStore::new(db);
    let item_count = extracted.items.len();
    let invoice = store.update(|invoice| {
        apply_extracted(invoice, extracted);
        Ok(())
    })?;

    db.log_processing(
        Some(&image_hash),
        "extract",
        "success",
        Some(&format!("{} items", item_count)),
    )?;
    tracing::info!(hash = %image_hash, items = item_count, "extraction merged");

    Ok(invoice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_mime_from_extension() {
        assert_eq!(mime_type_for(Path::new("scan.JPG")).unwrap(), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a/b/receipt.png")).unwrap(), "image/png");
        assert!(mime_type_for(Path::new("invoice.pdf")).is_err());
        assert!(mime_type_for(Path::new("noext")).is_err());
    }
}
