use anyhow::Result;
use std::path::Path;

use crate::commands::invoices::describe_invoice;
use crate::services::processor::process_image;
use crate::services::state::AppState;

/// Reads an invoice photo and merges what the model found into the stored
/// invoice. On failure the stored invoice is unchanged.
pub async fn run_extract(state: &AppState, image: &Path) -> Result<()> {
    let extractor = state.extractor()?;
    let invoice = process_image(&state.db, image, &extractor).await?;
    print!("{}", describe_invoice(&invoice));
    Ok(())
}
