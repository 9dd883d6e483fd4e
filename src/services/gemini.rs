use base64::{engine::general_purpose, Engine as _};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{ExtractedInvoice, ExtractedParty, LineItem, DEFAULT_TAX_RATE};
use crate::utils::{normalize_date, normalize_time};

pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const THINKING_BUDGET: u32 = 32768;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gemini error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Empty response")]
    EmptyResponse,
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Response does not match the extraction schema")]
    SchemaMismatch,
    #[error("Invalid extraction schema: {0}")]
    Schema(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
    thinking_config: ThinkingConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Shape the model is asked to answer with. Every field may be missing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExtraction {
    invoice_number: Option<String>,
    date: Option<String>,
    time: Option<String>,
    seller_name: Option<String>,
    seller_vat: Option<String>,
    seller_cr: Option<String>,
    seller_address: Option<String>,
    buyer_name: Option<String>,
    buyer_vat: Option<String>,
    buyer_address: Option<String>,
    #[serde(default)]
    items: Option<Vec<RawItem>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    description: Option<String>,
    quantity: Option<f64>,
    unit_price: Option<f64>,
}

pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiExtractor {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        GeminiExtractor {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sends the image to the model and returns whatever invoice fields it
    /// could read, plus the raw JSON it answered with.
    pub async fn extract_invoice(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<(ExtractedInvoice, String), ExtractionError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: general_purpose::STANDARD.encode(image),
                        },
                    },
                    Part::Text {
                        text: extraction_prompt().to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: response_schema(),
                thinking_config: ThinkingConfig {
                    thinking_budget: THINKING_BUDGET,
                },
            },
        };

        let raw = self.call_gemini(&request).await?;
        let value = parse_json(&raw)?;
        let schema = extraction_schema()?;
        if !schema.is_valid(&value) {
            return Err(ExtractionError::SchemaMismatch);
        }

        let data: RawExtraction =
            serde_json::from_value(value).map_err(|e| ExtractionError::InvalidJson(e.to_string()))?;
        Ok((map_extraction(data), raw))
    }

    pub async fn test_key(&self) -> Result<bool, ExtractionError> {
        let response = self
            .client
            .get(format!("{}/v1beta/models", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn call_gemini(&self, request: &GenerateRequest) -> Result<String, ExtractionError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Api { status, body });
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ExtractionError::EmptyResponse);
        }
        Ok(text)
    }
}

fn parse_json(raw: &str) -> Result<Value, ExtractionError> {
    serde_json::from_str::<Value>(raw).map_err(|e| ExtractionError::InvalidJson(e.to_string()))
}

fn map_extraction(data: RawExtraction) -> ExtractedInvoice {
    let items = data
        .items
        .unwrap_or_default()
        .into_iter()
        .map(|item| {
            // Zero quantity means the model could not read one.
            let quantity = item.quantity.filter(|q| *q != 0.0).unwrap_or(1.0);
            LineItem::new(
                item.description.unwrap_or_default(),
                quantity,
                item.unit_price.unwrap_or(0.0),
                DEFAULT_TAX_RATE,
            )
        })
        .collect();

    ExtractedInvoice {
        invoice_number: data.invoice_number,
        date: normalize_date(data.date),
        time: normalize_time(data.time),
        seller: ExtractedParty {
            name: data.seller_name,
            vat_number: data.seller_vat,
            cr_number: data.seller_cr,
            address: data.seller_address,
        },
        buyer: ExtractedParty {
            name: data.buyer_name,
            vat_number: data.buyer_vat,
            cr_number: None,
            address: data.buyer_address,
        },
        items,
    }
}

/// Local check of the model's answer; nulls are tolerated everywhere.
fn extraction_schema() -> Result<JSONSchema, ExtractionError> {
    let nullable_string = json!({"type": ["string", "null"]});
    let nullable_number = json!({"type": ["number", "null"]});
    let schema = json!({
        "type": "object",
        "properties": {
            "invoiceNumber": nullable_string,
            "date": nullable_string,
            "time": nullable_string,
            "sellerName": nullable_string,
            "sellerVat": nullable_string,
            "sellerCr": nullable_string,
            "sellerAddress": nullable_string,
            "buyerName": nullable_string,
            "buyerVat": nullable_string,
            "buyerAddress": nullable_string,
            "items": {
                "type": ["array", "null"],
                "items": {
                    "type": "object",
                    "properties": {
                        "description": nullable_string,
                        "quantity": nullable_number,
                        "unitPrice": nullable_number
                    }
                }
            }
        }
    });

    JSONSchema::compile(&schema).map_err(|e| ExtractionError::Schema(e.to_string()))
}

/// Schema sent to the model, in Gemini's OpenAPI subset.
fn response_schema() -> Value {
    let string = json!({"type": "STRING"});
    json!({
        "type": "OBJECT",
        "properties": {
            "invoiceNumber": string,
            "date": string,
            "time": string,
            "sellerName": string,
            "sellerVat": string,
            "sellerCr": string,
            "sellerAddress": string,
            "buyerName": string,
            "buyerVat": string,
            "buyerAddress": string,
            "items": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "description": {"type": "STRING"},
                        "quantity": {"type": "NUMBER"},
                        "unitPrice": {"type": "NUMBER"}
                    }
                }
            }
        }
    })
}

fn extraction_prompt() -> &'static str {
    "Extract the invoice data from this image. Extract seller details (name, vat number, address, CR), \
invoice number, date, and line items. If a value is missing, leave it null or empty string. \
For the date, try to format as YYYY-MM-DD."
}
