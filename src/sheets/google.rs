use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::auth::AuthSession;
use super::SheetClient;
use crate::error::SheetError;
use crate::schema::Row;

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// Sheets v4 REST client for a single spreadsheet document.
pub struct GoogleSheetsClient {
    api_base: String,
    spreadsheet_id: String,
    auth: Arc<AuthSession>,
    client: reqwest::Client,
    /// Numeric worksheet ids by title, filled on first delete.
    sheet_ids: Mutex<HashMap<String, i64>>,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

impl GoogleSheetsClient {
    pub fn new(
        api_base: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        auth: Arc<AuthSession>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            auth,
            client,
            sheet_ids: Mutex::new(HashMap::new()),
        }
    }

    fn spreadsheet_url(&self, suffix: &str) -> Result<Url, SheetError> {
        let base = format!("{}/v4/spreadsheets/", self.api_base);
        let mut url = Url::parse(&base).map_err(|e| SheetError::Api {
            status: 0,
            message: format!("invalid API base '{}': {}", self.api_base, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| SheetError::Api {
                status: 0,
                message: format!("API base '{}' cannot take a path", self.api_base),
            })?
            .pop_if_empty()
            .push(&format!("{}{}", self.spreadsheet_id, suffix));
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url, SheetError> {
        let mut url = self.spreadsheet_url("")?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push("values").push(range);
        }
        Ok(url)
    }

    /// Authorize, send and map non-success statuses onto [`SheetError`].
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        target: &str,
    ) -> Result<reqwest::Response, SheetError> {
        let token = self.auth.bearer().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = retry_after(response.headers());
        let error_text = response.text().await.unwrap_or_default();
        let err = classify(status, retry_after, &error_text, target);
        if matches!(err, SheetError::Auth(_)) {
            self.auth.invalidate().await;
        }
        log::warn!("GoogleSheets: {} failed: {}", target, err);
        Err(err)
    }

    fn cached_ids(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.sheet_ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Numeric id of a worksheet, looked up by title once and then cached.
    async fn sheet_id(&self, sheet: &str) -> Result<i64, SheetError> {
        let cached = self.cached_ids().get(sheet).copied();
        if let Some(id) = cached {
            return Ok(id);
        }

        let mut url = self.spreadsheet_url("")?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");

        let meta: SpreadsheetMeta = self.send(self.client.get(url), sheet).await?.json().await?;
        let id = meta
            .sheets
            .into_iter()
            .map(|s| s.properties)
            .find(|p| p.title == sheet)
            .map(|p| p.sheet_id)
            .ok_or_else(|| SheetError::NotFound(format!("worksheet '{}'", sheet)))?;

        self.cached_ids().insert(sheet.to_string(), id);
        Ok(id)
    }
}

fn check_row_index(sheet: &str, row_index: usize) -> Result<(), SheetError> {
    if row_index == 0 {
        return Err(SheetError::NotFound(format!(
            "row {} of worksheet '{}'",
            row_index, sheet
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl SheetClient for GoogleSheetsClient {
    fn name(&self) -> &str {
        "google_sheets"
    }

    async fn read_all(&self, sheet: &str) -> Result<Vec<Row>, SheetError> {
        let mut url = self.values_url(&quote_sheet(sheet))?;
        url.query_pairs_mut().append_pair("majorDimension", "ROWS");
        log::debug!("GoogleSheets: GET {}", url);

        let range: ValueRange = self.send(self.client.get(url), sheet).await?.json().await?;
        log::debug!("GoogleSheets: read {} row(s) from '{}'", range.values.len(), sheet);
        Ok(range.values)
    }

    async fn append_row(&self, sheet: &str, row: Row) -> Result<usize, SheetError> {
        let range = format!("{}!A1", quote_sheet(sheet));
        let mut url = self.values_url(&format!("{}:append", range))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let body = serde_json::json!({ "majorDimension": "ROWS", "values": [row] });
        let response: AppendResponse = self
            .send(self.client.post(url).json(&body), sheet)
            .await?
            .json()
            .await?;

        parse_row_index(&response.updates.updated_range).ok_or_else(|| SheetError::Api {
            status: 200,
            message: format!(
                "unexpected updated range '{}'",
                response.updates.updated_range
            ),
        })
    }

    async fn update_row(&self, sheet: &str, row_index: usize, row: Row) -> Result<(), SheetError> {
        check_row_index(sheet, row_index)?;

        let range = format!("{}!A{}", quote_sheet(sheet), row_index);
        let mut url = self.values_url(&range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let body = serde_json::json!({ "majorDimension": "ROWS", "values": [row] });
        self.send(self.client.put(url).json(&body), sheet).await?;
        Ok(())
    }

    async fn delete_row(&self, sheet: &str, row_index: usize) -> Result<(), SheetError> {
        check_row_index(sheet, row_index)?;
        let sheet_id = self.sheet_id(sheet).await?;

        let url = self.spreadsheet_url(":batchUpdate")?;
        let body = serde_json::json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": row_index - 1,
                        "endIndex": row_index
                    }
                }
            }]
        });
        if let Err(err) = self.send(self.client.post(url).json(&body), sheet).await {
            // The worksheet may have been renamed or recreated.
            self.cached_ids().remove(sheet);
            return Err(err);
        }
        Ok(())
    }
}

/// Quote a worksheet title for use in A1 notation.
pub fn quote_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// Extract the first row number from an A1 range such as `'Todo'!A5:F5`.
pub fn parse_row_index(range: &str) -> Option<usize> {
    let cells = range.rsplit_once('!').map_or(range, |(_, cells)| cells);
    let first = cells.split(':').next()?;
    let digits: String = first
        .chars()
        .skip_while(|c| c.is_ascii_alphabetic())
        .collect();
    digits.parse().ok().filter(|n| *n > 0)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Map a failed HTTP response onto the adapter's error taxonomy.
pub(crate) fn classify(
    status: StatusCode,
    retry_after: Option<Duration>,
    error_text: &str,
    target: &str,
) -> SheetError {
    let detail = serde_json::from_str::<ErrorBody>(error_text).ok().map(|b| b.error);
    let message = detail
        .as_ref()
        .map(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| error_text.to_string());
    let throttled = detail
        .as_ref()
        .is_some_and(|d| d.status == "RESOURCE_EXHAUSTED")
        || error_text.contains("rateLimitExceeded");

    match status {
        StatusCode::TOO_MANY_REQUESTS => SheetError::RateLimit { retry_after },
        StatusCode::FORBIDDEN if throttled => SheetError::RateLimit { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SheetError::Auth(message),
        StatusCode::NOT_FOUND => SheetError::NotFound(format!("{}: {}", target, message)),
        StatusCode::BAD_REQUEST if message.contains("Unable to parse range") => {
            SheetError::NotFound(format!("worksheet '{}'", target))
        }
        _ => SheetError::Api {
            status: status.as_u16(),
            message,
        },
    }
}
