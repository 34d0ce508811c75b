// =============================================================================
// Binance REST API Client — public daily klines
// =============================================================================
//
// Only the unauthenticated GET /api/v3/klines endpoint is used. One request
// per load: no retry and no backoff. Any response that is not a non-empty
// array of records with at least six numeric fields fails the whole fetch.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::market_data::{date_from_millis, Candle, CandleTable, FetchError, KlineSource};
use crate::runtime_config::ChartConfig;
use crate::types::{DAILY_INTERVAL, KLINE_LIMIT, LOOKBACK_DAYS};

/// Binance error code for an unknown trading pair.
const INVALID_SYMBOL_CODE: i64 = -1121;

/// Positional fields kept from every kline record:
/// `[open_time, open, high, low, close, volume]`.
const KLINE_FIELDS: usize = 6;

/// Binance REST client for public daily kline history.
///
/// The interval, window and record limit are fixed; only the endpoint and
/// timeout come from configuration.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Build a client from the service configuration.
    pub fn new(config: &ChartConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(config, client))
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_client(config: &ChartConfig, client: reqwest::Client) -> Self {
        debug!(base_url = %config.base_url, "BinanceClient initialised");
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// `(startTime, endTime)` in milliseconds: the last [`LOOKBACK_DAYS`]
    /// days ending now.
    ///
    /// Both ends are truncated to whole seconds before scaling.
    fn time_window() -> Result<(String, String), FetchError> {
        let now = Utc::now();
        let start = TimeDelta::try_days(LOOKBACK_DAYS)
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| FetchError::Malformed(format!("lookback of {LOOKBACK_DAYS} days is out of range")))?;
        Ok((
            (start.timestamp() * 1000).to_string(),
            (now.timestamp() * 1000).to_string(),
        ))
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/klines for the daily window ending now.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(&self, symbol: &str) -> Result<CandleTable, FetchError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let (start_time, end_time) = Self::time_window()?;
        let limit = KLINE_LIMIT.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", DAILY_INTERVAL),
                ("startTime", start_time.as_str()),
                ("endTime", end_time.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(rejection(symbol, status.as_u16(), &text));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| FetchError::Malformed(format!("body is not JSON: {e}")))?;

        let candles = parse_klines(&body)?;
        if candles.is_empty() {
            return Err(FetchError::Empty(symbol.to_string()));
        }

        debug!(symbol, interval = DAILY_INTERVAL, count = candles.len(), "klines fetched");
        Ok(CandleTable::new(symbol, DAILY_INTERVAL, candles))
    }
}

#[async_trait]
impl KlineSource for BinanceClient {
    async fn fetch(&self, symbol: &str) -> Result<CandleTable, FetchError> {
        self.get_klines(symbol).await
    }
}

// -----------------------------------------------------------------------------
// Response parsing
// -----------------------------------------------------------------------------

/// Classify a non-success response. Binance answers an unknown pair with
/// `{"code": -1121, "msg": "Invalid symbol."}`.
fn rejection(symbol: &str, status: u16, text: &str) -> FetchError {
    let parsed: Option<Value> = serde_json::from_str(text).ok();
    let code = parsed.as_ref().and_then(|v| v["code"].as_i64());
    let message = parsed
        .as_ref()
        .and_then(|v| v["msg"].as_str())
        .unwrap_or(text)
        .to_string();

    if code == Some(INVALID_SYMBOL_CODE) {
        warn!(symbol, %message, "quote source rejected symbol");
        return FetchError::InvalidSymbol {
            symbol: symbol.to_string(),
            message,
        };
    }

    warn!(symbol, status, body = %text, "quote source returned an error status");
    FetchError::Status {
        status,
        body: message,
    }
}

/// Parse Binance's array-of-arrays kline payload, keeping the first six
/// positional fields of each record:
///
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume, ...
///
/// Prices and volume may be JSON numbers or numeric strings. A single bad
/// record fails the whole payload.
pub fn parse_klines(body: &Value) -> Result<Vec<Candle>, FetchError> {
    let raw = body
        .as_array()
        .ok_or_else(|| FetchError::Malformed("klines response is not an array".into()))?;

    raw.iter()
        .enumerate()
        .map(|(row, entry)| parse_record(row, entry))
        .collect()
}

fn parse_record(row: usize, entry: &Value) -> Result<Candle, FetchError> {
    let arr = entry
        .as_array()
        .ok_or_else(|| FetchError::Malformed(format!("record {row} is not an array")))?;

    if arr.len() < KLINE_FIELDS {
        return Err(FetchError::Malformed(format!(
            "record {row} has {} fields, expected at least {KLINE_FIELDS}",
            arr.len()
        )));
    }

    let open_time = parse_open_time(&arr[0])
        .ok_or_else(|| FetchError::Malformed(format!("record {row} has an invalid open time")))?;
    let date = date_from_millis(open_time)
        .ok_or_else(|| FetchError::Malformed(format!("record {row} open time out of range")))?;

    Ok(Candle {
        date,
        open: parse_number(&arr[1], row, "open")?,
        high: parse_number(&arr[2], row, "high")?,
        low: parse_number(&arr[3], row, "low")?,
        close: parse_number(&arr[4], row, "close")?,
        volume: parse_number(&arr[5], row, "volume")?,
    })
}

/// Open time in epoch milliseconds, as an integer or an integer string.
fn parse_open_time(val: &Value) -> Option<i64> {
    match val {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a JSON value that may be either a string or a number into a finite
/// `f64`.
fn parse_number(val: &Value, row: usize, name: &str) -> Result<f64, FetchError> {
    let parsed = match val {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed
        .filter(|x| x.is_finite())
        .ok_or_else(|| FetchError::Malformed(format!("record {row} field {name} is not a number: {val}")))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DAY_MS: i64 = 86_400_000;
    // 2024-01-01T00:00:00Z
    const JAN_1_MS: i64 = 1_704_067_200_000;

    fn kline(day: i64, close: &str) -> Value {
        json!([
            JAN_1_MS + day * DAY_MS,
            "100.00",
            "110.50",
            "95.25",
            close,
            "1234.5",
            JAN_1_MS + (day + 1) * DAY_MS - 1,
            "0",
            42,
            "0",
            "0",
            "0"
        ])
    }

    fn client_for(server: &MockServer) -> BinanceClient {
        let config = ChartConfig {
            base_url: server.uri(),
            ..ChartConfig::default()
        };
        BinanceClient::with_client(&config, reqwest::Client::new())
    }

    #[test]
    fn parse_keeps_first_six_fields() {
        let body = json!([kline(0, "101.5"), kline(1, "102.5")]);
        let candles = parse_klines(&body).expect("should parse");
        assert_eq!(candles.len(), 2);
        let first = &candles[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!((first.open - 100.0).abs() < f64::EPSILON);
        assert!((first.high - 110.5).abs() < f64::EPSILON);
        assert!((first.low - 95.25).abs() < f64::EPSILON);
        assert!((first.close - 101.5).abs() < f64::EPSILON);
        assert!((first.volume - 1234.5).abs() < f64::EPSILON);
        assert_eq!(candles[1].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn parse_accepts_plain_numbers() {
        let body = json!([[JAN_1_MS, 1.0, 2.0, 0.5, 1.5, 10]]);
        let candles = parse_klines(&body).expect("numbers are accepted");
        assert!((candles[0].volume - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_rejects_short_record() {
        // No volume field.
        let body = json!([[JAN_1_MS, "1", "2", "0.5", "1.5"]]);
        assert!(matches!(parse_klines(&body), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn parse_rejects_non_numeric_field() {
        let body = json!([kline(0, "abc")]);
        assert!(matches!(parse_klines(&body), Err(FetchError::Malformed(_))));
        let body = json!([kline(0, "NaN")]);
        assert!(matches!(parse_klines(&body), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn parse_rejects_non_array_payload() {
        let body = json!({"code": 0, "msg": "unexpected"});
        assert!(matches!(parse_klines(&body), Err(FetchError::Malformed(_))));
        let body = json!([{"t": JAN_1_MS}]);
        assert!(matches!(parse_klines(&body), Err(FetchError::Malformed(_))));
    }

    #[tokio::test]
    async fn get_klines_sends_fixed_window_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/klines"))
            .and(query_param("symbol", "ETHUSDT"))
            .and(query_param("interval", "1d"))
            .and(query_param("limit", "1000"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([kline(0, "2000"), kline(1, "2010")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let table = client_for(&server).get_klines("ETHUSDT").await.expect("fetch succeeds");
        assert_eq!(table.symbol(), "ETHUSDT");
        assert_eq!(table.interval(), "1d");
        assert_eq!(table.closes(), vec![2000.0, 2010.0]);

        let requests = server.received_requests().await.expect("recorded requests");
        let query: std::collections::HashMap<_, _> = requests[0].url.query_pairs().into_owned().collect();
        let start: i64 = query["startTime"].parse().expect("numeric startTime");
        let end: i64 = query["endTime"].parse().expect("numeric endTime");
        assert_eq!(end - start, 1000 * DAY_MS);
        assert_eq!(end % 1000, 0);
    }

    #[tokio::test]
    async fn legacy_window_keys_in_config_are_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/klines"))
            .and(query_param("interval", "1d"))
            .and(query_param("limit", "1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([kline(0, "2000")])))
            .expect(1)
            .mount(&server)
            .await;

        let raw = json!({
            "base_url": server.uri(),
            "interval": "1h",
            "lookback_days": 4_294_967_295_u64,
            "limit": 5
        });
        let config: ChartConfig = serde_json::from_value(raw).expect("unknown keys are ignored");
        let client = BinanceClient::with_client(&config, reqwest::Client::new());

        let table = client.get_klines("BTCUSDT").await.expect("fetch succeeds");
        assert_eq!(table.interval(), "1d");

        let requests = server.received_requests().await.expect("recorded requests");
        let query: std::collections::HashMap<_, _> = requests[0].url.query_pairs().into_owned().collect();
        let start: i64 = query["startTime"].parse().expect("numeric startTime");
        let end: i64 = query["endTime"].parse().expect("numeric endTime");
        assert_eq!(end - start, LOOKBACK_DAYS * DAY_MS);
    }

    #[tokio::test]
    async fn invalid_symbol_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/klines"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"code": -1121, "msg": "Invalid symbol."})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).get_klines("NOPEUSDT").await.unwrap_err();
        assert_eq!(
            err,
            FetchError::InvalidSymbol {
                symbol: "NOPEUSDT".into(),
                message: "Invalid symbol.".into()
            }
        );
    }

    #[tokio::test]
    async fn server_error_is_a_status_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_klines("BTCUSDT").await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Status {
                status: 503,
                body: "maintenance".into()
            }
        );
    }

    #[tokio::test]
    async fn empty_array_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = client_for(&server).get_klines("BTCUSDT").await.unwrap_err();
        assert_eq!(err, FetchError::Empty("BTCUSDT".into()));
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch("BTCUSDT").await.unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_failure() {
        let config = ChartConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..ChartConfig::default()
        };
        let client = BinanceClient::with_client(&config, reqwest::Client::new());
        let err = client.fetch("BTCUSDT").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
