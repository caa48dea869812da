//! Position and prediction collectors.
//!
//! Each collector owns an authenticated API client and a pool, and runs
//! strictly sequential cycles: one cycle finishes (or fails) before the next
//! sleep starts. A failed cycle is logged and recorded as an error row in the
//! stats CSV; it never ends the loop.

use chrono::{Local, NaiveDateTime};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::analyzers::types::{PositionSample, PredictionSample};
use crate::config::{PositionsConfig, PredictionsConfig};
use crate::db;
use crate::fetch::{HttpClient, OlhoVivoClient};
use crate::output::append_record;
use crate::parser::{LinePredictionsPayload, PositionsPayload, parse_observed_at};
use crate::stats::{CollectionStats, Collector};

/// Target-line vehicles of one `/Posicao` snapshot.
#[derive(Debug, Default)]
pub struct Selection {
    pub lines_in_payload: usize,
    pub vehicles_in_payload: usize,
    pub samples: Vec<PositionSample>,
}

/// Keeps every vehicle of the lines whose code is in `targets`.
///
/// All samples share `collected_at`. Vehicles whose `ta` is missing or
/// unparseable are dropped.
pub fn select_target_positions(
    payload: &PositionsPayload,
    targets: &BTreeSet<String>,
    collected_at: NaiveDateTime,
) -> Selection {
    let mut selection = Selection {
        lines_in_payload: payload.lines.len(),
        ..Default::default()
    };

    for line in &payload.lines {
        selection.vehicles_in_payload += line.vehicles.len();
        if !targets.contains(&line.code) {
            continue;
        }

        for vehicle in &line.vehicles {
            let observed_at = vehicle.observed_at.as_deref().and_then(parse_observed_at);
            let Some(observed_at) = observed_at else {
                warn!(
                    line_code = %line.code,
                    vehicle_id = vehicle.prefix,
                    ta = ?vehicle.observed_at,
                    "Skipping vehicle without a usable timestamp"
                );
                continue;
            };

            selection.samples.push(PositionSample {
                vehicle_id: vehicle.prefix,
                line_code: line.code.clone(),
                latitude: vehicle.latitude,
                longitude: vehicle.longitude,
                observed_at,
                collected_at,
            });
        }
    }

    selection
}

/// One row per (stop, vehicle) of a `/Previsao/Linha` answer.
pub fn flatten_predictions(
    line_id: i64,
    payload: &LinePredictionsPayload,
    collected_at: NaiveDateTime,
) -> Vec<PredictionSample> {
    payload
        .stops
        .iter()
        .flat_map(|stop| {
            stop.vehicles.iter().map(move |vehicle| PredictionSample {
                collected_at,
                line_id,
                vehicle_id: vehicle.prefix,
                stop_id: stop.stop_id,
                predicted_time: vehicle.predicted_time.clone(),
            })
        })
        .collect()
}

fn error_kind(e: &anyhow::Error) -> &'static str {
    if e.downcast_ref::<serde_json::Error>().is_some() {
        "parse_error"
    } else {
        "fetch_error"
    }
}

fn record_stats(stats_csv: Option<&PathBuf>, stats: &CollectionStats) {
    if stats.is_error() {
        error!(
            collector = ?stats.collector,
            error_type = stats.error_type.as_deref().unwrap_or_default(),
            error_message = stats.error_message.as_deref().unwrap_or_default(),
            "Collection cycle failed"
        );
    } else {
        info!(
            collector = ?stats.collector,
            lines = stats.lines_in_payload,
            vehicles = stats.vehicles_in_payload,
            selected = stats.records_selected,
            selected_pct = %format_args!("{:.1}", stats.selected_pct()),
            saved = stats.records_saved,
            "Collection cycle finished"
        );
    }

    if let Some(path) = stats_csv {
        if let Err(e) = append_record(path, stats) {
            error!(path = %path.display(), error = %e, "Failed to append collection stats");
        }
    }
}

/// Stops after `num_cycles` cycles; 0 runs forever.
fn finished(cycle: usize, num_cycles: usize) -> bool {
    num_cycles > 0 && cycle >= num_cycles
}

pub struct PositionCollector<C> {
    api: OlhoVivoClient<C>,
    pool: SqlitePool,
    token: String,
    targets: BTreeSet<String>,
    schedule: PositionsConfig,
    stats_csv: Option<PathBuf>,
}

impl<C: HttpClient> PositionCollector<C> {
    pub fn new(
        api: OlhoVivoClient<C>,
        pool: SqlitePool,
        token: String,
        targets: BTreeSet<String>,
        schedule: PositionsConfig,
        stats_csv: Option<PathBuf>,
    ) -> Self {
        Self {
            api,
            pool,
            token,
            targets,
            schedule,
            stats_csv,
        }
    }

    /// Window check, then authenticate, fetch, filter and write.
    ///
    /// Returns `None` when `now` is outside the collection window.
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle(&self, now: NaiveDateTime) -> Option<CollectionStats> {
        if !self.schedule.is_active(now.time()) {
            info!(
                from = %self.schedule.active_from,
                until = %self.schedule.active_until,
                "Outside collection window, skipping cycle"
            );
            return None;
        }

        match self.api.authenticate(&self.token).await {
            Ok(true) => {}
            Ok(false) => {
                return Some(CollectionStats::from_error(
                    Collector::Positions,
                    "auth_error",
                    "token rejected",
                ));
            }
            Err(e) => {
                return Some(CollectionStats::from_error(
                    Collector::Positions,
                    "auth_error",
                    &format!("{e:#}"),
                ));
            }
        }

        let payload = match self.api.positions().await {
            Ok(payload) => payload,
            Err(e) => {
                return Some(CollectionStats::from_error(
                    Collector::Positions,
                    error_kind(&e),
                    &format!("{e:#}"),
                ));
            }
        };

        let selection = select_target_positions(&payload, &self.targets, now);
        let mut stats = CollectionStats::new(Collector::Positions);
        stats.lines_in_payload = selection.lines_in_payload;
        stats.vehicles_in_payload = selection.vehicles_in_payload;
        stats.records_selected = selection.samples.len();

        if selection.samples.is_empty() {
            warn!(
                vehicles = selection.vehicles_in_payload,
                "No vehicles of the target lines in this snapshot"
            );
            return Some(stats);
        }

        match db::insert_positions(&self.pool, &selection.samples).await {
            Ok(saved) => stats.records_saved = saved,
            Err(e) => {
                return Some(CollectionStats::from_error(
                    Collector::Positions,
                    "store_error",
                    &format!("{e:#}"),
                ));
            }
        }

        Some(stats)
    }

    pub async fn run(&self, num_cycles: usize) {
        info!(
            interval_secs = self.schedule.interval_secs,
            targets = self.targets.len(),
            num_cycles,
            "Position collector started"
        );

        let mut cycle = 0;
        loop {
            cycle += 1;
            if let Some(stats) = self.run_cycle(Local::now().naive_local()).await {
                record_stats(self.stats_csv.as_ref(), &stats);
            }

            if finished(cycle, num_cycles) {
                break;
            }
            debug!(secs = self.schedule.interval_secs, "Waiting before next cycle");
            tokio::time::sleep(Duration::from_secs(self.schedule.interval_secs)).await;
        }

        info!(cycles = cycle, "Position collector stopped");
    }
}

pub struct PredictionCollector<C> {
    api: OlhoVivoClient<C>,
    pool: SqlitePool,
    token: String,
    line_ids: Vec<i64>,
    schedule: PredictionsConfig,
    stats_csv: Option<PathBuf>,
}

impl<C: HttpClient> PredictionCollector<C> {
    pub fn new(
        api: OlhoVivoClient<C>,
        pool: SqlitePool,
        token: String,
        line_ids: Vec<i64>,
        schedule: PredictionsConfig,
        stats_csv: Option<PathBuf>,
    ) -> Self {
        Self {
            api,
            pool,
            token,
            line_ids,
            schedule,
            stats_csv,
        }
    }

    /// Authenticates, fetches every target line and writes the rows in one batch.
    ///
    /// A line that fails is skipped; the cycle only fails when no line answered.
    /// `lines_in_payload` counts the lines that answered.
    #[tracing::instrument(skip(self), fields(lines = self.line_ids.len()))]
    pub async fn run_cycle(&self, now: NaiveDateTime) -> CollectionStats {
        match self.api.authenticate(&self.token).await {
            Ok(true) => {}
            Ok(false) => {
                return CollectionStats::from_error(
                    Collector::Predictions,
                    "auth_error",
                    "token rejected",
                );
            }
            Err(e) => {
                return CollectionStats::from_error(
                    Collector::Predictions,
                    "auth_error",
                    &format!("{e:#}"),
                );
            }
        }

        let mut stats = CollectionStats::new(Collector::Predictions);
        let mut samples = Vec::new();
        let mut last_error = None;

        for &line_id in &self.line_ids {
            match self.api.line_predictions(line_id).await {
                Ok(payload) => {
                    let rows = flatten_predictions(line_id, &payload, now);
                    debug!(line_id, stops = payload.stops.len(), rows = rows.len(), "Line collected");
                    if rows.is_empty() {
                        warn!(line_id, "No predictions for line");
                    }
                    stats.lines_in_payload += 1;
                    stats.vehicles_in_payload += rows.len();
                    samples.extend(rows);
                }
                Err(e) => {
                    warn!(line_id, error = %e, "Failed to collect line predictions");
                    last_error = Some(e);
                }
            }
        }

        if stats.lines_in_payload == 0 {
            if let Some(e) = last_error {
                return CollectionStats::from_error(
                    Collector::Predictions,
                    error_kind(&e),
                    &format!("{e:#}"),
                );
            }
        }

        stats.records_selected = samples.len();
        if samples.is_empty() {
            warn!("No prediction rows to save in this cycle");
            return stats;
        }

        match db::insert_predictions(&self.pool, &samples).await {
            Ok(saved) => stats.records_saved = saved,
            Err(e) => {
                return CollectionStats::from_error(
                    Collector::Predictions,
                    "store_error",
                    &format!("{e:#}"),
                );
            }
        }

        stats
    }

    /// After a failed login the next attempt comes after `auth_retry_secs`
    /// instead of the regular interval.
    pub async fn run(&self, num_cycles: usize) {
        info!(
            interval_secs = self.schedule.interval_secs,
            lines = ?self.line_ids,
            num_cycles,
            "Prediction collector started"
        );

        let mut cycle = 0;
        loop {
            cycle += 1;
            let stats = self.run_cycle(Local::now().naive_local()).await;
            record_stats(self.stats_csv.as_ref(), &stats);

            if finished(cycle, num_cycles) {
                break;
            }
            let wait = if stats.error_type.as_deref() == Some("auth_error") {
                self.schedule.auth_retry_secs
            } else {
                self.schedule.interval_secs
            };
            debug!(secs = wait, "Waiting before next cycle");
            tokio::time::sleep(Duration::from_secs(wait)).await;
        }

        info!(cycles = cycle, "Prediction collector stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use crate::parser::{parse_line_predictions, parse_positions};
    use chrono::{NaiveDate, NaiveTime};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const POSITIONS_JSON: &str = r#"{
        "hr": "10:00",
        "l": [
            {"c": "8000-10", "cl": 1273, "vs": [
                {"p": 11433, "a": true, "ta": "2025-08-01T12:58:00Z", "py": -23.55, "px": -46.63},
                {"p": 11434, "a": true, "ta": "garbage", "py": -23.56, "px": -46.64}
            ]},
            {"c": "917H-10", "cl": 2506, "vs": [
                {"p": 22001, "a": false, "ta": "2025-08-01T12:59:00Z", "py": -23.50, "px": -46.70}
            ]},
            {"c": "4313-10", "cl": 99, "vs": null}
        ]
    }"#;

    const PREDICTIONS_JSON: &str = r#"{
        "hr": "10:00",
        "ps": [
            {"cp": 700016623, "np": "ANA CINTRA", "vs": [
                {"p": "11433", "t": "10:07"},
                {"p": 11434, "t": "10:15"}
            ]},
            {"cp": 700016624, "np": "PARADA 2", "vs": []}
        ]
    }"#;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn targets(codes: &[&str]) -> BTreeSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::init(&pool).await.unwrap();
        pool
    }

    /// Answers each request with the body of the first route whose path
    /// prefix matches, or 404.
    async fn serve(routes: Vec<(&'static str, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(routes);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let mut read = 0;
                    while read < buf.len() {
                        let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        read += n;
                        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }

                    let request = String::from_utf8_lossy(&buf[..read]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("").to_string();
                    let response = match routes.iter().find(|(prefix, _)| path.starts_with(prefix)) {
                        Some((_, body)) => format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        ),
                        None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            .to_string(),
                    };
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{addr}/v2.1")
    }

    fn api(base_url: &str) -> OlhoVivoClient<BasicClient> {
        OlhoVivoClient::new(BasicClient::new(Duration::from_secs(5)).unwrap(), base_url)
    }

    /// A pool whose tables were never created.
    async fn schemaless_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    /// Client without timers, so a paused clock only moves for the collector's
    /// own sleeps.
    struct UntimedClient(reqwest::Client);

    #[async_trait::async_trait]
    impl HttpClient for UntimedClient {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.0.execute(req).await
        }
    }

    fn untimed_api(base_url: &str) -> OlhoVivoClient<UntimedClient> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .pool_max_idle_per_host(0)
            .build()
            .unwrap();
        OlhoVivoClient::new(UntimedClient(client), base_url)
    }

    fn always_active() -> PositionsConfig {
        PositionsConfig {
            interval_secs: 0,
            active_from: NaiveTime::MIN,
            active_until: NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_select_target_positions() {
        let payload = parse_positions(POSITIONS_JSON.as_bytes()).unwrap();
        let selection = select_target_positions(&payload, &targets(&["8000-10"]), at(10, 0));

        assert_eq!(selection.lines_in_payload, 3);
        assert_eq!(selection.vehicles_in_payload, 3);
        // the vehicle with an unparseable `ta` is dropped
        assert_eq!(selection.samples.len(), 1);
        let sample = &selection.samples[0];
        assert_eq!(sample.vehicle_id, 11433);
        assert_eq!(sample.line_code, "8000-10");
        assert_eq!(sample.observed_at, at(12, 58));
        assert_eq!(sample.collected_at, at(10, 0));
    }

    #[test]
    fn test_select_with_no_targets_keeps_nothing() {
        let payload = parse_positions(POSITIONS_JSON.as_bytes()).unwrap();
        let selection = select_target_positions(&payload, &BTreeSet::new(), at(10, 0));
        assert!(selection.samples.is_empty());
        assert_eq!(selection.vehicles_in_payload, 3);
    }

    #[test]
    fn test_flatten_predictions() {
        let payload = parse_line_predictions(PREDICTIONS_JSON.as_bytes()).unwrap();
        let rows = flatten_predictions(1273, &payload, at(10, 0));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].vehicle_id, 11433);
        assert_eq!(rows[0].stop_id, Some(700016623));
        assert_eq!(rows[0].predicted_time.as_deref(), Some("10:07"));
        assert!(rows.iter().all(|r| r.line_id == 1273 && r.collected_at == at(10, 0)));
    }

    #[tokio::test]
    async fn test_position_cycle_outside_window_is_skipped() {
        let pool = memory_pool().await;
        // nothing listens here
        let collector = PositionCollector::new(
            api("http://127.0.0.1:1"),
            pool.clone(),
            "token".to_string(),
            targets(&["8000-10"]),
            PositionsConfig::default(),
            None,
        );

        assert!(collector.run_cycle(at(3, 0)).await.is_none());
        assert!(db::fetch_positions(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_position_cycle_saves_target_vehicles() {
        let base_url = serve(vec![
            ("/v2.1/Login/Autenticar", "true".to_string()),
            ("/v2.1/Posicao", POSITIONS_JSON.to_string()),
        ])
        .await;
        let pool = memory_pool().await;
        let collector = PositionCollector::new(
            api(&base_url),
            pool.clone(),
            "token".to_string(),
            targets(&["8000-10", "917H-10"]),
            PositionsConfig::default(),
            None,
        );

        let stats = collector.run_cycle(at(10, 0)).await.unwrap();

        assert!(!stats.is_error(), "{:?}", stats.error_message);
        assert_eq!(stats.records_selected, 2);
        assert_eq!(stats.records_saved, 2);
        let stored = db::fetch_positions(&pool).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|s| s.collected_at == at(10, 0)));
    }

    #[tokio::test]
    async fn test_position_cycle_rejected_token() {
        let base_url = serve(vec![("/v2.1/Login/Autenticar", "false".to_string())]).await;
        let pool = memory_pool().await;
        let collector = PositionCollector::new(
            api(&base_url),
            pool.clone(),
            "bad".to_string(),
            targets(&["8000-10"]),
            PositionsConfig::default(),
            None,
        );

        let stats = collector.run_cycle(at(10, 0)).await.unwrap();
        assert_eq!(stats.error_type.as_deref(), Some("auth_error"));
        assert!(db::fetch_positions(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_position_cycle_malformed_payload_is_parse_error() {
        let base_url = serve(vec![
            ("/v2.1/Login/Autenticar", "true".to_string()),
            ("/v2.1/Posicao", "{\"l\": 42}".to_string()),
        ])
        .await;
        let collector = PositionCollector::new(
            api(&base_url),
            memory_pool().await,
            "token".to_string(),
            targets(&["8000-10"]),
            PositionsConfig::default(),
            None,
        );

        let stats = collector.run_cycle(at(10, 0)).await.unwrap();
        assert_eq!(stats.error_type.as_deref(), Some("parse_error"));
    }

    #[tokio::test]
    async fn test_prediction_cycle_skips_failing_lines() {
        let base_url = serve(vec![
            ("/v2.1/Login/Autenticar", "true".to_string()),
            ("/v2.1/Previsao/Linha?codigoLinha=1273", PREDICTIONS_JSON.to_string()),
        ])
        .await;
        let pool = memory_pool().await;
        let collector = PredictionCollector::new(
            api(&base_url),
            pool.clone(),
            "token".to_string(),
            vec![1273, 9999],
            PredictionsConfig::default(),
            None,
        );

        let stats = collector.run_cycle(at(10, 0)).await;

        assert!(!stats.is_error(), "{:?}", stats.error_message);
        assert_eq!(stats.lines_in_payload, 1);
        assert_eq!(stats.records_saved, 2);
        assert_eq!(db::fetch_predictions(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_prediction_cycle_fails_when_no_line_answers() {
        let base_url = serve(vec![("/v2.1/Login/Autenticar", "true".to_string())]).await;
        let collector = PredictionCollector::new(
            api(&base_url),
            memory_pool().await,
            "token".to_string(),
            vec![1273],
            PredictionsConfig::default(),
            None,
        );

        let stats = collector.run_cycle(at(10, 0)).await;
        assert_eq!(stats.error_type.as_deref(), Some("fetch_error"));
    }

    #[tokio::test]
    async fn test_run_appends_stats_rows() {
        let base_url = serve(vec![("/v2.1/Login/Autenticar", "false".to_string())]).await;
        let dir = std::env::temp_dir().join("olhovivo_monitor_test_collect_stats");
        let _ = std::fs::remove_dir_all(&dir);
        let stats_csv = dir.join("stats.csv");

        let collector = PredictionCollector::new(
            api(&base_url),
            memory_pool().await,
            "bad".to_string(),
            vec![1273],
            PredictionsConfig::default(),
            Some(stats_csv.clone()),
        );
        collector.run(1).await;

        let content = std::fs::read_to_string(&stats_csv).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("timestamp,collector,"));
        assert!(lines[1].contains("predictions"));
        assert!(lines[1].contains("auth_error"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_position_cycle_without_schema_is_store_error() {
        let base_url = serve(vec![
            ("/v2.1/Login/Autenticar", "true".to_string()),
            ("/v2.1/Posicao", POSITIONS_JSON.to_string()),
        ])
        .await;
        let collector = PositionCollector::new(
            api(&base_url),
            schemaless_pool().await,
            "token".to_string(),
            targets(&["8000-10"]),
            PositionsConfig::default(),
            None,
        );

        let stats = collector.run_cycle(at(10, 0)).await.unwrap();
        assert_eq!(stats.error_type.as_deref(), Some("store_error"));
    }

    #[tokio::test]
    async fn test_prediction_cycle_without_schema_is_store_error() {
        let base_url = serve(vec![
            ("/v2.1/Login/Autenticar", "true".to_string()),
            ("/v2.1/Previsao/Linha", PREDICTIONS_JSON.to_string()),
        ])
        .await;
        let collector = PredictionCollector::new(
            api(&base_url),
            schemaless_pool().await,
            "token".to_string(),
            vec![1273],
            PredictionsConfig::default(),
            None,
        );

        let stats = collector.run_cycle(at(10, 0)).await;
        assert_eq!(stats.error_type.as_deref(), Some("store_error"));
    }

    #[tokio::test]
    async fn test_run_keeps_going_after_store_errors() {
        let base_url = serve(vec![
            ("/v2.1/Login/Autenticar", "true".to_string()),
            ("/v2.1/Posicao", POSITIONS_JSON.to_string()),
        ])
        .await;
        let dir = std::env::temp_dir().join("olhovivo_monitor_test_collect_store_error");
        let _ = std::fs::remove_dir_all(&dir);
        let stats_csv = dir.join("stats.csv");

        let collector = PositionCollector::new(
            api(&base_url),
            schemaless_pool().await,
            "token".to_string(),
            targets(&["8000-10"]),
            always_active(),
            Some(stats_csv.clone()),
        );
        collector.run(2).await;

        let content = std::fs::read_to_string(&stats_csv).unwrap();
        let rows: Vec<&str> = content.lines().skip(1).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.contains("store_error")));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_login_waits_auth_retry() {
        let base_url = serve(vec![("/v2.1/Login/Autenticar", "false".to_string())]).await;
        // lazy and without maintenance tasks: no pool timers on the paused clock
        let pool = SqlitePoolOptions::new()
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy("sqlite::memory:")
            .unwrap();
        let schedule = PredictionsConfig {
            interval_secs: 3600,
            auth_retry_secs: 45,
            ..Default::default()
        };
        let collector = PredictionCollector::new(
            untimed_api(&base_url),
            pool,
            "bad".to_string(),
            vec![1273],
            schedule,
            None,
        );

        let started = tokio::time::Instant::now();
        collector.run(2).await;
        let waited = started.elapsed();

        assert!(waited >= Duration::from_secs(45), "{waited:?}");
        assert!(waited < Duration::from_secs(46), "{waited:?}");
    }
}
