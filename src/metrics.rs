//! Prometheus-compatible metrics endpoint
//!
//! Exposes population engine metrics in Prometheus format.
//! Default endpoint: http://localhost:9090/metrics

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::game::systems::food::SpawnReport;
use crate::game::tables::Tables;

/// Rolling window size for spawn tick percentiles
const TICK_HISTORY_LEN: usize = 1000;

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Metrics registry for the population engine
#[derive(Debug)]
pub struct Metrics {
    // World gauges
    pub player_count: AtomicU64,
    pub entity_count: AtomicU64,
    pub food_count: AtomicU64,
    pub circle_count: AtomicU64,

    // Spawner counters
    pub spawn_ticks: AtomicU64,
    pub spawn_ticks_idle: AtomicU64,
    pub spawn_failures: AtomicU64,
    pub food_spawned_total: AtomicU64,

    // Spawn tick timing (microseconds)
    pub spawn_time_us: AtomicU64,
    pub spawn_time_p95_us: AtomicU64,
    pub spawn_time_max_us: AtomicU64,

    // Connections
    pub connections_total: AtomicU64,

    start_time: Instant,

    tick_history: RwLock<VecDeque<u64>>,
}

/// Point-in-time copy of every metric, for the JSON endpoint
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub players: u64,
    pub entities: u64,
    pub food: u64,
    pub circles: u64,
    pub spawn_ticks: u64,
    pub spawn_ticks_idle: u64,
    pub spawn_failures: u64,
    pub food_spawned_total: u64,
    pub spawn_time_us: u64,
    pub spawn_time_p95_us: u64,
    pub spawn_time_max_us: u64,
    pub connections_total: u64,
    pub uptime_seconds: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            player_count: AtomicU64::new(0),
            entity_count: AtomicU64::new(0),
            food_count: AtomicU64::new(0),
            circle_count: AtomicU64::new(0),
            spawn_ticks: AtomicU64::new(0),
            spawn_ticks_idle: AtomicU64::new(0),
            spawn_failures: AtomicU64::new(0),
            food_spawned_total: AtomicU64::new(0),
            spawn_time_us: AtomicU64::new(0),
            spawn_time_p95_us: AtomicU64::new(0),
            spawn_time_max_us: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY_LEN)),
        }
    }

    /// Record a committed spawn tick
    pub fn record_spawn_tick(&self, report: &SpawnReport, duration: Duration) {
        self.spawn_ticks.fetch_add(1, Ordering::Relaxed);
        if report.players == 0 {
            self.spawn_ticks_idle.fetch_add(1, Ordering::Relaxed);
        }
        self.food_spawned_total
            .fetch_add(report.spawned, Ordering::Relaxed);

        let us = duration.as_micros() as u64;
        self.spawn_time_us.store(us, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY_LEN {
            history.pop_front();
        }

        let mut sorted: Vec<u64> = history.iter().copied().collect();
        sorted.sort_unstable();
        let p95_idx = (sorted.len() as f32 * 0.95) as usize;
        self.spawn_time_p95_us
            .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
        self.spawn_time_max_us
            .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
    }

    pub fn record_spawn_failure(&self) {
        self.spawn_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Refresh world gauges from committed tables
    pub fn observe_world(&self, tables: &Tables) {
        self.player_count.store(tables.player.count(), Ordering::Relaxed);
        self.entity_count.store(tables.entity.count(), Ordering::Relaxed);
        self.food_count.store(tables.food.count(), Ordering::Relaxed);
        self.circle_count.store(tables.circle.count(), Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            players: self.player_count.load(Ordering::Relaxed),
            entities: self.entity_count.load(Ordering::Relaxed),
            food: self.food_count.load(Ordering::Relaxed),
            circles: self.circle_count.load(Ordering::Relaxed),
            spawn_ticks: self.spawn_ticks.load(Ordering::Relaxed),
            spawn_ticks_idle: self.spawn_ticks_idle.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
            food_spawned_total: self.food_spawned_total.load(Ordering::Relaxed),
            spawn_time_us: self.spawn_time_us.load(Ordering::Relaxed),
            spawn_time_p95_us: self.spawn_time_p95_us.load(Ordering::Relaxed),
            spawn_time_max_us: self.spawn_time_max_us.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("arena_players", "Number of player rows", "gauge", s.players);
        metric!("arena_entities", "Number of entity rows", "gauge", s.entities);
        metric!("arena_food", "Number of food rows", "gauge", s.food);
        metric!("arena_circles", "Number of circle rows", "gauge", s.circles);

        metric!("arena_spawn_ticks_total", "Committed spawn ticks", "counter", s.spawn_ticks);
        metric!("arena_spawn_ticks_idle_total", "Spawn ticks skipped for lack of players", "counter",
            s.spawn_ticks_idle);
        metric!("arena_spawn_failures_total", "Spawn ticks rolled back", "counter", s.spawn_failures);
        metric!("arena_food_spawned_total", "Food rows created by the spawner", "counter",
            s.food_spawned_total);

        metric!("arena_spawn_time_microseconds", "Last spawn tick duration", "gauge", s.spawn_time_us);
        metric!("arena_spawn_time_p95_microseconds", "95th percentile spawn tick duration", "gauge",
            s.spawn_time_p95_us);
        metric!("arena_spawn_time_max_microseconds", "Maximum spawn tick duration", "gauge",
            s.spawn_time_max_us);

        metric!("arena_connections_total", "Client connect events", "counter", s.connections_total);
        metric!("arena_uptime_seconds", "Server uptime in seconds", "counter", s.uptime_seconds);

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    serve_metrics(listener, metrics).await;
    Ok(())
}

/// Accept loop for the metrics endpoint. Accept errors are logged and the loop continues.
pub async fn serve_metrics(listener: TcpListener, metrics: Arc<Metrics>) {
    loop {
        let (mut socket, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Metrics server failed to accept connection: {}", e);
                // Back off so a persistent error (e.g. EMFILE) does not spin
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = route(&metrics, &request);

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

/// Build the HTTP response for a raw request
fn route(metrics: &Metrics, request: &str) -> String {
    // JSON first: "/metrics/json" also starts with "/metrics"
    let (content_type, body) = if request.starts_with("GET /metrics/json") || request.starts_with("GET /json") {
        ("application/json", metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        ("text/plain; version=0.0.4", metrics.to_prometheus())
    } else if request.starts_with("GET /health") || request.starts_with("GET / ") {
        ("text/plain", "OK".to_string())
    } else {
        return "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string();
    };

    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(players: u64, spawned: u64) -> SpawnReport {
        SpawnReport {
            players,
            food_before: 0,
            spawned,
        }
    }

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.spawn_ticks.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.food_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_spawn_tick() {
        let metrics = Metrics::new();
        metrics.record_spawn_tick(&report(1, 600), Duration::from_micros(900));
        metrics.record_spawn_tick(&report(0, 0), Duration::from_micros(5));

        assert_eq!(metrics.spawn_ticks.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.spawn_ticks_idle.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.food_spawned_total.load(Ordering::Relaxed), 600);
        assert_eq!(metrics.spawn_time_us.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.spawn_time_max_us.load(Ordering::Relaxed), 900);
    }

    #[test]
    fn test_percentiles() {
        let metrics = Metrics::new();
        for i in 0..100 {
            metrics.record_spawn_tick(&report(1, 0), Duration::from_micros(100 + i * 10));
        }
        let p95 = metrics.spawn_time_p95_us.load(Ordering::Relaxed);
        assert!(p95 >= 1000 && p95 <= 1090);
    }

    #[test]
    fn test_observe_world() {
        use crate::db::identity::Identity;
        use crate::game::tables::Player;

        let mut tables = Tables::new();
        tables.player.insert(Player::new(Identity::generate(), "a")).unwrap();
        let metrics = Metrics::new();
        metrics.observe_world(&tables);

        assert_eq!(metrics.player_count.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.food_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.food_count.store(600, Ordering::Relaxed);
        metrics.record_connect();

        let output = metrics.to_prometheus();
        assert!(output.contains("arena_food 600"));
        assert!(output.contains("arena_connections_total 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE arena_spawn_ticks_total counter"));
    }

    #[test]
    fn test_json_format() {
        let metrics = Metrics::new();
        metrics.player_count.store(3, Ordering::Relaxed);

        let value: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(value["players"], 3);
        assert_eq!(value["food_spawned_total"], 0);
    }

    #[test]
    fn test_route() {
        let metrics = Metrics::new();
        assert!(route(&metrics, "GET /metrics HTTP/1.1\r\n").contains("arena_food"));
        assert!(route(&metrics, "GET /metrics/json HTTP/1.1\r\n").contains("application/json"));
        assert!(route(&metrics, "GET /health HTTP/1.1\r\n").ends_with("OK"));
        assert!(route(&metrics, "GET /nope HTTP/1.1\r\n").starts_with("HTTP/1.1 404"));
    }

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {} HTTP/1.1\r\n\r\n", path).as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serve_metrics_keeps_accepting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let metrics = Arc::new(Metrics::new());
        metrics.food_count.store(42, Ordering::Relaxed);
        let server = tokio::spawn(serve_metrics(listener, metrics));

        // A client that hangs up without sending anything must not stop the server
        drop(tokio::net::TcpStream::connect(addr).await.unwrap());

        for _ in 0..3 {
            assert!(get(addr, "/health").await.ends_with("OK"));
        }
        assert!(get(addr, "/metrics").await.contains("arena_food 42"));

        server.abort();
    }
}
