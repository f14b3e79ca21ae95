//! Main SimGateway implementation

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::websocket_handler::WebSocketHandler;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use sync_coordinator::SyncCoordinator;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Accepts viewer connections and hands each one to a [`WebSocketHandler`]
pub struct SimGateway {
    config: GatewayConfig,
    coordinator: Arc<SyncCoordinator>,
    connection_count: Arc<AtomicUsize>,
    is_running: AtomicBool,
    shutdown: Notify,
}

impl SimGateway {
    pub fn new(config: GatewayConfig, coordinator: Arc<SyncCoordinator>) -> Self {
        Self {
            config,
            coordinator,
            connection_count: Arc::new(AtomicUsize::new(0)),
            is_running: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    /// Bind the configured address and accept connections until stopped
    pub async fn start(&self) -> GatewayResult<()> {
        let addr = self
            .config
            .server_addr()
            .map_err(|e| GatewayError::Config(format!("Invalid server address: {e}")))?;

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until stopped
    pub async fn serve(&self, listener: TcpListener) -> GatewayResult<()> {
        self.is_running.store(true, Ordering::SeqCst);
        info!(addr = %listener.local_addr()?, "SimGateway listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        if let Err(e) = self.handle_connection(stream, peer_addr) {
                            warn!(peer = %peer_addr, error = %e, "Refused connection");
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
                _ = self.shutdown.notified() => break,
            }
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("SimGateway stopped");
        Ok(())
    }

    /// Spawn a handler for a new connection, enforcing the connection limit
    fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) -> GatewayResult<()> {
        let active = self.connection_count.fetch_add(1, Ordering::SeqCst);
        if active >= self.config.max_connections {
            self.connection_count.fetch_sub(1, Ordering::SeqCst);
            metrics::counter!("orrery_gateway_connections_refused_total", 1);
            return Err(GatewayError::Connection("Connection limit exceeded".to_string()));
        }

        let handler = WebSocketHandler::new(
            peer_addr,
            Arc::clone(&self.coordinator),
            self.config.reply_queue_capacity,
        );
        let connection_count = Arc::clone(&self.connection_count);

        tokio::spawn(async move {
            if let Err(e) = handler.handle(stream).await {
                warn!(peer = %peer_addr, error = %e, "WebSocket handler error");
            }
            connection_count.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(())
    }

    /// Stop accepting connections. Open sessions end when the coordinator closes them.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Get the number of active connections
    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use futures_util::{SinkExt, StreamExt};
    use orbital_mechanics::catalog::j2000_epoch;
    use orbital_mechanics::{BodyCatalog, BodyRecord, OrbitalElements};
    use serde_json::{json, Value};
    use simulation_clock::{ClockConfig, SimulationClock};
    use std::time::Duration;
    use sync_coordinator::CoordinatorConfig;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn coordinator() -> Arc<SyncCoordinator> {
        let earth = OrbitalElements {
            semi_major_axis_km: 149_598_023.0,
            eccentricity: 0.0167,
            inclination_deg: 0.0,
            long_asc_node_deg: 0.0,
            arg_of_periapsis_deg: 102.9,
            mean_anomaly_deg: 358.6,
            period_days: 365.256,
        };
        let catalog = BodyCatalog::from_records(
            j2000_epoch(),
            vec![
                BodyRecord { id: 10, name: Some("Sun".into()), ..Default::default() },
                BodyRecord::orbiting(399, earth).with_name("Earth").with_parent(10),
            ],
        );
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = SimulationClock::with_start_time(ClockConfig::default(), start).unwrap();
        Arc::new(
            SyncCoordinator::new(Arc::new(clock), catalog, CoordinatorConfig::default()).unwrap(),
        )
    }

    async fn spawn_gateway(config: GatewayConfig) -> (Arc<SimGateway>, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let gateway = Arc::new(SimGateway::new(config, coordinator()));
        let serving = Arc::clone(&gateway);
        tokio::spawn(async move { serving.serve(listener).await });
        (gateway, addr)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (client, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        client
    }

    /// Next JSON text frame, skipping control frames
    async fn next_json(client: &mut Client) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let WsMessage::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    /// Next frame that answers request `id`
    async fn response_to(client: &mut Client, id: &str) -> Value {
        loop {
            let value = next_json(client).await;
            if value["id"] == id {
                return value;
            }
        }
    }

    async fn send(client: &mut Client, request: Value) {
        client.send(WsMessage::Text(request.to_string())).await.unwrap();
    }

    #[tokio::test]
    async fn test_session_receives_state_then_commands_apply_on_tick() {
        let (gateway, addr) = spawn_gateway(GatewayConfig::default()).await;
        let mut client = connect(addr).await;

        let first = next_json(&mut client).await;
        assert_eq!(first["stream"], "stateSync");
        assert_eq!(first["data"]["paused"], true);
        assert!(first["data"]["positions"]["399"]["x"].is_number());

        send(
            &mut client,
            json!({"id": "1", "method": "simulation.set_multiplier", "params": {"value": 50}}),
        )
        .await;
        let response = response_to(&mut client, "1").await;
        assert_eq!(response["result"]["accepted"], true);

        gateway.coordinator.tick();
        let changed = next_json(&mut client).await;
        assert_eq!(changed, json!({"stream": "multiplierChanged", "data": {"value": 50.0}}));
        let positions = next_json(&mut client).await;
        assert_eq!(positions["stream"], "positionsUpdated");
        assert_eq!(positions["data"]["tick"], 1);

        assert_eq!(gateway.connection_count(), 1);
        gateway.stop();
    }

    #[tokio::test]
    async fn test_invalid_requests_get_error_responses() {
        let (gateway, addr) = spawn_gateway(GatewayConfig::default()).await;
        let mut client = connect(addr).await;
        next_json(&mut client).await;

        send(
            &mut client,
            json!({"id": "t", "method": "simulation.set_time", "params": {"time": "yesterday"}}),
        )
        .await;
        assert_eq!(response_to(&mut client, "t").await["error"]["code"], 40001);

        send(
            &mut client,
            json!({"id": "m", "method": "simulation.set_multiplier", "params": {"value": -5}}),
        )
        .await;
        // The push and the response travel on separate queues
        let (mut rejected, mut response) = (None, None);
        while rejected.is_none() || response.is_none() {
            let value = next_json(&mut client).await;
            if value["stream"] == "commandRejected" {
                rejected = Some(value);
            } else if value["id"] == "m" {
                response = Some(value);
            }
        }
        assert_eq!(response.unwrap()["error"]["code"], 42200);

        send(&mut client, json!({"id": "u", "method": "simulation.warp"})).await;
        assert_eq!(response_to(&mut client, "u").await["error"]["code"], 40400);

        client.send(WsMessage::Text("{not json".into())).await.unwrap();
        assert_eq!(next_json(&mut client).await["error"]["code"], 40000);

        let clock = gateway.coordinator.clock().snapshot();
        assert!(clock.paused);
        assert_eq!(clock.multiplier, 1.0);
        gateway.stop();
    }

    #[tokio::test]
    async fn test_focus_reaches_every_viewer() {
        let (gateway, addr) = spawn_gateway(GatewayConfig::default()).await;
        let mut a = connect(addr).await;
        let mut b = connect(addr).await;
        next_json(&mut a).await;
        next_json(&mut b).await;

        send(&mut a, json!({"id": "f", "method": "simulation.focus", "params": {"bodyId": 399}})).await;

        let expected = json!({"stream": "focused", "data": {"bodyId": 399, "bodyName": "Earth"}});
        assert_eq!(next_json(&mut b).await, expected);
        loop {
            let value = next_json(&mut a).await;
            if value.get("stream").is_some() {
                assert_eq!(value, expected);
                break;
            }
        }
        gateway.stop();
    }

    #[tokio::test]
    async fn test_ping_answered() {
        let (gateway, addr) = spawn_gateway(GatewayConfig::default()).await;
        let mut client = connect(addr).await;
        client.send(WsMessage::Ping(vec![1, 2, 3])).await.unwrap();

        loop {
            let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let WsMessage::Pong(data) = frame {
                assert_eq!(data, vec![1, 2, 3]);
                break;
            }
        }
        gateway.stop();
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let config = GatewayConfig { max_connections: 1, ..Default::default() };
        let (gateway, addr) = spawn_gateway(config).await;
        let mut first = connect(addr).await;
        next_json(&mut first).await;

        tokio_test::assert_err!(connect_async(format!("ws://{addr}")).await);
        assert_eq!(gateway.connection_count(), 1);
        gateway.stop();
    }

    #[tokio::test]
    async fn test_disconnect_unregisters_session() {
        let (gateway, addr) = spawn_gateway(GatewayConfig::default()).await;
        let mut client = connect(addr).await;
        next_json(&mut client).await;
        assert_eq!(gateway.coordinator.registry().len(), 1);

        client.close(None).await.unwrap();
        for _ in 0..100 {
            if gateway.coordinator.registry().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(gateway.coordinator.registry().is_empty());
        gateway.stop();
    }

    #[tokio::test]
    async fn test_peer_that_stops_reading_is_closed() {
        let config = GatewayConfig { reply_queue_capacity: 4, ..Default::default() };
        let (gateway, addr) = spawn_gateway(config).await;
        let mut client = connect(addr).await;

        // Every error response echoes the large id and the client never reads them
        let id = "x".repeat(64 * 1024);
        let request = json!({"id": id, "method": "simulation.warp"}).to_string();
        for _ in 0..4000 {
            let sent = tokio::time::timeout(
                Duration::from_secs(1),
                client.send(WsMessage::Text(request.clone())),
            )
            .await;
            if !matches!(sent, Ok(Ok(()))) || gateway.connection_count() == 0 {
                break;
            }
        }

        for _ in 0..500 {
            if gateway.connection_count() == 0 && gateway.coordinator.registry().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(gateway.connection_count(), 0);
        assert!(gateway.coordinator.registry().is_empty());
        gateway.stop();
    }
}
