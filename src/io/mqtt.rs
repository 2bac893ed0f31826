//! MQTT session for vehicle discovery
//!
//! Wraps the rumqttc client and event loop behind the four bus operations
//! the bridge needs: connect, subscribe, unsubscribe and retained publish. A
//! background pump task drives the event loop and reports protocol
//! acknowledgements over a notice channel, so each operation can wait for
//! its own completion while racing the shutdown signal.

use crate::domain::entity::Entity;
use crate::infra::config::Config;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rumqttc::{
    AsyncClient, ClientError, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet,
    Publish, QoS, SubscribeReasonCode, TlsConfiguration, Transport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

/// How a bus operation ended when it didn't fail: it either ran to
/// completion or stopped early because shutdown was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }
}

/// Errors establishing the broker session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("failed to load system trust roots: {0}")]
    TrustRoots(#[from] std::io::Error),
    #[error("broker connection failed: {0}")]
    Connection(ConnectionError),
    #[error("connection closed before the broker acknowledged the session")]
    ConnectionClosed,
}

/// Errors establishing a subscription.
#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("subscribe request failed: {0}")]
    Request(#[from] ClientError),
    #[error("broker rejected the subscription")]
    Rejected,
    #[error("broker connection failed: {0}")]
    Connection(ConnectionError),
    #[error("connection closed while waiting for the subscribe ack")]
    ConnectionClosed,
}

/// Errors tearing down a subscription.
#[derive(Debug, thiserror::Error)]
pub enum UnsubscribeError {
    #[error("unsubscribe request failed: {0}")]
    Request(#[from] ClientError),
    #[error("broker connection failed: {0}")]
    Connection(ConnectionError),
    #[error("connection closed while waiting for the unsubscribe ack")]
    ConnectionClosed,
}

/// Errors publishing a discovery batch.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to serialize discovery payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("publish request failed: {0}")]
    Request(#[from] ClientError),
    #[error("broker connection failed: {0}")]
    Connection(ConnectionError),
    #[error("connection closed while flushing a publish")]
    ConnectionClosed,
}

/// Failure modes shared by every acknowledgement wait.
#[derive(Debug)]
enum AckError {
    Connection(ConnectionError),
    Closed,
}

impl From<AckError> for ConnectError {
    fn from(e: AckError) -> Self {
        match e {
            AckError::Connection(e) => ConnectError::Connection(e),
            AckError::Closed => ConnectError::ConnectionClosed,
        }
    }
}

impl From<AckError> for SubscribeError {
    fn from(e: AckError) -> Self {
        match e {
            AckError::Connection(e) => SubscribeError::Connection(e),
            AckError::Closed => SubscribeError::ConnectionClosed,
        }
    }
}

impl From<AckError> for UnsubscribeError {
    fn from(e: AckError) -> Self {
        match e {
            AckError::Connection(e) => UnsubscribeError::Connection(e),
            AckError::Closed => UnsubscribeError::ConnectionClosed,
        }
    }
}

impl From<AckError> for PublishError {
    fn from(e: AckError) -> Self {
        match e {
            AckError::Connection(e) => PublishError::Connection(e),
            AckError::Closed => PublishError::ConnectionClosed,
        }
    }
}

/// Protocol acknowledgements surfaced by the pump task.
#[derive(Debug)]
enum Notice {
    Connected,
    SubAck { ok: bool },
    UnsubAck,
    Flushed,
    Error(ConnectionError),
}

/// Control messages from the session to the pump task.
enum PumpCtrl {
    Attach(mpsc::UnboundedSender<Publish>),
    Detach,
}

/// Live subscription handed out by `Session::subscribe`.
///
/// Messages arrive in broker order. Dropping the subscription detaches its
/// sink, so later traffic on the filter is discarded by the pump.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Publish>,
    ctrl: mpsc::UnboundedSender<PumpCtrl>,
}

impl Subscription {
    /// Next inbound message, or `None` once the pump has gone away.
    pub async fn recv(&mut self) -> Option<Publish> {
        self.rx.recv().await
    }

    /// A subscription fed directly by tests, bypassing the broker.
    #[cfg(test)]
    pub(crate) fn direct() -> (mpsc::UnboundedSender<Publish>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ctrl, _) = mpsc::unbounded_channel();
        (tx, Self { rx, ctrl })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.ctrl.send(PumpCtrl::Detach);
    }
}

/// Established broker session.
///
/// Operations are strictly sequential per session; each waits for its own
/// acknowledgement before returning, racing the shutdown signal.
pub struct Session {
    client: AsyncClient,
    ctrl_tx: mpsc::UnboundedSender<PumpCtrl>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

impl Session {
    /// Connect to the broker and wait for its CONNACK.
    ///
    /// `Ok(None)` means shutdown was requested before the broker accepted
    /// the session.
    pub async fn connect(
        config: &Config,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Option<Session>, ConnectError> {
        let client_id = format!("teslamate-discovery-{}", random_suffix(12));
        info!(broker = %config.broker_uri(), client_id = %client_id, "mqtt_connecting");

        let mut options = MqttOptions::new(client_id, config.mqtt_host(), config.mqtt_port());
        options.set_keep_alive(Duration::from_secs(30));
        options.set_credentials(config.mqtt_username(), config.mqtt_password());
        if wants_tls(config.mqtt_scheme()) {
            options.set_transport(Transport::tls_with_config(tls_configuration()?));
        }

        let (client, eventloop) = AsyncClient::new(options, 100);
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        let (notice_tx, notices) = mpsc::unbounded_channel();
        tokio::spawn(pump(eventloop, ctrl_rx, notice_tx, cancel.clone()));

        // Send a DISCONNECT once shutdown fires. Best effort: process exit
        // closes the socket regardless.
        let disconnect_client = client.clone();
        let mut disconnect_cancel = cancel.clone();
        tokio::spawn(async move {
            cancelled(&mut disconnect_cancel).await;
            let _ = disconnect_client.disconnect().await;
        });

        let mut session = Session { client, ctrl_tx, notices };
        match session.wait(cancel, |notice| matches!(notice, Notice::Connected)).await {
            Ok(Outcome::Completed(_)) => {
                info!("mqtt_connected");
                Ok(Some(session))
            }
            Ok(Outcome::Cancelled) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Subscribe to `filter` and wait for the broker's SUBACK.
    ///
    /// The sink is attached to the pump before the subscribe request goes
    /// out, so a retained burst replayed right after the SUBACK is never
    /// dropped.
    pub async fn subscribe(
        &mut self,
        filter: &str,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Outcome<Subscription>, SubscribeError> {
        self.drain_stale()?;
        let (sink_tx, sink_rx) = mpsc::unbounded_channel();
        let subscription = Subscription { rx: sink_rx, ctrl: self.ctrl_tx.clone() };
        if self.ctrl_tx.send(PumpCtrl::Attach(sink_tx)).is_err() {
            return Err(SubscribeError::ConnectionClosed);
        }

        self.client.subscribe(filter, QoS::AtMostOnce).await?;
        debug!(filter = %filter, "mqtt_subscribe_sent");

        match self.wait(cancel, |notice| matches!(notice, Notice::SubAck { .. })).await {
            Ok(Outcome::Completed(Notice::SubAck { ok: true })) => {
                Ok(Outcome::Completed(subscription))
            }
            Ok(Outcome::Completed(_)) => Err(SubscribeError::Rejected),
            Ok(Outcome::Cancelled) => Ok(Outcome::Cancelled),
            Err(e) => Err(e.into()),
        }
    }

    /// Unsubscribe from `filter` and wait for the broker's UNSUBACK.
    pub async fn unsubscribe(
        &mut self,
        filter: &str,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Outcome<()>, UnsubscribeError> {
        self.drain_stale()?;
        self.client.unsubscribe(filter).await?;

        match self.wait(cancel, |notice| matches!(notice, Notice::UnsubAck)).await {
            Ok(Outcome::Completed(_)) => Ok(Outcome::Completed(())),
            Ok(Outcome::Cancelled) => Ok(Outcome::Cancelled),
            Err(e) => Err(e.into()),
        }
    }

    /// Publish one vehicle's discovery batch, retained at QoS 0.
    ///
    /// QoS 0 has no broker acknowledgement, so each message is only waited
    /// on until the client has written it to the wire. The first error
    /// aborts the rest of the batch; cancellation stops it quietly.
    pub async fn publish(
        &mut self,
        discovery_prefix: &str,
        entities: &[Entity<'_>],
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Outcome<()>, PublishError> {
        self.drain_stale()?;
        for entity in entities {
            let topic = entity.config_topic(discovery_prefix);
            let payload = serde_json::to_vec(entity)?;
            debug!(topic = %topic, "publishing_discovery_config");
            self.client.publish(topic, QoS::AtMostOnce, true, payload).await?;

            match self.wait(cancel, |notice| matches!(notice, Notice::Flushed)).await {
                Ok(Outcome::Completed(_)) => {}
                Ok(Outcome::Cancelled) => return Ok(Outcome::Cancelled),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Outcome::Completed(()))
    }

    /// Discard acknowledgements left over from an operation that gave up
    /// early, so they cannot satisfy the next wait. An error notice is not
    /// stale; it fails the operation that finds it.
    fn drain_stale(&mut self) -> Result<(), AckError> {
        loop {
            match self.notices.try_recv() {
                Ok(Notice::Error(e)) => return Err(AckError::Connection(e)),
                Ok(_) => {}
                Err(mpsc::error::TryRecvError::Empty) => return Ok(()),
                Err(mpsc::error::TryRecvError::Disconnected) => return Err(AckError::Closed),
            }
        }
    }

    /// Wait for the next notice matching `want`, racing shutdown. Unrelated
    /// notices are discarded; operations run one at a time, so a discarded
    /// notice can only belong to an operation that already gave up.
    async fn wait(
        &mut self,
        cancel: &mut watch::Receiver<bool>,
        want: fn(&Notice) -> bool,
    ) -> Result<Outcome<Notice>, AckError> {
        loop {
            tokio::select! {
                biased;
                _ = cancelled(cancel) => return Ok(Outcome::Cancelled),
                notice = self.notices.recv() => match notice {
                    Some(Notice::Error(e)) => return Err(AckError::Connection(e)),
                    Some(notice) if want(&notice) => return Ok(Outcome::Completed(notice)),
                    Some(_) => {}
                    None => return Err(AckError::Closed),
                },
            }
        }
    }
}

/// Drives the rumqttc event loop until shutdown.
///
/// Inbound publishes flow to the attached sink, acknowledgements and errors
/// flow to the notice channel. Control messages are honored before the next
/// poll, so a sink attached ahead of a subscribe request is in place before
/// the broker can replay retained messages.
async fn pump(
    mut eventloop: EventLoop,
    mut ctrl_rx: mpsc::UnboundedReceiver<PumpCtrl>,
    notice_tx: mpsc::UnboundedSender<Notice>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut sink: Option<mpsc::UnboundedSender<Publish>> = None;

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("mqtt_pump_shutdown");
                    return;
                }
            }
            ctrl = ctrl_rx.recv() => match ctrl {
                Some(PumpCtrl::Attach(tx)) => sink = Some(tx),
                Some(PumpCtrl::Detach) => sink = None,
                None => return,
            },
            result = eventloop.poll() => match result {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Some(ref tx) = sink {
                        if tx.send(publish).is_err() {
                            sink = None;
                        }
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    let _ = notice_tx.send(Notice::Connected);
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let ok = ack
                        .return_codes
                        .iter()
                        .all(|code| !matches!(code, SubscribeReasonCode::Failure));
                    let _ = notice_tx.send(Notice::SubAck { ok });
                }
                Ok(Event::Incoming(Packet::UnsubAck(_))) => {
                    let _ = notice_tx.send(Notice::UnsubAck);
                }
                Ok(Event::Outgoing(Outgoing::Publish(_))) => {
                    let _ = notice_tx.send(Notice::Flushed);
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "MQTT error");
                    let _ = notice_tx.send(Notice::Error(e));
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

/// Resolves once the shutdown signal is raised. A dropped sender counts as
/// shutdown, so waiters never hang on a dead channel.
pub async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}

fn wants_tls(scheme: &str) -> bool {
    matches!(scheme, "ssl" | "tls" | "mqtts" | "tcps")
}

/// Client TLS configuration backed by the system trust store.
fn tls_configuration() -> Result<TlsConfiguration, ConnectError> {
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs()? {
        // Unusable certificates in the system store are skipped, not fatal.
        let _ = roots.add(cert);
    }

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConfiguration::Rustls(Arc::new(config)))
}

/// Random alphanumeric client id suffix so parallel runs never collide.
fn random_suffix(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}
