//! Mint Trigger
//!
//! Notifies the downstream anchoring service that a persisted attestation
//! can be minted. Delivery is best effort; failures never block the window.

use crate::MintError;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use token_registry::TokenId;
use tracing::{debug, error, info};
use uuid::Uuid;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Upper bound on queueing a request while the broker is unreachable
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Trigger for downstream minting
#[async_trait]
pub trait MintTrigger: Send + Sync {
    /// Request a mint for `token_id`, returning a delivery receipt
    async fn mint(&self, token_id: TokenId, reference: &str) -> Result<String, MintError>;
}

/// MQTT mint trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MintConfig {
    /// Broker host; minting disabled when unset
    pub broker_host: Option<String>,
    /// Broker port
    pub broker_port: u16,
    /// Topic mint requests are published to
    pub topic: String,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            broker_host: None,
            broker_port: 1883,
            topic: "driveledger/mint".to_string(),
        }
    }
}

/// Mint request message
#[derive(Debug, Serialize)]
struct MintRequest<'a> {
    token_id: TokenId,
    reference: &'a str,
}

/// Publishes mint requests over MQTT
pub struct MqttMintTrigger {
    client: AsyncClient,
    topic: String,
}

impl MqttMintTrigger {
    /// Connect to the broker and start the event loop
    pub fn connect(host: &str, config: &MintConfig) -> Result<Self, MintError> {
        if host.is_empty() {
            return Err(MintError::Connection("empty broker host".to_string()));
        }

        let client_id = format!("driveledger-{}", Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        let broker = format!("{}:{}", host, config.broker_port);
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        info!("Mint broker {} connected: {:?}", broker, ack.code);
                    }
                    Ok(event) => debug!("Mint MQTT event: {:?}", event),
                    Err(e) => {
                        // rumqttc reconnects on the next poll
                        error!("Mint broker {} unavailable: {}", broker, e);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        info!("Mint trigger publishing to {}:{} on {}", host, config.broker_port, config.topic);
        Ok(Self {
            client,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl MintTrigger for MqttMintTrigger {
    async fn mint(&self, token_id: TokenId, reference: &str) -> Result<String, MintError> {
        let payload = serde_json::to_vec(&MintRequest { token_id, reference })
            .map_err(|e| MintError::Serialization(e.to_string()))?;

        tokio::time::timeout(
            PUBLISH_TIMEOUT,
            self.client.publish(&self.topic, QoS::AtLeastOnce, false, payload),
        )
        .await
        .map_err(|_| {
            MintError::Publish(format!("request queue full after {:?}", PUBLISH_TIMEOUT))
        })?
        .map_err(|e| MintError::Publish(e.to_string()))?;

        Ok(format!("{}#{}", self.topic, token_id))
    }
}
