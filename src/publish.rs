//! Outbound signal delivery

use async_trait::async_trait;
use tracing::info;

use crate::types::Signal;

/// Sink for formatted signal messages. Failures are reported to the caller,
/// which logs them and keeps going.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, messages: &[String]) -> anyhow::Result<()>;
}

/// Writes every message to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, messages: &[String]) -> anyhow::Result<()> {
        for message in messages {
            info!("\n{}", message);
        }
        Ok(())
    }
}

/// Render signals as chat-style alert messages, one per signal
pub fn format_signals(signals: &[Signal]) -> Vec<String> {
    signals
        .iter()
        .map(|signal| {
            format!(
                "⚡ Signal: {}\n📈 Direction: {}\n🎯 Confidence: {}%\n⏱️ Expires in: {}m",
                signal.symbol.to_uppercase(),
                signal.direction,
                confidence_pct(signal.confidence),
                ttl_minutes(signal),
            )
        })
        .collect()
}

/// Nearest multiple of 5, clamped to 0..=100
fn confidence_pct(confidence: f64) -> i64 {
    let pct = ((confidence * 100.0) / 5.0).round() * 5.0;
    (pct as i64).clamp(0, 100)
}

fn ttl_minutes(signal: &Signal) -> u64 {
    let minutes = (signal.ttl.as_secs_f64() / 60.0).round() as u64;
    minutes.max(1)
}
