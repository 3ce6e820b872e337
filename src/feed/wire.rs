//! Wire format and message hygiene
//!
//! Each feed message carries one bar as JSON with short keys
//! (`s`, `t`, `o`, `h`, `l`, `c`, `v`), timestamp in epoch milliseconds.
//! Long-form keys are accepted as aliases.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::observer::DropReason;
use crate::types::Bar;

#[derive(Debug, Deserialize)]
struct WireBar {
    #[serde(default, alias = "symbol")]
    s: String,
    #[serde(default, alias = "timestamp")]
    t: i64,
    #[serde(default, alias = "open")]
    o: f64,
    #[serde(default, alias = "high")]
    h: f64,
    #[serde(default, alias = "low")]
    l: f64,
    #[serde(default, alias = "close")]
    c: f64,
    #[serde(default, alias = "volume")]
    v: f64,
}

/// Decode one wire message. Field-level sanity is checked by [`BarFilter`].
pub fn decode_bar(raw: &str) -> Result<Bar> {
    let wire: WireBar = serde_json::from_str(raw).map_err(|e| Error::Decode(e.to_string()))?;
    let timestamp = if wire.t > 0 {
        DateTime::from_timestamp_millis(wire.t)
            .ok_or_else(|| Error::Decode(format!("timestamp out of range: {}", wire.t)))?
    } else {
        DateTime::UNIX_EPOCH
    };

    Ok(Bar {
        symbol: wire.s.trim().to_string(),
        timestamp,
        open: wire.o,
        high: wire.h,
        low: wire.l,
        close: wire.c,
        volume: wire.v,
    })
}

/// Structural checks: missing/zero timestamp, empty symbol, all-zero prices
pub fn is_well_formed(bar: &Bar) -> bool {
    bar.timestamp.timestamp_millis() > 0
        && !bar.symbol.is_empty()
        && !(bar.open == 0.0 && bar.high == 0.0 && bar.low == 0.0 && bar.close == 0.0)
}

/// Decodes, validates and de-duplicates incoming messages.
///
/// Keeps the last accepted timestamp per symbol. The map is locked so the
/// filter can be shared if reads are ever spread across tasks.
#[derive(Debug)]
pub struct BarFilter {
    max_age: Duration,
    last_seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl BarFilter {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the bar if it should be emitted, recording its timestamp
    pub fn accept(&self, raw: &str, received_at: DateTime<Utc>) -> std::result::Result<Bar, DropReason> {
        let bar = decode_bar(raw).map_err(|_| DropReason::Decode)?;
        self.check(bar, received_at)
    }

    pub fn check(&self, bar: Bar, received_at: DateTime<Utc>) -> std::result::Result<Bar, DropReason> {
        if !is_well_formed(&bar) {
            return Err(DropReason::Invalid);
        }

        // Bars stamped in the future fail to_std() and are let through
        if let Ok(age) = (received_at - bar.timestamp).to_std() {
            if age > self.max_age {
                return Err(DropReason::Stale);
            }
        }

        let mut last_seen = self.last_seen.lock();
        if last_seen.get(&bar.symbol) == Some(&bar.timestamp) {
            return Err(DropReason::Duplicate);
        }
        last_seen.insert(bar.symbol.clone(), bar.timestamp);
        Ok(bar)
    }
}
