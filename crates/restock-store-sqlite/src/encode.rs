//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use restock_core::{
  host::{StockLevel, Variant},
  subscription::{Subscription, SubscriptionStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// The current time, truncated to what survives a round trip through
/// [`encode_dt`].
pub fn now() -> DateTime<Utc> {
  let now = Utc::now();
  decode_dt(&encode_dt(now)).unwrap_or(now)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawSubscription::from_row`].
pub const SUBSCRIPTION_COLUMNS: &str = "subscription_id, status, variant_id, channel, \
                                        customer_id, email, created_at, updated_at";

/// Raw strings read directly from a `subscriptions` row.
pub struct RawSubscription {
  pub subscription_id: String,
  pub status:          String,
  pub variant_id:      String,
  pub channel:         String,
  pub customer_id:     Option<String>,
  pub email:           String,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawSubscription {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subscription_id: row.get(0)?,
      status:          row.get(1)?,
      variant_id:      row.get(2)?,
      channel:         row.get(3)?,
      customer_id:     row.get(4)?,
      email:           row.get(5)?,
      created_at:      row.get(6)?,
      updated_at:      row.get(7)?,
    })
  }

  pub fn into_subscription(self) -> Result<Subscription> {
    Ok(Subscription {
      subscription_id: decode_uuid(&self.subscription_id)?,
      status:          SubscriptionStatus::parse(&self.status)?,
      variant_id:      decode_uuid(&self.variant_id)?,
      channel:         self.channel,
      customer_id:     self.customer_id.as_deref().map(decode_uuid).transpose()?,
      email:           self.email,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `variants` row.
pub struct RawVariant {
  pub variant_id:             String,
  pub sku:                    String,
  pub name:                   String,
  pub stock_on_hand:          i64,
  pub stock_allocated:        i64,
  pub out_of_stock_threshold: i64,
}

impl RawVariant {
  pub const COLUMNS: &'static str =
    "variant_id, sku, name, stock_on_hand, stock_allocated, out_of_stock_threshold";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      variant_id:             row.get(0)?,
      sku:                    row.get(1)?,
      name:                   row.get(2)?,
      stock_on_hand:          row.get(3)?,
      stock_allocated:        row.get(4)?,
      out_of_stock_threshold: row.get(5)?,
    })
  }

  pub fn stock(&self) -> StockLevel {
    StockLevel {
      on_hand:                self.stock_on_hand,
      allocated:              self.stock_allocated,
      out_of_stock_threshold: self.out_of_stock_threshold,
    }
  }

  pub fn into_variant(self) -> Result<Variant> {
    Ok(Variant {
      variant_id: decode_uuid(&self.variant_id)?,
      sku:        self.sku,
      name:       self.name,
    })
  }
}
