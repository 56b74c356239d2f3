//! [`SqliteStore`]: the SQLite implementation of [`SubscriptionStore`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use restock_core::{
  store::{
    Page, PageOptions, SortField, SortOrder, SubscriptionFilter, SubscriptionStore,
  },
  subscription::{NewSubscription, Subscription, SubscriptionStatus},
};

use crate::{
  Result,
  encode::{RawSubscription, SUBSCRIPTION_COLUMNS, encode_dt, encode_uuid, now},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A subscription store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a filtered, sorted, paged query and the matching count in one call.
  async fn query_page(
    &self,
    filter: SubscriptionFilter,
    options: &PageOptions,
  ) -> Result<Page<Subscription>> {
    let (where_clause, params) = where_clause(&filter);
    let order_clause = order_clause(options);
    let limit  = options.take.map_or(-1, |t| t as i64);
    let offset = options.skip.unwrap_or(0) as i64;

    let (raws, total): (Vec<RawSubscription>, i64) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM subscriptions {where_clause}"),
          rusqlite::params_from_iter(params.iter()),
          |r| r.get(0),
        )?;

        let sql = format!(
          "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
           {where_clause}
           {order_clause}
           LIMIT {limit} OFFSET {offset}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(params.iter()),
            RawSubscription::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((rows, total))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawSubscription::into_subscription)
      .collect::<Result<Vec<_>>>()?;

    Ok(Page { items, total_items: total as usize })
  }
}

// ─── Query building ──────────────────────────────────────────────────────────

/// Build a `WHERE` clause and its positional parameters from `filter`.
/// Only column names from this file are interpolated; values are bound.
fn where_clause(filter: &SubscriptionFilter) -> (String, Vec<Value>) {
  let mut conds: Vec<&'static str> = vec![];
  let mut params: Vec<Value> = vec![];

  if let Some(status) = filter.status {
    conds.push("status = ?");
    params.push(Value::Text(status.as_str().to_owned()));
  }
  if let Some(email) = &filter.email {
    conds.push("email = ?");
    params.push(Value::Text(email.clone()));
  }
  if let Some(channel) = &filter.channel {
    conds.push("channel = ?");
    params.push(Value::Text(channel.clone()));
  }
  if let Some(variant_id) = filter.variant_id {
    conds.push("variant_id = ?");
    params.push(Value::Text(encode_uuid(variant_id)));
  }

  let clause = if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  };
  (clause, params)
}

/// `ORDER BY` for `options`, tie-broken on insertion order.
fn order_clause(options: &PageOptions) -> String {
  let Some(sort) = options.sort else {
    return "ORDER BY rowid ASC".to_owned();
  };
  let column = match sort.field {
    SortField::CreatedAt => "created_at",
    SortField::UpdatedAt => "updated_at",
    SortField::Email => "email",
    SortField::Status => "status",
  };
  let dir = match sort.order {
    SortOrder::Asc => "ASC",
    SortOrder::Desc => "DESC",
  };
  format!("ORDER BY {column} {dir}, rowid {dir}")
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

// ─── SubscriptionStore impl ──────────────────────────────────────────────────

impl SubscriptionStore for SqliteStore {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn insert_subscription(
    &self,
    input: NewSubscription,
  ) -> Result<Option<Subscription>> {
    let at = now();
    let subscription = Subscription {
      subscription_id: Uuid::new_v4(),
      status:          SubscriptionStatus::Created,
      variant_id:      input.variant_id,
      channel:         input.channel,
      customer_id:     input.customer_id,
      email:           input.email,
      created_at:      at,
      updated_at:      at,
    };

    let id_str       = encode_uuid(subscription.subscription_id);
    let status_str   = subscription.status.as_str();
    let variant_str  = encode_uuid(subscription.variant_id);
    let channel      = subscription.channel.clone();
    let customer_str = subscription.customer_id.map(encode_uuid);
    let email        = subscription.email.clone();
    let at_str       = encode_dt(at);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO subscriptions (
             subscription_id, status, variant_id, channel,
             customer_id, email, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
          rusqlite::params![
            id_str,
            status_str,
            variant_str,
            channel,
            customer_str,
            email,
            at_str,
          ],
        );
        match res {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      tracing::debug!(
        variant_id = %subscription.variant_id,
        channel = %subscription.channel,
        "active subscription already exists"
      );
      return Ok(None);
    }
    Ok(Some(subscription))
  }

  async fn set_status(
    &self,
    subscription_id: Uuid,
    expected:        Option<SubscriptionStatus>,
    status:          SubscriptionStatus,
  ) -> Result<Option<Subscription>> {
    let id_str       = encode_uuid(subscription_id);
    let status_str   = status.as_str();
    let expected_str = expected.map(SubscriptionStatus::as_str);
    let at_str       = encode_dt(now());

    let raw: Option<RawSubscription> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE subscriptions
           SET status = ?1, updated_at = ?2
           WHERE subscription_id = ?3
             AND (?4 IS NULL OR status = ?4)",
          rusqlite::params![status_str, at_str, id_str, expected_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE subscription_id = ?1"
              ),
              rusqlite::params![id_str],
              RawSubscription::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubscription::into_subscription).transpose()
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn find_subscription(&self, subscription_id: Uuid) -> Result<Option<Subscription>> {
    let id_str = encode_uuid(subscription_id);

    let raw: Option<RawSubscription> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE subscription_id = ?1"
              ),
              rusqlite::params![id_str],
              RawSubscription::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubscription::into_subscription).transpose()
  }

  async fn list_subscriptions(&self, options: &PageOptions) -> Result<Page<Subscription>> {
    self.query_page(options.filter.clone(), options).await
  }

  async fn find_active_for_variant(
    &self,
    variant_id: Uuid,
    options:    &PageOptions,
  ) -> Result<Page<Subscription>> {
    let filter = SubscriptionFilter {
      status:     Some(SubscriptionStatus::Created),
      variant_id: Some(variant_id),
      ..options.filter.clone()
    };
    self.query_page(filter, options).await
  }

  async fn find_active_for_variant_and_email(
    &self,
    channel:    &str,
    variant_id: Uuid,
    email:      &str,
  ) -> Result<Option<Subscription>> {
    let filter = SubscriptionFilter {
      status:     Some(SubscriptionStatus::Created),
      email:      Some(email.to_owned()),
      channel:    Some(channel.to_owned()),
      variant_id: Some(variant_id),
    };
    let options = PageOptions { take: Some(1), ..Default::default() };
    let page = self.query_page(filter, &options).await?;
    Ok(page.items.into_iter().next())
  }
}
