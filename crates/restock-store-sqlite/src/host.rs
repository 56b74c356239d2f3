//! Host capabilities backed by the same SQLite file: the variant catalog
//! mirror and shop sessions.

use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use restock_core::host::{
  Customer, IdentityProvider, Session, StockLevel, Variant, VariantCatalog,
  VariantRecord,
};

use crate::{
  Error, Result, SqliteStore,
  encode::{RawVariant, decode_uuid, encode_dt, encode_uuid, now},
};

// ─── VariantCatalog impl ─────────────────────────────────────────────────────

impl VariantCatalog for SqliteStore {
  type Error = Error;

  async fn find_variant(&self, variant_id: Uuid) -> Result<Option<Variant>> {
    let raw = self.find_raw_variant(variant_id).await?;
    raw.map(RawVariant::into_variant).transpose()
  }

  async fn find_variants(&self, variant_ids: &[Uuid]) -> Result<Vec<Variant>> {
    if variant_ids.is_empty() {
      return Ok(Vec::new());
    }
    let params: Vec<Value> = variant_ids
      .iter()
      .map(|id| Value::Text(encode_uuid(*id)))
      .collect();
    let placeholders = vec!["?"; params.len()].join(", ");

    let raws: Vec<RawVariant> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM variants WHERE variant_id IN ({placeholders})",
          RawVariant::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawVariant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVariant::into_variant).collect()
  }

  async fn stock_level(&self, variant_id: Uuid) -> Result<Option<StockLevel>> {
    Ok(self.find_raw_variant(variant_id).await?.map(|raw| raw.stock()))
  }

  async fn upsert_variant(&self, record: VariantRecord) -> Result<Variant> {
    let id_str = encode_uuid(record.variant_id);
    let sku    = record.sku.clone();
    let name   = record.name.clone();
    let stock  = record.stock;
    let at_str = encode_dt(now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO variants (
             variant_id, sku, name, stock_on_hand, stock_allocated,
             out_of_stock_threshold, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT(variant_id) DO UPDATE SET
             sku                    = excluded.sku,
             name                   = excluded.name,
             stock_on_hand          = excluded.stock_on_hand,
             stock_allocated        = excluded.stock_allocated,
             out_of_stock_threshold = excluded.out_of_stock_threshold,
             updated_at             = excluded.updated_at",
          rusqlite::params![
            id_str,
            sku,
            name,
            stock.on_hand,
            stock.allocated,
            stock.out_of_stock_threshold,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(Variant {
      variant_id: record.variant_id,
      sku:        record.sku,
      name:       record.name,
    })
  }
}

impl SqliteStore {
  async fn find_raw_variant(&self, variant_id: Uuid) -> Result<Option<RawVariant>> {
    let id_str = encode_uuid(variant_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM variants WHERE variant_id = ?1", RawVariant::COLUMNS),
              rusqlite::params![id_str],
              RawVariant::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(raw)
  }
}

// ─── IdentityProvider impl ───────────────────────────────────────────────────

impl IdentityProvider for SqliteStore {
  type Error = Error;

  async fn resolve_session(&self, token: &str) -> Result<Option<Session>> {
    let token_owned = token.to_owned();

    type Row = (String, Option<String>, Option<String>);
    let row: Option<Row> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT s.token, s.customer_id, c.email_address
               FROM sessions s
               LEFT JOIN customers c ON c.customer_id = s.customer_id
               WHERE s.token = ?1",
              rusqlite::params![token_owned],
              |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let Some((token, customer_id, email_address)) = row else {
      return Ok(None);
    };

    let customer = match (customer_id, email_address) {
      (Some(id), Some(email_address)) => Some(Customer {
        customer_id: decode_uuid(&id)?,
        email_address,
      }),
      (Some(id), None) => return Err(Error::CustomerNotFound(decode_uuid(&id)?)),
      (None, _) => None,
    };

    Ok(Some(Session { token, customer }))
  }

  async fn open_session(&self, customer_email: Option<String>) -> Result<Session> {
    let token  = Uuid::new_v4().simple().to_string();
    let at_str = encode_dt(now());
    let new_customer_id = encode_uuid(Uuid::new_v4());

    let token_owned = token.clone();
    let customer: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        let customer = match customer_email {
          Some(email) => {
            conn.execute(
              "INSERT OR IGNORE INTO customers (customer_id, email_address, created_at)
               VALUES (?1, ?2, ?3)",
              rusqlite::params![new_customer_id, email, at_str],
            )?;
            let id: String = conn.query_row(
              "SELECT customer_id FROM customers WHERE email_address = ?1",
              rusqlite::params![email],
              |r| r.get(0),
            )?;
            Some((id, email))
          }
          None => None,
        };

        conn.execute(
          "INSERT INTO sessions (token, customer_id, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![token_owned, customer.as_ref().map(|(id, _)| id), at_str],
        )?;
        Ok(customer)
      })
      .await?;

    let customer = customer
      .map(|(id, email_address)| {
        Ok::<_, Error>(Customer { customer_id: decode_uuid(&id)?, email_address })
      })
      .transpose()?;

    Ok(Session { token, customer })
  }
}
