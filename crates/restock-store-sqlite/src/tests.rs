//! Integration tests for `SqliteStore` against an in-memory database.

use restock_core::{
  host::{IdentityProvider, StockLevel, VariantCatalog, VariantRecord},
  store::{PageOptions, Sort, SortField, SortOrder, SubscriptionFilter, SubscriptionStore},
  subscription::{NewSubscription, SubscriptionStatus},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn variant(s: &SqliteStore, on_hand: i64) -> Uuid {
  let variant_id = Uuid::new_v4();
  s.upsert_variant(VariantRecord {
    variant_id,
    sku:   format!("SKU-{}", &variant_id.simple().to_string()[..8]),
    name:  "Laptop 13 inch 8GB".into(),
    stock: StockLevel { on_hand, allocated: 0, out_of_stock_threshold: 0 },
  })
  .await
  .unwrap();
  variant_id
}

fn new_sub(variant_id: Uuid, email: &str) -> NewSubscription {
  NewSubscription {
    variant_id,
    channel: "default".into(),
    customer_id: None,
    email: email.into(),
  }
}

// ─── Insert / dedup ──────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_find_subscription() {
  let s = store().await;
  let v = variant(&s, 0).await;

  let sub = s.insert_subscription(new_sub(v, "a@x.com")).await.unwrap().unwrap();
  assert_eq!(sub.status, SubscriptionStatus::Created);
  assert_eq!(sub.created_at, sub.updated_at);

  let fetched = s.find_subscription(sub.subscription_id).await.unwrap().unwrap();
  assert_eq!(fetched, sub);
}

#[tokio::test]
async fn find_missing_subscription_returns_none() {
  let s = store().await;
  assert!(s.find_subscription(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn second_active_insert_for_same_triple_is_rejected() {
  let s = store().await;
  let v = variant(&s, 0).await;

  assert!(s.insert_subscription(new_sub(v, "a@x.com")).await.unwrap().is_some());
  assert!(s.insert_subscription(new_sub(v, "a@x.com")).await.unwrap().is_none());

  let page = s.find_active_for_variant(v, &PageOptions::default()).await.unwrap();
  assert_eq!(page.total_items, 1);
}

#[tokio::test]
async fn same_email_may_subscribe_in_another_channel() {
  let s = store().await;
  let v = variant(&s, 0).await;

  s.insert_subscription(new_sub(v, "a@x.com")).await.unwrap().unwrap();
  let mut other = new_sub(v, "a@x.com");
  other.channel = "eu".into();
  assert!(s.insert_subscription(other).await.unwrap().is_some());
}

#[tokio::test]
async fn resubscribe_allowed_after_notification() {
  let s = store().await;
  let v = variant(&s, 0).await;

  let first = s.insert_subscription(new_sub(v, "a@x.com")).await.unwrap().unwrap();
  s.set_status(first.subscription_id, None, SubscriptionStatus::Notified)
    .await
    .unwrap()
    .unwrap();

  assert!(s.insert_subscription(new_sub(v, "a@x.com")).await.unwrap().is_some());
}

#[tokio::test]
async fn insert_for_unknown_variant_is_a_database_error() {
  let s = store().await;
  let err = s
    .insert_subscription(new_sub(Uuid::new_v4(), "a@x.com"))
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::Database(_)));
}

// ─── Status transitions ──────────────────────────────────────────────────────

#[tokio::test]
async fn set_status_bumps_updated_at() {
  let s = store().await;
  let v = variant(&s, 0).await;
  let sub = s.insert_subscription(new_sub(v, "a@x.com")).await.unwrap().unwrap();

  let updated = s
    .set_status(sub.subscription_id, Some(SubscriptionStatus::Created), SubscriptionStatus::Notified)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.status, SubscriptionStatus::Notified);
  assert!(updated.updated_at >= sub.updated_at);
  assert_eq!(updated.created_at, sub.created_at);
}

#[tokio::test]
async fn set_status_with_stale_expectation_writes_nothing() {
  let s = store().await;
  let v = variant(&s, 0).await;
  let sub = s.insert_subscription(new_sub(v, "a@x.com")).await.unwrap().unwrap();
  s.set_status(sub.subscription_id, None, SubscriptionStatus::Notified)
    .await
    .unwrap();

  let res = s
    .set_status(sub.subscription_id, Some(SubscriptionStatus::Created), SubscriptionStatus::Converted)
    .await
    .unwrap();
  assert!(res.is_none());

  let fetched = s.find_subscription(sub.subscription_id).await.unwrap().unwrap();
  assert_eq!(fetched.status, SubscriptionStatus::Notified);
}

#[tokio::test]
async fn set_status_on_missing_subscription_returns_none() {
  let s = store().await;
  let res = s
    .set_status(Uuid::new_v4(), None, SubscriptionStatus::Notified)
    .await
    .unwrap();
  assert!(res.is_none());
}

#[tokio::test]
async fn unknown_persisted_status_fails_to_load() {
  let s = store().await;
  let v = variant(&s, 0).await;
  let sub = s.insert_subscription(new_sub(v, "a@x.com")).await.unwrap().unwrap();

  let id = sub.subscription_id.hyphenated().to_string();
  s.conn
    .call(move |conn| {
      conn.execute(
        "UPDATE subscriptions SET status = 'notified' WHERE subscription_id = ?1",
        rusqlite::params![id],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let err = s.find_subscription(sub.subscription_id).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(restock_core::Error::UnknownStatus(ref v)) if v == "notified"
  ));
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn active_for_variant_is_fifo_and_capped() {
  let s = store().await;
  let v = variant(&s, 0).await;

  let mut ids = vec![];
  for i in 0..5 {
    let sub = s
      .insert_subscription(new_sub(v, &format!("u{i}@x.com")))
      .await
      .unwrap()
      .unwrap();
    ids.push(sub.subscription_id);
  }

  let page = s.find_active_for_variant(v, &PageOptions::fifo(3)).await.unwrap();
  assert_eq!(page.total_items, 5);
  let got: Vec<_> = page.items.iter().map(|s| s.subscription_id).collect();
  assert_eq!(got, ids[..3]);
}

#[tokio::test]
async fn active_for_variant_excludes_other_states_and_variants() {
  let s = store().await;
  let v = variant(&s, 0).await;
  let other = variant(&s, 0).await;

  let a = s.insert_subscription(new_sub(v, "a@x.com")).await.unwrap().unwrap();
  s.insert_subscription(new_sub(v, "b@x.com")).await.unwrap().unwrap();
  s.insert_subscription(new_sub(other, "c@x.com")).await.unwrap().unwrap();
  s.set_status(a.subscription_id, None, SubscriptionStatus::Notified)
    .await
    .unwrap();

  let page = s.find_active_for_variant(v, &PageOptions::default()).await.unwrap();
  assert_eq!(page.total_items, 1);
  assert_eq!(page.items[0].email, "b@x.com");
}

#[tokio::test]
async fn list_subscriptions_filters_sorts_and_pages() {
  let s = store().await;
  let v = variant(&s, 0).await;
  for email in ["c@x.com", "a@x.com", "b@x.com"] {
    s.insert_subscription(new_sub(v, email)).await.unwrap().unwrap();
  }

  let options = PageOptions {
    skip:   Some(1),
    take:   Some(1),
    sort:   Some(Sort { field: SortField::Email, order: SortOrder::Desc }),
    filter: SubscriptionFilter { channel: Some("default".into()), ..Default::default() },
  };
  let page = s.list_subscriptions(&options).await.unwrap();
  assert_eq!(page.total_items, 3);
  assert_eq!(page.items.len(), 1);
  assert_eq!(page.items[0].email, "b@x.com");

  let none = s
    .list_subscriptions(&PageOptions {
      filter: SubscriptionFilter { channel: Some("eu".into()), ..Default::default() },
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(none.total_items, 0);
  assert!(none.items.is_empty());
}

#[tokio::test]
async fn active_for_variant_and_email_is_channel_scoped() {
  let s = store().await;
  let v = variant(&s, 0).await;
  let sub = s.insert_subscription(new_sub(v, "a@x.com")).await.unwrap().unwrap();

  let found = s
    .find_active_for_variant_and_email("default", v, "a@x.com")
    .await
    .unwrap();
  assert_eq!(found.map(|f| f.subscription_id), Some(sub.subscription_id));

  assert!(
    s.find_active_for_variant_and_email("eu", v, "a@x.com")
      .await
      .unwrap()
      .is_none()
  );
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_variant_replaces_stock() {
  let s = store().await;
  let v = variant(&s, 0).await;
  assert_eq!(s.stock_level(v).await.unwrap().unwrap().on_hand, 0);

  s.upsert_variant(VariantRecord {
    variant_id: v,
    sku:        "L2201308".into(),
    name:       "Laptop 13 inch 8GB".into(),
    stock:      StockLevel { on_hand: 5, allocated: 2, out_of_stock_threshold: 1 },
  })
  .await
  .unwrap();

  let level = s.stock_level(v).await.unwrap().unwrap();
  assert_eq!(level.saleable(), Some(2));
  assert_eq!(s.find_variant(v).await.unwrap().unwrap().sku, "L2201308");
}

#[tokio::test]
async fn find_variants_omits_unknown_ids() {
  let s = store().await;
  let a = variant(&s, 0).await;
  let b = variant(&s, 0).await;

  let found = s.find_variants(&[a, Uuid::new_v4(), b]).await.unwrap();
  assert_eq!(found.len(), 2);
  assert!(s.find_variants(&[]).await.unwrap().is_empty());
  assert!(s.stock_level(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn anonymous_session_resolves_without_customer() {
  let s = store().await;
  let session = s.open_session(None).await.unwrap();
  let resolved = s.resolve_session(&session.token).await.unwrap().unwrap();
  assert_eq!(resolved, session);
  assert!(resolved.customer.is_none());
}

#[tokio::test]
async fn customer_sessions_share_one_customer() {
  let s = store().await;
  let first = s.open_session(Some("a@x.com".into())).await.unwrap();
  let second = s.open_session(Some("a@x.com".into())).await.unwrap();

  assert_ne!(first.token, second.token);
  let c1 = first.customer.unwrap();
  let c2 = second.customer.unwrap();
  assert_eq!(c1.customer_id, c2.customer_id);
  assert_eq!(c1.email_address, "a@x.com");
}

#[tokio::test]
async fn unknown_session_token_returns_none() {
  let s = store().await;
  assert!(s.resolve_session("nope").await.unwrap().is_none());
}
