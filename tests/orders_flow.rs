mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use farm_market_api::{
    config::OutboxConfig,
    domain::{
        status::{DeliveryType, OrderStatus, PaymentMethod, PaymentStatus},
        verification::VerificationError,
    },
    dto::{
        cart::AddToCartRequest,
        orders::{
            CheckoutResult, CreateOrderRequest, OrderItemRequest, UpdateAddressRequest,
            UpdateOrderStatusRequest, VerifyDeliveryRequest,
        },
    },
    error::AppError,
    middleware::auth::{Principal, Role},
    models::{DeliveryAddress, DeliverySlot, Order},
    notify::{Notification, Notifier},
    outbox::Dispatcher,
    routes::params::Pagination,
    services::{cart_service, order_service, verification_service},
    state::AppState,
};
use uuid::Uuid;

use common::{create_product, create_user, farmer_with_farm, principal, stock_of, test_state};

const PUNE: (f64, f64) = (73.8567, 18.5204);

fn checkout(
    items: &[(Uuid, i32)],
    payment_method: PaymentMethod,
    discount_code: Option<&str>,
) -> CreateOrderRequest {
    CreateOrderRequest {
        items: items
            .iter()
            .map(|(product_id, quantity)| OrderItemRequest {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
        delivery_type: DeliveryType::Delivery,
        delivery_address: Some(DeliveryAddress {
            street: "12 Market Road".into(),
            city: "Pune".into(),
            state: "MH".into(),
            zip_code: "411001".into(),
        }),
        delivery_slot: Some(DeliverySlot {
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            time_slot: "09:00-12:00".into(),
        }),
        payment_method,
        discount_code: discount_code.map(str::to_string),
        cart_ids: vec![],
    }
}

async fn place(
    state: &AppState,
    buyer: &Principal,
    request: CreateOrderRequest,
) -> anyhow::Result<Vec<Order>> {
    let resp = order_service::create_order(state, buyer, request).await?;
    Ok(resp.data.expect("checkout data").into_orders())
}

async fn set_status(
    state: &AppState,
    actor: &Principal,
    order_id: Uuid,
    status: OrderStatus,
) -> Result<Order, AppError> {
    let resp = order_service::update_order_status(
        state,
        actor,
        order_id,
        UpdateOrderStatusRequest { status },
    )
    .await?;
    Ok(resp.data.expect("order data"))
}

async fn verify(
    state: &AppState,
    actor: &Principal,
    order_id: Uuid,
    code: &str,
) -> Result<(), AppError> {
    verification_service::verify_delivery(
        state,
        actor,
        VerifyDeliveryRequest {
            order_id,
            verification_code: code.to_string(),
        },
    )
    .await
    .map(|_| ())
}

fn code_of(order: &Order) -> String {
    order
        .verification_code
        .as_ref()
        .and_then(|info| info.code.clone())
        .expect("buyer sees the code")
}

async fn outbox_count(state: &AppState, recipient: Uuid, kind: &str) -> anyhow::Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notification_outbox WHERE recipient_id = $1 AND kind = $2",
    )
    .bind(recipient)
    .bind(kind)
    .fetch_one(&state.pool)
    .await?;
    Ok(count)
}

async fn buyer(state: &AppState) -> anyhow::Result<Principal> {
    let id = create_user(state, Role::Buyer).await?;
    Ok(principal(id, Role::Buyer, None))
}

#[tokio::test]
async fn multi_farm_checkout_splits_orders_and_discount() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let (farmer_x, farm_x) = farmer_with_farm(&state, PUNE.0, PUNE.1, 80.0).await?;
    let (farmer_y, farm_y) = farmer_with_farm(&state, PUNE.0, PUNE.1, 60.0).await?;
    let apples = create_product(&state, farm_x, "Apples", "fruits", 100, 10).await?;
    let beans = create_product(&state, farm_y, "Beans", "vegetables", 50, 5).await?;
    let buyer = buyer(&state).await?;

    for product_id in [apples, beans] {
        cart_service::add_to_cart(
            &state,
            &buyer,
            AddToCartRequest {
                product_id,
                quantity: 1,
            },
        )
        .await?;
    }

    let resp = order_service::create_order(
        &state,
        &buyer,
        checkout(&[(apples, 2), (beans, 1)], PaymentMethod::Upi, Some("WELCOME10")),
    )
    .await?;
    let data = resp.data.expect("checkout data");
    assert!(matches!(data, CheckoutResult::Multi(_)));

    let orders = data.into_orders();
    assert_eq!(orders.len(), 2);

    let x = orders.iter().find(|o| o.farm_id == farm_x).expect("farm x order");
    let y = orders.iter().find(|o| o.farm_id == farm_y).expect("farm y order");
    assert_eq!((x.total_amount, x.discount), (200, 20));
    assert_eq!((y.total_amount, y.discount), (50, 5));
    assert_eq!(x.discount_code.as_deref(), Some("WELCOME10"));
    assert_eq!(x.farmer_id, Some(farmer_x.user_id));
    assert_eq!(y.farmer_id, Some(farmer_y.user_id));
    assert_eq!(x.order_status, OrderStatus::Placed);
    assert_eq!(x.status_history.len(), 1);
    assert!(x.verification_code.is_none());
    assert!(!x.delivery_verification.required);

    assert_eq!(stock_of(&state, apples).await?, 8);
    assert_eq!(stock_of(&state, beans).await?, 4);

    let cart = cart_service::list_cart(&state, &buyer, Pagination::default()).await?;
    assert!(cart.data.expect("cart").items.is_empty());

    assert_eq!(outbox_count(&state, farmer_x.user_id, "new_order").await?, 1);
    assert_eq!(outbox_count(&state, farmer_y.user_id, "new_order").await?, 1);
    assert_eq!(outbox_count(&state, buyer.user_id, "order_verification").await?, 0);

    let mine = order_service::list_buyer_orders(&state, &buyer, Default::default()).await?;
    assert_eq!(mine.meta.and_then(|m| m.total), Some(2));

    let farmer_view = order_service::list_farmer_orders(&state, &farmer_x, Default::default()).await?;
    let farmer_orders = farmer_view.data.expect("orders").items;
    assert_eq!(farmer_orders.len(), 1);
    assert_eq!(farmer_orders[0].id, x.id);
    Ok(())
}

#[tokio::test]
async fn insufficient_stock_rolls_back_the_whole_checkout() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let (_, farm) = farmer_with_farm(&state, PUNE.0, PUNE.1, 50.0).await?;
    let plenty = create_product(&state, farm, "Onions", "vegetables", 30, 10).await?;
    let scarce = create_product(&state, farm, "Saffron", "spices", 900, 1).await?;
    let buyer = buyer(&state).await?;

    let result = order_service::create_order(
        &state,
        &buyer,
        checkout(&[(plenty, 3), (scarce, 2)], PaymentMethod::Cod, None),
    )
    .await;

    assert!(
        matches!(&result, Err(AppError::BadRequest(msg)) if msg == "Insufficient stock for Saffron"),
        "unexpected result: {:?}",
        result.err()
    );
    assert_eq!(stock_of(&state, plenty).await?, 10);
    assert_eq!(stock_of(&state, scarce).await?, 1);

    let mine = order_service::list_buyer_orders(&state, &buyer, Default::default()).await?;
    assert_eq!(mine.meta.and_then(|m| m.total), Some(0));
    Ok(())
}

#[tokio::test]
async fn cod_order_is_delivered_only_through_the_code() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let (farmer, farm) = farmer_with_farm(&state, PUNE.0, PUNE.1, 70.0).await?;
    let milk = create_product(&state, farm, "Milk", "dairy", 60, 20).await?;
    let buyer = buyer(&state).await?;

    let orders = place(&state, &buyer, checkout(&[(milk, 2)], PaymentMethod::Cod, None)).await?;
    let order = &orders[0];
    let code = code_of(order);
    assert_eq!(code.len(), 6);
    assert!(order.delivery_verification.required);
    assert_eq!(outbox_count(&state, buyer.user_id, "order_verification").await?, 1);

    // farmers never see the code value
    let farmer_view = order_service::get_order(&state, &farmer, order.id).await?;
    let info = farmer_view.data.expect("order").verification_code.expect("code info");
    assert!(info.code.is_none());

    // too early
    let early = verify(&state, &buyer, order.id, &code).await;
    assert!(matches!(
        early,
        Err(AppError::Verification(VerificationError::InvalidState(OrderStatus::Placed)))
    ));

    set_status(&state, &farmer, order.id, OrderStatus::Ready).await?;
    assert_eq!(outbox_count(&state, buyer.user_id, "order_ready").await?, 1);

    let skipped = set_status(&state, &farmer, order.id, OrderStatus::Delivered).await;
    assert!(
        matches!(&skipped, Err(AppError::BadRequest(msg)) if msg.starts_with("COD orders must be verified"))
    );

    let wrong = verify(&state, &farmer, order.id, "ZZZZZZ").await;
    assert!(matches!(
        wrong,
        Err(AppError::Verification(VerificationError::InvalidCode))
    ));

    verify(&state, &farmer, order.id, &code).await?;

    let delivered = order_service::get_order(&state, &buyer, order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(delivered.order_status, OrderStatus::Delivered);
    assert_eq!(delivered.payment_status, PaymentStatus::Paid);
    assert!(delivered.delivery_verification.verified);
    assert_eq!(delivered.delivery_verification.verified_by.as_deref(), Some("farmer"));
    assert!(delivered.verification_code.as_ref().is_some_and(|c| c.verified));
    let last = delivered.status_history.last().expect("history");
    assert_eq!(last.status, OrderStatus::Delivered);

    let reused = verify(&state, &buyer, order.id, &code).await;
    assert!(matches!(
        reused,
        Err(AppError::Verification(VerificationError::CodeReused))
    ));

    let frozen = set_status(&state, &farmer, order.id, OrderStatus::Cancelled).await;
    assert!(matches!(frozen, Err(AppError::BadRequest(_))));
    Ok(())
}

#[tokio::test]
async fn regenerated_code_replaces_the_old_one() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let (farmer, farm) = farmer_with_farm(&state, PUNE.0, PUNE.1, 70.0).await?;
    let eggs = create_product(&state, farm, "Eggs", "poultry", 8, 100).await?;
    let buyer = buyer(&state).await?;

    let orders = place(&state, &buyer, checkout(&[(eggs, 12)], PaymentMethod::Cod, None)).await?;
    let order_id = orders[0].id;
    let old_code = code_of(&orders[0]);

    let not_yet = verification_service::regenerate_code(&state, &buyer, order_id).await;
    assert!(matches!(
        not_yet,
        Err(AppError::Verification(VerificationError::InvalidState(OrderStatus::Placed)))
    ));

    set_status(&state, &farmer, order_id, OrderStatus::Processing).await?;

    let stranger = principal(create_user(&state, Role::Buyer).await?, Role::Buyer, None);
    let denied = verification_service::regenerate_code(&state, &stranger, order_id).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let by_farmer = verification_service::regenerate_code(&state, &farmer, order_id).await?;
    assert!(by_farmer.data.expect("data").code.is_none());

    let by_buyer = verification_service::regenerate_code(&state, &buyer, order_id).await?;
    let new_code = by_buyer.data.expect("data").code.expect("buyer gets the code");

    set_status(&state, &farmer, order_id, OrderStatus::OutForDelivery).await?;

    if new_code != old_code {
        let stale = verify(&state, &buyer, order_id, &old_code).await;
        assert!(matches!(
            stale,
            Err(AppError::Verification(VerificationError::InvalidCode))
        ));
    }
    verify(&state, &buyer, order_id, &new_code).await?;
    assert_eq!(outbox_count(&state, buyer.user_id, "order_verification").await?, 3);
    Ok(())
}

#[tokio::test]
async fn expired_code_leaves_order_unchanged() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let (farmer, farm) = farmer_with_farm(&state, PUNE.0, PUNE.1, 70.0).await?;
    let rice = create_product(&state, farm, "Rice", "grains", 70, 50).await?;
    let buyer = buyer(&state).await?;

    let orders = place(&state, &buyer, checkout(&[(rice, 5)], PaymentMethod::Cod, None)).await?;
    let order_id = orders[0].id;
    let code = code_of(&orders[0]);

    set_status(&state, &farmer, order_id, OrderStatus::Ready).await?;
    sqlx::query(
        "UPDATE orders SET code_generated_at = now() - interval '31 minutes' WHERE id = $1",
    )
    .bind(order_id)
    .execute(&state.pool)
    .await?;

    let expired = verify(&state, &buyer, order_id, &code).await;
    assert!(matches!(
        expired,
        Err(AppError::Verification(VerificationError::Expired))
    ));

    let order = order_service::get_order(&state, &buyer, order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(order.order_status, OrderStatus::Ready);
    assert!(!order.delivery_verification.verified);
    Ok(())
}

#[tokio::test]
async fn cancelling_restores_stock_exactly_once() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let (farmer, farm) = farmer_with_farm(&state, PUNE.0, PUNE.1, 40.0).await?;
    let honey = create_product(&state, farm, "Honey", "pantry", 300, 10).await?;
    let buyer = buyer(&state).await?;

    let orders = place(&state, &buyer, checkout(&[(honey, 3)], PaymentMethod::Card, None)).await?;
    let order_id = orders[0].id;
    assert_eq!(stock_of(&state, honey).await?, 7);

    let by_farmer = order_service::cancel_order(&state, &farmer, order_id).await;
    assert!(matches!(by_farmer, Err(AppError::Forbidden(_))));

    let cancelled = order_service::cancel_order(&state, &buyer, order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&state, honey).await?, 10);

    let again = order_service::cancel_order(&state, &buyer, order_id).await;
    assert!(matches!(again, Err(AppError::BadRequest(_))));
    assert_eq!(stock_of(&state, honey).await?, 10);
    Ok(())
}

#[tokio::test]
async fn status_moves_forward_only_and_checks_ownership() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let (farmer, farm) = farmer_with_farm(&state, PUNE.0, PUNE.1, 40.0).await?;
    let (other_farmer, _) = farmer_with_farm(&state, PUNE.0, PUNE.1, 40.0).await?;
    let corn = create_product(&state, farm, "Corn", "grains", 20, 10).await?;
    let buyer = buyer(&state).await?;

    let orders = place(&state, &buyer, checkout(&[(corn, 1)], PaymentMethod::Upi, None)).await?;
    let order_id = orders[0].id;

    let foreign = set_status(&state, &other_farmer, order_id, OrderStatus::Confirmed).await;
    assert!(matches!(foreign, Err(AppError::Forbidden(_))));

    let nosy = order_service::get_order(&state, &other_farmer, order_id).await;
    assert!(matches!(nosy, Err(AppError::Forbidden(_))));

    // owner without a farm-bound session is still recognised
    let owner_only = principal(farmer.user_id, Role::Farmer, None);
    set_status(&state, &owner_only, order_id, OrderStatus::Processing).await?;

    let backwards = set_status(&state, &farmer, order_id, OrderStatus::Confirmed).await;
    assert!(matches!(backwards, Err(AppError::BadRequest(_))));

    let delivered = set_status(&state, &farmer, order_id, OrderStatus::Delivered).await?;
    assert_eq!(delivered.order_status, OrderStatus::Delivered);
    let statuses: Vec<OrderStatus> = delivered.status_history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![OrderStatus::Placed, OrderStatus::Processing, OrderStatus::Delivered]
    );
    Ok(())
}

#[tokio::test]
async fn address_can_change_until_the_order_closes() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let (_, farm) = farmer_with_farm(&state, PUNE.0, PUNE.1, 40.0).await?;
    let okra = create_product(&state, farm, "Okra", "vegetables", 45, 10).await?;
    let buyer = buyer(&state).await?;

    let orders = place(&state, &buyer, checkout(&[(okra, 1)], PaymentMethod::Upi, None)).await?;
    let order_id = orders[0].id;

    let mut address = DeliveryAddress {
        street: "7 Hill View".into(),
        city: "Pune".into(),
        state: "MH".into(),
        zip_code: "411002".into(),
    };
    let updated = order_service::update_delivery_address(
        &state,
        &buyer,
        order_id,
        UpdateAddressRequest {
            delivery_address: address.clone(),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(updated.delivery_address.as_ref(), Some(&address));
    assert_eq!(outbox_count(&state, buyer.user_id, "address_update").await?, 1);

    address.zip_code = "4110".into();
    let invalid = order_service::update_delivery_address(
        &state,
        &buyer,
        order_id,
        UpdateAddressRequest {
            delivery_address: address,
        },
    )
    .await;
    assert!(matches!(invalid, Err(AppError::BadRequest(_))));
    Ok(())
}

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        self.seen
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .push(notification.recipient_id);
        Ok(())
    }
}

#[tokio::test]
async fn dispatcher_delivers_enqueued_notifications() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let (farmer, farm) = farmer_with_farm(&state, PUNE.0, PUNE.1, 40.0).await?;
    let garlic = create_product(&state, farm, "Garlic", "vegetables", 120, 10).await?;
    let buyer = buyer(&state).await?;
    place(&state, &buyer, checkout(&[(garlic, 1)], PaymentMethod::Cod, None)).await?;

    let notifier = Arc::new(RecordingNotifier::default());
    let dispatcher = Dispatcher::new(
        state.pool.clone(),
        notifier.clone(),
        OutboxConfig {
            batch_size: 500,
            ..OutboxConfig::default()
        },
    );

    let mut pending = 1;
    for _ in 0..1000 {
        let handled = dispatcher.dispatch_once().await?;
        pending = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notification_outbox WHERE recipient_id = ANY($1) AND status <> 'sent'",
        )
        .bind(vec![buyer.user_id, farmer.user_id])
        .fetch_one(&state.pool)
        .await?;
        if pending == 0 || handled == 0 {
            break;
        }
    }
    assert_eq!(pending, 0);

    let seen = notifier.seen.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
    assert!(seen.contains(&buyer.user_id));
    assert!(seen.contains(&farmer.user_id));
    Ok(())
}
