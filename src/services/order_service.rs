use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    domain::{
        access::{OrderParties, owns_farm},
        discount,
        status::{DeliveryType, OrderStatus, PaymentMethod, PaymentStatus},
        verification,
    },
    dto::orders::{
        CheckoutResult, CreateOrderRequest, OrderList, UpdateAddressRequest,
        UpdateOrderStatusRequest,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        farms::{Column as FarmCol, Entity as Farms},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        order_status_history::{
            ActiveModel as HistoryActive, Column as HistoryCol, Entity as OrderStatusHistory,
            Model as HistoryModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{Principal, Role, ensure_role},
    models::{Order, stored},
    outbox::{self, OutboxEvent},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    state::AppState,
};

/// Line captured at checkout; price and name are frozen here.
struct Snapshot {
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    price: i64,
    unit: String,
}

struct FarmGroup {
    farm_id: Uuid,
    items: Vec<Snapshot>,
    subtotal: i64,
}

pub async fn create_order(
    state: &AppState,
    principal: &Principal,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<CheckoutResult>> {
    payload.validate()?;

    let txn = state.orm.begin().await?;

    let mut groups: Vec<FarmGroup> = Vec::new();
    let mut group_index: HashMap<Uuid, usize> = HashMap::new();

    for line in &payload.items {
        let product = Products::find_by_id(line.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", line.product_id)))?;

        if !product.is_active {
            return Err(AppError::BadRequest(format!(
                "Product {} is not available",
                product.name
            )));
        }

        let updated = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::value(Utc::now()))
            .filter(ProdCol::Id.eq(product.id))
            .filter(ProdCol::Stock.gte(line.quantity))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }

        let idx = *group_index.entry(product.farm_id).or_insert_with(|| {
            groups.push(FarmGroup {
                farm_id: product.farm_id,
                items: Vec::new(),
                subtotal: 0,
            });
            groups.len() - 1
        });
        let group = &mut groups[idx];
        group.subtotal += product.price * i64::from(line.quantity);
        group.items.push(Snapshot {
            product_id: product.id,
            product_name: product.name,
            quantity: line.quantity,
            price: product.price,
            unit: product.unit,
        });
    }

    let overall_subtotal: i64 = groups.iter().map(|g| g.subtotal).sum();
    let discount_code = known_code(&payload);
    let overall_discount = discount::overall_discount(overall_subtotal, discount_code.as_deref());
    let subtotals: Vec<i64> = groups.iter().map(|g| g.subtotal).collect();
    let shares = discount::allocate(overall_discount, &subtotals);

    let delivery_address = payload
        .delivery_address
        .as_ref()
        .filter(|_| payload.delivery_type == DeliveryType::Delivery)
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| AppError::Internal(e.into()))?;
    let delivery_slot = payload
        .delivery_slot
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Delivery slot is required".into()))
        .and_then(|slot| serde_json::to_value(slot).map_err(|e| AppError::Internal(e.into())))?;
    let is_cod = payload.payment_method.is_cod();

    let mut created = Vec::with_capacity(groups.len());

    for (group, share) in groups.into_iter().zip(shares) {
        let farmer_id = Farms::find_by_id(group.farm_id)
            .one(&txn)
            .await?
            .map(|farm| farm.owner_id);

        let code = is_cod.then(verification::generate_code);
        let now = Utc::now();

        let order = OrderActive {
            id: Set(Uuid::new_v4()),
            buyer_id: Set(principal.user_id),
            farm_id: Set(group.farm_id),
            farmer_id: Set(farmer_id),
            total_amount: Set(group.subtotal),
            discount: Set(share),
            discount_code: Set(code_for_share(discount_code.clone(), share)),
            delivery_type: Set(payload.delivery_type.as_str().to_string()),
            delivery_address: Set(delivery_address.clone()),
            delivery_slot: Set(delivery_slot.clone()),
            payment_method: Set(payload.payment_method.as_str().to_string()),
            payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
            order_status: Set(OrderStatus::Placed.as_str().to_string()),
            verification_code: Set(code.clone()),
            code_generated_at: Set(code.as_ref().map(|_| now.into())),
            code_verified: Set(false),
            code_verified_at: Set(None),
            verification_required: Set(is_cod),
            delivery_verified: Set(false),
            delivery_verified_by: Set(None),
            delivery_verified_at: Set(None),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(group.items.len());
        for (position, line) in group.items.into_iter().enumerate() {
            let item = OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                product_name: Set(line.product_name),
                quantity: Set(line.quantity),
                price: Set(line.price),
                unit: Set(line.unit),
                position: Set(position as i32),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        let history = vec![append_history(&txn, order.id, OrderStatus::Placed).await?];

        if let Some(code) = &code {
            outbox::enqueue(
                &txn,
                OutboxEvent::verification_code(principal.user_id, order.id, code, false),
            )
            .await?;
        }
        if let Some(farmer_id) = farmer_id {
            outbox::enqueue(
                &txn,
                OutboxEvent::new_order(farmer_id, order.id, order.total_amount, order.delivery_address.as_ref()),
            )
            .await?;
        }

        tracing::info!(
            order_id = %order.id,
            buyer_id = %principal.user_id,
            farm_id = %order.farm_id,
            total_amount = order.total_amount,
            discount = order.discount,
            "order created"
        );
        created.push((order, items, history));
    }

    let mut clear = CartItems::delete_many().filter(CartCol::UserId.eq(principal.user_id));
    if !payload.cart_ids.is_empty() {
        clear = clear.filter(CartCol::Id.is_in(payload.cart_ids.clone()));
    }
    clear.exec(&txn).await?;

    txn.commit().await?;

    let orders = created
        .into_iter()
        .map(|(order, items, history)| Order::from_parts(order, items, history, true))
        .collect::<AppResult<Vec<_>>>()?;

    let message = if orders.len() > 1 {
        format!("{} orders created", orders.len())
    } else {
        "Order created".to_string()
    };

    Ok(ApiResponse::success(
        message,
        CheckoutResult::from_orders(orders),
        Some(Meta::empty()),
    ))
}

/// The submitted discount code, when it is one we honour.
fn known_code(payload: &CreateOrderRequest) -> Option<String> {
    payload
        .discount_code
        .as_deref()
        .map(str::trim)
        .filter(|c| discount::code_percentage(c).is_some())
        .map(str::to_string)
}

fn code_for_share(code: Option<String>, share: i64) -> Option<String> {
    code.filter(|_| share > 0)
}

pub async fn list_buyer_orders(
    state: &AppState,
    principal: &Principal,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let finder = Orders::find().filter(OrderCol::BuyerId.eq(principal.user_id));
    paginate_orders(state, principal, finder, &query).await
}

pub async fn list_farm_orders(
    state: &AppState,
    principal: &Principal,
    farm_id: Uuid,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let farm = Farms::find_by_id(farm_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Farm"))?;

    let allowed = principal.is_admin()
        || principal.farm_id == Some(farm.id)
        || owns_farm(principal, Some(farm.owner_id));
    if !allowed {
        return Err(AppError::forbidden());
    }

    let finder = Orders::find().filter(OrderCol::FarmId.eq(farm.id));
    paginate_orders(state, principal, finder, &query).await
}

/// Orders assigned to the calling farmer. Orders created before the farmer was recorded
/// on the order are found through the farms the caller owns.
pub async fn list_farmer_orders(
    state: &AppState,
    principal: &Principal,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_role(principal, Role::Farmer)?;

    let assigned = Orders::find()
        .filter(OrderCol::FarmerId.eq(principal.user_id))
        .count(&state.orm)
        .await?;

    if assigned > 0 {
        let finder = Orders::find().filter(OrderCol::FarmerId.eq(principal.user_id));
        return paginate_orders(state, principal, finder, &query).await;
    }

    let farm_ids: Vec<Uuid> = Farms::find()
        .filter(FarmCol::OwnerId.eq(principal.user_id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|farm| farm.id)
        .collect();

    tracing::debug!(
        farmer_id = %principal.user_id,
        farms = farm_ids.len(),
        "no assigned orders, falling back to owned farms"
    );

    let finder = Orders::find().filter(OrderCol::FarmId.is_in(farm_ids));
    paginate_orders(state, principal, finder, &query).await
}

async fn paginate_orders(
    state: &AppState,
    principal: &Principal,
    finder: Select<Orders>,
    query: &OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::OrderStatus.eq(status.as_str()));
    }
    let finder = finder.filter(condition).order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = order_views(&state.orm, orders, principal).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let parties = parties(&order);
    if !parties.is_buyer(principal) {
        ensure_farm_side(&state.orm, &parties, principal).await?;
    }

    let view = order_view(&state.orm, order, principal).await?;
    Ok(ApiResponse::success("OK", view, Some(Meta::empty())))
}

pub async fn update_order_status(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = lock_order(&txn, id).await?;
    ensure_farm_side(&txn, &parties(&order), principal).await?;

    let current: OrderStatus = stored(&order.order_status)?;
    let next = payload.status;
    current.ensure_transition(next)?;

    let payment_method: PaymentMethod = stored(&order.payment_method)?;
    if next == OrderStatus::Delivered && payment_method.is_cod() && !order.delivery_verified {
        return Err(AppError::BadRequest(
            "COD orders must be verified with the code before marking as delivered".into(),
        ));
    }

    if next == OrderStatus::Cancelled {
        restore_stock(&txn, order.id).await?;
    }

    let mut active: OrderActive = order.into();
    active.order_status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    append_history(&txn, order.id, next).await?;

    if next == OrderStatus::Ready {
        let delivery_type: DeliveryType = stored(&order.delivery_type)?;
        outbox::enqueue(
            &txn,
            OutboxEvent::order_ready(order.buyer_id, order.id, delivery_type, order.total_amount),
        )
        .await?;
    }

    let view = order_view(&txn, order, principal).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %id,
        from = %current,
        to = %next,
        by = %principal.user_id,
        "order status updated"
    );

    Ok(ApiResponse::success(
        "Order status updated",
        view,
        Some(Meta::empty()),
    ))
}

pub async fn cancel_order(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = lock_order(&txn, id).await?;
    if !parties(&order).is_buyer(principal) {
        return Err(AppError::forbidden());
    }

    match stored::<OrderStatus>(&order.order_status)? {
        OrderStatus::Delivered => {
            return Err(AppError::BadRequest("Cannot cancel a delivered order".into()));
        }
        OrderStatus::Cancelled => {
            return Err(AppError::BadRequest("Order is already cancelled".into()));
        }
        _ => {}
    }

    restore_stock(&txn, order.id).await?;

    let mut active: OrderActive = order.into();
    active.order_status = Set(OrderStatus::Cancelled.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    append_history(&txn, order.id, OrderStatus::Cancelled).await?;

    let view = order_view(&txn, order, principal).await?;
    txn.commit().await?;

    tracing::info!(order_id = %id, buyer_id = %principal.user_id, "order cancelled");

    Ok(ApiResponse::success(
        "Order cancelled successfully",
        view,
        Some(Meta::empty()),
    ))
}

pub async fn update_delivery_address(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
    payload: UpdateAddressRequest,
) -> AppResult<ApiResponse<Order>> {
    payload.delivery_address.validate()?;

    let txn = state.orm.begin().await?;

    let order = lock_order(&txn, id).await?;
    if !(parties(&order).is_buyer(principal) || principal.is_admin()) {
        return Err(AppError::forbidden());
    }

    let status: OrderStatus = stored(&order.order_status)?;
    if status.is_terminal() {
        return Err(AppError::BadRequest(format!(
            "Cannot update address for {status} orders"
        )));
    }

    let address =
        serde_json::to_value(&payload.delivery_address).map_err(|e| AppError::Internal(e.into()))?;
    let buyer_id = order.buyer_id;

    let mut active: OrderActive = order.into();
    active.delivery_address = Set(Some(address));
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    outbox::enqueue(&txn, OutboxEvent::address_updated(buyer_id, order.id)).await?;

    let view = order_view(&txn, order, principal).await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Delivery address updated",
        view,
        Some(Meta::empty()),
    ))
}

pub(crate) fn parties(order: &OrderModel) -> OrderParties {
    OrderParties {
        buyer_id: order.buyer_id,
        farm_id: order.farm_id,
        farmer_id: order.farmer_id,
    }
}

/// Admin, the recorded farmer, a session on the order's farm, or the farm's current owner.
pub(crate) async fn ensure_farm_side<C: ConnectionTrait>(
    db: &C,
    parties: &OrderParties,
    principal: &Principal,
) -> AppResult<()> {
    if parties.is_farm_side(principal) {
        return Ok(());
    }
    let owner = Farms::find_by_id(parties.farm_id)
        .one(db)
        .await?
        .map(|farm| farm.owner_id);
    if owns_farm(principal, owner) {
        return Ok(());
    }
    Err(AppError::forbidden())
}

pub(crate) async fn lock_order<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

pub(crate) async fn append_history<C: ConnectionTrait>(
    db: &C,
    order_id: Uuid,
    status: OrderStatus,
) -> AppResult<HistoryModel> {
    let entry = HistoryActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        status: Set(status.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(db)
    .await?;
    Ok(entry)
}

/// Put every item's quantity back on its product. Products deleted since checkout are skipped.
async fn restore_stock<C: ConnectionTrait>(db: &C, order_id: Uuid) -> AppResult<()> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(db)
        .await?;

    for item in items {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::value(Utc::now()))
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(db)
            .await?;
    }
    Ok(())
}

pub(crate) async fn order_view<C: ConnectionTrait>(
    db: &C,
    order: OrderModel,
    principal: &Principal,
) -> AppResult<Order> {
    order_views(db, vec![order], principal)
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Order"))
}

/// Load items and history for a page of orders in two queries.
async fn order_views<C: ConnectionTrait>(
    db: &C,
    orders: Vec<OrderModel>,
    principal: &Principal,
) -> AppResult<Vec<Order>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();

    let mut items: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
    for item in OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(ids.clone()))
        .order_by_asc(OrderItemCol::Position)
        .all(db)
        .await?
    {
        items.entry(item.order_id).or_default().push(item);
    }

    let mut history: HashMap<Uuid, Vec<HistoryModel>> = HashMap::new();
    for entry in OrderStatusHistory::find()
        .filter(HistoryCol::OrderId.is_in(ids))
        .order_by_asc(HistoryCol::CreatedAt)
        .all(db)
        .await?
    {
        history.entry(entry.order_id).or_default().push(entry);
    }

    orders
        .into_iter()
        .map(|order| {
            let id = order.id;
            let reveal = order.buyer_id == principal.user_id;
            Order::from_parts(
                order,
                items.remove(&id).unwrap_or_default(),
                history.remove(&id).unwrap_or_default(),
                reveal,
            )
        })
        .collect()
}
