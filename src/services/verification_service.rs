//! Cash-on-delivery handover: checking the buyer's one-time code and issuing new ones.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use uuid::Uuid;

use crate::{
    domain::{
        status::{OrderStatus, PaymentMethod, PaymentStatus},
        verification::{self, CodeState},
    },
    dto::orders::{RegenerateCodeResponse, VerifyDeliveryRequest, VerifyDeliveryResponse},
    entity::orders::{ActiveModel as OrderActive, Model as OrderModel},
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::{DeliveryVerification, stored},
    outbox::{self, OutboxEvent},
    response::{ApiResponse, Meta},
    services::order_service::{append_history, ensure_farm_side, lock_order, parties},
    state::AppState,
};

fn code_state(order: &OrderModel) -> AppResult<CodeState<'_>> {
    Ok(CodeState {
        required: order.verification_required,
        delivery_verified: order.delivery_verified,
        status: stored(&order.order_status)?,
        code: order.verification_code.as_deref(),
        code_verified: order.code_verified,
        generated_at: order.code_generated_at.map(|dt| dt.with_timezone(&Utc)),
    })
}

pub async fn verify_delivery(
    state: &AppState,
    principal: &Principal,
    payload: VerifyDeliveryRequest,
) -> AppResult<ApiResponse<VerifyDeliveryResponse>> {
    payload.validate()?;
    let submitted = payload.verification_code.trim().to_ascii_uppercase();

    let txn = state.orm.begin().await?;

    let order = lock_order(&txn, payload.order_id).await?;
    let parties = parties(&order);
    if !parties.is_buyer(principal) {
        ensure_farm_side(&txn, &parties, principal).await?;
    }

    let now = Utc::now();
    if let Err(err) = code_state(&order)?.check_submission(&submitted, now) {
        tracing::warn!(
            order_id = %order.id,
            by = %principal.user_id,
            reason = err.reason(),
            "delivery verification rejected"
        );
        return Err(err.into());
    }

    let payment_method: PaymentMethod = stored(&order.payment_method)?;

    let mut active: OrderActive = order.into();
    active.code_verified = Set(true);
    active.code_verified_at = Set(Some(now.into()));
    active.delivery_verified = Set(true);
    active.delivery_verified_by = Set(Some(principal.role.as_str().to_string()));
    active.delivery_verified_at = Set(Some(now.into()));
    active.order_status = Set(OrderStatus::Delivered.as_str().to_string());
    if payment_method.is_cod() {
        active.payment_status = Set(PaymentStatus::Paid.as_str().to_string());
    }
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    append_history(&txn, order.id, OrderStatus::Delivered).await?;
    outbox::enqueue(&txn, OutboxEvent::order_delivered(order.buyer_id, order.id)).await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        by = %principal.user_id,
        role = %principal.role,
        "delivery verified"
    );

    Ok(ApiResponse::success(
        "Order delivered and verified successfully",
        VerifyDeliveryResponse {
            order_id: order.id,
            status: OrderStatus::Delivered,
            verification: DeliveryVerification::from_entity(&order),
        },
        Some(Meta::empty()),
    ))
}

pub async fn regenerate_code(
    state: &AppState,
    principal: &Principal,
    order_id: Uuid,
) -> AppResult<ApiResponse<RegenerateCodeResponse>> {
    let txn = state.orm.begin().await?;

    let order = lock_order(&txn, order_id).await?;
    let parties = parties(&order);
    let is_buyer = parties.is_buyer(principal);
    if !(is_buyer || parties.is_assigned_farmer(principal)) {
        return Err(AppError::forbidden());
    }

    code_state(&order)?.check_regeneration()?;

    let code = verification::generate_code();
    let now = Utc::now();
    let buyer_id = order.buyer_id;

    let mut active: OrderActive = order.into();
    active.verification_code = Set(Some(code.clone()));
    active.code_generated_at = Set(Some(now.into()));
    active.code_verified = Set(false);
    active.code_verified_at = Set(None);
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    outbox::enqueue(
        &txn,
        OutboxEvent::verification_code(buyer_id, order.id, &code, true),
    )
    .await?;

    txn.commit().await?;

    tracing::info!(order_id = %order.id, by = %principal.user_id, "verification code regenerated");

    Ok(ApiResponse::success(
        "New verification code generated",
        RegenerateCodeResponse {
            code: is_buyer.then_some(code),
        },
        Some(Meta::empty()),
    ))
}
