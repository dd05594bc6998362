use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    domain::{
        geo::GeoPoint,
        status::{DeliveryType, OrderStatus, PaymentMethod, PaymentStatus},
    },
    dto::{
        cart::{AddToCartRequest, CartItemDto, CartList},
        farms::CreateFarmRequest,
        orders::{
            CheckoutResult, CreateOrderRequest, MultiOrder, OrderItemRequest, OrderList,
            RegenerateCodeResponse, UpdateAddressRequest, UpdateOrderStatusRequest,
            VerifyDeliveryRequest, VerifyDeliveryResponse,
        },
        products::{
            CertifiedProduct, CertifiedProductList, CreateProductRequest, FarmSummary,
            NearbyProduct, NearbyProducts, ProductList, SearchProduct, SearchProductList,
            UpdateProductRequest,
        },
    },
    models::{
        CartItem, DeliveryAddress, DeliverySlot, DeliveryVerification, Farm, Order, OrderItem,
        Product, StatusEntry, VerificationCodeInfo,
    },
    response::{ApiResponse, Meta},
    routes::{cart, farms, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        farms::create_farm,
        farms::my_farm,
        farms::get_farm,
        products::nearby_products,
        products::search_products,
        products::top_certified,
        products::my_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::create_order,
        orders::list_my_orders,
        orders::list_farmer_orders,
        orders::list_farm_orders,
        orders::get_order,
        orders::update_order_status,
        orders::cancel_order,
        orders::verify_delivery,
        orders::regenerate_code,
        orders::update_delivery_address
    ),
    components(
        schemas(
            GeoPoint,
            OrderStatus,
            PaymentMethod,
            PaymentStatus,
            DeliveryType,
            Farm,
            Product,
            CartItem,
            Order,
            OrderItem,
            StatusEntry,
            DeliveryAddress,
            DeliverySlot,
            DeliveryVerification,
            VerificationCodeInfo,
            AddToCartRequest,
            CartItemDto,
            CartList,
            CreateFarmRequest,
            CreateOrderRequest,
            OrderItemRequest,
            CheckoutResult,
            MultiOrder,
            OrderList,
            UpdateOrderStatusRequest,
            VerifyDeliveryRequest,
            VerifyDeliveryResponse,
            RegenerateCodeResponse,
            UpdateAddressRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            FarmSummary,
            NearbyProduct,
            NearbyProducts,
            SearchProduct,
            SearchProductList,
            CertifiedProduct,
            CertifiedProductList,
            params::SearchSortBy,
            Meta,
            ApiResponse<Product>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<CheckoutResult>,
            ApiResponse<NearbyProducts>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product catalogue and discovery"),
        (name = "Farms", description = "Farm profiles"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout, order lifecycle and delivery verification"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let spec = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/orders",
            "/api/orders/verify",
            "/api/orders/{id}/regenerate-code",
            "/api/products/nearby",
            "/api/products/search",
            "/api/farms",
        ] {
            assert!(spec.paths.paths.contains_key(path), "{path} missing from docs");
        }
    }
}
