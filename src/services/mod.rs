pub mod cart_service;
pub mod discovery_service;
pub mod farm_service;
pub mod order_service;
pub mod product_service;
pub mod verification_service;
