pub mod cart;
pub mod farms;
pub mod orders;
pub mod products;
