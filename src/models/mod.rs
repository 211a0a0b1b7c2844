// Re-export all model types
pub use self::cart::*;
pub use self::category::*;
pub use self::errors::*;
pub use self::product::*;

mod cart;
mod category;
mod errors;
mod product;
