pub mod cost;
pub mod decision;
pub mod endpoint;
pub mod quote;
