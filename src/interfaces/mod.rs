pub mod cost_source;
pub mod price_source;
pub mod probe;

pub use cost_source::CostSource;
pub use price_source::PriceSource;
pub use probe::EndpointProbe;
