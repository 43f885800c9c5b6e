pub mod validator;

pub use validator::{PriceConsensusValidator, ValidatorStatistics};
