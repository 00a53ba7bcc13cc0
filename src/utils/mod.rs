pub mod overrides;
pub mod payload;
