pub mod statistics;
pub mod scale;
pub mod geo;
pub mod aviation;
