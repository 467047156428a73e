pub mod timeseries;
pub mod features;
pub mod pipeline;
pub mod scheduler;
