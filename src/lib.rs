pub mod app;
#[cfg(test)]
mod app_test;
pub mod config;
pub mod grafana;
pub mod metrics;
#[cfg(test)]
mod metrics_test;
pub mod sync;
