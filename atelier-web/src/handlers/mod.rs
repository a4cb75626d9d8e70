pub mod app;
pub mod auth;
pub mod cron;
pub mod customers;
pub mod dashboard;
pub mod debug;
pub mod metrics;
pub mod projects;
pub mod public;
pub mod webhooks;
