pub mod changelog;
pub mod charts;
pub mod collector;
pub mod config;
pub mod database;
pub mod forecast;
pub mod issue;
pub mod jira_client;
pub mod jira_types;
pub mod metrics;
pub mod models;
pub mod renderer;
pub mod report;
pub mod routes;
pub mod sprint;
