pub mod apply;
pub mod calendar;
pub mod check;
pub mod conflict;
pub mod plan;
pub mod query;
pub mod reconcile;
pub mod resolve;
pub mod similar;
pub mod tree;
