pub mod admin_service;
pub mod award_service;
pub mod catalog_service;
pub mod dispute_service;
pub mod eco_service;
pub mod fulfillment_service;
pub mod gateway;
pub mod ledger_service;
pub mod notification;
pub mod order_service;
pub mod order_store;
pub mod payment_service;
pub mod policy;
pub mod pricing;
pub mod review_service;
