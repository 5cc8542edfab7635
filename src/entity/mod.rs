pub mod awards;
pub mod disputes;
pub mod eco_ledger_entries;
pub mod order_reviews;
pub mod orders;
pub mod products;
pub mod user_strikes;
pub mod users;

pub use awards::Entity as Awards;
pub use disputes::Entity as Disputes;
pub use eco_ledger_entries::Entity as EcoLedgerEntries;
pub use order_reviews::Entity as OrderReviews;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use user_strikes::Entity as UserStrikes;
pub use users::Entity as Users;
