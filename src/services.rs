pub mod inventory;
pub mod ledger;
pub mod onboarding;
pub mod referral;

mod coordinator;

pub use coordinator::{CollectionView, PurchaseReceipt, SaleReceipt, TransactionCoordinator};
