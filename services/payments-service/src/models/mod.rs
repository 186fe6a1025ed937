pub mod account;
pub mod payment_transaction;

pub use account::Account;
pub use payment_transaction::PaymentTransaction;
