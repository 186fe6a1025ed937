pub mod payment_results;
