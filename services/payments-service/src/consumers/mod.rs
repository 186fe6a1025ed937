pub mod payment_requests;
