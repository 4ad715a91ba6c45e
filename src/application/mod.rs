//! Application layer containing the checkout orchestration.
//!
//! This module defines the `PaymentProcessor`, the single entry point for
//! paying an order. It ties card validation, gateway authorization, payment
//! persistence and inventory mutation into one failure-safe operation.

pub mod processor;
