use crate::domain::card::CardInput;
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::payment::{DEFAULT_CURRENCY, NewPayment, Payment, PaymentMethod};
use crate::domain::ports::{
    AuthDecision, CheckoutTx, GatewayBox, OrderStoreBox, PaymentStoreBox, UnitOfWorkBox,
};
use crate::error::{PaymentError, Result};

/// Failure code recorded when the stock re-check under lock comes up short.
pub const ERROR_OUT_OF_STOCK: &str = "out_of_stock";
/// Failure code recorded on an attempt that lost the race against a
/// concurrent capture of the same order.
pub const ERROR_ALREADY_PAID: &str = "already_paid";
/// Failure code recorded when the order left the payable state mid-flight.
pub const ERROR_NOT_PAYABLE: &str = "order_not_payable";

/// Result of a processed payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    /// Authorization succeeded and stock was captured in the same
    /// transaction.
    Approved { payment: Payment },
    /// The order was already paid; the existing captured payment is returned
    /// untouched.
    AlreadyPaid { payment: Payment },
    /// The attempt was recorded and failed: gateway decline or stock
    /// shortfall. The order stays payable.
    Declined { payment: Payment },
}

impl PaymentOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            Self::Approved { payment } | Self::AlreadyPaid { payment } | Self::Declined { payment } => {
                payment
            }
        }
    }

    /// True when the order ended up (or already was) paid.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Declined { .. })
    }
}

/// The main entry point for paying orders.
///
/// `PaymentProcessor` owns the storage ports and the authorization gateway.
/// Callers must not bypass it to mutate stock or order status directly; the
/// capture transaction is the only place those writes happen.
pub struct PaymentProcessor {
    orders: OrderStoreBox,
    payments: PaymentStoreBox,
    unit_of_work: UnitOfWorkBox,
    gateway: GatewayBox,
}

impl PaymentProcessor {
    pub fn new(
        orders: OrderStoreBox,
        payments: PaymentStoreBox,
        unit_of_work: UnitOfWorkBox,
        gateway: GatewayBox,
    ) -> Self {
        Self {
            orders,
            payments,
            unit_of_work,
            gateway,
        }
    }

    /// Processes one payment attempt for the order.
    ///
    /// Card validation failures surface as `PaymentError::CardRejected` before
    /// any payment row exists. Gateway declines and stock shortfalls settle
    /// the attempt as a failed payment and return `PaymentOutcome::Declined`;
    /// the order stays pending and may be retried. An order that is already
    /// paid short-circuits to its existing captured payment.
    pub async fn process_payment(
        &self,
        order_id: OrderId,
        card: CardInput,
    ) -> Result<PaymentOutcome> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;

        // Idempotency gate: double submissions resolve to the existing
        // payment instead of reprocessing.
        match order.status {
            OrderStatus::Paid => return self.replay(order_id).await,
            OrderStatus::Canceled => {
                return Err(PaymentError::OrderNotPayable {
                    order: order_id,
                    status: order.status,
                });
            }
            OrderStatus::Pending => {}
        }

        let details = card.validate()?;

        // Only safe derivatives reach storage; the PAN stays in `details`
        // until the authorization call and the CVV is already gone.
        let mut payment = self
            .payments
            .create(NewPayment {
                order: order.id,
                amount: order.total_amount,
                currency: DEFAULT_CURRENCY.to_string(),
                method: PaymentMethod::Card,
                brand: details.brand,
                last4: details.last4().to_string(),
            })
            .await?;

        let decision = self
            .gateway
            .authorize(&details.number, order.total_amount, &payment.currency)
            .await?;

        match decision {
            AuthDecision::Declined {
                error_code,
                message,
            } => {
                payment.fail(&error_code, &message)?;
                self.payments.update(&payment).await?;
                tracing::info!(
                    order = order_id,
                    payment = payment.id,
                    code = %error_code,
                    "authorization declined"
                );
                Ok(PaymentOutcome::Declined { payment })
            }
            AuthDecision::Approved { auth_code } => {
                self.capture(order_id, payment, &auth_code).await
            }
        }
    }

    /// Capture: one atomic transaction locking the order row and every
    /// affected product row, re-validating stock under lock, then writing the
    /// decrements, the captured payment and the paid order together.
    async fn capture(
        &self,
        order_id: OrderId,
        mut payment: Payment,
        auth_code: &str,
    ) -> Result<PaymentOutcome> {
        let mut tx = self.unit_of_work.begin().await?;

        let mut order = tx
            .order_for_update(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;

        // Re-check under the row lock: a concurrent attempt may have captured
        // the order after our gate check.
        if order.status != OrderStatus::Pending {
            drop(tx);
            return self.settle_unpayable(order, payment).await;
        }

        match self.reserve_stock(tx.as_mut(), &order).await? {
            StockCheck::Short(shortfalls) => {
                drop(tx);
                let message = format!("insufficient stock for: {}", shortfalls.join(", "));
                payment.fail(ERROR_OUT_OF_STOCK, &message)?;
                self.payments.update(&payment).await?;
                tracing::warn!(
                    order = order_id,
                    payment = payment.id,
                    %message,
                    "capture aborted"
                );
                Ok(PaymentOutcome::Declined { payment })
            }
            StockCheck::Satisfiable => {
                payment.capture(auth_code)?;
                tx.save_payment(&payment).await?;
                order.mark_paid()?;
                tx.save_order(&order).await?;
                tx.commit().await?;
                tracing::info!(
                    order = order_id,
                    payment = payment.id,
                    amount = %payment.amount,
                    "payment captured"
                );
                Ok(PaymentOutcome::Approved { payment })
            }
        }
    }

    /// Locks every distinct product in ascending id order and validates the
    /// aggregated quantities, then stages the decrements. Stock is never read
    /// for the decision without holding its lock.
    async fn reserve_stock(&self, tx: &mut dyn CheckoutTx, order: &Order) -> Result<StockCheck> {
        let requirements = order.stock_requirements();
        let mut shortfalls = Vec::new();
        for &(product_id, required) in &requirements {
            match tx.product_for_update(product_id).await? {
                None => shortfalls.push(format!("product {} does not exist", product_id)),
                Some(product) => {
                    if !product.can_fulfill(required) {
                        shortfalls.push(format!(
                            "{} (stock: {}, required: {})",
                            product.name, product.stock_quantity, required
                        ));
                    }
                }
            }
        }
        if !shortfalls.is_empty() {
            return Ok(StockCheck::Short(shortfalls));
        }
        for &(product_id, required) in &requirements {
            tx.decrement_stock(product_id, required).await?;
        }
        Ok(StockCheck::Satisfiable)
    }

    /// The order stopped being payable between the gate check and the row
    /// lock. The stray initiated payment is settled as failed (audit trail of
    /// the attempt) and, for a paid order, the call resolves to the winning
    /// payment.
    async fn settle_unpayable(
        &self,
        order: Order,
        mut payment: Payment,
    ) -> Result<PaymentOutcome> {
        if order.status == OrderStatus::Paid {
            payment.fail(ERROR_ALREADY_PAID, "order was already paid")?;
            self.payments.update(&payment).await?;
            self.replay(order.id).await
        } else {
            payment.fail(ERROR_NOT_PAYABLE, "order is no longer payable")?;
            self.payments.update(&payment).await?;
            Err(PaymentError::OrderNotPayable {
                order: order.id,
                status: order.status,
            })
        }
    }

    /// Idempotent replay: the order is paid, return its captured payment.
    async fn replay(&self, order_id: OrderId) -> Result<PaymentOutcome> {
        let payment = self
            .payments
            .captured_for_order(order_id)
            .await?
            .ok_or(PaymentError::PaymentMissing(order_id))?;
        Ok(PaymentOutcome::AlreadyPaid { payment })
    }
}

enum StockCheck {
    Satisfiable,
    Short(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::CardBrand;
    use crate::domain::money::Amount;
    use crate::domain::order::OrderItem;
    use crate::domain::payment::PaymentStatus;
    use crate::domain::ports::{OrderStore, PaymentStore, ProductStore};
    use crate::domain::product::Product;
    use crate::infrastructure::in_memory::InMemoryStore;
    use crate::infrastructure::simulator::SimulatedGateway;
    use rust_decimal_macros::dec;

    fn processor(store: &InMemoryStore) -> PaymentProcessor {
        PaymentProcessor::new(
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(SimulatedGateway),
        )
    }

    async fn seed(store: &InMemoryStore, stock: u32, quantity: u32) {
        let price = Amount::new(dec!(150000)).unwrap();
        ProductStore::insert(
            store,
            Product {
                id: 1,
                name: "Mechanical Keyboard".to_string(),
                price,
                stock_quantity: stock,
            },
        )
        .await
        .unwrap();
        let order = Order::new(
            1,
            1,
            vec![OrderItem {
                product: 1,
                quantity,
                unit_price: price,
            }],
        )
        .unwrap();
        OrderStore::insert(store, order).await.unwrap();
    }

    fn card(number: &str) -> CardInput {
        CardInput {
            cardholder_name: "Ada Lovelace".to_string(),
            number: number.to_string(),
            expiry: "12/99".to_string(),
            cvv: "123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_capture_decrements_stock_and_marks_paid() {
        let store = InMemoryStore::new();
        seed(&store, 5, 3).await;
        let processor = processor(&store);

        let outcome = processor
            .process_payment(1, card("4111111111111111"))
            .await
            .unwrap();

        let payment = outcome.payment();
        assert!(matches!(outcome, PaymentOutcome::Approved { .. }));
        assert_eq!(payment.status, PaymentStatus::Captured);
        assert_eq!(payment.auth_code.as_deref(), Some("A1111OK"));
        assert_eq!(payment.brand, CardBrand::Visa);
        assert_eq!(payment.last4, "1111");
        assert_eq!(payment.amount.value(), dec!(450000));

        let product = ProductStore::get(&store, 1).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 2);
        let order = OrderStore::get(&store, 1).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_decline_leaves_stock_and_order_untouched() {
        let store = InMemoryStore::new();
        seed(&store, 5, 3).await;
        let processor = processor(&store);

        let outcome = processor
            .process_payment(1, card("4700000000000005"))
            .await
            .unwrap();

        assert!(!outcome.is_success());
        let payment = outcome.payment();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.error_code.as_deref(), Some("insufficient_funds"));

        let product = ProductStore::get(&store, 1).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 5);
        let order = OrderStore::get(&store, 1).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_stock_shortfall_fails_payment_and_rolls_back() {
        let store = InMemoryStore::new();
        seed(&store, 1, 2).await;
        let processor = processor(&store);

        let outcome = processor
            .process_payment(1, card("4111111111111111"))
            .await
            .unwrap();

        let payment = outcome.payment();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.error_code.as_deref(), Some(ERROR_OUT_OF_STOCK));
        assert_eq!(
            payment.error_message.as_deref(),
            Some("insufficient stock for: Mechanical Keyboard (stock: 1, required: 2)")
        );

        let product = ProductStore::get(&store, 1).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 1);
        let order = OrderStore::get(&store, 1).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_replay_returns_existing_payment() {
        let store = InMemoryStore::new();
        seed(&store, 5, 3).await;
        let processor = processor(&store);

        let first = processor
            .process_payment(1, card("4111111111111111"))
            .await
            .unwrap();
        let second = processor
            .process_payment(1, card("4111111111111111"))
            .await
            .unwrap();

        assert!(matches!(second, PaymentOutcome::AlreadyPaid { .. }));
        assert_eq!(second.payment().id, first.payment().id);

        // No second payment row, and stock decremented exactly once.
        let latest = store.latest_for_order(1).await.unwrap().unwrap();
        assert_eq!(latest.id, first.payment().id);
        let product = ProductStore::get(&store, 1).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 2);
    }

    #[tokio::test]
    async fn test_retry_after_decline_can_capture() {
        let store = InMemoryStore::new();
        seed(&store, 5, 3).await;
        let processor = processor(&store);

        let declined = processor
            .process_payment(1, card("4400000000003333"))
            .await
            .unwrap();
        assert_eq!(
            declined.payment().error_code.as_deref(),
            Some("do_not_honor")
        );

        let retried = processor
            .process_payment(1, card("4111111111111111"))
            .await
            .unwrap();
        assert!(matches!(retried, PaymentOutcome::Approved { .. }));
        assert_ne!(retried.payment().id, declined.payment().id);

        let product = ProductStore::get(&store, 1).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 2);
    }

    #[tokio::test]
    async fn test_validation_failure_creates_no_payment() {
        let store = InMemoryStore::new();
        seed(&store, 5, 3).await;
        let processor = processor(&store);

        let err = processor
            .process_payment(1, card("4111111111111112"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::CardRejected(_)));

        assert!(store.latest_for_order(1).await.unwrap().is_none());
        let product = ProductStore::get(&store, 1).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 5);
    }

    #[tokio::test]
    async fn test_canceled_order_is_not_payable() {
        let store = InMemoryStore::new();
        seed(&store, 5, 3).await;
        let mut order = OrderStore::get(&store, 1).await.unwrap().unwrap();
        order.cancel().unwrap();
        OrderStore::insert(&store, order).await.unwrap();
        let processor = processor(&store);

        let err = processor
            .process_payment(1, card("4111111111111111"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::OrderNotPayable {
                order: 1,
                status: OrderStatus::Canceled
            }
        ));
        assert!(store.latest_for_order(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let store = InMemoryStore::new();
        let processor = processor(&store);
        let err = processor
            .process_payment(42, card("4111111111111111"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::OrderNotFound(42)));
    }

    #[tokio::test]
    async fn test_shortfall_message_lists_every_short_product() {
        let store = InMemoryStore::new();
        let price = Amount::new(dec!(1000)).unwrap();
        for (id, stock) in [(1u64, 1u32), (2, 0)] {
            ProductStore::insert(
                &store,
                Product {
                    id,
                    name: format!("Gadget {}", id),
                    price,
                    stock_quantity: stock,
                },
            )
            .await
            .unwrap();
        }
        let order = Order::new(
            7,
            1,
            vec![
                OrderItem {
                    product: 1,
                    quantity: 2,
                    unit_price: price,
                },
                OrderItem {
                    product: 2,
                    quantity: 1,
                    unit_price: price,
                },
                OrderItem {
                    product: 3,
                    quantity: 1,
                    unit_price: price,
                },
            ],
        )
        .unwrap();
        OrderStore::insert(&store, order).await.unwrap();
        let processor = processor(&store);

        let outcome = processor
            .process_payment(7, card("4111111111111111"))
            .await
            .unwrap();
        let message = outcome.payment().error_message.clone().unwrap();
        assert!(message.contains("Gadget 1 (stock: 1, required: 2)"));
        assert!(message.contains("Gadget 2 (stock: 0, required: 1)"));
        assert!(message.contains("product 3 does not exist"));
    }
}
