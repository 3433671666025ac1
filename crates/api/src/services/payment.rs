//! Payment participant.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use msg::{ReplyPublisher, with_reply, with_success};
use saga::{CommandDispatcher, SagaCommand, StepError};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::fulfillment::{AuthorizePayment, PaymentAuthorized, VoidPayment};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Authorization {
    order_id: Uuid,
    customer_id: Uuid,
    amount_cents: i64,
}

#[derive(Debug, Default)]
struct PaymentState {
    authorizations: HashMap<String, Authorization>,
    next_id: u32,
}

/// In-memory payment service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<PaymentState>>,
    fail_on_authorize: Arc<AtomicBool>,
}

impl InMemoryPaymentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following authorization fail until reset.
    pub fn set_fail_on_authorize(&self, fail: bool) {
        self.fail_on_authorize.store(fail, Ordering::SeqCst);
    }

    /// Number of live authorizations.
    pub async fn authorization_count(&self) -> usize {
        self.state.read().await.authorizations.len()
    }

    pub async fn authorize(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
        amount_cents: i64,
    ) -> Result<String, StepError> {
        if self.fail_on_authorize.load(Ordering::SeqCst) {
            return Err(StepError::new("payment declined"));
        }
        if amount_cents <= 0 {
            return Err(StepError::new(format!("invalid amount: {amount_cents}")));
        }

        let mut state = self.state.write().await;
        state.next_id += 1;
        let payment_id = format!("PAY-{:04}", state.next_id);
        state.authorizations.insert(
            payment_id.clone(),
            Authorization {
                order_id,
                customer_id,
                amount_cents,
            },
        );

        tracing::debug!(%order_id, payment_id, amount_cents, "Payment authorized");
        Ok(payment_id)
    }

    /// Voids an authorization. Unknown ids are ignored.
    pub async fn void(&self, payment_id: &str) {
        if let Some(authorization) = self.state.write().await.authorizations.remove(payment_id) {
            tracing::debug!(
                order_id = %authorization.order_id,
                customer_id = %authorization.customer_id,
                payment_id,
                "Payment voided"
            );
        }
    }

    /// Builds the dispatcher answering payment commands.
    pub fn dispatcher<P: ReplyPublisher>(&self, publisher: P) -> CommandDispatcher<P> {
        let authorize = self.clone();
        let void = self.clone();

        CommandDispatcher::new(publisher)
            .handle(move |cmd: SagaCommand<AuthorizePayment>| {
                let service = authorize.clone();
                async move {
                    let AuthorizePayment {
                        order_id,
                        customer_id,
                        amount_cents,
                    } = cmd.into_command();
                    let payment_id = service
                        .authorize(order_id, customer_id, amount_cents)
                        .await?;
                    Ok(vec![with_reply(PaymentAuthorized { payment_id }).success()])
                }
            })
            .handle(move |cmd: SagaCommand<VoidPayment>| {
                let service = void.clone();
                async move {
                    service.void(&cmd.command().payment_id).await;
                    Ok(vec![with_success()])
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_authorize_and_void() {
        let service = InMemoryPaymentService::new();

        let payment_id = service
            .authorize(Uuid::new_v4(), Uuid::new_v4(), 5000)
            .await
            .unwrap();
        assert_eq!(payment_id, "PAY-0001");
        assert_eq!(service.authorization_count().await, 1);

        service.void(&payment_id).await;
        assert_eq!(service.authorization_count().await, 0);
    }

    #[tokio::test]
    async fn test_fail_on_authorize() {
        let service = InMemoryPaymentService::new();
        service.set_fail_on_authorize(true);

        let err = service
            .authorize(Uuid::new_v4(), Uuid::new_v4(), 5000)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "payment declined");
        assert_eq!(service.authorization_count().await, 0);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let service = InMemoryPaymentService::new();
        assert!(
            service
                .authorize(Uuid::new_v4(), Uuid::new_v4(), 0)
                .await
                .is_err()
        );
    }
}
