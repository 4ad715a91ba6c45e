use crate::domain::card::CardNumber;
use crate::domain::money::Amount;
use crate::domain::ports::{AuthDecision, AuthorizationGateway};
use crate::error::Result;
use async_trait::async_trait;

pub const DECLINE_INSUFFICIENT_FUNDS: &str = "insufficient_funds";
pub const DECLINE_DO_NOT_HONOR: &str = "do_not_honor";
pub const DECLINE_SUSPECTED_FRAUD: &str = "suspected_fraud";

/// Stand-in authorization gateway with deterministic decisions.
///
/// The decision is keyed on the last four digits of the normalized number, so
/// identical inputs always produce identical outcomes: suffix `0005` declines
/// with insufficient funds, `3333` with do-not-honor, `6666` as suspected
/// fraud, everything else approves with auth code `A{last4}OK`. No network,
/// no state.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedGateway;

#[async_trait]
impl AuthorizationGateway for SimulatedGateway {
    async fn authorize(
        &self,
        number: &CardNumber,
        _amount: Amount,
        _currency: &str,
    ) -> Result<AuthDecision> {
        let digits = number.as_str();
        if digits.ends_with("0005") {
            return Ok(AuthDecision::Declined {
                error_code: DECLINE_INSUFFICIENT_FUNDS.to_string(),
                message: "Insufficient funds.".to_string(),
            });
        }
        if digits.ends_with("3333") {
            return Ok(AuthDecision::Declined {
                error_code: DECLINE_DO_NOT_HONOR.to_string(),
                message: "Transaction declined by the issuer.".to_string(),
            });
        }
        if digits.ends_with("6666") {
            return Ok(AuthDecision::Declined {
                error_code: DECLINE_SUSPECTED_FRAUD.to_string(),
                message: "Transaction flagged as suspicious.".to_string(),
            });
        }
        Ok(AuthDecision::Approved {
            auth_code: format!("A{}OK", number.last4()),
        })
    }
}
