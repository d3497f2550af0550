use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use commerce_core::{Aggregate, AggregateRoot, DomainError, DomainResult, Money, RecordStatus};
use commerce_events::Event;

use crate::discount::{DiscountRule, DiscountSplit};

commerce_core::aggregate_id!(CouponId);

/// Coupon code as shoppers type it, normalised to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if !(3..=32).contains(&code.len()) {
            return Err(DomainError::validation("coupon code must be 3 to 32 characters"));
        }
        if !code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(DomainError::validation(
                "coupon code may only contain letters, digits, '-' and '_'",
            ));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for CouponCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CouponCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CouponCode> for String {
    fn from(value: CouponCode) -> Self {
        value.0
    }
}

/// Aggregate root: Coupon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coupon {
    id: CouponId,
    code: Option<CouponCode>,
    name: String,
    rule: DiscountRule,
    minimum_amount: Money,
    usage_limit: Option<u32>,
    used_count: u32,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    status: RecordStatus,
    version: u64,
    created: bool,
}

impl Coupon {
    pub fn empty(id: CouponId) -> Self {
        Self {
            id,
            code: None,
            name: String::new(),
            rule: DiscountRule::FreeShipping,
            minimum_amount: Money::ZERO,
            usage_limit: None,
            used_count: 0,
            valid_from: None,
            valid_until: None,
            status: RecordStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CouponId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn code(&self) -> Option<&CouponCode> {
        self.code.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule(&self) -> DiscountRule {
        self.rule
    }

    pub fn minimum_amount(&self) -> Money {
        self.minimum_amount
    }

    pub fn usage_limit(&self) -> Option<u32> {
        self.usage_limit
    }

    pub fn used_count(&self) -> u32 {
        self.used_count
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    /// All redemption checks except the order-specific ones done by `RedeemCoupon`.
    pub fn check_applicable(&self, subtotal: Money, now: DateTime<Utc>) -> DomainResult<()> {
        let code = self.code.as_ref().map(CouponCode::as_str).unwrap_or("");
        if !self.created {
            return Err(DomainError::invalid_coupon("coupon does not exist"));
        }
        if !self.status.is_visible() {
            return Err(DomainError::invalid_coupon(format!("{code} is no longer active")));
        }
        if self.valid_from.is_some_and(|from| now < from) {
            return Err(DomainError::invalid_coupon(format!("{code} is not valid yet")));
        }
        if self.valid_until.is_some_and(|until| now > until) {
            return Err(DomainError::invalid_coupon(format!("{code} has expired")));
        }
        if self.usage_limit.is_some_and(|limit| self.used_count >= limit) {
            return Err(DomainError::invalid_coupon(format!(
                "{code} has reached its usage limit"
            )));
        }
        if subtotal < self.minimum_amount {
            return Err(DomainError::invalid_coupon(format!(
                "{code} requires a minimum order of {}",
                self.minimum_amount
            )));
        }
        Ok(())
    }

    pub fn discount_for(&self, subtotal: Money, shipping: Money) -> Money {
        self.rule.discount_for(subtotal, shipping)
    }

    pub fn discount_split(&self, subtotal: Money, shipping: Money) -> DiscountSplit {
        self.rule.split(subtotal, shipping)
    }
}

impl AggregateRoot for Coupon {
    type Id = CouponId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCoupon {
    pub coupon_id: CouponId,
    pub code: CouponCode,
    pub name: String,
    pub rule: DiscountRule,
    pub minimum_amount: Money,
    pub usage_limit: Option<u32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RedeemCoupon. Issued by checkout for the order being placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemCoupon {
    pub coupon_id: CouponId,
    pub order_number: String,
    pub subtotal: Money,
    pub discount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateCoupon {
    pub coupon_id: CouponId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouponCommand {
    CreateCoupon(CreateCoupon),
    RedeemCoupon(RedeemCoupon),
    DeactivateCoupon(DeactivateCoupon),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponCreated {
    pub coupon_id: CouponId,
    pub code: CouponCode,
    pub name: String,
    pub rule: DiscountRule,
    pub minimum_amount: Money,
    pub usage_limit: Option<u32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponRedeemed {
    pub coupon_id: CouponId,
    pub order_number: String,
    pub discount: Money,
    pub used_count: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponDeactivated {
    pub coupon_id: CouponId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouponEvent {
    CouponCreated(CouponCreated),
    CouponRedeemed(CouponRedeemed),
    CouponDeactivated(CouponDeactivated),
}

impl Event for CouponEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CouponEvent::CouponCreated(_) => "promotions.coupon.created",
            CouponEvent::CouponRedeemed(_) => "promotions.coupon.redeemed",
            CouponEvent::CouponDeactivated(_) => "promotions.coupon.deactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CouponEvent::CouponCreated(e) => e.occurred_at,
            CouponEvent::CouponRedeemed(e) => e.occurred_at,
            CouponEvent::CouponDeactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Coupon {
    type Command = CouponCommand;
    type Event = CouponEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CouponEvent::CouponCreated(e) => {
                self.id = e.coupon_id;
                self.code = Some(e.code.clone());
                self.name = e.name.clone();
                self.rule = e.rule;
                self.minimum_amount = e.minimum_amount;
                self.usage_limit = e.usage_limit;
                self.used_count = 0;
                self.valid_from = e.valid_from;
                self.valid_until = e.valid_until;
                self.status = RecordStatus::Active;
                self.created = true;
            }
            CouponEvent::CouponRedeemed(e) => {
                self.used_count = e.used_count;
            }
            CouponEvent::CouponDeactivated(_) => {
                self.status = RecordStatus::Inactive;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CouponCommand::CreateCoupon(cmd) => self.handle_create(cmd),
            CouponCommand::RedeemCoupon(cmd) => self.handle_redeem(cmd),
            CouponCommand::DeactivateCoupon(cmd) => self.handle_deactivate(cmd),
        }
    }
}

impl Coupon {
    fn handle_create(&self, cmd: &CreateCoupon) -> Result<Vec<CouponEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("coupon already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("coupon name cannot be empty"));
        }
        cmd.rule.validate()?;
        if let (Some(from), Some(until)) = (cmd.valid_from, cmd.valid_until) {
            if until <= from {
                return Err(DomainError::validation("valid_until must be after valid_from"));
            }
        }
        if cmd.usage_limit == Some(0) {
            return Err(DomainError::validation("usage_limit must be at least 1"));
        }

        Ok(vec![CouponEvent::CouponCreated(CouponCreated {
            coupon_id: cmd.coupon_id,
            code: cmd.code.clone(),
            name: cmd.name.trim().to_string(),
            rule: cmd.rule,
            minimum_amount: cmd.minimum_amount,
            usage_limit: cmd.usage_limit,
            valid_from: cmd.valid_from,
            valid_until: cmd.valid_until,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_redeem(&self, cmd: &RedeemCoupon) -> Result<Vec<CouponEvent>, DomainError> {
        self.check_applicable(cmd.subtotal, cmd.occurred_at)?;

        Ok(vec![CouponEvent::CouponRedeemed(CouponRedeemed {
            coupon_id: cmd.coupon_id,
            order_number: cmd.order_number.clone(),
            discount: cmd.discount,
            used_count: self.used_count + 1,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateCoupon) -> Result<Vec<CouponEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("coupon"));
        }
        if !self.status.is_visible() {
            return Ok(vec![]);
        }
        Ok(vec![CouponEvent::CouponDeactivated(CouponDeactivated {
            coupon_id: cmd.coupon_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use commerce_events::execute;

    fn save10(usage_limit: Option<u32>) -> Coupon {
        let id = CouponId::generate();
        let mut c = Coupon::empty(id);
        execute(
            &mut c,
            &CouponCommand::CreateCoupon(CreateCoupon {
                coupon_id: id,
                code: CouponCode::parse("save10").unwrap(),
                name: "Ten percent off".into(),
                rule: DiscountRule::Percentage {
                    basis_points: 1000,
                    max_discount: None,
                },
                minimum_amount: Money::from_minor(10000),
                usage_limit,
                valid_from: Some(Utc::now() - Duration::days(1)),
                valid_until: Some(Utc::now() + Duration::days(1)),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        c
    }

    fn redeem(c: &Coupon, subtotal: u64) -> CouponCommand {
        CouponCommand::RedeemCoupon(RedeemCoupon {
            coupon_id: c.id_typed(),
            order_number: "ORD202610160001".into(),
            subtotal: Money::from_minor(subtotal),
            discount: c.discount_for(Money::from_minor(subtotal), Money::ZERO),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn code_is_normalised() {
        assert_eq!(CouponCode::parse(" save10 ").unwrap().as_str(), "SAVE10");
        assert!(CouponCode::parse("ab").is_err());
        assert!(CouponCode::parse("SAVE 10").is_err());
    }

    #[test]
    fn save10_on_two_hundred_discounts_twenty() {
        let mut c = save10(None);
        let cmd = redeem(&c, 20000);
        let events = execute(&mut c, &cmd).unwrap();

        match &events[0] {
            CouponEvent::CouponRedeemed(e) => {
                assert_eq!(e.discount, Money::from_minor(2000));
                assert_eq!(e.used_count, 1);
            }
            _ => panic!("Expected CouponRedeemed event"),
        }
        assert_eq!(c.used_count(), 1);
    }

    #[test]
    fn below_minimum_amount_is_invalid() {
        let c = save10(None);
        assert!(matches!(
            c.handle(&redeem(&c, 9999)),
            Err(DomainError::InvalidCoupon(_))
        ));
    }

    #[test]
    fn usage_limit_is_enforced() {
        let mut c = save10(Some(1));
        let first = redeem(&c, 20000);
        execute(&mut c, &first).unwrap();

        let err = c.handle(&redeem(&c, 20000)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidCoupon(msg) if msg.contains("usage limit")));
    }

    #[test]
    fn expired_and_inactive_coupons_are_invalid() {
        let c = save10(None);
        let later = Utc::now() + Duration::days(2);
        assert!(c.check_applicable(Money::from_minor(20000), later).is_err());

        let mut c = save10(None);
        let deactivate = CouponCommand::DeactivateCoupon(DeactivateCoupon {
            coupon_id: c.id_typed(),
            occurred_at: Utc::now(),
        });
        execute(&mut c, &deactivate).unwrap();
        assert!(matches!(
            c.check_applicable(Money::from_minor(20000), Utc::now()),
            Err(DomainError::InvalidCoupon(_))
        ));
    }
}
