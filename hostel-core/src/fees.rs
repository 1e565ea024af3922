use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Rounds a money amount to two decimal places, midpoint away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Process-wide fee rules applied to every booking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Flat platform fee charged per booking.
    pub platform_fee: Decimal,
    /// Percentage the gateway takes, as a fraction (0.0195 = 1.95%).
    pub gateway_rate: Decimal,
    /// Flat amount the gateway adds per transaction.
    pub gateway_fixed_fee: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            platform_fee: Decimal::new(1500, 2),
            gateway_rate: Decimal::new(195, 4),
            gateway_fixed_fee: Decimal::new(250, 2),
        }
    }
}

impl FeeSchedule {
    /// Composes the price a student pays for a room listed at `hostel_fee`.
    ///
    /// `estimated_gateway_fee = (hostel_fee + platform_fee) * gateway_rate + gateway_fixed_fee`,
    /// rounded to cents; `total_price` is the exact sum of the three parts.
    pub fn quote(&self, hostel_fee: Decimal) -> FeeBreakdown {
        let hostel_fee = round_money(hostel_fee);
        let platform_fee = round_money(self.platform_fee);
        let estimated_gateway_fee =
            round_money((hostel_fee + platform_fee) * self.gateway_rate + self.gateway_fixed_fee);

        FeeBreakdown {
            hostel_fee,
            platform_fee,
            estimated_gateway_fee,
            total_price: hostel_fee + platform_fee + estimated_gateway_fee,
        }
    }
}

/// Price composition stored on each booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub hostel_fee: Decimal,
    pub platform_fee: Decimal,
    pub estimated_gateway_fee: Decimal,
    pub total_price: Decimal,
}

impl FeeBreakdown {
    /// Share of each gateway transaction routed to the landlord vs. kept by
    /// the platform.
    ///
    /// The landlord receives the hostel fee portion of the total; the
    /// platform keeps its fee plus the estimated gateway fee and bears the
    /// gateway's actual charges.
    pub fn split(&self) -> SplitShares {
        let hundred = Decimal::ONE_HUNDRED;
        if self.total_price <= Decimal::ZERO {
            return SplitShares {
                landlord_percent: Decimal::ZERO,
                platform_percent: hundred,
            };
        }

        let landlord_percent = round_money(self.hostel_fee / self.total_price * hundred);
        SplitShares {
            landlord_percent,
            platform_percent: hundred - landlord_percent,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total_price == self.hostel_fee + self.platform_fee + self.estimated_gateway_fee
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitShares {
    pub landlord_percent: Decimal,
    pub platform_percent: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_quote_matches_reference_scenario() {
        let quote = FeeSchedule::default().quote(d("300"));

        assert_eq!(quote.platform_fee, d("15.00"));
        // 315 * 0.0195 + 2.50 = 8.6425
        assert_eq!(quote.estimated_gateway_fee, d("8.64"));
        assert_eq!(quote.total_price, d("323.64"));
        assert!(quote.is_consistent());
    }

    #[test]
    fn test_quote_rounds_midpoint_away_from_zero() {
        // (100 + 15) * 0.0195 + 2.5 = 4.7425 -> 4.74
        assert_eq!(FeeSchedule::default().quote(d("100")).estimated_gateway_fee, d("4.74"));

        let schedule = FeeSchedule {
            platform_fee: Decimal::ZERO,
            gateway_rate: d("0.01"),
            gateway_fixed_fee: Decimal::ZERO,
        };
        // 12.50 * 0.01 = 0.125 -> 0.13
        assert_eq!(schedule.quote(d("12.50")).estimated_gateway_fee, d("0.13"));
    }

    #[test]
    fn test_total_is_always_sum_of_parts() {
        let schedule = FeeSchedule::default();
        for fee in ["0.01", "1", "99.99", "450.5", "1234.56", "9999"] {
            let quote = schedule.quote(d(fee));
            assert!(quote.is_consistent(), "inconsistent quote for {}", fee);
        }
    }

    #[test]
    fn test_split_gives_landlord_hostel_fee_share() {
        let split = FeeSchedule::default().quote(d("300")).split();

        // 300 / 323.64 = 92.6955...
        assert_eq!(split.landlord_percent, d("92.70"));
        assert_eq!(split.platform_percent, d("7.30"));
        assert_eq!(split.landlord_percent + split.platform_percent, Decimal::ONE_HUNDRED);
    }
}
