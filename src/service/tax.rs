use bigdecimal::{BigDecimal, Zero};
use std::str::FromStr;

use crate::models::{ReportRow, TaxFigures};
use crate::service::sanitize::round_money;

/// 法定默认增值税率 20%
pub const STATUTORY_VAT_RATE: &str = "0.2";

/// 本次账单运行的统一税率
#[derive(Debug, Clone, PartialEq)]
pub struct VatRatio(BigDecimal);

impl VatRatio {
    pub fn statutory() -> Self {
        Self(BigDecimal::from_str(STATUTORY_VAT_RATE).unwrap_or_else(|_| BigDecimal::new(2.into(), 1)))
    }

    /// 由整张账单的税前金额与税额反推税率；任一不为正时使用默认税率
    pub fn reconcile(pre_tax: &BigDecimal, total_tax: &BigDecimal) -> Self {
        let zero = BigDecimal::zero();
        if *pre_tax > zero && *total_tax > zero {
            let ratio = total_tax / pre_tax;
            tracing::info!("VAT ratio reconciled from bill totals: {} / {} = {}", total_tax, pre_tax, ratio);
            Self(ratio)
        } else {
            tracing::info!(
                "bill totals not usable (pre-tax {}, tax {}), using statutory VAT {}",
                pre_tax,
                total_tax,
                STATUTORY_VAT_RATE
            );
            Self::statutory()
        }
    }

    pub fn value(&self) -> &BigDecimal {
        &self.0
    }

    /// VAT = round(Net × ratio)，Gross = Net + VAT
    pub fn apply(&self, net: &BigDecimal) -> TaxFigures {
        let vat = round_money(&(net * &self.0));
        let gross = net + &vat;
        TaxFigures {
            net: net.clone(),
            vat,
            gross,
        }
    }

    /// 对每一行统一计税，Net = 用量合计 + 月租
    pub fn apply_all(&self, rows: &mut [ReportRow]) {
        for row in rows.iter_mut() {
            let net = &row.usage_total + &row.line.recurring;
            row.tax = Some(self.apply(&net));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::sanitize::format_money;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn ratio_from_bill_totals() {
        let ratio = VatRatio::reconcile(&dec("1000"), &dec("200"));
        assert_eq!(ratio.value(), &dec("0.2"));
    }

    #[test]
    fn falls_back_when_either_total_not_positive() {
        let statutory = VatRatio::statutory();
        assert_eq!(VatRatio::reconcile(&dec("0"), &dec("200")), statutory);
        assert_eq!(VatRatio::reconcile(&dec("1000"), &dec("0")), statutory);
        assert_eq!(VatRatio::reconcile(&dec("-50"), &dec("10")), statutory);
        assert_eq!(VatRatio::reconcile(&dec("50"), &dec("-10")), statutory);
        assert_eq!(statutory.value(), &dec("0.2"));
    }

    #[test]
    fn cascade_net_vat_gross() {
        let figures = VatRatio::reconcile(&dec("1000"), &dec("200")).apply(&dec("100.00"));
        assert_eq!(format_money(&figures.vat, ""), "20.00");
        assert_eq!(format_money(&figures.gross, ""), "120.00");
    }

    #[test]
    fn vat_is_rounded_before_gross() {
        let ratio = VatRatio::reconcile(&dec("3"), &dec("1"));
        let figures = ratio.apply(&dec("10.00"));
        assert_eq!(figures.vat, dec("3.33"));
        assert_eq!(figures.gross, dec("13.33"));
    }
}
