use serde::{Deserialize, Serialize};

use crate::money::Won;

/// One purchased line of a receipt, matched against a store's menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub item_name: String,
    pub unit_price: i64,
    pub quantity: i64,
    pub total_amount: i64,
}

impl MenuItem {
    /// Derive price fields from the numerals that trail an item name.
    ///
    /// One numeral is both unit price and total. Two are unit price and total,
    /// with the quantity recovered by floor division. Three or more are read as
    /// unit price, quantity, total; anything beyond the third is ignored.
    /// Returns `None` when no numeral was observed.
    pub fn from_numerals(item_name: impl Into<String>, numerals: &[i64]) -> Option<Self> {
        let (unit_price, quantity, total_amount) = match *numerals {
            [] => return None,
            [only] => (only, 1, only),
            [unit, total] => {
                let quantity = if unit > 0 { (total / unit).max(1) } else { 1 };
                (unit, quantity, total)
            }
            [unit, quantity, total, ..] => (unit, quantity.max(1), total),
        };
        Some(Self {
            item_name: item_name.into(),
            unit_price,
            quantity,
            total_amount,
        })
    }

    pub fn total(&self) -> Won {
        Won::new(self.total_amount)
    }
}

/// Structured output for one receipt image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub store_name: Option<String>,
    pub items: Vec<MenuItem>,
}

impl ExtractionResult {
    pub fn total(&self) -> Won {
        self.items.iter().map(MenuItem::total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_numeral_is_price_and_total() {
        let item = MenuItem::from_numerals("아메리카노", &[3000]).unwrap();
        assert_eq!((item.unit_price, item.quantity, item.total_amount), (3000, 1, 3000));
    }

    #[test]
    fn two_numerals_recover_quantity() {
        let item = MenuItem::from_numerals("아메리카노", &[3000, 9000]).unwrap();
        assert_eq!((item.unit_price, item.quantity, item.total_amount), (3000, 3, 9000));
    }

    #[test]
    fn two_numerals_with_zero_price_default_to_one() {
        let item = MenuItem::from_numerals("물", &[0, 0]).unwrap();
        assert_eq!(item.quantity, 1);
    }

    #[test]
    fn three_numerals_are_price_quantity_total() {
        let item = MenuItem::from_numerals("아메리카노", &[3000, 2, 6000]).unwrap();
        assert_eq!((item.unit_price, item.quantity, item.total_amount), (3000, 2, 6000));
    }

    #[test]
    fn extra_numerals_are_ignored() {
        let item = MenuItem::from_numerals("라떼", &[4000, 2, 8000, 123]).unwrap();
        assert_eq!(item.total_amount, 8000);
    }

    #[test]
    fn no_numerals_yields_nothing() {
        assert!(MenuItem::from_numerals("라떼", &[]).is_none());
    }

    #[test]
    fn result_total_sums_items() {
        let result = ExtractionResult {
            store_name: Some("스타벅스".into()),
            items: vec![
                MenuItem::from_numerals("아메리카노", &[4500, 2, 9000]).unwrap(),
                MenuItem::from_numerals("라떼", &[5000]).unwrap(),
            ],
        };
        assert_eq!(result.total(), Won::new(14_000));
    }

    #[test]
    fn serializes_plain_integer_fields() {
        let item = MenuItem::from_numerals("라떼", &[5000]).unwrap();
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["item_name"], "라떼");
        assert_eq!(json["unit_price"], 5000);
        assert_eq!(json["quantity"], 1);
        assert_eq!(json["total_amount"], 5000);
    }
}
