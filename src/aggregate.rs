//! Totals, breakdowns and the budget alert shown on the dashboard.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::structs::Expense;

pub fn total(expenses: &[Expense]) -> f64 {
    expenses.iter().map(|e| e.amount).sum()
}

pub fn category_totals(expenses: &[Expense]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for expense in expenses {
        *totals.entry(expense.category.clone()).or_insert(0.0) += expense.amount;
    }
    totals
}

/// Keyed by the `YYYY-MM` prefix of each date.
pub fn monthly_totals(expenses: &[Expense]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for expense in expenses {
        *totals.entry(expense.month().to_string()).or_insert(0.0) += expense.amount;
    }
    totals
}

pub fn budget_alert(spent: f64, budget: Option<f64>) -> bool {
    budget.is_some_and(|limit| spent >= limit)
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub expenses: Vec<Expense>,
    pub total: f64,
    pub category_totals: BTreeMap<String, f64>,
    pub monthly_totals: BTreeMap<String, f64>,
    pub budget: Option<f64>,
    pub budget_alert: bool,
    pub selected_month: Option<String>,
    pub effective_month: String,
}

impl Dashboard {
    /// `visible` is the month-filtered list, `history` every record of the
    /// user. The budget applies to `effective_month`.
    pub fn build(
        visible: Vec<Expense>,
        history: &[Expense],
        budget: Option<f64>,
        selected_month: Option<&str>,
        effective_month: &str,
    ) -> Self {
        let monthly_totals = monthly_totals(history);
        let spent_in_month = monthly_totals.get(effective_month).copied().unwrap_or(0.0);
        Dashboard {
            total: total(&visible),
            category_totals: category_totals(&visible),
            budget_alert: budget_alert(spent_in_month, budget),
            monthly_totals,
            budget,
            selected_month: selected_month.map(str::to_string),
            effective_month: effective_month.to_string(),
            expenses: visible,
        }
    }
}
