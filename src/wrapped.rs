use std::collections::{HashMap, VecDeque};

use crate::analytics::{category_totals, top_categories};
use crate::effects::{self, Palette};
use crate::fmt::money;
use crate::models::{StatementsResponse, Transaction};

/// Share of the top category a user "could have saved".
pub const MISSED_SAVINGS_RATE: f64 = 0.05;
pub const FALLBACK_CATEGORY: &str = "Miscellaneous";

#[derive(Debug, Clone, PartialEq)]
pub enum Card {
    TopCategory { name: String, amount: f64 },
    TopCategories(Vec<String>),
    MissedSavings { amount: f64 },
    RecurringPayments { count: usize },
    AlternativeUse,
}

impl Card {
    pub fn title(&self) -> &'static str {
        match self {
            Card::TopCategory { .. } => "Top Spending Category",
            Card::TopCategories(_) => "Top 5 Spend Categories",
            Card::MissedSavings { .. } => "Missed Savings",
            Card::RecurringPayments { .. } => "Recurring Payments",
            Card::AlternativeUse => "Alternative Use",
        }
    }

    pub fn content(&self) -> String {
        match self {
            Card::TopCategory { name, amount } => {
                format!("You spent the most on {name}! 💸 {}", money(*amount))
            }
            Card::TopCategories(names) if names.is_empty() => "No spending recorded yet.".to_string(),
            Card::TopCategories(names) => names.join(", "),
            Card::MissedSavings { amount } => {
                format!("You could have saved ₹{} last month.", amount.round() as i64)
            }
            Card::RecurringPayments { count } => {
                format!("You have {count} recurring payments this month!")
            }
            Card::AlternativeUse => {
                "Instead of subscriptions, you could’ve bought 3 books 📚".to_string()
            }
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            Card::TopCategory { .. } => effects::SUNSET,
            Card::TopCategories(_) => effects::LAGOON,
            Card::MissedSavings { .. } => effects::EMBER,
            Card::RecurringPayments { .. } | Card::AlternativeUse => effects::DUSK,
        }
    }
}

/// Cards in display order. Advancing sends the front card to the back.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    cards: VecDeque<Card>,
}

impl Deck {
    pub fn new(cards: Vec<Card>) -> Self {
        Self {
            cards: cards.into(),
        }
    }

    pub fn front(&self) -> Option<&Card> {
        self.cards.front()
    }

    pub fn advance(&mut self) {
        if let Some(card) = self.cards.pop_front() {
            self.cards.push_back(card);
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }
}

/// Debit descriptions grouped on their first three `/`-separated segments
/// (UPI-style `UPI/merchant/ref`); a group seen more than once counts as recurring.
pub fn recurring_pattern_count(spends: &[&Transaction]) -> usize {
    let mut groups: HashMap<String, usize> = HashMap::new();
    for t in spends {
        let key = t.description.split('/').take(3).collect::<Vec<_>>().join("/");
        *groups.entry(key).or_insert(0) += 1;
    }
    groups.values().filter(|&&n| n > 1).count()
}

/// Build the deck from the first upload only.
pub fn build_deck(statements: &StatementsResponse) -> Deck {
    let txns: Vec<Transaction> = statements
        .uploads
        .first()
        .map(|u| u.data.clone())
        .unwrap_or_default();
    let spends: Vec<&Transaction> = txns.iter().filter(|t| t.is_debit()).collect();

    let totals = category_totals(&txns);
    let (top_name, top_amount) = totals
        .first()
        .map(|c| (c.name.clone(), c.total))
        .unwrap_or_else(|| (FALLBACK_CATEGORY.to_string(), 0.0));

    Deck::new(vec![
        Card::TopCategory {
            name: top_name,
            amount: top_amount,
        },
        Card::TopCategories(top_categories(&totals, 5).into_iter().map(|c| c.name).collect()),
        Card::MissedSavings {
            amount: top_amount * MISSED_SAVINGS_RATE,
        },
        Card::RecurringPayments {
            count: recurring_pattern_count(&spends),
        },
        Card::AlternativeUse,
    ])
}
