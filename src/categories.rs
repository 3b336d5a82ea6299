use tracing::debug;

use crate::api::Backend;
use crate::error::{FinwizzError, Result};
use crate::models::{CategoryUpdate, Transaction};

pub const CATEGORIES: &[&str] = &[
    "Salary",
    "Food",
    "Travel",
    "Shopping",
    "Subscriptions",
    "Utilities",
    "Transfers",
    "Wallets",
    "Rent",
    "Health",
    "Education",
    "Entertainment",
    "Miscellaneous",
];

/// Resolve user input to the canonical category name, case-insensitively.
pub fn resolve(input: &str) -> Result<&'static str> {
    let input = input.trim();
    CATEGORIES
        .iter()
        .find(|c| c.eq_ignore_ascii_case(input))
        .copied()
        .ok_or_else(|| {
            FinwizzError::UnknownCategory(format!(
                "{input} (choose from: {})",
                CATEGORIES.join(", ")
            ))
        })
}

impl CategoryUpdate {
    pub fn for_transaction(txn: &Transaction, category: &str) -> Self {
        Self {
            upload_id: txn.upload_id.clone(),
            date: txn.date.clone(),
            description: txn.description.clone(),
            category: category.to_string(),
        }
    }

    pub fn matches(&self, txn: &Transaction) -> bool {
        txn.upload_id == self.upload_id
            && txn.date == self.date
            && txn.description == self.description
    }
}

/// Set the category on every local record sharing the update's key. Returns how many changed.
pub fn apply_local(txns: &mut [Transaction], update: &CategoryUpdate) -> usize {
    let mut changed = 0;
    for txn in txns.iter_mut().filter(|t| update.matches(t)) {
        txn.category = Some(update.category.clone());
        changed += 1;
    }
    changed
}

/// Validate, send, then mutate local state. Local records are untouched on failure.
pub fn update_category(
    backend: &dyn Backend,
    txns: &mut [Transaction],
    update: CategoryUpdate,
) -> Result<String> {
    let category = resolve(&update.category)?;
    let update = CategoryUpdate {
        category: category.to_string(),
        ..update
    };
    let message = backend.update_category(&update)?;
    let changed = apply_local(txns, &update);
    debug!(changed, "local records updated");
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::tests::txn;
    use crate::api::tests::FakeBackend;

    fn ledger() -> Vec<Transaction> {
        let mut other_upload = txn("2024-01-01", "Swiggy", -200.0, None);
        other_upload.upload_id = "U2".into();
        vec![
            txn("2024-01-01", "Swiggy", -200.0, None),
            txn("2024-01-02", "Swiggy", -150.0, None),
            txn("2024-01-01", "Uber", -90.0, None),
            other_upload,
        ]
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        assert_eq!(resolve("food").unwrap(), "Food");
        assert_eq!(resolve(" SUBSCRIPTIONS ").unwrap(), "Subscriptions");
        assert!(matches!(resolve("Groceries"), Err(FinwizzError::UnknownCategory(_))));
    }

    #[test]
    fn test_update_changes_only_matching_record() {
        let backend = FakeBackend::default();
        let mut txns = ledger();
        let update = CategoryUpdate::for_transaction(&txns[0], "food");
        update_category(&backend, &mut txns, update).unwrap();

        assert_eq!(txns[0].category.as_deref(), Some("Food"));
        assert!(txns[1..].iter().all(|t| t.category.is_none()));
        let sent = backend.updates.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].category, "Food");
        assert_eq!(sent[0].upload_id, "U1");
    }

    #[test]
    fn test_failed_update_leaves_local_state() {
        let backend = FakeBackend {
            fail_update: Some("Transaction not found or not updated".into()),
            ..Default::default()
        };
        let mut txns = ledger();
        let update = CategoryUpdate::for_transaction(&txns[0], "Food");
        let err = update_category(&backend, &mut txns, update).unwrap_err();
        assert!(err.to_string().contains("Transaction not found"));
        assert!(txns.iter().all(|t| t.category.is_none()));
    }

    #[test]
    fn test_unknown_category_never_reaches_backend() {
        let backend = FakeBackend::default();
        let mut txns = ledger();
        let update = CategoryUpdate::for_transaction(&txns[0], "Groceries");
        assert!(update_category(&backend, &mut txns, update).is_err());
        assert!(backend.updates.borrow().is_empty());
    }
}
