//! Fixed bootstrap documents.
//!
//! The site root and the accounts root are resolvable without a store
//! lookup and are never persisted; they anchor the authorization walk for
//! every other address.

use std::collections::HashMap;

use arbor_model::Object;

/// The account every stock document is attributed to.
pub const ADMIN_ACCOUNT: &str = "/accounts/admin";

pub fn defaults() -> HashMap<String, Object> {
    let mut stock = HashMap::new();

    let mut root = Object::with_id("/", ["Collection"]);
    root.attributed_to = vec![ADMIN_ACCOUNT.into()];
    root.audience = vec!["public".into()];
    stock.insert("/".to_string(), root);

    let mut accounts = Object::with_id("/accounts", ["Collection", "Accounts"]);
    accounts.attributed_to = vec![ADMIN_ACCOUNT.into()];
    accounts.audience = vec!["private".into()];
    stock.insert("/accounts".to_string(), accounts);

    stock
}
