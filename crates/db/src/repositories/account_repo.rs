//! Repository for subscriber accounts and their API keys.

use chrono::Utc;
use webopt_core::error::CoreError;
use webopt_core::types::{new_id, EntityId};

use crate::models::usage::{CreateQuotaAccount, QuotaAccount};
use crate::Database;

pub struct AccountRepo;

impl AccountRepo {
    /// Register an account. Fails if the id or any key digest is taken.
    pub async fn create(
        db: &Database,
        input: CreateQuotaAccount,
    ) -> Result<QuotaAccount, CoreError> {
        let mut accounts = db.accounts.write().await;
        let id = input.id.unwrap_or_else(new_id);
        if accounts.by_id.contains_key(&id) {
            return Err(CoreError::Conflict(format!("Account {id} already exists")));
        }
        if input
            .api_key_hashes
            .iter()
            .any(|h| accounts.by_key_hash.contains_key(h))
        {
            return Err(CoreError::Conflict(
                "API key is already assigned to another account".to_string(),
            ));
        }

        let account = QuotaAccount {
            id,
            name: input.name,
            plan: input.plan,
            monthly_limit: input.monthly_limit,
            overage_rate_cents: input.overage_rate_cents,
            api_key_hashes: input.api_key_hashes,
            created_at: input.created_at.unwrap_or_else(Utc::now),
        };
        for hash in &account.api_key_hashes {
            accounts.by_key_hash.insert(hash.clone(), id);
        }
        accounts.by_id.insert(id, account.clone());
        Ok(account)
    }

    pub async fn find_by_id(db: &Database, id: EntityId) -> Option<QuotaAccount> {
        db.accounts.read().await.by_id.get(&id).cloned()
    }

    /// Look up the account owning an API key digest.
    pub async fn find_by_api_key_hash(db: &Database, key_hash: &str) -> Option<QuotaAccount> {
        let accounts = db.accounts.read().await;
        accounts
            .by_key_hash
            .get(key_hash)
            .and_then(|id| accounts.by_id.get(id))
            .cloned()
    }

    pub async fn list(db: &Database) -> Vec<QuotaAccount> {
        let accounts = db.accounts.read().await;
        let mut rows: Vec<QuotaAccount> = accounts.by_id.values().cloned().collect();
        rows.sort_by_key(|a| (a.created_at, a.id));
        rows
    }
}
