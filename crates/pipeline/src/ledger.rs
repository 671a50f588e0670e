//! QuotaLedger: caller resolution, authorization and usage recording.
//!
//! Policy: only units whose image completes are charged, for every tier.
//! Anonymous callers reserve units atomically at `authorize`; each unit is
//! then either committed with [`QuotaLedger::record`] or handed back with
//! [`QuotaLedger::release`]. Subscriber and API-key holders are never denied,
//! so they have nothing to reserve; `record` adds used units to the current
//! billing cycle and tracks overage past the plan ceiling.

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::Deserialize;
use webopt_core::config::QuotaConfig;
use webopt_core::error::CoreError;
use webopt_core::quota::{
    anonymous_remaining, cycle_end, cycle_index, cycle_start, day_key, next_midnight,
    overage_cost_cents, Authorization, Caller, QuotaStatus, Tier,
};
use webopt_core::types::{EntityId, Timestamp};
use webopt_db::models::usage::{CreateQuotaAccount, QuotaAccount};
use webopt_db::repositories::{AccountRepo, UsageRepo};
use webopt_db::DbPool;

/// One entry of the accounts seed file. Limits come from the named plan.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSeed {
    pub id: Option<EntityId>,
    pub name: String,
    pub plan: String,
    /// SHA-256 hex digests of the account's API keys.
    #[serde(default)]
    pub api_key_hashes: Vec<String>,
    pub created_at: Option<Timestamp>,
}

/// The quota identity a caller resolves to.
enum Resolved {
    Account(QuotaAccount, Tier),
    Anonymous(String),
}

pub struct QuotaLedger {
    db: DbPool,
    config: QuotaConfig,
}

impl QuotaLedger {
    pub fn new(db: DbPool, config: QuotaConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    pub async fn register_account(
        &self,
        input: CreateQuotaAccount,
    ) -> Result<QuotaAccount, CoreError> {
        let account = AccountRepo::create(&self.db, input).await?;
        tracing::info!(
            account_id = %account.id,
            plan = %account.plan,
            keys = account.api_key_hashes.len(),
            "Quota account registered"
        );
        Ok(account)
    }

    /// Register seed accounts, resolving each plan's limits from config.
    pub async fn seed_accounts(&self, seeds: Vec<AccountSeed>) -> Result<usize, CoreError> {
        let mut registered = 0;
        for seed in seeds {
            let plan = self.config.plan(&seed.plan).ok_or_else(|| {
                CoreError::Validation(format!(
                    "Account '{}' references unknown plan '{}'",
                    seed.name, seed.plan
                ))
            })?;
            self.register_account(CreateQuotaAccount {
                id: seed.id,
                name: seed.name,
                plan: plan.name.clone(),
                monthly_limit: plan.monthly_limit,
                overage_rate_cents: plan.overage_rate_cents,
                api_key_hashes: seed.api_key_hashes,
                created_at: seed.created_at,
            })
            .await?;
            registered += 1;
        }
        Ok(registered)
    }

    /// Find a subscriber's account, registering it on the first configured
    /// plan when it has never been seen.
    async fn subscriber_account(&self, account_id: EntityId) -> Result<QuotaAccount, CoreError> {
        if let Some(account) = AccountRepo::find_by_id(&self.db, account_id).await {
            return Ok(account);
        }
        let (plan, monthly_limit, overage_rate_cents) = self
            .config
            .plans
            .first()
            .map(|p| (p.name.clone(), p.monthly_limit, p.overage_rate_cents))
            .unwrap_or_else(|| ("default".to_string(), 0, 0));

        let created = AccountRepo::create(
            &self.db,
            CreateQuotaAccount {
                id: Some(account_id),
                name: format!("subscriber-{account_id}"),
                plan,
                monthly_limit,
                overage_rate_cents,
                api_key_hashes: Vec::new(),
                created_at: None,
            },
        )
        .await;

        match created {
            Ok(account) => {
                tracing::info!(account_id = %account_id, plan = %account.plan, "Subscriber account created on first use");
                Ok(account)
            }
            // Lost a registration race; the winner's row is the account.
            Err(CoreError::Conflict(_)) => AccountRepo::find_by_id(&self.db, account_id)
                .await
                .ok_or(CoreError::NotFound {
                    entity: "QuotaAccount",
                    id: account_id,
                }),
            Err(e) => Err(e),
        }
    }

    async fn resolve(&self, caller: &Caller) -> Result<Resolved, CoreError> {
        match caller {
            Caller::Subscriber { account_id } => Ok(Resolved::Account(
                self.subscriber_account(*account_id).await?,
                Tier::Subscriber,
            )),
            Caller::ApiKey {
                key_hash,
                fingerprint,
            } => match AccountRepo::find_by_api_key_hash(&self.db, key_hash).await {
                Some(account) => Ok(Resolved::Account(account, Tier::ApiKey)),
                None => {
                    tracing::debug!("API key matches no account; treating caller as anonymous");
                    Ok(Resolved::Anonymous(fingerprint.clone()))
                }
            },
            Caller::Anonymous { fingerprint } => Ok(Resolved::Anonymous(fingerprint.clone())),
        }
    }

    // -----------------------------------------------------------------------
    // Authorize / record / release
    // -----------------------------------------------------------------------

    pub async fn authorize(&self, caller: &Caller, count: u32) -> Result<Authorization, CoreError> {
        self.authorize_at(caller, count, Local::now().fixed_offset())
            .await
    }

    /// Authorize `count` units at `now`. Anonymous grants are reserved in the
    /// same atomic step as the ceiling check; a denial reserves nothing.
    pub async fn authorize_at(
        &self,
        caller: &Caller,
        count: u32,
        now: DateTime<FixedOffset>,
    ) -> Result<Authorization, CoreError> {
        let authorization = match self.resolve(caller).await? {
            Resolved::Account(_, Tier::Subscriber) => Authorization {
                allowed: true,
                remaining: None,
                tier: Tier::Subscriber,
            },
            Resolved::Account(account, tier) => {
                let index = cycle_index(account.created_at, now.with_timezone(&Utc), self.config.cycle_days);
                let used = UsageRepo::account_usage(&self.db, account.id, index)
                    .await
                    .map_or(0, |u| u.used);
                Authorization {
                    allowed: true,
                    remaining: Some(account.monthly_limit.saturating_sub(used)),
                    tier,
                }
            }
            Resolved::Anonymous(fingerprint) => {
                let outcome = UsageRepo::try_reserve_anonymous(
                    &self.db,
                    &fingerprint,
                    day_key(&now),
                    self.config.anonymous_daily_limit,
                    count,
                )
                .await;
                Authorization {
                    allowed: outcome.allowed,
                    remaining: Some(outcome.remaining),
                    tier: Tier::Anonymous,
                }
            }
        };

        tracing::debug!(
            caller = caller.kind(),
            requested = count,
            allowed = authorization.allowed,
            remaining = ?authorization.remaining,
            "Quota authorization"
        );
        Ok(authorization)
    }

    /// Charge `count` units of completed work.
    pub async fn record(&self, caller: &Caller, count: u32) -> Result<(), CoreError> {
        self.record_at(caller, count, Local::now().fixed_offset())
            .await
    }

    pub async fn record_at(
        &self,
        caller: &Caller,
        count: u32,
        now: DateTime<FixedOffset>,
    ) -> Result<(), CoreError> {
        match self.resolve(caller).await? {
            Resolved::Account(account, _) => {
                let index = cycle_index(account.created_at, now.with_timezone(&Utc), self.config.cycle_days);
                let overage =
                    UsageRepo::commit_account(&self.db, account.id, index, account.monthly_limit, count)
                        .await;
                if overage > 0 {
                    tracing::info!(
                        account_id = %account.id,
                        overage_units = overage,
                        rate_cents = account.overage_rate_cents,
                        "Usage beyond plan ceiling billed as overage"
                    );
                }
            }
            Resolved::Anonymous(fingerprint) => {
                UsageRepo::commit_anonymous(
                    &self.db,
                    &fingerprint,
                    day_key(&now),
                    self.config.anonymous_daily_limit,
                    count,
                )
                .await;
            }
        }
        Ok(())
    }

    /// Hand back `count` reserved units whose work failed or was cancelled.
    pub async fn release(&self, caller: &Caller, count: u32) -> Result<(), CoreError> {
        self.release_at(caller, count, Local::now().fixed_offset())
            .await
    }

    pub async fn release_at(
        &self,
        caller: &Caller,
        count: u32,
        now: DateTime<FixedOffset>,
    ) -> Result<(), CoreError> {
        if let Resolved::Anonymous(fingerprint) = self.resolve(caller).await? {
            UsageRepo::release_anonymous(&self.db, &fingerprint, day_key(&now), count).await;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    pub async fn status(&self, caller: &Caller) -> Result<QuotaStatus, CoreError> {
        self.status_at(caller, Local::now().fixed_offset()).await
    }

    pub async fn status_at(
        &self,
        caller: &Caller,
        now: DateTime<FixedOffset>,
    ) -> Result<QuotaStatus, CoreError> {
        match self.resolve(caller).await? {
            Resolved::Account(account, _) => {
                let cycle_days = self.config.cycle_days;
                let index = cycle_index(account.created_at, now.with_timezone(&Utc), cycle_days);
                let usage = UsageRepo::account_usage(&self.db, account.id, index).await;
                let (used, overage_units) = usage.map_or((0, 0), |u| (u.used, u.overage_units));
                Ok(QuotaStatus::Subscriber {
                    plan: account.plan,
                    used,
                    quota: account.monthly_limit,
                    remaining: account.monthly_limit.saturating_sub(used),
                    overage_units,
                    overage_rate_cents: account.overage_rate_cents,
                    overage_cost_cents: overage_cost_cents(overage_units, account.overage_rate_cents),
                    cycle_started_at: cycle_start(account.created_at, index, cycle_days),
                    resets_at: cycle_end(account.created_at, index, cycle_days),
                })
            }
            Resolved::Anonymous(fingerprint) => {
                let limit = self.config.anonymous_daily_limit;
                let record = UsageRepo::anonymous_usage(&self.db, &fingerprint, day_key(&now)).await;
                let (used, reserved) = record.map_or((0, 0), |r| (r.used, r.reserved));
                Ok(QuotaStatus::Anonymous {
                    used,
                    quota: limit,
                    remaining: anonymous_remaining(used, reserved, limit),
                    resets_at: next_midnight(&now),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
