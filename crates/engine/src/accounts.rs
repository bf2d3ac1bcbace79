//! Account registration and referral codes

use crate::RewardsEngine;
use rand::Rng;
use tracing::{info, warn};
use watchrewards_core::{Account, Error, Result};
use watchrewards_persistence::sqlite::{accounts, CodeUpdate};

/// Referral code summary for the /referral display
#[derive(Debug, Clone)]
pub struct ReferralSummary {
    pub code: String,
    pub referral_count: i64,
}

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn generate_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

impl RewardsEngine {
    /// Create the account on first contact and return its canonical state
    ///
    /// Idempotent: a concurrent or repeated call for the same id leaves
    /// exactly one stored account. A referral code used at first contact
    /// links the referrer at most once and never to the account itself.
    pub async fn register(
        &self,
        account_id: i64,
        display_name: &str,
        referral_code_used: Option<&str>,
    ) -> Result<Account> {
        {
            let mut conn = self.db.acquire().await?;

            let referrer_id = match referral_code_used {
                Some(code) => accounts::find_by_referral_code(&mut conn, code)
                    .await?
                    .filter(|id| *id != account_id),
                None => None,
            };

            let mut attempts = self.config.referral_code_attempts;
            let inserted = loop {
                let code = generate_code(self.config.referral_code_len);
                match accounts::create_if_absent(
                    &mut conn,
                    account_id,
                    display_name,
                    Some(&code),
                    referrer_id,
                )
                .await
                {
                    Ok(created) => break created,
                    // Fresh code collided with an existing one; draw again
                    Err(Error::CodeGenerationFailed) if attempts > 1 => attempts -= 1,
                    // Every draw collided; store the account without a code
                    // rather than turn a code problem into a lost registration
                    Err(Error::CodeGenerationFailed) => {
                        break accounts::create_if_absent(
                            &mut conn,
                            account_id,
                            display_name,
                            None,
                            referrer_id,
                        )
                        .await?
                    }
                    Err(e) => return Err(e),
                }
            };

            if inserted {
                info!("Registered account {account_id} (referred by {referrer_id:?})");
            } else {
                // Existing account: refresh a changed display name and apply
                // a late referral link if none was ever set
                accounts::set_display_name(&mut conn, account_id, display_name).await?;
                if let Some(referrer) = referrer_id {
                    if accounts::link_referrer_if_unset(&mut conn, account_id, referrer).await? {
                        info!("Linked referrer {referrer} to existing account {account_id}");
                    }
                }
            }
        }

        // Codes can be missing on accounts that raced a collision; generation
        // failure is non-fatal here and the caller may re-prompt
        match self.ensure_referral_code(account_id).await {
            Ok(_) => {}
            Err(Error::CodeGenerationFailed) => {
                warn!("Could not assign a referral code to account {account_id}");
            }
            Err(e) => return Err(e),
        }

        let mut conn = self.db.acquire().await?;
        accounts::get(&mut conn, account_id)
            .await?
            .ok_or(Error::AccountNotFound(account_id))
    }

    /// Look up an account by id
    pub async fn account(&self, account_id: i64) -> Result<Option<Account>> {
        let mut conn = self.db.acquire().await?;
        accounts::get(&mut conn, account_id).await
    }

    /// Current point balance
    pub async fn balance(&self, account_id: i64) -> Result<i64> {
        self.account(account_id)
            .await?
            .map(|a| a.points)
            .ok_or(Error::AccountNotFound(account_id))
    }

    /// Record the externally checked channel-membership state
    pub async fn set_membership(&self, account_id: i64, is_member: bool) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        accounts::set_membership(&mut conn, account_id, is_member).await
    }

    /// Get the account's referral code, generating one if missing
    ///
    /// Bounded retry on code collisions; exhausting the draws surfaces
    /// `CodeGenerationFailed`, which is retryable later.
    pub async fn ensure_referral_code(&self, account_id: i64) -> Result<String> {
        let mut conn = self.db.acquire().await?;

        for _ in 0..self.config.referral_code_attempts {
            let code = generate_code(self.config.referral_code_len);
            match accounts::set_referral_code_if_missing(&mut conn, account_id, &code).await? {
                CodeUpdate::Assigned => return Ok(code),
                CodeUpdate::AlreadyPresent => {
                    let account = accounts::get(&mut conn, account_id)
                        .await?
                        .ok_or(Error::AccountNotFound(account_id))?;
                    return account.referral_code.ok_or(Error::CodeGenerationFailed);
                }
                CodeUpdate::Collision => continue,
            }
        }

        warn!("Referral code generation exhausted retries for account {account_id}");
        Err(Error::CodeGenerationFailed)
    }

    /// Referral code plus how many accounts it has brought in
    pub async fn referral_summary(&self, account_id: i64) -> Result<ReferralSummary> {
        let code = self.ensure_referral_code(account_id).await?;
        let mut conn = self.db.acquire().await?;
        let referral_count = accounts::count_referrals(&mut conn, account_id).await?;
        Ok(ReferralSummary {
            code,
            referral_count,
        })
    }
}
