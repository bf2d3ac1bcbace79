//! Engine configuration

/// Tunable parameters for the rewards ledger
#[derive(Debug, Clone)]
pub struct RewardsConfig {
    /// Fraction of a credited reward paid to the referring account
    pub referral_rate: f64,
    /// Minimum time between credited watches of the same video
    pub cooldown_secs: i64,
    /// Smallest withdrawable amount in points
    pub min_withdrawal_points: i64,
    /// Currency paid per point on withdrawal
    pub points_to_currency_rate: f64,
    /// Length of generated referral codes
    pub referral_code_len: usize,
    /// Draws attempted before code generation gives up
    pub referral_code_attempts: u32,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            referral_rate: 0.10,
            cooldown_secs: 20 * 60 * 60, // 20 hours between credited watches
            min_withdrawal_points: 10,
            points_to_currency_rate: 0.1,
            referral_code_len: 8,
            referral_code_attempts: 5,
        }
    }
}
