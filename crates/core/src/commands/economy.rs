use super::error::EconomyError;

/// The external economy. Only consulted for player invokers of commands
/// that declare a cost.
pub trait EconomyBackend: Send + Sync {
    fn can_afford(&self, account: u128, amount: f64) -> bool;

    fn charge(&self, account: u128, amount: f64) -> Result<(), EconomyError>;

    fn format_amount(&self, amount: f64) -> String {
        format!("{amount:.2}")
    }
}
