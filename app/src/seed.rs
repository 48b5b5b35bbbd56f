// In app/src/seed.rs

use anyhow::{Context, Result};
use app_config::PortfolioConfig;
use core_types::{AccountId, Holding, NewOrder, Symbol};
use ledger::{AccountLedger, NewAccount};
use std::collections::HashMap;

/// What was loaded into the ledger.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub accounts: usize,
    pub holdings: usize,
    pub orders: usize,
}

/// Loads the portfolio seed into an empty ledger.
///
/// Holdings start marked at their cost basis; the first polling pass marks
/// them to market. Every order goes through the ledger's validation.
pub async fn seed_ledger(ledger: &dyn AccountLedger, portfolio: &PortfolioConfig) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    // --- 1. Accounts ---
    let mut accounts: HashMap<&str, AccountId> = HashMap::new();
    for seed in &portfolio.accounts {
        let account = ledger
            .insert_account(NewAccount {
                name: seed.name.clone(),
                available_funds: seed.available_funds,
                strategy: seed.strategy.clone(),
                exclude_from_totals: seed.exclude_from_totals,
            })
            .await?;
        accounts.insert(seed.name.as_str(), account.id);
        summary.accounts += 1;
    }

    let account_id = |name: &str| {
        accounts
            .get(name)
            .copied()
            .with_context(|| format!("portfolio references unknown account '{}'", name))
    };

    // --- 2. Holdings ---
    for seed in &portfolio.holdings {
        ledger
            .upsert_holding(&Holding {
                account_id: account_id(&seed.account)?,
                symbol: Symbol::new(&seed.symbol),
                quantity: seed.quantity,
                cost_basis: seed.cost_basis,
                current_price: seed.cost_basis,
            })
            .await?;
        summary.holdings += 1;
    }

    // --- 3. Orders ---
    for (index, seed) in portfolio.orders.iter().enumerate() {
        let order = ledger
            .insert_order(NewOrder {
                account_id: account_id(&seed.account)?,
                symbol: Symbol::new(&seed.symbol),
                action: seed.action,
                strategy: seed.strategy,
                quantity: seed.quantity,
                limit_price: seed.limit_price,
                stop_price: seed.stop_price,
                stop_percent: seed.stop_percent,
            })
            .await
            .with_context(|| format!("order #{} ({} {})", index + 1, seed.action, seed.symbol))?;
        tracing::debug!(order_id = %order.id, symbol = %order.symbol, strategy = %order.strategy, "Seeded order.");
        summary.orders += 1;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::InMemoryLedger;
    use rust_decimal_macros::dec;

    const PORTFOLIO: &str = r#"
        [[accounts]]
        name = "brokerage"
        available_funds = "10000"

        [[accounts]]
        name = "ira"
        available_funds = "2500.50"
        exclude_from_totals = true

        [[holdings]]
        account = "ira"
        symbol = "ACME"
        quantity = 5
        cost_basis = "20"

        [[orders]]
        account = "brokerage"
        symbol = "ACME"
        action = "BUY"
        strategy = "LIMIT"
        quantity = 10
        limit_price = "18.5"

        [[orders]]
        account = "ira"
        symbol = "ACME"
        action = "SELL"
        strategy = "TRAILING_STOP_PERCENT_CHANGE"
        quantity = 5
        stop_percent = "10"
    "#;

    #[tokio::test]
    async fn seeds_accounts_holdings_and_orders() {
        let ledger = InMemoryLedger::new();
        let portfolio = app_config::parse_portfolio(PORTFOLIO).unwrap();

        let summary = seed_ledger(&ledger, &portfolio).await.unwrap();
        assert_eq!(summary, SeedSummary { accounts: 2, holdings: 1, orders: 2 });
        let names: Vec<String> = ledger.accounts().await.unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, ["brokerage", "ira"]);

        let holdings = ledger.holdings(None).await.unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].current_price, dec!(20));

        let orders = ledger.open_orders().await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].limit_price, Some(dec!(18.5)));
        let ira = ledger.get_account(orders[1].account_id).await.unwrap();
        assert_eq!(ira.available_funds, dec!(2500.50));
        assert!(ira.exclude_from_totals);
    }

    #[tokio::test]
    async fn invalid_orders_are_reported_with_their_position() {
        let ledger = InMemoryLedger::new();
        let content = format!(
            "{}\n[[orders]]\naccount = \"brokerage\"\nsymbol = \"ACME\"\naction = \"BUY\"\nstrategy = \"STOP_LOSS\"\nquantity = 1\nlimit_price = \"5\"\n",
            PORTFOLIO
        );
        let portfolio = app_config::parse_portfolio(&content).unwrap();

        let err = seed_ledger(&ledger, &portfolio).await.unwrap_err();
        assert!(err.to_string().contains("order #3"), "{}", err);
    }
}
