//! End-to-end shopping scenario: search under a price, fill the cart, check
//! the cart total against the budget.

use crate::config::TestData;
use crate::error::{Error, Result};
use crate::page::BasePage;
use crate::pages::{CartPage, LoginPage, ProductPage, SearchPage};

/// Outcome of a full scenario run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub found_urls: Vec<String>,
    pub added: usize,
    pub cart_total: f64,
    pub threshold: f64,
}

/// Fail when `total` exceeds `budget_per_item * items_count`.
pub fn check_budget(total: f64, budget_per_item: f64, items_count: usize) -> Result<f64> {
    let threshold = budget_per_item * items_count as f64;
    log::info!(
        "Threshold: ${:.2} (${:.2} x {} items)",
        threshold,
        budget_per_item,
        items_count
    );
    if total > threshold {
        return Err(Error::BudgetExceeded { total, threshold });
    }
    Ok(threshold)
}

/// Search for `query`, try the price facet and collect up to `limit` result
/// URLs priced at or below `max_price`.
pub async fn search_items_by_name_under_price(
    search: &SearchPage,
    query: &str,
    max_price: f64,
    limit: usize,
) -> Result<Vec<String>> {
    search.search(query).await?;
    search.apply_price_filter(max_price).await;
    search.collect_items_under_price(max_price, limit).await
}

/// Add every URL to the cart. A failing item is logged and screenshotted,
/// then skipped. Returns how many were added.
pub async fn add_items_to_cart(page: &BasePage, product: &ProductPage, urls: &[String]) -> usize {
    let mut added = 0;
    for (i, url) in urls.iter().enumerate() {
        let index = i + 1;
        log::info!("Adding item {}/{} to cart: {}", index, urls.len(), url);
        let result = async {
            product.open(url).await?;
            product.add_to_cart().await
        }
        .await;

        match result {
            Ok(()) => added += 1,
            Err(e) => {
                log::error!("Failed to add item {} to cart: {}", index, e);
                page.checkpoint(&format!("add_to_cart_failure_item_{}", index))
                    .await;
            }
        }
    }
    log::info!("Added {}/{} items to cart", added, urls.len());
    added
}

/// Open the cart and assert its total does not exceed
/// `budget_per_item * items_count`. Returns `(total, threshold)`.
pub async fn assert_cart_total_not_exceeds(
    page: &BasePage,
    cart: &CartPage,
    budget_per_item: f64,
    items_count: usize,
) -> Result<(f64, f64)> {
    cart.open().await?;
    let total = cart.total().await?;
    page.checkpoint("cart_total_validation").await;

    let threshold = check_budget(total, budget_per_item, items_count)?;
    log::info!(
        "Cart total validation passed: ${:.2} <= ${:.2}",
        total,
        threshold
    );
    Ok((total, threshold))
}

/// The whole scenario, driven by `data`.
pub async fn run_shopping_scenario(page: &BasePage, data: &TestData) -> Result<ScenarioReport> {
    let login = LoginPage::new(page.clone())?;
    let search = SearchPage::new(page.clone())?;
    let product = ProductPage::new(page.clone())?;
    let cart = CartPage::new(page.clone())?;

    page.navigate_to(&data.base_url).await?;

    if data.login_enabled {
        match data.credentials() {
            Some((username, password)) => login.login(username, password).await?,
            None => log::warn!("Login enabled but no credentials were provided"),
        }
        page.navigate_to(&data.base_url).await?;
    }

    let found_urls = search_items_by_name_under_price(
        &search,
        &data.search_query,
        data.max_price,
        data.item_limit,
    )
    .await?;
    if found_urls.is_empty() {
        return Err(Error::Flow(format!(
            "No items found under ${:.2}",
            data.max_price
        )));
    }
    log::info!("Found {} items to add to cart", found_urls.len());

    let added = add_items_to_cart(page, &product, &found_urls).await;
    let (cart_total, threshold) =
        assert_cart_total_not_exceeds(page, &cart, data.max_price, found_urls.len()).await?;

    Ok(ScenarioReport {
        found_urls,
        added,
        cart_total,
        threshold,
    })
}
