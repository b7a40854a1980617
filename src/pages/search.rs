use super::price::parse_price;
use crate::error::{ConfigurationError, Result};
use crate::locator::LocatorSet;
use crate::locator_set;
use crate::page::BasePage;
use std::time::Duration;

/// Upper bound on result pages walked while collecting items.
pub const MAX_RESULT_PAGES: usize = 10;

const INSTANT: Duration = Duration::ZERO;

#[derive(Debug, Clone)]
pub struct SearchLocators {
    pub search_input: LocatorSet,
    pub search_button: LocatorSet,
    pub price_min: LocatorSet,
    pub price_max: LocatorSet,
    pub price_submit: LocatorSet,
    pub result_links: LocatorSet,
    pub result_prices: LocatorSet,
    pub next_page: LocatorSet,
}

impl SearchLocators {
    pub fn new() -> std::result::Result<Self, ConfigurationError> {
        Ok(Self {
            search_input: locator_set!("Search Input", [
                ("id", "gh-ac"),
                "//input[@type='text' and @aria-label='Search for anything']",
                "input[type='text'][placeholder*='Search']",
                "input[name='_nkw']",
            ])?,
            search_button: locator_set!("Search Button", [
                ("id", "gh-btn"),
                "//input[@type='submit' and @value='Search']",
                "input[type='submit'][value*='Search']",
                "//button[@type='submit']",
            ])?,
            price_min: locator_set!("Min Price Input", [
                ("xpath", "//input[@aria-label='Minimum Value in $']"),
                ("xpath", "input[contains(@class, 'x-textrange__input--from')]"),
            ])?,
            price_max: locator_set!("Max Price Input", [
                ("xpath", "//input[@aria-label='Maximum Value in $']"),
                ("xpath", "input[contains(@class, 'x-textrange__input--to')]"),
            ])?,
            price_submit: locator_set!("Price Submit Button", [
                ("xpath", "//button[contains(@aria-label, 'Submit price range')]"),
                ("xpath", "//button[contains(text(), 'Submit')]"),
            ])?,
            result_links: locator_set!("Product Items", [
                ("xpath", "//li[contains(@class, 's-item')]//a[@class='s-item__link']"),
                ("xpath", "//div[contains(@class, 'srp-results')]//a[contains(@href, '/itm/')]"),
            ])?,
            result_prices: locator_set!("Product Prices", [
                ("xpath", "//li[contains(@class, 's-item')]//span[@class='s-item__price']"),
                ("xpath", "//span[contains(@class, 's-item__price')]"),
            ])?,
            next_page: locator_set!("Next Page Button", [
                ("xpath", "//a[@type='next']"),
                ("xpath", "//a[contains(@class, 'pagination__next')]"),
                "a[aria-label='Go to next search page']",
            ])?,
        })
    }

    pub fn sets(&self) -> Vec<&LocatorSet> {
        vec![
            &self.search_input,
            &self.search_button,
            &self.price_min,
            &self.price_max,
            &self.price_submit,
            &self.result_links,
            &self.result_prices,
            &self.next_page,
        ]
    }
}

pub struct SearchPage {
    page: BasePage,
    locators: SearchLocators,
}

impl SearchPage {
    pub fn new(page: BasePage) -> Result<Self> {
        Ok(Self {
            page,
            locators: SearchLocators::new()?,
        })
    }

    pub fn locators(&self) -> &SearchLocators {
        &self.locators
    }

    /// Run a search, submitting with Enter when the search button cannot be found.
    pub async fn search(&self, query: &str) -> Result<()> {
        log::info!("Searching for: {}", query);
        self.page.fill(&self.locators.search_input, query).await?;

        if let Err(e) = self.page.click(&self.locators.search_button).await {
            log::warn!("Could not click search button: {}", e);
            log::info!("Pressing Enter key to search instead");
            self.page.type_text(&self.locators.search_input, "\n").await?;
        }

        self.page.settle().await;
        self.page.checkpoint(&format!("search_results_{}", query)).await;
        Ok(())
    }

    /// Narrow results with the max-price facet. Returns whether it was applied.
    pub async fn apply_price_filter(&self, max_price: f64) -> bool {
        log::info!("Applying price filter: max ${}", max_price);
        if !self.page.is_visible(&self.locators.price_max).await {
            log::warn!("Price filter not available on this page");
            return false;
        }
        let applied = async {
            self.page
                .fill(&self.locators.price_max, &format!("{}", max_price))
                .await?;
            self.page.click(&self.locators.price_submit).await
        }
        .await;

        match applied {
            Ok(()) => {
                self.page.settle().await;
                self.page.checkpoint("price_filter_applied").await;
                true
            }
            Err(e) => {
                log::warn!("Could not apply price filter: {}", e);
                false
            }
        }
    }

    /// Collect up to `limit` result URLs priced at or below `max_price`,
    /// following the next-page link while more are needed.
    pub async fn collect_items_under_price(&self, max_price: f64, limit: usize) -> Result<Vec<String>> {
        log::info!("Collecting up to {} items under ${}", limit, max_price);
        let mut collected = Vec::new();

        for page_num in 1..=MAX_RESULT_PAGES {
            log::info!("Processing results page {}", page_num);
            if !self
                .page
                .is_present_within(&self.locators.result_links, self.page.timeouts().optional)
                .await
            {
                log::warn!("No products found on this page");
                break;
            }

            let links = self.page.find_all(&self.locators.result_links).await?;
            let prices = self.page.find_all(&self.locators.result_prices).await?;
            if links.len() != prices.len() {
                log::warn!(
                    "Found {} product links but {} prices; pairing in order",
                    links.len(),
                    prices.len()
                );
            }

            for (i, (link, price_el)) in links.iter().zip(prices.iter()).enumerate() {
                if collected.len() >= limit {
                    break;
                }
                let text = self.page.read_text_of(price_el).await?;
                let price = match parse_price(&text) {
                    Ok(price) => price,
                    Err(e) => {
                        log::warn!("Could not parse price for item {}: {}", i + 1, e);
                        continue;
                    }
                };
                if price > max_price {
                    continue;
                }
                match self.page.read_attribute_of(link, "href").await? {
                    Some(url) => {
                        log::info!(
                            "Found item {}/{}: ${:.2} - {}",
                            collected.len() + 1,
                            limit,
                            price,
                            url
                        );
                        collected.push(url);
                    }
                    None => log::warn!("Item {} has no link", i + 1),
                }
            }

            if collected.len() >= limit {
                break;
            }
            if !self.page.is_visible_within(&self.locators.next_page, INSTANT).await {
                log::info!("No more pages available");
                break;
            }
            self.page.click(&self.locators.next_page).await?;
            self.page.settle().await;
        }

        log::info!("Collected {} items total", collected.len());
        Ok(collected)
    }
}
