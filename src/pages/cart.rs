use super::price::parse_price;
use crate::error::{ConfigurationError, Result};
use crate::locator::LocatorSet;
use crate::locator_set;
use crate::page::BasePage;

#[derive(Debug, Clone)]
pub struct CartLocators {
    pub cart_icon: LocatorSet,
    pub subtotal: LocatorSet,
    pub items: LocatorSet,
}

impl CartLocators {
    pub fn new() -> std::result::Result<Self, ConfigurationError> {
        Ok(Self {
            cart_icon: locator_set!("Cart Icon", [
                ("id", "gh-cart"),
                "//a[@title='Your shopping cart']",
                "//a[contains(@href, '/sh/sc')]",
                "a[href*='cart']",
            ])?,
            subtotal: locator_set!("Cart Subtotal", [
                "//span[@class='total-price']",
                "//div[contains(@class, 'subtotal')]//span[contains(@class, 'price')]",
                "//div[@data-test-id='SUBTOTAL']//span[contains(text(), '$')]",
            ])?,
            items: locator_set!("Cart Items", [
                "//div[@data-test-id='cart-item']",
                "//div[contains(@class, 'cart-item')]",
            ])?,
        })
    }

    pub fn sets(&self) -> Vec<&LocatorSet> {
        vec![&self.cart_icon, &self.subtotal, &self.items]
    }
}

pub struct CartPage {
    page: BasePage,
    locators: CartLocators,
}

impl CartPage {
    pub fn new(page: BasePage) -> Result<Self> {
        Ok(Self {
            page,
            locators: CartLocators::new()?,
        })
    }

    pub fn locators(&self) -> &CartLocators {
        &self.locators
    }

    pub async fn open(&self) -> Result<()> {
        log::info!("Opening cart");
        self.page.click(&self.locators.cart_icon).await?;
        self.page.settle().await;
        self.page.checkpoint("cart_opened").await;
        Ok(())
    }

    pub async fn total(&self) -> Result<f64> {
        let text = self.page.read_text(&self.locators.subtotal).await?;
        let total = parse_price(&text).map_err(|e| {
            log::error!("Could not parse cart total from: {}", text);
            e
        })?;
        log::info!("Cart total: ${:.2}", total);
        Ok(total)
    }

    /// Number of line items; an empty cart has none to match.
    pub async fn item_count(&self) -> Result<usize> {
        if !self
            .page
            .is_present_within(&self.locators.items, self.page.timeouts().optional)
            .await
        {
            log::info!("Cart contains 0 items");
            return Ok(0);
        }
        let count = self.page.find_all(&self.locators.items).await?.len();
        log::info!("Cart contains {} items", count);
        Ok(count)
    }
}
