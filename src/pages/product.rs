use crate::error::{ConfigurationError, Result};
use crate::locator::LocatorSet;
use crate::locator_set;
use crate::page::BasePage;
use rand::seq::SliceRandom;

#[derive(Debug, Clone)]
pub struct ProductLocators {
    pub add_to_cart: LocatorSet,
    pub variant_buttons: LocatorSet,
}

impl ProductLocators {
    pub fn new() -> std::result::Result<Self, ConfigurationError> {
        Ok(Self {
            add_to_cart: locator_set!("Add to Cart Button", [
                ("id", "isCartBtn_btn"),
                "//a[contains(@class, 'ux-call-to-action') and contains(text(), 'Add to cart')]",
                "//button[contains(text(), 'Add to cart')]",
                "//span[text()='Add to cart']/../..",
                "a:has-text('Add to cart')",
            ])?,
            variant_buttons: locator_set!("Variant Buttons", [
                ("xpath", "//div[contains(@class, 'msku')]//button[not(@disabled)]"),
                ("xpath", "//fieldset//button[not(@disabled)]"),
            ])?,
        })
    }

    pub fn sets(&self) -> Vec<&LocatorSet> {
        vec![&self.add_to_cart, &self.variant_buttons]
    }
}

pub struct ProductPage {
    page: BasePage,
    locators: ProductLocators,
}

impl ProductPage {
    pub fn new(page: BasePage) -> Result<Self> {
        Ok(Self {
            page,
            locators: ProductLocators::new()?,
        })
    }

    pub fn locators(&self) -> &ProductLocators {
        &self.locators
    }

    pub async fn open(&self, url: &str) -> Result<()> {
        self.page.navigate_to(url).await?;
        self.page.settle().await;
        Ok(())
    }

    /// Click one enabled variant button at random. Absence is not an error.
    pub async fn select_random_variant(&self) -> bool {
        log::info!("Checking for product variants");
        if !self
            .page
            .is_present_within(&self.locators.variant_buttons, self.page.timeouts().optional)
            .await
        {
            log::debug!("No variant buttons on this product");
            return false;
        }

        let buttons = match self.page.find_all(&self.locators.variant_buttons).await {
            Ok(buttons) => buttons,
            Err(e) => {
                log::debug!("No variant buttons or error: {}", e);
                return false;
            }
        };
        let Some(button) = buttons.choose(&mut rand::thread_rng()) else {
            return false;
        };

        match self.page.click_handle(button, "Variant Button").await {
            Ok(()) => {
                log::info!("Clicked random variant button ({} available)", buttons.len());
                self.page.settle().await;
                true
            }
            Err(e) => {
                log::debug!("Variant button click failed: {}", e);
                false
            }
        }
    }

    pub async fn add_to_cart(&self) -> Result<()> {
        log::info!("Adding product to cart");
        self.select_random_variant().await;
        self.page.click(&self.locators.add_to_cart).await?;
        self.page.settle().await;
        self.page.checkpoint("product_added_to_cart").await;
        log::info!("Product added to cart successfully");
        Ok(())
    }
}
