//! Site selector catalogs and page flows.
//!
//! Built only on the public [`BasePage`](crate::page::BasePage) operations.

pub mod cart;
pub mod login;
pub mod price;
pub mod product;
pub mod search;

pub use cart::{CartLocators, CartPage};
pub use login::{LoginLocators, LoginPage};
pub use price::parse_price;
pub use product::{ProductLocators, ProductPage};
pub use search::{SearchLocators, SearchPage};

use crate::error::ConfigurationError;
use crate::locator::{normalize, LocatorSet};

/// One declared locator set and the page it belongs to.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub page: &'static str,
    pub set: LocatorSet,
}

/// Build every declared locator set and normalize every descriptor.
///
/// Run at startup so authoring mistakes surface before a browser is launched.
pub fn validate_catalog() -> Result<Vec<CatalogEntry>, ConfigurationError> {
    let login = LoginLocators::new()?;
    let search = SearchLocators::new()?;
    let product = ProductLocators::new()?;
    let cart = CartLocators::new()?;

    let pages: [(&'static str, Vec<&LocatorSet>); 4] = [
        ("login", login.sets()),
        ("search", search.sets()),
        ("product", product.sets()),
        ("cart", cart.sets()),
    ];

    let mut entries = Vec::new();
    for (page, sets) in pages {
        for set in sets {
            for (i, descriptor) in set.iter().enumerate() {
                log::debug!(
                    "{} / {} #{}: {} -> {}",
                    page,
                    set.name(),
                    i + 1,
                    descriptor,
                    normalize(descriptor)
                );
            }
            entries.push(CatalogEntry {
                page,
                set: set.clone(),
            });
        }
    }
    Ok(entries)
}
