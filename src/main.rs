use anyhow::Context;
use cartwright::config::{DEFAULT_CONFIG_PATH, DEFAULT_TEST_DATA_PATH};
use cartwright::pages::{self, SearchPage};
use cartwright::{scenario, BasePage, ChromeDriver, Driver, Settings, TestData};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (YAML)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Scenario test data (JSON)
    #[arg(long, global = true, default_value = DEFAULT_TEST_DATA_PATH)]
    data: PathBuf,

    /// Run the browser headless regardless of settings
    #[arg(long, global = true)]
    headless: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the end-to-end shopping scenario
    Run,
    /// Build and normalize every declared locator set, then exit
    CheckLocators,
    /// Open the base URL and check that the search box resolves
    Smoke,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(Some(&args.config))
        .with_context(|| format!("loading settings from {}", args.config.display()))?;
    if args.headless {
        settings.headless = true;
    }
    cartwright::logging::init(&settings.logs_dir).context("initializing logging")?;
    log::info!("Browser: {} (headless: {})", settings.browser, settings.headless);

    match args.command {
        Command::CheckLocators => check_locators(),
        Command::Smoke => with_browser(&settings, |page| smoke(page, &settings)).await,
        Command::Run => {
            let data = TestData::load(Some(&args.data))
                .with_context(|| format!("loading test data from {}", args.data.display()))?;
            with_browser(&settings, |page| run(page, data)).await
        }
    }
}

fn check_locators() -> anyhow::Result<()> {
    let entries = pages::validate_catalog()?;
    for entry in &entries {
        println!(
            "{:<8} {:<24} {} locator(s)",
            entry.page,
            entry.set.name(),
            entry.set.len()
        );
    }
    println!("{} locator sets OK", entries.len());
    Ok(())
}

/// Launch the browser, hand a page to `f`, close the browser afterwards.
///
/// On failure the error is reported before the browser goes away.
async fn with_browser<F, Fut>(settings: &Settings, f: F) -> anyhow::Result<()>
where
    F: FnOnce(BasePage) -> Fut,
    Fut: std::future::Future<Output = cartwright::Result<()>>,
{
    let chrome = Arc::new(ChromeDriver::from_settings(settings).await?);
    let driver: Arc<dyn Driver> = chrome.clone();
    let page = BasePage::from_settings(driver, settings);

    let outcome = f(page).await;
    if let Err(e) = &outcome {
        log::error!("Run failed: {}", e);
        if let Some(not_found) = e.as_element_not_found() {
            log::error!("Locators tried:\n{}", not_found.attempts_summary());
        }
    }

    match Arc::try_unwrap(chrome) {
        Ok(chrome) => {
            if let Err(e) = chrome.close().await {
                log::warn!("Error closing browser: {}", e);
            }
        }
        Err(_) => log::warn!("Browser still in use, leaving it to shut down on exit"),
    }
    outcome.map_err(Into::into)
}

async fn smoke(page: BasePage, settings: &Settings) -> cartwright::Result<()> {
    page.navigate_to(&settings.base_url).await?;
    log::info!("Loaded '{}' at {}", page.title().await?, page.current_url().await?);

    let search = SearchPage::new(page.clone())?;
    let search_box = page.find(&search.locators().search_input).await?;
    log::info!("Search box resolved ({})", search_box);
    page.checkpoint("smoke").await;
    println!("Smoke check passed");
    Ok(())
}

async fn run(page: BasePage, data: TestData) -> cartwright::Result<()> {
    let report = scenario::run_shopping_scenario(&page, &data).await?;
    println!(
        "Added {}/{} items; cart total ${:.2} <= ${:.2}",
        report.added,
        report.found_urls.len(),
        report.cart_total,
        report.threshold
    );
    Ok(())
}
