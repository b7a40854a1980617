use crate::error::{ConfigurationError, Error, Result};
use crate::locator::LocatorSet;
use crate::locator_set;
use crate::page::BasePage;
use std::time::Duration;

pub const LOGIN_URL: &str = "https://signin.ebay.com/";

/// How long to leave the browser alone while a human solves a CAPTCHA.
pub const DEFAULT_CAPTCHA_WAIT: Duration = Duration::from_secs(20);

/// Single look at the current DOM, no polling.
const INSTANT: Duration = Duration::ZERO;

#[derive(Debug, Clone)]
pub struct LoginLocators {
    pub username: LocatorSet,
    pub password: LocatorSet,
    pub continue_button: LocatorSet,
    pub sign_in_button: LocatorSet,
    pub error_message: LocatorSet,
    pub captcha: LocatorSet,
    pub skip_for_now: LocatorSet,
}

impl LoginLocators {
    pub fn new() -> std::result::Result<Self, ConfigurationError> {
        Ok(Self {
            username: locator_set!("Username Input Field", [
                "//label[text()=\"Email or username\"]/..//input",
                "#userid",
                "input[name='userid']",
                "input[type='email']",
                "input[autocomplete='username']",
                "//input[@type='text' or @type='email']",
                ("css", "input#userid"),
            ])?,
            password: locator_set!("Password Input Field", [
                "//label[text()=\"Password\"]/..//input",
                "#pass",
                "input[type='password']",
                "input[name='pass']",
                "//input[@name='pass' and @type='password']",
                ("id", "pass"),
            ])?,
            continue_button: locator_set!("Continue Button", [
                "//button[text()=\"Continue\"]",
                "#signin-continue-btn",
                "button[data-testid='signin-continue-btn']",
                "button[type='submit']",
                "//button[contains(text(), 'Continue')]",
                "button[id*='continue']",
            ])?,
            sign_in_button: locator_set!("Sign In Button", [
                "#sgnBt",
                "button[name='sgnBt']",
                "//button[@id='sgnBt']",
                "//button[contains(text(), 'Sign in')]",
                ("css", "button#sgnBt"),
            ])?,
            error_message: locator_set!("Error Message", [
                "#errMsg",
                ".errMsg",
                "//div[contains(@class, 'errMsg')]",
                "//span[contains(@class, 'error')]",
            ])?,
            captcha: locator_set!("Captcha Challenge", [
                "iframe[title*='captcha']",
                "iframe[src*='captcha']",
                "#captcha",
                ".captcha",
                "//div[contains(@class, 'captcha')]",
                "[id*='captcha']",
            ])?,
            skip_for_now: locator_set!("Skip For Now Link", [
                "//a[text()='Skip for now']",
                "a:has-text('Skip for now')",
                "button:has-text('Skip for now')",
                "a[href*='skip']",
                ("text", "Skip for now"),
            ])?,
        })
    }

    pub fn sets(&self) -> Vec<&LocatorSet> {
        vec![
            &self.username,
            &self.password,
            &self.continue_button,
            &self.sign_in_button,
            &self.error_message,
            &self.captcha,
            &self.skip_for_now,
        ]
    }
}

/// Two-step sign-in: username, continue, password, sign in.
pub struct LoginPage {
    page: BasePage,
    locators: LoginLocators,
    login_url: String,
    captcha_wait: Duration,
}

impl LoginPage {
    pub fn new(page: BasePage) -> Result<Self> {
        Ok(Self {
            page,
            locators: LoginLocators::new()?,
            login_url: LOGIN_URL.to_string(),
            captcha_wait: DEFAULT_CAPTCHA_WAIT,
        })
    }

    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = url.into();
        self
    }

    pub fn with_captcha_wait(mut self, wait: Duration) -> Self {
        self.captcha_wait = wait;
        self
    }

    pub fn locators(&self) -> &LoginLocators {
        &self.locators
    }

    pub async fn open(&self) -> Result<()> {
        log::info!("Navigating to login page");
        self.page.navigate_to(&self.login_url).await?;
        self.page.settle().await;
        Ok(())
    }

    pub async fn enter_username(&self, username: &str) -> Result<()> {
        log::info!("Entering username: {}", username);
        self.page.fill(&self.locators.username, username).await
    }

    pub async fn click_continue(&self) -> Result<()> {
        self.page.click(&self.locators.continue_button).await?;
        log::info!("Clicked Continue, waiting for password field");
        self.page.settle().await;
        Ok(())
    }

    pub async fn enter_password(&self, password: &str) -> Result<()> {
        log::info!("Entering password");
        self.page.fill_secret(&self.locators.password, password).await
    }

    pub async fn click_sign_in(&self) -> Result<()> {
        self.page.click(&self.locators.sign_in_button).await
    }

    pub async fn is_captcha_present(&self) -> bool {
        let present = self.page.is_present_within(&self.locators.captcha, INSTANT).await;
        if present {
            log::warn!("CAPTCHA detected on page");
        }
        present
    }

    /// Give a human `captcha_wait` to solve the challenge in the browser window.
    pub async fn wait_for_captcha_solution(&self) {
        log::warn!(
            "CAPTCHA detected: waiting up to {} seconds for it to be solved manually",
            self.captcha_wait.as_secs()
        );
        self.page.pause(self.captcha_wait).await;
        log::info!("Continuing after CAPTCHA wait period");
    }

    /// Click the post-login "Skip for now" prompt if it shows up.
    pub async fn skip_for_now_if_present(&self) -> Result<bool> {
        log::info!("Checking for 'Skip for now' link");
        self.page.settle().await;
        if !self.page.is_visible_within(&self.locators.skip_for_now, INSTANT).await {
            log::info!("'Skip for now' link not found, continuing");
            return Ok(false);
        }
        self.page.click(&self.locators.skip_for_now).await?;
        self.page.settle().await;
        Ok(true)
    }

    pub async fn error_message(&self) -> Option<String> {
        if !self.page.is_visible_within(&self.locators.error_message, INSTANT).await {
            return None;
        }
        match self.page.read_text(&self.locators.error_message).await {
            Ok(text) => {
                log::warn!("Login error detected: {}", text);
                Some(text)
            }
            Err(e) => {
                log::debug!("Error message vanished before it could be read: {}", e);
                None
            }
        }
    }

    /// Signed in once the browser has left the sign-in host.
    pub async fn is_login_successful(&self) -> bool {
        match self.page.current_url().await {
            Ok(url) if !url.to_ascii_lowercase().contains("signin") => {
                log::info!("Login successful, redirected away from sign-in page");
                true
            }
            Ok(_) => {
                log::warn!("Login may have failed, still on sign-in page");
                false
            }
            Err(e) => {
                log::error!("Error checking login status: {}", e);
                false
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        log::info!("Starting login process for user: {}", username);
        match self.run_login(username, password).await {
            Ok(()) => {
                log::info!("Login completed successfully");
                Ok(())
            }
            Err(e) => {
                log::error!("Login process failed: {}", e);
                if !matches!(e, Error::Flow(_)) {
                    self.page.checkpoint("login_exception").await;
                }
                Err(e)
            }
        }
    }

    async fn run_login(&self, username: &str, password: &str) -> Result<()> {
        self.open().await?;
        self.enter_username(username).await?;
        if self.is_captcha_present().await {
            self.wait_for_captcha_solution().await;
        }

        self.click_continue().await?;
        if self.is_captcha_present().await {
            self.wait_for_captcha_solution().await;
        }

        self.enter_password(password).await?;
        self.click_sign_in().await?;
        self.skip_for_now_if_present().await?;

        if let Some(message) = self.error_message().await {
            self.page.checkpoint("login_error").await;
            return Err(Error::Flow(format!("Login rejected: {}", message)));
        }
        if !self.is_login_successful().await {
            self.page.checkpoint("login_failed_verification").await;
            return Err(Error::Flow(
                "Login verification failed: still on the sign-in page".to_string(),
            ));
        }
        Ok(())
    }
}
