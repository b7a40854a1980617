//! Fallback cascade behavior of the locator engine against an in-memory DOM.

mod common;

use cartwright::driver::ElementState;
use cartwright::locator::AttemptOutcome;
use cartwright::locator_set;
use common::{engine_for, files_in, Failure, FakeDriver, FakeElement};
use std::time::Duration;
use tempfile::TempDir;

const ATTEMPT: Duration = Duration::from_millis(100);

fn sign_in_set() -> cartwright::LocatorSet {
    locator_set!("Sign In Button", [
        "#sgnBt",
        "button[name='sgnBt']",
        ("xpath", "//button[contains(text(), 'Sign in')]"),
    ])
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_first_locator_wins_without_trying_the_rest() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    driver.add("#sgnBt", "signin", FakeElement::visible());
    driver.alias("button[name='sgnBt']", "signin");
    let engine = engine_for(driver.clone(), dir.path());

    let resolved = engine
        .resolve(&sign_in_set(), ATTEMPT, ElementState::Visible)
        .await
        .unwrap();

    assert_eq!(resolved.descriptor_index, 1);
    assert_eq!(resolved.handle().id(), "signin");
    assert_eq!(resolved.attempts.len(), 1);
    assert_eq!(driver.selectors_tried(), vec!["#sgnBt"]);
}

#[tokio::test(start_paused = true)]
async fn test_falls_back_to_second_locator() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    driver.add("button[name='sgnBt']", "signin", FakeElement::visible());
    let engine = engine_for(driver.clone(), dir.path());

    let resolved = engine
        .resolve(&sign_in_set(), ATTEMPT, ElementState::Visible)
        .await
        .unwrap();

    assert_eq!(resolved.descriptor_index, 2);
    let outcomes: Vec<_> = resolved.attempts.iter().map(|a| a.outcome.clone()).collect();
    assert_eq!(outcomes, vec![AttemptOutcome::Timeout, AttemptOutcome::Success]);
    assert_eq!(driver.selectors_tried(), vec!["#sgnBt", "button[name='sgnBt']"]);
    assert!(files_in(dir.path()).is_empty(), "success must not screenshot");
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_tries_each_locator_once_and_captures_screenshot() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    driver.set_location("https://signin.ebay.com/", "Sign in or Register");
    let engine = engine_for(driver.clone(), dir.path());

    let err = engine
        .resolve(&sign_in_set(), ATTEMPT, ElementState::Visible)
        .await
        .unwrap_err();

    assert_eq!(err.element_name, "Sign In Button");
    assert_eq!(err.attempts.len(), 3);
    for (i, attempt) in err.attempts.iter().enumerate() {
        assert_eq!(attempt.index, i + 1);
        assert_eq!(attempt.outcome, AttemptOutcome::Timeout);
        assert!(attempt.elapsed_ms >= ATTEMPT.as_millis() as u64);
    }
    assert_eq!(
        driver.selectors_tried(),
        vec![
            "#sgnBt",
            "button[name='sgnBt']",
            "//button[contains(text(), 'Sign in')]"
        ]
    );

    let screenshot = err.screenshot_path.clone().expect("screenshot captured");
    assert!(screenshot.exists());
    let files = files_in(dir.path());
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("failed_Sign_In_Button_"), "{:?}", files);
    assert!(files[0].ends_with(".png"));

    let message = err.to_string();
    assert!(message.contains("Failed to find 'Sign In Button' after trying 3 locator strategies"));
    assert!(message.contains("failed_Sign_In_Button_"));
}

#[tokio::test(start_paused = true)]
async fn test_resolution_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    driver.add("//button[contains(text(), 'Sign in')]", "signin", FakeElement::visible());
    let engine = engine_for(driver.clone(), dir.path());
    let set = sign_in_set();

    let first = engine.resolve(&set, ATTEMPT, ElementState::Visible).await.unwrap();
    let second = engine.resolve(&set, ATTEMPT, ElementState::Visible).await.unwrap();

    assert_eq!(first.descriptor_index, 3);
    assert_eq!(second.descriptor_index, 3);
    assert_eq!(first.value, second.value);
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_element_to_become_visible() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    driver.add("#sgnBt", "signin", FakeElement::hidden());
    driver.reveal_after("signin", Duration::from_millis(60));
    let engine = engine_for(driver.clone(), dir.path());

    let resolved = engine
        .resolve(&sign_in_set(), ATTEMPT, ElementState::Visible)
        .await
        .unwrap();

    assert_eq!(resolved.descriptor_index, 1);
    assert!(resolved.attempts[0].elapsed_ms >= 60);
    assert!(resolved.attempts[0].elapsed_ms < ATTEMPT.as_millis() as u64);
}

#[tokio::test(start_paused = true)]
async fn test_each_attempt_gets_its_own_budget() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    // Both descriptors find the same element, which only shows up after the
    // first attempt has used its whole budget.
    driver.add("#sgnBt", "signin", FakeElement::hidden());
    driver.alias("button[name='sgnBt']", "signin");
    driver.reveal_after("signin", Duration::from_millis(150));
    let engine = engine_for(driver.clone(), dir.path());

    let resolved = engine
        .resolve(&sign_in_set(), ATTEMPT, ElementState::Visible)
        .await
        .unwrap();

    assert_eq!(resolved.descriptor_index, 2);
    assert_eq!(resolved.attempts[0].outcome, AttemptOutcome::Timeout);
    assert_eq!(resolved.attempts[1].outcome, AttemptOutcome::Success);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_selector_is_recorded_and_cascade_continues() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    driver.fail("#sgnBt", Failure::InvalidSelector);
    driver.add("button[name='sgnBt']", "signin", FakeElement::visible());
    let engine = engine_for(driver.clone(), dir.path());

    let resolved = engine
        .resolve(&sign_in_set(), ATTEMPT, ElementState::Visible)
        .await
        .unwrap();

    assert_eq!(resolved.descriptor_index, 2);
    match &resolved.attempts[0].outcome {
        AttemptOutcome::Error(reason) => assert!(reason.contains("Invalid selector"), "{}", reason),
        other => panic!("expected an error outcome, got {:?}", other),
    }
    // An unusable selector fails straight away instead of polling.
    assert_eq!(driver.locate_calls().iter().filter(|s| *s == "#sgnBt").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_element_errors_are_recovered() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    driver.fail("#sgnBt", Failure::Stale);
    driver.fail("button[name='sgnBt']", Failure::Stale);
    driver.add("//button[contains(text(), 'Sign in')]", "signin", FakeElement::visible());
    let engine = engine_for(driver.clone(), dir.path());

    let resolved = engine
        .resolve(&sign_in_set(), ATTEMPT, ElementState::Visible)
        .await
        .unwrap();

    assert_eq!(resolved.descriptor_index, 3);
    assert!(resolved.attempts[..2]
        .iter()
        .all(|a| matches!(a.outcome, AttemptOutcome::Error(_))));
}

#[tokio::test(start_paused = true)]
async fn test_hidden_and_attached_states() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    driver.add("#sgnBt", "signin", FakeElement::hidden());
    let engine = engine_for(driver.clone(), dir.path());
    let set = sign_in_set();

    let hidden = engine.resolve(&set, ATTEMPT, ElementState::Hidden).await.unwrap();
    assert_eq!(hidden.descriptor_index, 1);

    let attached = engine.resolve(&set, ATTEMPT, ElementState::Attached).await.unwrap();
    assert_eq!(attached.descriptor_index, 1);

    let visible = engine.try_resolve(&set, ATTEMPT, ElementState::Visible).await;
    assert!(visible.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_try_resolve_skips_diagnostics() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    let engine = engine_for(driver.clone(), dir.path());

    let attempts = engine
        .try_resolve(&sign_in_set(), Duration::ZERO, ElementState::Visible)
        .await
        .unwrap_err();

    assert_eq!(attempts.len(), 3);
    // A zero budget still looks once per descriptor.
    assert_eq!(driver.locate_calls().len(), 3);
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_broken_screenshot_still_reports_not_found() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    driver.break_screenshots();
    let engine = engine_for(driver.clone(), dir.path());

    let err = engine
        .resolve(&sign_in_set(), ATTEMPT, ElementState::Visible)
        .await
        .unwrap_err();

    assert_eq!(err.attempts.len(), 3);
    assert!(err.screenshot_path.is_none());
    assert!(err.to_string().contains("<not captured>"));
}

#[tokio::test(start_paused = true)]
async fn test_resolve_all_moves_past_locators_matching_nothing() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    for i in 0..3 {
        driver.add(
            "//span[contains(@class, 's-item__price')]",
            &format!("price-{}", i),
            FakeElement::visible().with_text("$10.00"),
        );
    }
    let engine = engine_for(driver.clone(), dir.path());
    let set = locator_set!("Product Prices", [
        ("xpath", "//li[contains(@class, 's-item')]//span[@class='s-item__price']"),
        ("xpath", "//span[contains(@class, 's-item__price')]"),
    ])
    .unwrap();

    let resolved = engine.resolve_all(&set, ATTEMPT).await.unwrap();

    assert_eq!(resolved.descriptor_index, 2);
    let ids: Vec<_> = resolved.value.iter().map(|h| h.id().to_string()).collect();
    assert_eq!(ids, vec!["price-0", "price-1", "price-2"]);
    assert_eq!(resolved.attempts[0].outcome, AttemptOutcome::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_resolve_all_exhaustion_captures_screenshot() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    let engine = engine_for(driver.clone(), dir.path());
    let set = locator_set!("Cart Items", ["//div[@data-test-id='cart-item']"]).unwrap();

    let err = engine.resolve_all(&set, ATTEMPT).await.unwrap_err();

    assert_eq!(err.attempts.len(), 1);
    let files = files_in(dir.path());
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("failed_Cart_Items_"));
}

#[tokio::test(start_paused = true)]
async fn test_resolves_once_element_detaches() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    driver.add("#spinner", "spinner", FakeElement::visible());
    driver.detach_after("spinner", Duration::from_millis(40));
    let engine = engine_for(driver.clone(), dir.path());
    let set = locator_set!("Loading Spinner", ["#spinner"]).unwrap();

    let resolved = engine
        .resolve(&set, ATTEMPT, ElementState::Detached)
        .await
        .unwrap();

    assert_eq!(resolved.descriptor_index, 1);
    assert_eq!(resolved.handle().id(), "spinner");
    assert!(resolved.attempts[0].elapsed_ms >= 40);
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_element_that_never_detaches_times_out() {
    let dir = TempDir::new().unwrap();
    let driver = FakeDriver::new();
    driver.add("#spinner", "spinner", FakeElement::visible());
    let engine = engine_for(driver.clone(), dir.path());
    let set = locator_set!("Loading Spinner", ["#spinner"]).unwrap();

    let err = engine
        .resolve(&set, ATTEMPT, ElementState::Detached)
        .await
        .unwrap_err();

    assert_eq!(err.attempts.len(), 1);
    assert_eq!(err.attempts[0].outcome, AttemptOutcome::Timeout);
    assert!(err.attempts[0].elapsed_ms >= ATTEMPT.as_millis() as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_sessions_keep_every_failure_screenshot() {
    let dir = TempDir::new().unwrap();
    let sessions = 64;

    let tasks: Vec<_> = (0..sessions)
        .map(|_| {
            let screenshot_dir = dir.path().to_path_buf();
            tokio::spawn(async move {
                let engine = engine_for(FakeDriver::new(), &screenshot_dir);
                let set = locator_set!("Search Box", ["#nope"]).unwrap();
                engine
                    .resolve(&set, Duration::ZERO, ElementState::Visible)
                    .await
                    .unwrap_err()
                    .screenshot_path
                    .expect("screenshot captured")
            })
        })
        .collect();

    let mut paths = std::collections::HashSet::new();
    for task in tasks {
        paths.insert(task.await.unwrap());
    }

    assert_eq!(paths.len(), sessions);
    let files = files_in(dir.path());
    assert_eq!(files.len(), sessions);
    assert!(files.iter().all(|f| f.starts_with("failed_Search_Box_")));
    for path in &paths {
        assert_eq!(std::fs::read(path).unwrap(), common::PNG_MAGIC);
    }
}
