//! Scenario execution tests against the scripted driver
//!
//! The site below models the monitored dashboard: a login form that
//! redirects to the dashboard, an alerts panel, an STP page whose status
//! widget lives in an iframe, and a few pages with awkward elements.

use std::sync::Arc;
use std::time::Duration;

use dashcheck_common::{
    retry, Assertion, Backoff, ElementState, FailurePolicy, FrameScope, LoadState, Locator, Scenario,
    ScenarioConfig, Selector, Step, WaitUntil,
};
use dashcheck_e2e::{
    AssertionStatus, CancellationToken, ClickEffect, FailureReason, Observed, Outcome, Readiness,
    ScenarioFilter, ScenarioRegistry, ScenarioRunner, ScriptedDriver, ScriptedElement,
    ScriptedFrame, ScriptedPage, ScriptedSite, SessionManager, StepErrorKind,
};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

const BASE_URL: &str = "http://dash.test";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sign_in_button() -> Selector {
    Selector::Role {
        role: "button".into(),
        name: Some("Sign in".into()),
    }
}

fn dashboard_site() -> ScriptedSite {
    ScriptedSite::new()
        .page(
            "/login",
            ScriptedPage::new()
                .element(ScriptedElement::input(Selector::Label("Email".into())))
                .element(ScriptedElement::input(Selector::Label("Password".into())))
                .element(ScriptedElement::new(sign_in_button()).text("Sign in").on_click(
                    ClickEffect::NavigateCarrying {
                        path: "/dashboard".into(),
                        from: Selector::Label("Email".into()),
                        into: Selector::TestId("user-email".into()),
                    },
                )),
        )
        .page(
            "/dashboard",
            ScriptedPage::new()
                .element(ScriptedElement::new(Selector::Text("Dashboard".into())).text("Dashboard"))
                .element(ScriptedElement::new(Selector::TestId("user-email".into())))
                .element(
                    ScriptedElement::new(Selector::TestId("alerts-summary".into()))
                        .text("3 active alerts"),
                ),
        )
        .page(
            "/stp",
            ScriptedPage::new()
                .frame(
                    ScriptedFrame::new("ads", "about:blank")
                        .readiness(Readiness::Never)
                        .element(
                            ScriptedElement::new(Selector::TestId("stp-status".into()))
                                .text("stale"),
                        ),
                )
                .frame(
                    ScriptedFrame::new("chart", "http://dash.test/embed/stp")
                        .named("stp-chart")
                        .element(
                            ScriptedElement::new(Selector::TestId("stp-status".into()))
                                .text("Treatment OK"),
                        ),
                ),
        )
        .page(
            "/assets",
            ScriptedPage::new()
                .element(ScriptedElement::new(Selector::Css("#export".into())).offscreen())
                .element(ScriptedElement::new(Selector::Css("#archived".into())).hidden())
                .element(ScriptedElement::new(Selector::Css("#footer-link".into())).unreachable())
                .element(
                    ScriptedElement::new(Selector::TestId("asset-count".into()))
                        .text("42 assets")
                        .appears_after(Duration::from_millis(150)),
                ),
        )
        .page(
            "/reports",
            ScriptedPage::new().readiness(Readiness::After(Duration::from_millis(100))),
        )
        .page(
            "/hang",
            ScriptedPage::new().commit_delay(Duration::from_secs(3)),
        )
        .page("/spinner", ScriptedPage::new().readiness(Readiness::Never))
        .page(
            "/profile",
            ScriptedPage::new()
                .element(ScriptedElement::input(Selector::Label("Display name".into())).value("Old Name"))
                .element(
                    ScriptedElement::input(Selector::Label("Account id".into()))
                        .value("acct-17")
                        .read_only(),
                )
                .element(ScriptedElement::input(Selector::Css("input[name=csrf]".into())).hidden()),
        )
}

fn config() -> ScenarioConfig {
    ScenarioConfig {
        base_url: BASE_URL.to_string(),
        default_timeout_ms: 400,
        navigation_timeout_ms: 500,
        ..Default::default()
    }
}

fn harness() -> (ScriptedDriver, ScenarioRunner) {
    init_tracing();
    let driver = ScriptedDriver::new(dashboard_site());
    let sessions = SessionManager::new(Arc::new(driver.clone()))
        .with_poll_interval(Duration::from_millis(20));
    (driver, ScenarioRunner::new(Arc::new(sessions)))
}

fn login_steps(email: &str) -> Vec<Step> {
    vec![
        Step::navigate("/login"),
        Step::fill(Locator::label("Email"), email),
        Step::fill(Locator::label("Password"), "s3cret"),
        Step::click(Locator::role("button", Some("Sign in"))),
    ]
}

#[tokio::test]
async fn login_redirects_to_dashboard() {
    let (driver, runner) = harness();
    let scenario = Scenario::builder("login-redirect")
        .config(config())
        .steps(login_steps("ops@example.com"))
        .assert(Assertion::url_contains("/dashboard"))
        .assert(Assertion::text_visible(Locator::test_id("user-email"), "ops@example.com"))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Passed, "{:?}", result);
    assert_eq!(result.steps.len(), 4);
    assert!(result.steps.iter().all(|s| s.success));
    assert_eq!(driver.launches(), 1);
    assert_eq!(driver.closes(), 1);
    assert_eq!(runner.sessions().stats().active(), 0);
}

#[tokio::test]
async fn empty_step_list_still_evaluates_assertions() {
    let (_, runner) = harness();
    let scenario = Scenario::builder("no-steps")
        .config(config())
        .assert(Assertion::url_contains("/dashboard").within(Duration::from_millis(100)))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Failed);
    assert!(result.steps.is_empty());
    let failure = result.assertions[0].failure.as_ref().unwrap();
    assert_eq!(failure.reason, FailureReason::ContentMismatch);
    assert_eq!(failure.observed, Observed::Url("about:blank".into()));
}

#[tokio::test]
async fn every_assertion_is_evaluated_and_absence_differs_from_mismatch() {
    let (_, runner) = harness();
    let quick = Duration::from_millis(150);
    let scenario = Scenario::builder("alerts-empty-state")
        .config(config())
        .step(Step::navigate("/dashboard"))
        .assert(Assertion::text_visible(Locator::test_id("alerts-empty"), "No Alerts Found").within(quick))
        .assert(Assertion::text_visible(Locator::test_id("alerts-summary"), "No Alerts Found").within(quick))
        .assert(Assertion::url_contains("/dashboard"))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Failed);
    assert_eq!(result.assertions.len(), 3);

    let absent = result.assertions[0].failure.as_ref().unwrap();
    assert_eq!(absent.reason, FailureReason::NeverAppeared);
    assert_eq!(absent.observed, Observed::Absent);
    assert!(absent.assertion.contains("No Alerts Found"));

    let mismatch = result.assertions[1].failure.as_ref().unwrap();
    assert_eq!(mismatch.reason, FailureReason::ContentMismatch);
    assert_eq!(mismatch.observed, Observed::Text("3 active alerts".into()));

    assert_eq!(result.assertions[2].status, AssertionStatus::Held);
}

#[tokio::test]
async fn fail_fast_locator_timeout_stops_remaining_steps() {
    let (driver, runner) = harness();
    let scenario = Scenario::builder("missing-button")
        .config(config())
        .step(Step::navigate("/login"))
        .step(Step::click(Locator::css("#does-not-exist")).with_timeout(Duration::from_millis(150)))
        .step(Step::fill(Locator::label("Email"), "never@example.com"))
        .assert(Assertion::url_contains("/dashboard"))
        .assert(Assertion::url_contains("/login").regardless())
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Errored);
    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.steps_total, 3);
    let error = result.steps[1].error.as_ref().unwrap();
    assert_eq!(error.kind, StepErrorKind::LocatorTimeout);
    assert!(!driver.journal().iter().any(|entry| entry.contains("fill")));

    assert_eq!(result.assertions[0].status, AssertionStatus::Skipped);
    assert_eq!(result.assertions[1].status, AssertionStatus::Held);
    assert!(result.error.as_deref().unwrap().contains("step 2"));
    assert_eq!(driver.closes(), 1);
}

#[tokio::test]
async fn best_effort_records_failure_and_continues() {
    let (_, runner) = harness();
    let scenario = Scenario::builder("tolerant-login")
        .config(ScenarioConfig {
            failure_policy: FailurePolicy::BestEffort,
            ..config()
        })
        .step(Step::navigate("/login"))
        .step(Step::click(Locator::css("#cookie-banner")).with_timeout(Duration::from_millis(100)))
        .step(Step::fill(Locator::label("Email"), "ops@example.com"))
        .assert(Assertion::value_equals(Locator::label("Email"), "ops@example.com"))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Passed);
    assert_eq!(result.steps.len(), 3);
    assert!(!result.steps[1].success);
    assert!(result.steps[2].success);
}

#[tokio::test]
async fn step_override_aborts_a_best_effort_scenario() {
    let (_, runner) = harness();
    let scenario = Scenario::builder("critical-step")
        .config(ScenarioConfig {
            failure_policy: FailurePolicy::BestEffort,
            ..config()
        })
        .step(Step::navigate("/login"))
        .step(
            Step::click(Locator::css("#nope"))
                .with_timeout(Duration::from_millis(100))
                .on_failure(FailurePolicy::FailFast),
        )
        .step(Step::fill(Locator::label("Email"), "x"))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Errored);
    assert_eq!(result.steps.len(), 2);
}

#[tokio::test]
async fn concurrent_scenarios_do_not_share_state() {
    let (driver, runner) = harness();
    let mut registry = ScenarioRegistry::new();
    for (name, email) in [("login-a", "a@example.com"), ("login-b", "b@example.com")] {
        registry
            .register(
                Scenario::builder(name)
                    .config(config())
                    .steps(login_steps(email))
                    .assert(Assertion::text_visible(Locator::test_id("user-email"), email))
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }

    let report = registry
        .run_all(&runner, &ScenarioFilter::all(), 2)
        .await
        .unwrap();

    assert_eq!(report.total, 2);
    assert!(report.all_passed(), "{:?}", report.results);
    assert_eq!(report.results[0].scenario, "login-a");
    assert_eq!(report.results[1].scenario, "login-b");
    assert_ne!(report.results[0].session, report.results[1].session);
    assert_eq!(driver.launches(), 2);
    assert_eq!(driver.closes(), 2);

    let dir = TempDir::new().unwrap();
    let path = report.write_json(dir.path()).unwrap();
    assert!(path.ends_with("results.json"));
}

#[tokio::test]
async fn filter_runs_only_selected_scenarios() {
    let (driver, runner) = harness();
    let mut registry = ScenarioRegistry::new();
    registry
        .register(Scenario::builder("smoke").config(config()).tag("smoke").build().unwrap())
        .unwrap();
    registry
        .register(Scenario::builder("slow").config(config()).tag("nightly").build().unwrap())
        .unwrap();

    let report = registry
        .run_all(&runner, &ScenarioFilter::all().tag("smoke"), 4)
        .await
        .unwrap();

    assert_eq!(report.total, 1);
    assert_eq!(report.results[0].scenario, "smoke");
    assert_eq!(driver.launches(), 1);
}

#[tokio::test]
async fn cancellation_still_releases_the_session() {
    let (driver, runner) = harness();
    let token = CancellationToken::new();
    let runner = runner.with_cancellation(token.clone());
    let scenario = Scenario::builder("long-wait")
        .config(config())
        .step(Step::navigate("/dashboard"))
        .step(Step::sleep(5_000))
        .assert(Assertion::url_contains("/dashboard"))
        .build()
        .unwrap();

    let handle = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run(&scenario).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();
    let result = handle.await.unwrap();

    assert_eq!(result.outcome, Outcome::Errored);
    assert_eq!(result.error.as_deref(), Some("run cancelled"));
    assert_eq!(result.steps.len(), 1, "navigate finished before cancellation");
    assert_eq!(driver.closes(), 1);
    assert_eq!(runner.sessions().stats().active(), 0);
}

#[tokio::test]
async fn scenario_deadline_interrupts_and_releases() {
    let (driver, runner) = harness();
    let scenario = Scenario::builder("deadline")
        .config(ScenarioConfig {
            scenario_timeout_ms: Some(100),
            ..config()
        })
        .step(Step::sleep(2_000))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Errored);
    assert!(result.error.as_deref().unwrap().contains("deadline"));
    assert_eq!(driver.closes(), 1);
}

#[tokio::test]
async fn launch_failure_is_errored_without_steps() {
    let (driver, runner) = harness();
    driver.fail_launches(true);
    let scenario = Scenario::builder("no-browser")
        .config(config())
        .steps(login_steps("x@example.com"))
        .assert(Assertion::url_contains("/dashboard"))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Errored);
    assert!(result.steps.is_empty());
    assert!(result.assertions.is_empty());
    assert!(result.error.as_deref().unwrap().contains("launch"));
    assert_eq!(runner.sessions().stats().active(), 0);
}

#[tokio::test]
async fn nested_frame_search_skips_frames_that_never_load() {
    let (_, runner) = harness();
    let status = Locator::test_id("stp-status").in_frame(FrameScope::any_nested());
    let scenario = Scenario::builder("stp-status")
        .config(config())
        .step(Step::navigate("/stp"))
        .assert(Assertion::text_visible(status, "Treatment OK"))
        .assert(Assertion::element_visible(
            Locator::test_id("stp-status").in_frame(FrameScope::Nested {
                url_contains: None,
                name: Some("stp-chart".into()),
            }),
        ))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Passed, "{:?}", result.assertions);
}

#[tokio::test]
async fn main_scope_does_not_search_frames() {
    let (_, runner) = harness();
    let scenario = Scenario::builder("stp-main-only")
        .config(config())
        .step(Step::navigate("/stp"))
        .assert(
            Assertion::element_visible(Locator::test_id("stp-status"))
                .within(Duration::from_millis(100)),
        )
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Failed);
    let failure = result.assertions[0].failure.as_ref().unwrap();
    assert_eq!(failure.reason, FailureReason::NeverAppeared);
}

#[tokio::test]
async fn click_scrolls_offscreen_elements_into_view() {
    let (driver, runner) = harness();
    let scenario = Scenario::builder("export")
        .config(config())
        .step(Step::navigate("/assets"))
        .step(Step::click(Locator::css("#export")))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Passed);
    assert!(driver.journal().iter().any(|e| e.ends_with("click css=#export")));
}

#[tokio::test]
async fn click_rejects_hidden_and_unreachable_elements() {
    let (_, runner) = harness();
    let quick = Duration::from_millis(100);
    let scenario = Scenario::builder("bad-clicks")
        .config(ScenarioConfig {
            failure_policy: FailurePolicy::BestEffort,
            ..config()
        })
        .step(Step::navigate("/assets"))
        .step(Step::click(Locator::css("#archived")).with_timeout(quick))
        .step(Step::click(Locator::css("#footer-link")).with_timeout(quick))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    let hidden = result.steps[1].error.as_ref().unwrap();
    assert_eq!(hidden.kind, StepErrorKind::ElementNotInteractable);
    assert!(hidden.message.contains("hidden"));
    let outside = result.steps[2].error.as_ref().unwrap();
    assert_eq!(outside.kind, StepErrorKind::ElementNotInteractable);
    assert!(outside.message.contains("viewport"));
}

#[tokio::test]
async fn late_elements_resolve_within_timeout() {
    let (_, runner) = harness();
    let scenario = Scenario::builder("asset-count")
        .config(config())
        .step(Step::navigate("/assets"))
        .step(Step::wait_for(Locator::test_id("asset-count")))
        .assert(Assertion::text_visible(Locator::test_id("asset-count"), "42 assets"))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Passed);
}

#[tokio::test]
async fn retry_expansion_recovers_from_slow_rendering() {
    let (_, runner) = harness();
    let wait = Step::wait_for(Locator::test_id("asset-count")).with_timeout(Duration::from_millis(60));
    let scenario = Scenario::builder("retry-asset-count")
        .config(config())
        .step(Step::navigate("/assets"))
        .steps(retry(wait, 5, Backoff::Fixed(40)).unwrap())
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Passed);
    assert!(!result.steps[1].success, "first attempt should miss");
    let succeeded: Vec<_> = result
        .steps
        .iter()
        .filter(|s| s.label.contains("attempt") && s.success)
        .collect();
    assert_eq!(succeeded.len(), 1, "attempts after the first success are skipped");
    assert!(result.steps.last().unwrap().success);
    assert!(result.steps.len() < scenario.steps().len());
}

#[tokio::test]
async fn load_state_waits_are_bounded() {
    let (_, runner) = harness();
    let ok = Scenario::builder("reports-load")
        .config(config())
        .step(Step::navigate("/reports"))
        .step(Step::wait_for_load_state(LoadState::Load))
        .build()
        .unwrap();
    assert_eq!(runner.run(&ok).await.outcome, Outcome::Passed);

    let stuck = Scenario::builder("spinner-load")
        .config(config())
        .step(Step::new(dashcheck_common::Action::Navigate {
            url: "/spinner".into(),
            wait_until: WaitUntil::Load,
        }))
        .build()
        .unwrap();
    let result = runner.run(&stuck).await;
    assert_eq!(result.outcome, Outcome::Errored);
    assert_eq!(
        result.steps[0].error.as_ref().unwrap().kind,
        StepErrorKind::NavigationTimeout
    );
}

#[tokio::test]
async fn navigation_commit_timeout_is_reported() {
    let (driver, runner) = harness();
    let scenario = Scenario::builder("hang")
        .config(config())
        .step(Step::navigate("/hang"))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Errored);
    let error = result.steps[0].error.as_ref().unwrap();
    assert_eq!(error.kind, StepErrorKind::NavigationTimeout);
    assert!(error.message.contains("commit"));
    assert_eq!(driver.closes(), 1);
}

#[tokio::test]
async fn same_scenario_twice_gives_same_outcome() {
    let (driver, runner) = harness();
    let scenario = Scenario::builder("rerun")
        .config(config())
        .steps(login_steps("ops@example.com"))
        .assert(Assertion::url_contains("/dashboard"))
        .build()
        .unwrap();

    let first = runner.run(&scenario).await;
    let second = runner.run(&scenario).await;

    assert_eq!(first.outcome, second.outcome);
    assert_ne!(first.session, second.session);
    assert_eq!(driver.launches(), 2);
    assert_eq!(driver.closes(), 2);
}

#[tokio::test]
async fn failure_screenshot_is_written() {
    let (_, runner) = harness();
    let dir = TempDir::new().unwrap();
    let runner = runner.with_artifacts_dir(dir.path());
    let scenario = Scenario::builder("alerts/empty state")
        .config(config())
        .step(Step::navigate("/dashboard"))
        .assert(Assertion::element_visible(Locator::test_id("alerts-empty")).within(Duration::from_millis(50)))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    let shot = result.screenshot.expect("screenshot path");
    let session = result.session.unwrap().simple().to_string();
    assert_eq!(shot, dir.path().join(format!("alerts_empty_state-{session}.png")));
    assert!(shot.exists());
}

#[tokio::test]
async fn screenshots_of_colliding_names_are_kept_apart() {
    let (_, runner) = harness();
    let dir = TempDir::new().unwrap();
    let runner = runner.with_artifacts_dir(dir.path());
    let failing = |name: &str| {
        Scenario::builder(name)
            .config(config())
            .step(Step::navigate("/dashboard"))
            .assert(Assertion::element_visible(Locator::test_id("alerts-empty")).within(Duration::from_millis(50)))
            .build()
            .unwrap()
    };

    let slash = runner.run(&failing("assets/filter")).await;
    let space = runner.run(&failing("assets filter")).await;
    let again = runner.run(&failing("assets/filter")).await;

    let shots: Vec<_> = [&slash, &space, &again]
        .iter()
        .map(|r| r.screenshot.clone().expect("screenshot path"))
        .collect();
    assert_ne!(shots[0], shots[1]);
    assert_ne!(shots[0], shots[2]);
    assert!(shots.iter().all(|p| p.exists()));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
}

#[tokio::test]
async fn cancellation_during_launch_returns_promptly() {
    let (driver, runner) = harness();
    driver.delay_launches(Duration::from_secs(5));
    let token = CancellationToken::new();
    let runner = runner.with_cancellation(token.clone());
    let scenario = Scenario::builder("slow-browser")
        .config(config())
        .steps(login_steps("ops@example.com"))
        .build()
        .unwrap();

    let handle = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run(&scenario).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let cancelled_at = std::time::Instant::now();
    token.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("run should stop once cancelled")
        .unwrap();

    assert!(cancelled_at.elapsed() < Duration::from_secs(1));
    assert_eq!(result.outcome, Outcome::Errored);
    assert_eq!(result.error.as_deref(), Some("run cancelled"));
    assert!(result.session.is_none());
    assert!(result.steps.is_empty());
    assert_eq!(driver.launches(), 0);
    assert_eq!(runner.sessions().stats().active(), 0);
}

#[tokio::test]
async fn clear_then_fill_replaces_the_value() {
    let (driver, runner) = harness();
    let name = Locator::label("Display name");
    let scenario = Scenario::builder("rename")
        .config(config())
        .step(Step::navigate("/profile"))
        .step(Step::clear(name.clone()))
        .step(Step::fill(name.clone(), "Ops Team"))
        .assert(Assertion::value_equals(name, "Ops Team"))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Passed, "{:?}", result.assertions);
    let journal = driver.journal();
    let clear = journal.iter().position(|e| e.contains("clear label=Display name"));
    let fill = journal.iter().position(|e| e.contains("fill label=Display name"));
    assert!(clear.is_some() && clear < fill);
}

#[tokio::test]
async fn clear_alone_leaves_an_empty_value() {
    let (_, runner) = harness();
    let scenario = Scenario::builder("clear-name")
        .config(config())
        .step(Step::navigate("/profile"))
        .step(Step::clear(Locator::label("Display name")))
        .assert(Assertion::value_equals(Locator::label("Display name"), ""))
        .build()
        .unwrap();

    assert_eq!(runner.run(&scenario).await.outcome, Outcome::Passed);
}

#[tokio::test]
async fn read_only_inputs_reject_fill_and_clear() {
    let (driver, runner) = harness();
    let account = Locator::label("Account id");
    let scenario = Scenario::builder("edit-account-id")
        .config(ScenarioConfig {
            failure_policy: FailurePolicy::BestEffort,
            ..config()
        })
        .step(Step::navigate("/profile"))
        .step(Step::fill(account.clone(), "acct-99"))
        .step(Step::clear(account.clone()))
        .assert(Assertion::value_equals(account, "acct-17"))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    for step in &result.steps[1..] {
        let error = step.error.as_ref().unwrap();
        assert_eq!(error.kind, StepErrorKind::ElementNotInteractable);
        assert!(error.message.contains("not editable"), "{}", error.message);
    }
    assert_eq!(result.assertions[0].status, AssertionStatus::Held);
    assert!(!driver.journal().iter().any(|e| e.contains("label=Account id")));
}

#[tokio::test]
async fn scroll_reaches_the_browser() {
    let (driver, runner) = harness();
    let scenario = Scenario::builder("scroll-assets")
        .config(config())
        .step(Step::navigate("/assets"))
        .step(Step::scroll(0, 600))
        .step(Step::scroll(-40, 0))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert_eq!(result.outcome, Outcome::Passed);
    assert_eq!(result.steps[1].label, "scroll:0,600");
    let scrolls: Vec<_> = driver
        .journal()
        .into_iter()
        .filter(|e| e.contains("scroll"))
        .collect();
    assert_eq!(scrolls, vec!["#1 scroll 0,600", "#1 scroll -40,0"]);
}

#[tokio::test]
async fn wait_for_attached_accepts_hidden_elements() {
    let (_, runner) = harness();
    let csrf = Locator::css("input[name=csrf]");
    let attached = Step::new(dashcheck_common::Action::WaitFor {
        locator: csrf.clone(),
        state: ElementState::Attached,
    });
    let scenario = Scenario::builder("csrf-field")
        .config(ScenarioConfig {
            failure_policy: FailurePolicy::BestEffort,
            ..config()
        })
        .step(Step::navigate("/profile"))
        .step(attached)
        .step(Step::wait_for(csrf).with_timeout(Duration::from_millis(100)))
        .build()
        .unwrap();

    let result = runner.run(&scenario).await;

    assert!(result.steps[1].success, "{:?}", result.steps[1].error);
    let visible = result.steps[2].error.as_ref().unwrap();
    assert_eq!(visible.kind, StepErrorKind::LocatorTimeout);
}
